//! Interrupt handling for operator-paced captures (SIGINT/SIGTERM)
//!
//! While a QR capture is blocked waiting for the operator:
//! 1. The first interrupt cancels that capture. The signing workflow stays in
//!    the state it was in before the capture and no artifact is touched.
//! 2. A second interrupt during the same capture exits immediately.
//!
//! Outside a capture an interrupt exits immediately. Artifacts are written
//! with write-then-rename, so exiting at any point never leaves a partial one.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

/// Exit code for cancelled workflows
pub const EXIT_CODE_CANCELLED: i32 = 80;

/// Shared interrupt state, polled by capture backends
#[derive(Debug, Default)]
pub struct SignalState {
    /// A capture is currently blocked on the operator
    capture_active: AtomicBool,
    /// The active capture should give up
    cancel_requested: AtomicBool,
    /// Interrupts received during the active capture
    signal_count: AtomicU8,
}

impl SignalState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of a blocking capture, clearing stale requests.
    pub fn begin_capture(&self) {
        self.cancel_requested.store(false, Ordering::SeqCst);
        self.signal_count.store(0, Ordering::SeqCst);
        self.capture_active.store(true, Ordering::SeqCst);
    }

    /// Mark the end of the capture, whatever its outcome.
    pub fn end_capture(&self) {
        self.capture_active.store(false, Ordering::SeqCst);
        self.cancel_requested.store(false, Ordering::SeqCst);
    }

    pub fn is_capture_active(&self) -> bool {
        self.capture_active.load(Ordering::SeqCst)
    }

    /// Check if the active capture has been asked to stop
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::SeqCst)
    }

    /// Ask the active capture to stop (same as a first interrupt)
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::SeqCst);
    }

    /// Decide what an interrupt means right now
    pub fn handle_signal(&self) -> SignalAction {
        if !self.is_capture_active() {
            return SignalAction::ImmediateExit;
        }

        let count = self.signal_count.fetch_add(1, Ordering::SeqCst);
        if count == 0 {
            self.request_cancel();
            SignalAction::CancelCapture
        } else {
            SignalAction::ImmediateExit
        }
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Return the blocked capture to its pre-capture state
    CancelCapture,
    /// Leave the process now
    ImmediateExit,
}

/// Installs the process-wide handler and hands out the shared state
pub struct SignalHandler {
    state: Arc<SignalState>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            state: Arc::new(SignalState::new()),
        }
    }

    /// Get a reference to the signal state
    pub fn state(&self) -> Arc<SignalState> {
        Arc::clone(&self.state)
    }

    /// Install the SIGINT/SIGTERM handler. Call once at startup.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::CancelCapture => {
                eprintln!("\nInterrupt received, cancelling scan (press Ctrl-C again to quit)");
            }
            SignalAction::ImmediateExit => {
                eprintln!("\nInterrupted");
                std::process::exit(EXIT_CODE_CANCELLED);
            }
        })
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Marks a capture active for its lifetime
pub(crate) struct CaptureGuard<'a> {
    state: &'a SignalState,
}

impl<'a> CaptureGuard<'a> {
    pub(crate) fn new(state: &'a SignalState) -> Self {
        state.begin_capture();
        Self { state }
    }
}

impl Drop for CaptureGuard<'_> {
    fn drop(&mut self) {
        self.state.end_capture();
    }
}
