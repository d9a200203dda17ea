//! Line-oriented capture for keyboard-wedge QR scanners
//!
//! A handheld scanner decodes the QR code itself and types the text followed
//! by Enter. Lines are read on one background thread for the whole process,
//! so an abandoned capture never leaves a reader behind to swallow the next
//! scan.

use std::io::{self, BufRead};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use super::{CaptureError, QrCapture, ScanKind};
use crate::signal::{CaptureGuard, SignalState};

/// Typed inputs that cancel the current scan
pub const CANCEL_INPUTS: &[&str] = &["q", ":q"];

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Feed lines from `reader` into a channel on a background thread.
///
/// Bytes that are not UTF-8 are replaced rather than ending the stream; the
/// line then fails decoding like any other bad scan. Only EOF or a read
/// error stops the reader.
pub fn spawn_line_reader<R>(mut reader: R) -> Receiver<String>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::warn!(error = %e, "scanner input failed");
                    break;
                }
            }

            let line = match String::from_utf8(buf.clone()) {
                Ok(line) => line,
                Err(_) => {
                    tracing::warn!(len = buf.len(), "scanner sent bytes that are not UTF-8");
                    String::from_utf8_lossy(&buf).into_owned()
                }
            };
            let line = line.trim_end_matches(['\n', '\r']).to_string();
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Lines typed on stdin
pub fn stdin_lines() -> Receiver<String> {
    spawn_line_reader(io::BufReader::new(io::stdin()))
}

/// Capture backend reading decoded text one line at a time
pub struct LineCapture {
    lines: Receiver<String>,
    signals: Arc<SignalState>,
    timeout: Option<Duration>,
}

impl LineCapture {
    pub fn new(lines: Receiver<String>, signals: Arc<SignalState>) -> Self {
        Self {
            lines,
            signals,
            timeout: None,
        }
    }

    /// Give up after `timeout`. `None` blocks until decode or cancel.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

impl QrCapture for LineCapture {
    fn capture(&mut self, kind: ScanKind) -> Result<String, CaptureError> {
        let _guard = CaptureGuard::new(&self.signals);
        let started = Instant::now();
        tracing::debug!(kind = %kind, "waiting for scan");

        loop {
            if self.signals.is_cancel_requested() {
                tracing::debug!(kind = %kind, "scan interrupted");
                return Err(CaptureError::Cancelled(kind));
            }

            let wait = match self.timeout {
                Some(timeout) => {
                    let elapsed = started.elapsed();
                    if elapsed >= timeout {
                        return Err(CaptureError::TimedOut {
                            kind,
                            seconds: timeout.as_secs(),
                        });
                    }
                    POLL_INTERVAL.min(timeout - elapsed)
                }
                None => POLL_INTERVAL,
            };

            match self.lines.recv_timeout(wait) {
                Ok(line) => {
                    let text = line.trim();
                    if text.is_empty() {
                        continue;
                    }
                    if CANCEL_INPUTS.contains(&text) {
                        tracing::debug!(kind = %kind, "scan cancelled from input");
                        return Err(CaptureError::Cancelled(kind));
                    }
                    tracing::debug!(kind = %kind, len = text.len(), "QR code decoded");
                    return Ok(text.to_string());
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    return Err(CaptureError::SourceClosed(kind));
                }
            }
        }
    }
}
