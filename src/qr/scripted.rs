//! Replay capture: a fixed queue of scan outcomes

use std::collections::VecDeque;

use super::{CaptureError, QrCapture, ScanKind};

#[derive(Debug)]
enum Scripted {
    Decode(String),
    Cancel,
    Timeout,
}

/// Capture backend that replays queued outcomes in order.
///
/// Each entry is decoded text, an operator cancel or a timeout.
/// An exhausted queue behaves like a closed capture source.
#[derive(Debug, Default)]
pub struct ScriptedCapture {
    queue: VecDeque<Scripted>,
    requested: Vec<ScanKind>,
}

impl ScriptedCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue decoded text
    pub fn then_decode(mut self, text: impl Into<String>) -> Self {
        self.queue.push_back(Scripted::Decode(text.into()));
        self
    }

    /// Queue an operator cancel
    pub fn then_cancel(mut self) -> Self {
        self.queue.push_back(Scripted::Cancel);
        self
    }

    /// Queue a scan that times out
    pub fn then_timeout(mut self) -> Self {
        self.queue.push_back(Scripted::Timeout);
        self
    }

    /// Scans requested so far, in order
    pub fn requested(&self) -> &[ScanKind] {
        &self.requested
    }

    /// Outcomes not yet consumed
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

impl QrCapture for ScriptedCapture {
    fn capture(&mut self, kind: ScanKind) -> Result<String, CaptureError> {
        self.requested.push(kind);
        match self.queue.pop_front() {
            Some(Scripted::Decode(text)) => Ok(text),
            Some(Scripted::Cancel) => Err(CaptureError::Cancelled(kind)),
            Some(Scripted::Timeout) => Err(CaptureError::TimedOut { kind, seconds: 0 }),
            None => Err(CaptureError::SourceClosed(kind)),
        }
    }
}
