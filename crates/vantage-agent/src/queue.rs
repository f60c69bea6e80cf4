//! FIFO buffer for frames accepted while the transport is down.

use std::collections::VecDeque;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Outbound frames awaiting transport availability.
///
/// Entries are serialized frames, flushed in strict FIFO order exactly once.
/// A frame that fails to send during a flush goes back to the front of the
/// queue; frames behind it are not attempted.
#[derive(Debug, Default)]
pub(crate) struct OutboundQueue {
    frames: VecDeque<String>,
}

impl OutboundQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Append a serialized frame.
    pub(crate) fn enqueue(&mut self, frame: String) {
        self.frames.push_back(frame);
    }

    /// Send every queued frame in original order.
    ///
    /// Stops at the first failure, putting the failed frame back at the
    /// front. Returns the number of frames handed to the transport.
    pub(crate) fn flush(&mut self, sender: &mpsc::Sender<String>) -> usize {
        let mut sent = 0;
        while let Some(frame) = self.frames.pop_front() {
            match sender.try_send(frame) {
                Ok(()) => sent += 1,
                Err(TrySendError::Full(frame) | TrySendError::Closed(frame)) => {
                    self.frames.push_front(frame);
                    break;
                }
            }
        }
        sent
    }

    /// Drop all queued frames without sending. Returns the dropped count.
    pub(crate) fn clear(&mut self) -> usize {
        let dropped = self.frames.len();
        self.frames.clear();
        dropped
    }

    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
