use bytes::Bytes;
use log::warn;

use crate::constants::HANDLE_QUEUE_SIZE;

/// Frames received from the link and not yet handled.
///
/// When full, newly arrived frames are dropped; the sender's retransmission
/// recovers them.
#[derive(Debug, Default)]
pub(crate) struct InboundQueue {
    frames: heapless::Deque<Bytes, HANDLE_QUEUE_SIZE>,
    dropped: u64,
}

impl InboundQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the frame was dropped.
    pub(crate) fn push(&mut self, frame: Bytes) -> bool {
        match self.frames.push_back(frame) {
            Ok(()) => true,
            Err(frame) => {
                self.dropped += 1;
                warn!(
                    "Inbound queue full, dropping frame [{}] ({} dropped so far)",
                    hex::encode(&frame),
                    self.dropped
                );
                false
            }
        }
    }

    pub(crate) fn pop(&mut self) -> Option<Bytes> {
        self.frames.pop_front()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn dropped(&self) -> u64 {
        self.dropped
    }
}
