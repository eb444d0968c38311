use bytes::Bytes;
use log::debug;

use crate::{messages::Message, protocol::NodeId};

/// Outbound side of the radio link.
///
/// Sends are best effort: the frame may be lost or duplicated and no
/// completion is reported.
pub(crate) trait Link {
    fn send(&mut self, dest: NodeId, frame: Bytes);

    fn send_message(&mut self, dest: NodeId, message: &Message) {
        let frame = message.encode();
        debug!("-> {dest}: {message} [{}]", hex::encode(&frame));
        self.send(dest, frame);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Records every frame instead of transmitting it.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingLink {
        pub(crate) sent: Vec<(NodeId, Bytes)>,
    }

    impl RecordingLink {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Decoded copies of everything sent so far, draining the log.
        pub(crate) fn take(&mut self) -> Vec<(NodeId, Message)> {
            self.sent
                .drain(..)
                .map(|(dest, frame)| {
                    (dest, Message::decode(&frame).expect("sent frames are well formed"))
                })
                .collect()
        }
    }

    impl Link for RecordingLink {
        fn send(&mut self, dest: NodeId, frame: Bytes) {
            self.sent.push((dest, frame));
        }
    }
}
