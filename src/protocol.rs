use std::error::Error;
use std::fmt;

use crate::constants::{BROKER_ADDRESS, MAX_NODES, NODE_OFFSET};

pub(crate) mod decoding;
pub(crate) mod encoding;
pub(crate) mod msg_type;
pub(crate) mod qos;

/// Size of the header shared by every message: node id and message type.
pub(crate) const HEADER_LEN: usize = 2;

/// Size of the packed subscription body.
pub(crate) const SUB_BODY_LEN: usize = 1;

/// Size of the publish body: topic id, flags and data.
pub(crate) const PUB_BODY_LEN: usize = 3;

/// Returned when a frame cannot be interpreted as a protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MalformedMessageError(pub String);

impl fmt::Display for MalformedMessageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Malformed Message: {}", self.0)
    }
}

impl Error for MalformedMessageError {}

/// Identity of a node on the radio network.
///
/// The wire carries a raw byte, so any value can be decoded; use
/// [`NodeId::is_client`] before trusting one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct NodeId(pub u8);

impl NodeId {
    pub(crate) const BROKER: NodeId = NodeId(BROKER_ADDRESS);

    pub(crate) fn is_broker(self) -> bool {
        self.0 == BROKER_ADDRESS
    }

    /// Client identities occupy `NODE_OFFSET..=MAX_NODES`.
    pub(crate) fn is_client(self) -> bool {
        (NODE_OFFSET..=MAX_NODES).contains(&self.0)
    }

    /// Every identity a client may use, in ascending order.
    pub(crate) fn clients() -> impl Iterator<Item = NodeId> {
        (NODE_OFFSET..=MAX_NODES).map(NodeId)
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_broker() {
            write!(f, "broker")
        } else {
            write!(f, "node {}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn broker_is_never_a_client() {
        assert!(NodeId::BROKER.is_broker());
        assert!(!NodeId::BROKER.is_client());
        assert!(NodeId::clients().all(|id| !id.is_broker()));
    }

    #[test]
    fn client_range_has_seven_members() {
        let clients: Vec<_> = NodeId::clients().collect();
        assert_eq!(clients.len(), 7);
        assert_eq!(clients.first(), Some(&NodeId(2)));
        assert_eq!(clients.last(), Some(&NodeId(8)));
        assert!(!NodeId(0).is_client());
        assert!(!NodeId(9).is_client());
    }
}
