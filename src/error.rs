use std::{error::Error, fmt};

use crate::{
    protocol::{msg_type::MsgType, MalformedMessageError, NodeId},
    retransmission::QueueError,
};

/// Reasons a state machine refused to act on a message.
///
/// None of these are fatal: the drivers log them and keep going. Silent
/// rejects produce no reply, so the sender's own retry logic takes over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProtocolError {
    Malformed(MalformedMessageError),
    UnknownNode(u8),
    UnexpectedMessage { from: NodeId, msg_type: MsgType, state: &'static str },
    QueueFull(QueueError),
    DuplicateAck { from: NodeId, msg_type: MsgType },
    Failed,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "{e}"),
            Self::UnknownNode(id) => write!(f, "Unknown Node: {id}"),
            Self::UnexpectedMessage { from, msg_type, state } => {
                write!(f, "Unexpected {msg_type} from {from} in state {state}")
            }
            Self::QueueFull(e) => write!(f, "{e}"),
            Self::DuplicateAck { from, msg_type } => {
                write!(f, "Duplicate Ack: {msg_type} from {from} matches no pending entry")
            }
            Self::Failed => write!(f, "Node has failed"),
        }
    }
}

impl Error for ProtocolError {}

impl From<MalformedMessageError> for ProtocolError {
    fn from(e: MalformedMessageError) -> Self {
        Self::Malformed(e)
    }
}

impl From<QueueError> for ProtocolError {
    fn from(e: QueueError) -> Self {
        Self::QueueFull(e)
    }
}
