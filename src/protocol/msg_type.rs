use std::fmt;

use crate::constants::{
    CONNACK_IDENTIFIER, CONN_IDENTIFIER, PUBACK_IDENTIFIER, PUB_IDENTIFIER, SUBACK_IDENTIFIER,
    SUB_IDENTIFIER,
};

use super::{HEADER_LEN, PUB_BODY_LEN, SUB_BODY_LEN};

/// Represents the message types of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum MsgType {
    /// Connection request.
    /// Sent by: Node to Broker.
    Conn = CONN_IDENTIFIER as isize,

    /// Connect acknowledgment.
    /// Sent by: Broker to Node.
    ConnAck = CONNACK_IDENTIFIER as isize,

    /// Subscribe request.
    /// Sent by: Node to Broker.
    Sub = SUB_IDENTIFIER as isize,

    /// Subscribe acknowledgment.
    /// Sent by: Broker to Node.
    SubAck = SUBACK_IDENTIFIER as isize,

    /// Publish message.
    /// Sent by: Node to Broker or Broker to Node.
    Pub = PUB_IDENTIFIER as isize,

    /// Publish acknowledgment (`QoS` 1).
    /// Sent by: Node to Broker or Broker to Node.
    PubAck = PUBACK_IDENTIFIER as isize,
}

impl MsgType {
    /// Converts a numeric value to a `MsgType`.
    ///
    /// Returns `None` if the value does not match a known type.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            CONN_IDENTIFIER => Some(Self::Conn),
            CONNACK_IDENTIFIER => Some(Self::ConnAck),
            SUB_IDENTIFIER => Some(Self::Sub),
            SUBACK_IDENTIFIER => Some(Self::SubAck),
            PUB_IDENTIFIER => Some(Self::Pub),
            PUBACK_IDENTIFIER => Some(Self::PubAck),
            _ => None,
        }
    }

    /// Converts the `MsgType` to its numeric value.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// The request type an acknowledgment retires, or `None` for requests.
    pub fn acknowledges(self) -> Option<MsgType> {
        match self {
            Self::ConnAck => Some(Self::Conn),
            Self::SubAck => Some(Self::Sub),
            Self::PubAck => Some(Self::Pub),
            Self::Conn | Self::Sub | Self::Pub => None,
        }
    }

    /// Number of bytes a message of this type occupies on the wire.
    pub fn wire_len(self) -> usize {
        match self {
            Self::Conn | Self::ConnAck | Self::SubAck | Self::PubAck => HEADER_LEN,
            Self::Sub => HEADER_LEN + SUB_BODY_LEN,
            Self::Pub => HEADER_LEN + PUB_BODY_LEN,
        }
    }
}

impl fmt::Display for MsgType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Self::Conn => "CONN",
            Self::ConnAck => "CONNACK",
            Self::Sub => "SUB",
            Self::SubAck => "SUBACK",
            Self::Pub => "PUB",
            Self::PubAck => "PUBACK",
        };

        write!(f, "{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_cover_zero_to_five() {
        for value in 0..=5u8 {
            let msg_type = MsgType::from_u8(value).expect("known discriminant");
            assert_eq!(msg_type.to_u8(), value);
        }
        assert_eq!(MsgType::from_u8(6), None);
        assert_eq!(MsgType::from_u8(0xFF), None);
    }

    #[test]
    fn acks_retire_their_request() {
        assert_eq!(MsgType::ConnAck.acknowledges(), Some(MsgType::Conn));
        assert_eq!(MsgType::SubAck.acknowledges(), Some(MsgType::Sub));
        assert_eq!(MsgType::PubAck.acknowledges(), Some(MsgType::Pub));
        assert_eq!(MsgType::Pub.acknowledges(), None);
    }
}
