use std::{fmt, io::Cursor};

use bytes::{BufMut, BytesMut};

use crate::{
    protocol::{
        decoding::{decode_flags, decode_u8},
        msg_type::MsgType,
        qos::QoS,
        MalformedMessageError,
    },
    topics::{self, Topic},
};

use super::{DecodablePayload, EncodablePayload};

/// Only bit 0 (`QoS`) is defined.
const PUB_FLAGS_MASK: u8 = 0b0000_0001;

/// A sensor reading published on a topic.
///
/// # Wire Format
///
/// | Byte | Field                          |
/// |------|--------------------------------|
/// | 1    | Topic id (0..=2)               |
/// | 2    | Flags: bit 0 is `QoS`, rest 0  |
/// | 3    | Data                           |
///
/// The body is always topic, flags, data in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PubPayload {
    pub(crate) topic: Topic,
    pub(crate) qos: QoS,
    pub(crate) data: u8,
}

impl DecodablePayload for PubPayload {
    fn msg_type() -> MsgType {
        MsgType::Pub
    }

    fn decode(cursor: &mut Cursor<&[u8]>) -> Result<Self, MalformedMessageError> {
        let topic_id = decode_u8(cursor)?;
        if !topics::is_valid(topic_id) {
            return Err(MalformedMessageError(format!(
                "{} with unknown topic id: {topic_id}",
                Self::msg_type()
            )));
        }
        let topic = Topic::ALL[topic_id as usize];

        let flags = decode_flags(cursor, PUB_FLAGS_MASK).map_err(|e| {
            MalformedMessageError(format!("{} flags: {}", Self::msg_type(), e.0))
        })?;
        let qos = QoS::from_bit(flags & PUB_FLAGS_MASK == 1);

        let data = decode_u8(cursor)?;

        Ok(Self { topic, qos, data })
    }
}

impl EncodablePayload for PubPayload {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.topic.to_u8());
        buf.put_u8(self.qos.to_u8());
        buf.put_u8(self.data);
    }
}

impl fmt::Display for PubPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} ({})", self.topic, self.data, self.qos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unknown_topic() {
        let mut cursor = Cursor::new(&[3u8, 0, 42][..]);
        let err = PubPayload::decode(&mut cursor).unwrap_err();
        assert_eq!(err.0, "PUB with unknown topic id: 3");
    }

    #[test]
    fn rejects_reserved_flag_bits() {
        let mut cursor = Cursor::new(&[0u8, 0b10, 42][..]);
        assert!(PubPayload::decode(&mut cursor).is_err());
    }

    #[test]
    fn decodes_fields_in_order() {
        let mut cursor = Cursor::new(&[2u8, 1, 200][..]);
        let payload = PubPayload::decode(&mut cursor).unwrap();
        assert_eq!(payload, PubPayload { topic: Topic::Humidity, qos: QoS::AtLeastOnce, data: 200 });
        assert_eq!(payload.to_string(), "HUMI=200 (QoS 1)");
    }
}
