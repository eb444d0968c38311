use std::{fmt, io::Cursor};

use bytes::{BufMut, BytesMut};

use crate::{
    constants::TOPIC_COUNT,
    protocol::{
        decoding::decode_flags,
        encoding::{pack_bits, unpack_bits},
        msg_type::MsgType,
        qos::QoS,
        MalformedMessageError,
    },
    topics::Topic,
};

use super::{DecodablePayload, EncodablePayload};

/// Bit offset of the `QoS` flags inside the packed byte.
const QOS_SHIFT: u8 = TOPIC_COUNT as u8;

/// Bits 6 and 7 are reserved.
const SUB_FLAGS_MASK: u8 = 0b0011_1111;

/// Topics a node wants to receive, with the `QoS` of each.
///
/// # Wire Format
///
/// | Bit  | 7 | 6 | 5      | 4      | 3      | 2       | 1       | 0       |
/// |------|---|---|--------|--------|--------|---------|---------|---------|
/// | Byte | reserved | QoS HUMI | QoS LUMI | QoS TEMP | want HUMI | want LUMI | want TEMP |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct SubPayload {
    pub(crate) topics: [bool; TOPIC_COUNT],
    pub(crate) qos: [bool; TOPIC_COUNT],
}

impl SubPayload {
    /// Subscribe to `topic` with the given `QoS`, or drop it with `None`.
    pub(crate) fn set(&mut self, topic: Topic, qos: Option<QoS>) {
        self.topics[topic.index()] = qos.is_some();
        self.qos[topic.index()] = qos.is_some_and(QoS::is_reliable);
    }

    /// The requested `QoS` for `topic`, if the topic is wanted at all.
    pub(crate) fn qos_for(&self, topic: Topic) -> Option<QoS> {
        self.topics[topic.index()].then(|| QoS::from_bit(self.qos[topic.index()]))
    }

    pub(crate) fn wanted(&self) -> impl Iterator<Item = (Topic, QoS)> + '_ {
        Topic::ALL.into_iter().filter_map(|topic| self.qos_for(topic).map(|qos| (topic, qos)))
    }
}

impl DecodablePayload for SubPayload {
    fn msg_type() -> MsgType {
        MsgType::Sub
    }

    fn decode(cursor: &mut Cursor<&[u8]>) -> Result<Self, MalformedMessageError> {
        let flags = decode_flags(cursor, SUB_FLAGS_MASK).map_err(|e| {
            MalformedMessageError(format!("{} subscription flags: {}", Self::msg_type(), e.0))
        })?;

        // QoS bits of unwanted topics are carried but never read
        let topics = unpack_bits::<TOPIC_COUNT>(flags, 0);
        let qos = unpack_bits::<TOPIC_COUNT>(flags, QOS_SHIFT);

        Ok(Self { topics, qos })
    }
}

impl EncodablePayload for SubPayload {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(pack_bits(&self.topics, 0) | pack_bits(&self.qos, QOS_SHIFT));
    }
}

impl fmt::Display for SubPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (topic, qos)) in self.wanted().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{topic}:{}", qos.to_u8())?;
        }
        write!(f, "]")
    }
}
