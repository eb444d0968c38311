use std::{fmt, io::Cursor};

use bytes::{Bytes, BytesMut};

use crate::protocol::{
    decoding::decode_header, encoding::encode_header, msg_type::MsgType, MalformedMessageError,
    NodeId,
};

use self::{publish_payload::PubPayload, subscribe_payload::SubPayload};

pub(crate) mod publish_payload;
pub(crate) mod subscribe_payload;

pub(crate) trait DecodablePayload: Sized {
    fn msg_type() -> MsgType;

    fn decode(cursor: &mut Cursor<&[u8]>) -> Result<Self, MalformedMessageError>;
}

pub(crate) trait EncodablePayload {
    fn encode(&self, buf: &mut BytesMut);
}

/// Body of a message, selected by its type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MessageBody {
    Conn,
    ConnAck,
    Sub(SubPayload),
    SubAck,
    Pub(PubPayload),
    PubAck,
}

/// A protocol message.
///
/// `node_id` names the client the message is about: the sender for messages
/// a node sends to the broker, the addressee for messages the broker sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Message {
    pub(crate) node_id: NodeId,
    pub(crate) body: MessageBody,
}

impl Message {
    pub(crate) fn new(node_id: NodeId, body: MessageBody) -> Self {
        Self { node_id, body }
    }

    pub(crate) fn conn(node_id: NodeId) -> Self {
        Self::new(node_id, MessageBody::Conn)
    }

    pub(crate) fn conn_ack(node_id: NodeId) -> Self {
        Self::new(node_id, MessageBody::ConnAck)
    }

    pub(crate) fn sub(node_id: NodeId, payload: SubPayload) -> Self {
        Self::new(node_id, MessageBody::Sub(payload))
    }

    pub(crate) fn sub_ack(node_id: NodeId) -> Self {
        Self::new(node_id, MessageBody::SubAck)
    }

    pub(crate) fn publish(node_id: NodeId, payload: PubPayload) -> Self {
        Self::new(node_id, MessageBody::Pub(payload))
    }

    pub(crate) fn pub_ack(node_id: NodeId) -> Self {
        Self::new(node_id, MessageBody::PubAck)
    }

    pub(crate) fn msg_type(&self) -> MsgType {
        match self.body {
            MessageBody::Conn => MsgType::Conn,
            MessageBody::ConnAck => MsgType::ConnAck,
            MessageBody::Sub(_) => MsgType::Sub,
            MessageBody::SubAck => MsgType::SubAck,
            MessageBody::Pub(_) => MsgType::Pub,
            MessageBody::PubAck => MsgType::PubAck,
        }
    }

    /// Encode the message into its fixed-size wire form.
    pub(crate) fn encode(&self) -> Bytes {
        let msg_type = self.msg_type();
        let mut buf = BytesMut::with_capacity(msg_type.wire_len());

        encode_header(&mut buf, self.node_id, msg_type);
        match &self.body {
            MessageBody::Sub(payload) => payload.encode(&mut buf),
            MessageBody::Pub(payload) => payload.encode(&mut buf),
            MessageBody::Conn | MessageBody::ConnAck | MessageBody::SubAck | MessageBody::PubAck => {}
        }

        buf.freeze()
    }

    /// Decode a message from a received frame.
    ///
    /// Bytes past the length of the decoded type are link padding and are ignored.
    ///
    /// # Errors
    /// - Returns `MalformedMessageError` if the frame is shorter than its type
    ///   requires or carries values outside their ranges.
    pub(crate) fn decode(frame: &[u8]) -> Result<Self, MalformedMessageError> {
        let mut cursor = Cursor::new(frame);
        let (node_id, msg_type) = decode_header(&mut cursor)?;

        if frame.len() < msg_type.wire_len() {
            return Err(MalformedMessageError(format!(
                "{msg_type} requires {} bytes, got {}",
                msg_type.wire_len(),
                frame.len()
            )));
        }

        let body = match msg_type {
            MsgType::Conn => MessageBody::Conn,
            MsgType::ConnAck => MessageBody::ConnAck,
            MsgType::Sub => MessageBody::Sub(SubPayload::decode(&mut cursor)?),
            MsgType::SubAck => MessageBody::SubAck,
            MsgType::Pub => MessageBody::Pub(PubPayload::decode(&mut cursor)?),
            MsgType::PubAck => MessageBody::PubAck,
        };

        Ok(Self { node_id, body })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            MessageBody::Sub(payload) => write!(f, "SUB({}) {payload}", self.node_id.0),
            MessageBody::Pub(payload) => write!(f, "PUB({}) {payload}", self.node_id.0),
            _ => write!(f, "{}({})", self.msg_type(), self.node_id.0),
        }
    }
}
