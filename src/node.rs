use std::fmt;

use log::{debug, error, info, warn};
use tokio::time::Instant;

use crate::{
    config::ProtocolConfig,
    error::ProtocolError,
    link::Link,
    messages::{publish_payload::PubPayload, Message, MessageBody},
    protocol::{msg_type::MsgType, NodeId},
    retransmission::RetransmissionQueue,
    topics::{self, NodeProfile},
};

/// Lifecycle of a sensor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeState {
    Disconnected,
    Connecting,
    Connected,
    Subscribing,
    Active,
    /// Terminal. The node stopped all protocol activity.
    Failed,
}

impl NodeState {
    fn name(self) -> &'static str {
        match self {
            Self::Disconnected => "DISCONNECTED",
            Self::Connecting => "CONNECTING",
            Self::Connected => "CONNECTED",
            Self::Subscribing => "SUBSCRIBING",
            Self::Active => "ACTIVE",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Client side of the protocol, run by every sensor node.
///
/// The node talks only to the broker. It owns its retransmission queue and
/// is driven by three inputs: received frames, the retransmission tick and
/// the sample timer.
#[derive(Debug)]
pub(crate) struct Node {
    id: NodeId,
    state: NodeState,
    profile: NodeProfile,
    config: ProtocolConfig,
    queue: RetransmissionQueue,
    delivery_failures: u8,
}

impl Node {
    pub(crate) fn new(id: NodeId, config: ProtocolConfig) -> Self {
        let profile = config.topic_assignment.profile_for(id);
        Self::with_profile(id, profile, config)
    }

    pub(crate) fn with_profile(id: NodeId, profile: NodeProfile, config: ProtocolConfig) -> Self {
        let queue = RetransmissionQueue::new(config.max_retries);
        Self { id, state: NodeState::Disconnected, profile, config, queue, delivery_failures: 0 }
    }

    pub(crate) fn id(&self) -> NodeId {
        self.id
    }

    pub(crate) fn state(&self) -> NodeState {
        self.state
    }

    /// Messages still waiting for an acknowledgment from the broker.
    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Send CONN to the broker. Has no effect once the node left `Disconnected`.
    pub(crate) fn start<L: Link>(&mut self, now: Instant, link: &mut L) -> Result<(), ProtocolError> {
        if self.state != NodeState::Disconnected {
            debug!("{} already started ({})", self.id, self.state);
            return Ok(());
        }

        info!(
            "{} starting: subscribes {}, publishes {} with {}",
            self.id, self.profile.subscriptions, self.profile.publish_topic, self.profile.publish_qos
        );
        self.send_tracked(Message::conn(self.id), now, link)?;
        self.transition(NodeState::Connecting);

        Ok(())
    }

    /// Decode and handle a frame received from the link.
    ///
    /// Frames addressed to another node are ignored.
    pub(crate) fn handle_frame<L: Link>(
        &mut self,
        frame: &[u8],
        now: Instant,
        link: &mut L,
    ) -> Result<(), ProtocolError> {
        let message = Message::decode(frame)?;
        if message.node_id != self.id {
            return Ok(());
        }

        self.handle_message(message, now, link)
    }

    pub(crate) fn handle_message<L: Link>(
        &mut self,
        message: Message,
        now: Instant,
        link: &mut L,
    ) -> Result<(), ProtocolError> {
        debug!("{} <- {message}", self.id);

        match (self.state, &message.body) {
            (NodeState::Failed, _) => Err(ProtocolError::Failed),
            (NodeState::Connecting, MessageBody::ConnAck) => {
                self.retire(MsgType::ConnAck)?;
                self.transition(NodeState::Connected);
                self.subscribe(now, link)
            }
            (NodeState::Subscribing, MessageBody::SubAck) => {
                self.retire(MsgType::SubAck)?;
                self.transition(NodeState::Active);
                Ok(())
            }
            (NodeState::Active, MessageBody::PubAck) => {
                self.retire(MsgType::PubAck)?;
                self.delivery_failures = 0;
                Ok(())
            }
            (
                NodeState::Connected | NodeState::Subscribing | NodeState::Active,
                MessageBody::Pub(payload),
            ) => {
                self.deliver(*payload, link);
                Ok(())
            }
            (_, MessageBody::ConnAck | MessageBody::SubAck | MessageBody::PubAck) => {
                Err(ProtocolError::DuplicateAck { from: NodeId::BROKER, msg_type: message.msg_type() })
            }
            _ => Err(ProtocolError::UnexpectedMessage {
                from: NodeId::BROKER,
                msg_type: message.msg_type(),
                state: self.state.name(),
            }),
        }
    }

    /// Publish a sensor reading on the assigned topic.
    ///
    /// Readings taken before the node is `Active` are discarded.
    pub(crate) fn on_sample<L: Link>(
        &mut self,
        now: Instant,
        data: u8,
        link: &mut L,
    ) -> Result<(), ProtocolError> {
        match self.state {
            NodeState::Failed => return Err(ProtocolError::Failed),
            NodeState::Active => {}
            state => {
                debug!("{} discarding reading {data} while {state}", self.id);
                return Ok(());
            }
        }

        let payload = PubPayload { topic: self.profile.publish_topic, qos: self.profile.publish_qos, data };
        let message = Message::publish(self.id, payload);

        if payload.qos.is_reliable() {
            self.send_tracked(message, now, link)?;
        } else {
            link.send_message(NodeId::BROKER, &message);
        }
        info!("{} published {payload}", self.id);

        Ok(())
    }

    /// Run the retransmission timer and escalate undeliverable messages.
    pub(crate) fn on_tick<L: Link>(&mut self, now: Instant, link: &mut L) {
        if self.state == NodeState::Failed || self.queue.is_empty() {
            return;
        }

        for failure in self.queue.tick(now, link) {
            match failure.message.msg_type() {
                MsgType::Conn | MsgType::Sub => {
                    self.fail(&format!("no answer to {}", failure.message.msg_type()));
                    return;
                }
                MsgType::Pub => {
                    self.delivery_failures += 1;
                    warn!(
                        "{} could not deliver {} ({}/{})",
                        self.id, failure.message, self.delivery_failures, self.config.max_delivery_failures
                    );
                    if self.delivery_failures >= self.config.max_delivery_failures {
                        self.fail("too many undelivered publishes");
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn subscribe<L: Link>(&mut self, now: Instant, link: &mut L) -> Result<(), ProtocolError> {
        self.send_tracked(Message::sub(self.id, self.profile.subscriptions), now, link)?;
        self.transition(NodeState::Subscribing);
        Ok(())
    }

    fn deliver<L: Link>(&mut self, payload: PubPayload, link: &mut L) {
        let topic = topics::name_of(payload.topic.to_u8()).unwrap_or("????");
        info!("{} received {topic}: {}", self.id, payload.data);

        if payload.qos.is_reliable() {
            link.send_message(NodeId::BROKER, &Message::pub_ack(self.id));
        }
    }

    fn send_tracked<L: Link>(
        &mut self,
        message: Message,
        now: Instant,
        link: &mut L,
    ) -> Result<(), ProtocolError> {
        let delay = self.config.retry_delay_for(message.msg_type(), self.id);
        self.queue.send(link, NodeId::BROKER, message, now, delay)?;
        Ok(())
    }

    fn retire(&mut self, ack: MsgType) -> Result<(), ProtocolError> {
        let acked_type = ack.acknowledges().unwrap_or(ack);
        if self.queue.acknowledge(NodeId::BROKER, acked_type) {
            Ok(())
        } else {
            Err(ProtocolError::DuplicateAck { from: NodeId::BROKER, msg_type: ack })
        }
    }

    fn transition(&mut self, next: NodeState) {
        info!("{}: {} -> {}", self.id, self.state, next);
        self.state = next;
    }

    fn fail(&mut self, reason: &str) {
        error!("{} failed: {reason}", self.id);
        self.queue.clear();
        self.state = NodeState::Failed;
    }
}
