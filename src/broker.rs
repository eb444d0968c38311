use std::fmt;

use log::{debug, info, warn};
use tokio::time::Instant;

use crate::{
    config::ProtocolConfig,
    constants::MAX_NODES,
    error::ProtocolError,
    link::Link,
    messages::{publish_payload::PubPayload, subscribe_payload::SubPayload, Message, MessageBody},
    protocol::{msg_type::MsgType, NodeId},
    retransmission::{DeliveryFailed, RetransmissionQueue},
    topics::SubscriptionTable,
};

/// What the broker knows about one client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum SessionState {
    #[default]
    Unknown,
    Connected,
    Subscribed,
}

impl SessionState {
    fn name(self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Connected => "CONNECTED",
            Self::Subscribed => "SUBSCRIBED",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

const SLOTS: usize = MAX_NODES as usize + 1;

/// The central hub: tracks every client session, keeps the subscription
/// table and forwards each publish to the subscribers of its topic.
#[derive(Debug)]
pub(crate) struct Broker {
    sessions: [SessionState; SLOTS],
    subscriptions: SubscriptionTable,
    queue: RetransmissionQueue,
    config: ProtocolConfig,
    delivery_failures: [u32; SLOTS],
}

impl Broker {
    pub(crate) fn new(config: ProtocolConfig) -> Self {
        Self {
            sessions: [SessionState::Unknown; SLOTS],
            subscriptions: SubscriptionTable::new(),
            queue: RetransmissionQueue::new(config.max_retries),
            config,
            delivery_failures: [0; SLOTS],
        }
    }

    pub(crate) fn session(&self, node: NodeId) -> SessionState {
        self.sessions.get(node.index()).copied().unwrap_or_default()
    }

    #[cfg(test)]
    pub(crate) fn subscriptions(&self) -> &SubscriptionTable {
        &self.subscriptions
    }

    /// Forwards to `node` still waiting for a PUBACK.
    pub(crate) fn pending_for(&self, node: NodeId) -> usize {
        self.queue.pending_for(node)
    }

    /// Forwards to `node` that were given up on.
    pub(crate) fn delivery_failures(&self, node: NodeId) -> u32 {
        self.delivery_failures.get(node.index()).copied().unwrap_or(0)
    }

    pub(crate) fn handle_frame<L: Link>(
        &mut self,
        frame: &[u8],
        now: Instant,
        link: &mut L,
    ) -> Result<(), ProtocolError> {
        let message = Message::decode(frame)?;
        self.handle_message(message, now, link)
    }

    pub(crate) fn handle_message<L: Link>(
        &mut self,
        message: Message,
        now: Instant,
        link: &mut L,
    ) -> Result<(), ProtocolError> {
        let node = message.node_id;
        if !node.is_client() {
            return Err(ProtocolError::UnknownNode(node.0));
        }
        debug!("broker <- {message}");

        match message.body {
            MessageBody::Conn => {
                self.connect(node, link);
                Ok(())
            }
            MessageBody::Sub(payload) => self.subscribe(node, &payload, link),
            MessageBody::Pub(payload) => self.publish(node, payload, now, link),
            MessageBody::PubAck => {
                if self.queue.acknowledge(node, MsgType::Pub) {
                    self.delivery_failures[node.index()] = 0;
                    Ok(())
                } else {
                    Err(ProtocolError::DuplicateAck { from: node, msg_type: MsgType::PubAck })
                }
            }
            MessageBody::ConnAck | MessageBody::SubAck => Err(ProtocolError::UnexpectedMessage {
                from: node,
                msg_type: message.msg_type(),
                state: self.session(node).name(),
            }),
        }
    }

    /// Retransmit overdue forwards. Forwards that ran out of retries are
    /// counted against their subscriber and returned.
    pub(crate) fn on_tick<L: Link>(&mut self, now: Instant, link: &mut L) -> Vec<DeliveryFailed> {
        let failures = self.queue.tick(now, link);

        for failure in &failures {
            if let Some(count) = self.delivery_failures.get_mut(failure.dest.index()) {
                *count += 1;
                warn!("{} did not acknowledge {} ({count} undelivered)", failure.dest, failure.message);
            }
        }

        failures
    }

    fn connect<L: Link>(&mut self, node: NodeId, link: &mut L) {
        let state = &mut self.sessions[node.index()];
        match *state {
            SessionState::Unknown => {
                info!("{node} connected");
                *state = SessionState::Connected;
            }
            // The CONNACK was lost and the node retried
            _ => debug!("{node} reconnected while {state}"),
        }

        link.send_message(node, &Message::conn_ack(node));
    }

    fn subscribe<L: Link>(
        &mut self,
        node: NodeId,
        payload: &SubPayload,
        link: &mut L,
    ) -> Result<(), ProtocolError> {
        let state = self.session(node);
        if state == SessionState::Unknown {
            return Err(ProtocolError::UnexpectedMessage {
                from: node,
                msg_type: MsgType::Sub,
                state: state.name(),
            });
        }

        self.subscriptions.update(node, payload);
        if state == SessionState::Connected {
            info!("{node} subscribed to {payload}");
            self.sessions[node.index()] = SessionState::Subscribed;
        }

        link.send_message(node, &Message::sub_ack(node));
        Ok(())
    }

    fn publish<L: Link>(
        &mut self,
        publisher: NodeId,
        payload: PubPayload,
        now: Instant,
        link: &mut L,
    ) -> Result<(), ProtocolError> {
        let state = self.session(publisher);
        if state != SessionState::Subscribed {
            return Err(ProtocolError::UnexpectedMessage {
                from: publisher,
                msg_type: MsgType::Pub,
                state: state.name(),
            });
        }

        info!("{publisher} published {payload}");
        let delay = self.config.retry_delay_for(MsgType::Pub, NodeId::BROKER);

        for (subscriber, qos) in self.subscriptions.subscribers(payload.topic) {
            if subscriber == publisher {
                continue;
            }

            let forward = Message::publish(subscriber, PubPayload { qos, ..payload });
            if qos.is_reliable() {
                if let Err(e) = self.queue.send(link, subscriber, forward, now, delay) {
                    warn!("Dropping forward of {payload} to {subscriber}: {e}");
                }
            } else {
                link.send_message(subscriber, &forward);
            }
        }

        link.send_message(publisher, &Message::pub_ack(publisher));
        Ok(())
    }
}
