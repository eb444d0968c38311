//! Broker and nodes wired together without a runtime. Frames are routed by
//! hand so tests can drop exactly the ones they want.

use std::time::Duration;

use tokio::time::Instant;

use crate::{
    broker::{Broker, SessionState},
    config::ProtocolConfig,
    link::testing::RecordingLink,
    messages::{publish_payload::PubPayload, subscribe_payload::SubPayload, Message, MessageBody},
    node::{Node, NodeState},
    protocol::{qos::QoS, NodeId},
    topics::{NodeProfile, Topic},
};

type DropRule = Box<dyn FnMut(NodeId, &Message) -> bool>;

struct Network {
    now: Instant,
    config: ProtocolConfig,
    broker: Broker,
    broker_link: RecordingLink,
    nodes: Vec<(Node, RecordingLink)>,
    /// Every delivered frame, as `(dest, message)`.
    delivered: Vec<(NodeId, Message)>,
    drop_rule: DropRule,
}

impl Network {
    fn new(profiles: Vec<(u8, NodeProfile)>) -> Self {
        let config = ProtocolConfig::default();
        let nodes = profiles
            .into_iter()
            .map(|(id, profile)| {
                (Node::with_profile(NodeId(id), profile, config.clone()), RecordingLink::new())
            })
            .collect();

        Self {
            now: Instant::now(),
            broker: Broker::new(config.clone()),
            config,
            broker_link: RecordingLink::new(),
            nodes,
            delivered: Vec::new(),
            drop_rule: Box::new(|_, _| false),
        }
    }

    fn dropping(mut self, rule: impl FnMut(NodeId, &Message) -> bool + 'static) -> Self {
        self.drop_rule = Box::new(rule);
        self
    }

    fn node(&self, id: u8) -> &Node {
        &self.nodes.iter().find(|(node, _)| node.id() == NodeId(id)).expect("node exists").0
    }

    fn start(&mut self) {
        for (node, link) in &mut self.nodes {
            node.start(self.now, link).unwrap();
        }
        self.settle();
    }

    fn sample(&mut self, id: u8, data: u8) {
        let now = self.now;
        let (node, link) =
            self.nodes.iter_mut().find(|(node, _)| node.id() == NodeId(id)).expect("node exists");
        node.on_sample(now, data, link).unwrap();
        self.settle();
    }

    /// Let `duration` pass one retransmission tick at a time.
    fn advance(&mut self, duration: Duration) {
        let end = self.now + duration;
        while self.now < end {
            self.now += self.config.tick_period;
            self.broker.on_tick(self.now, &mut self.broker_link);
            for (node, link) in &mut self.nodes {
                node.on_tick(self.now, link);
            }
            self.settle();
        }
    }

    /// Deliver frames until no station has anything left to send.
    fn settle(&mut self) {
        loop {
            let mut in_flight: Vec<(NodeId, Message)> = self.broker_link.take();
            for (_, link) in &mut self.nodes {
                in_flight.extend(link.take());
            }
            if in_flight.is_empty() {
                return;
            }

            for (dest, message) in in_flight {
                if (self.drop_rule)(dest, &message) {
                    continue;
                }
                self.delivered.push((dest, message.clone()));

                // Rejections are logged by the drivers; here they only leave state unchanged
                if dest.is_broker() {
                    let _ = self.broker.handle_message(message, self.now, &mut self.broker_link);
                } else if let Some((node, link)) =
                    self.nodes.iter_mut().find(|(node, _)| node.id() == dest)
                {
                    let _ = node.handle_frame(&message.encode(), self.now, link);
                }
            }
        }
    }

    fn delivered_to(&self, dest: u8, wanted: &Message) -> usize {
        self.delivered.iter().filter(|(to, message)| *to == NodeId(dest) && message == wanted).count()
    }
}

fn profile(subscribe: Option<(Topic, QoS)>, publish_topic: Topic) -> NodeProfile {
    let mut subscriptions = SubPayload::default();
    if let Some((topic, qos)) = subscribe {
        subscriptions.set(topic, Some(qos));
    }
    NodeProfile { subscriptions, publish_topic, publish_qos: QoS::AtLeastOnce }
}

fn temperature(node: u8, data: u8) -> Message {
    Message::publish(NodeId(node), PubPayload { topic: Topic::Temperature, qos: QoS::AtLeastOnce, data })
}

/// Node 3 and node 5 both subscribe to TEMP with QoS 1; node 3 publishes on it.
fn temperature_network() -> Network {
    Network::new(vec![
        (3, profile(Some((Topic::Temperature, QoS::AtLeastOnce)), Topic::Temperature)),
        (5, profile(Some((Topic::Temperature, QoS::AtLeastOnce)), Topic::Temperature)),
    ])
}

#[test]
fn reading_reaches_the_other_subscriber() {
    let mut network = temperature_network();
    network.start();

    assert_eq!(network.node(3).state(), NodeState::Active);
    assert_eq!(network.node(5).state(), NodeState::Active);

    network.sample(3, 42);

    assert_eq!(network.delivered_to(1, &temperature(3, 42)), 1);
    assert_eq!(network.delivered_to(5, &temperature(5, 42)), 1);
    assert_eq!(network.delivered_to(3, &temperature(3, 42)), 0);
    assert_eq!(network.delivered_to(3, &Message::pub_ack(NodeId(3))), 1);
    assert_eq!(network.delivered_to(1, &Message::pub_ack(NodeId(5))), 1);

    assert_eq!(network.node(3).pending(), 0);
    assert_eq!(network.broker.pending_for(NodeId(5)), 0);
}

#[test]
fn handshake_survives_losses_below_the_retry_limit() {
    let mut conns = 0;
    let mut conn_acks = 0;
    let mut network = temperature_network().dropping(move |_, message| match message.body {
        MessageBody::Conn if message.node_id == NodeId(3) => {
            conns += 1;
            conns <= 2
        }
        MessageBody::ConnAck if message.node_id == NodeId(3) => {
            conn_acks += 1;
            conn_acks <= 2
        }
        _ => false,
    });

    network.start();
    assert_eq!(network.node(3).state(), NodeState::Connecting);

    network.advance(network.config.conn_retry * 5);

    assert_eq!(network.node(3).state(), NodeState::Active);
    assert_eq!(network.broker.session(NodeId(3)), SessionState::Subscribed);
    assert_eq!(network.delivered_to(1, &Message::conn(NodeId(3))), 3);
}

#[test]
fn lost_subscriber_ack_causes_a_duplicate_delivery() {
    let mut pub_acks = 0;
    let mut network = temperature_network().dropping(move |dest, message| {
        if dest.is_broker() && message == &Message::pub_ack(NodeId(5)) {
            pub_acks += 1;
            return pub_acks == 1;
        }
        false
    });
    network.start();
    network.sample(3, 42);
    assert_eq!(network.broker.pending_for(NodeId(5)), 1);

    network.advance(network.config.retr_delay);

    assert_eq!(network.delivered_to(5, &temperature(5, 42)), 2);
    assert_eq!(network.broker.pending_for(NodeId(5)), 0);
    assert_eq!(network.broker.delivery_failures(NodeId(5)), 0);
}

#[test]
fn lost_publisher_ack_republishes_the_reading() {
    let mut pub_acks = 0;
    let mut network = temperature_network().dropping(move |dest, message| {
        if dest == NodeId(3) && message == &Message::pub_ack(NodeId(3)) {
            pub_acks += 1;
            return pub_acks == 1;
        }
        false
    });
    network.start();
    network.sample(3, 42);
    assert_eq!(network.node(3).pending(), 1);

    network.advance(network.config.puback_delay);

    assert_eq!(network.node(3).pending(), 0);
    assert_eq!(network.delivered_to(1, &temperature(3, 42)), 2);
    assert_eq!(network.delivered_to(5, &temperature(5, 42)), 2);
}

#[test]
fn publish_survives_losing_every_ack_but_the_last() {
    let max_retries = usize::from(ProtocolConfig::default().max_retries);
    let mut pub_acks = 0;
    let mut network = temperature_network().dropping(move |dest, message| {
        if dest == NodeId(3) && message == &Message::pub_ack(NodeId(3)) {
            pub_acks += 1;
            return pub_acks <= max_retries;
        }
        false
    });
    network.start();
    network.sample(3, 42);

    network.advance(network.config.puback_delay * u32::from(network.config.max_retries));

    assert_eq!(network.node(3).pending(), 0);
    assert_eq!(network.node(3).state(), NodeState::Active);
    assert_eq!(network.delivered_to(1, &temperature(3, 42)), 1 + max_retries);
    assert_eq!(network.delivered_to(3, &Message::pub_ack(NodeId(3))), 1);
}

#[test]
fn silent_subscriber_is_given_up_on() {
    let mut network = temperature_network()
        .dropping(|dest, message| dest.is_broker() && message == &Message::pub_ack(NodeId(5)));
    network.start();
    network.sample(3, 42);

    network.advance(network.config.retr_delay * (u32::from(network.config.max_retries) + 1));

    assert_eq!(network.delivered_to(5, &temperature(5, 42)), 1 + usize::from(network.config.max_retries));
    assert_eq!(network.broker.pending_for(NodeId(5)), 0);
    assert_eq!(network.broker.delivery_failures(NodeId(5)), 1);
    assert_eq!(network.node(3).state(), NodeState::Active);
}
