use std::fmt;

use log::debug;
use rand::Rng;

use crate::{
    constants::{MAX_NODES, NODE_OFFSET, TOPIC_COUNT, TOPIC_NAME_LENGTH},
    messages::subscribe_payload::SubPayload,
    protocol::{qos::QoS, NodeId},
};

/// The fixed catalog of data channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Topic {
    Temperature = 0,
    Luminosity = 1,
    Humidity = 2,
}

const TOPIC_NAMES: [&str; TOPIC_COUNT] = ["TEMP", "LUMI", "HUMI"];

const _: () = {
    let mut i = 0;
    while i < TOPIC_COUNT {
        assert!(TOPIC_NAMES[i].len() == TOPIC_NAME_LENGTH);
        i += 1;
    }
};

impl Topic {
    pub(crate) const ALL: [Topic; TOPIC_COUNT] =
        [Topic::Temperature, Topic::Luminosity, Topic::Humidity];

    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.get(value as usize).copied()
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        TOPIC_NAMES[self.index()]
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

pub(crate) fn topic_count() -> usize {
    TOPIC_COUNT
}

pub(crate) fn name_of(topic_id: u8) -> Option<&'static str> {
    Topic::from_u8(topic_id).map(Topic::name)
}

pub(crate) fn is_valid(topic_id: u8) -> bool {
    Topic::from_u8(topic_id).is_some()
}

/// Which node subscribes to which topic, at which `QoS`.
///
/// Owned by the broker. Rows are indexed by node id, so the table never
/// grows past `MAX_NODES` entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SubscriptionTable {
    rows: [[Option<QoS>; TOPIC_COUNT]; MAX_NODES as usize + 1],
}

impl Default for SubscriptionTable {
    fn default() -> Self {
        Self { rows: [[None; TOPIC_COUNT]; MAX_NODES as usize + 1] }
    }
}

impl SubscriptionTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Replace the subscriptions of `node` with the ones requested in `payload`.
    ///
    /// Applying the same payload twice leaves the table unchanged.
    pub(crate) fn update(&mut self, node: NodeId, payload: &SubPayload) {
        let Some(row) = self.rows.get_mut(node.index()) else {
            return;
        };

        for topic in Topic::ALL {
            row[topic.index()] = payload.qos_for(topic);
        }
        debug!("Subscriptions of {node}: {row:?}");
    }

    pub(crate) fn clear(&mut self, node: NodeId) {
        if let Some(row) = self.rows.get_mut(node.index()) {
            *row = [None; TOPIC_COUNT];
        }
    }

    pub(crate) fn qos_for(&self, node: NodeId, topic: Topic) -> Option<QoS> {
        self.rows.get(node.index()).and_then(|row| row[topic.index()])
    }

    /// Subscribers of `topic` in ascending node order.
    pub(crate) fn subscribers(&self, topic: Topic) -> impl Iterator<Item = (NodeId, QoS)> + '_ {
        self.rows
            .iter()
            .enumerate()
            .filter_map(move |(id, row)| row[topic.index()].map(|qos| (NodeId(id as u8), qos)))
    }
}

/// How a node picks the topics it subscribes to and publishes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TopicAssignment {
    Static,
    Random,
}

/// The subscriptions a node requests and the channel it publishes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct NodeProfile {
    pub(crate) subscriptions: SubPayload,
    pub(crate) publish_topic: Topic,
    pub(crate) publish_qos: QoS,
}

impl TopicAssignment {
    pub(crate) fn profile_for(self, node: NodeId) -> NodeProfile {
        match self {
            Self::Static => static_profile(node),
            Self::Random => random_profile(&mut rand::thread_rng()),
        }
    }
}

fn static_profile(node: NodeId) -> NodeProfile {
    let slot = node.0.saturating_sub(NODE_OFFSET);

    let mut subscriptions = SubPayload::default();
    let subscribed = Topic::ALL[slot as usize % TOPIC_COUNT];
    subscriptions.set(subscribed, Some(QoS::from_bit(node.0 % 2 == 1)));

    NodeProfile {
        subscriptions,
        publish_topic: Topic::ALL[(slot as usize + 1) % TOPIC_COUNT],
        publish_qos: QoS::AtLeastOnce,
    }
}

pub(crate) fn random_profile<R: Rng>(rng: &mut R) -> NodeProfile {
    let mut subscriptions = SubPayload::default();
    for topic in Topic::ALL {
        if rng.gen_bool(0.5) {
            subscriptions.set(topic, Some(QoS::from_bit(rng.gen_bool(0.5))));
        }
    }

    NodeProfile {
        subscriptions,
        publish_topic: Topic::ALL[rng.gen_range(0..topic_count())],
        publish_qos: QoS::from_bit(rng.gen_bool(0.5)),
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    #[test]
    fn registry_lookups() {
        assert_eq!(topic_count(), 3);
        assert_eq!(name_of(0), Some("TEMP"));
        assert_eq!(name_of(1), Some("LUMI"));
        assert_eq!(name_of(2), Some("HUMI"));
        assert_eq!(name_of(3), None);
        assert!(is_valid(2));
        assert!(!is_valid(3));
        assert!(!is_valid(u8::MAX));
    }

    #[test]
    fn subscribe_twice_is_idempotent() {
        let mut payload = SubPayload::default();
        payload.set(Topic::Temperature, Some(QoS::AtLeastOnce));
        payload.set(Topic::Humidity, Some(QoS::AtMostOnce));

        let mut once = SubscriptionTable::new();
        once.update(NodeId(3), &payload);

        let mut twice = once.clone();
        twice.update(NodeId(3), &payload);

        assert_eq!(once, twice);
        assert_eq!(twice.subscribers(Topic::Temperature).count(), 1);
    }

    #[test]
    fn resubscribe_replaces_previous_row() {
        let mut table = SubscriptionTable::new();

        let mut first = SubPayload::default();
        first.set(Topic::Temperature, Some(QoS::AtLeastOnce));
        table.update(NodeId(4), &first);

        let mut second = SubPayload::default();
        second.set(Topic::Luminosity, Some(QoS::AtMostOnce));
        table.update(NodeId(4), &second);

        assert_eq!(table.qos_for(NodeId(4), Topic::Temperature), None);
        assert_eq!(table.qos_for(NodeId(4), Topic::Luminosity), Some(QoS::AtMostOnce));
    }

    #[test]
    fn subscribers_are_listed_in_node_order() {
        let mut payload = SubPayload::default();
        payload.set(Topic::Humidity, Some(QoS::AtLeastOnce));

        let mut table = SubscriptionTable::new();
        table.update(NodeId(7), &payload);
        table.update(NodeId(2), &payload);

        let subscribers: Vec<_> = table.subscribers(Topic::Humidity).collect();
        assert_eq!(subscribers, vec![(NodeId(2), QoS::AtLeastOnce), (NodeId(7), QoS::AtLeastOnce)]);

        table.clear(NodeId(7));
        assert_eq!(table.subscribers(Topic::Humidity).count(), 1);
    }

    #[test]
    fn static_profiles_spread_over_topics() {
        let first = TopicAssignment::Static.profile_for(NodeId(2));
        assert_eq!(first.subscriptions.qos_for(Topic::Temperature), Some(QoS::AtMostOnce));
        assert_eq!(first.publish_topic, Topic::Luminosity);

        let second = TopicAssignment::Static.profile_for(NodeId(3));
        assert_eq!(second.subscriptions.qos_for(Topic::Luminosity), Some(QoS::AtLeastOnce));
        assert_eq!(second.publish_topic, Topic::Humidity);
    }

    #[test]
    fn random_profiles_are_reproducible_with_a_seed() {
        let a = random_profile(&mut StdRng::seed_from_u64(7));
        let b = random_profile(&mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }
}
