use std::time::Duration;

use crate::{
    constants::{
        CONN_RETRY, MAX_DELIVERY_FAILURES, MAX_RETRIES, PUBACK_DELAY, RANDOM_TOPIC_ASSIGNMENT,
        RETR_DELAY, SAMPLE_DELAY, SUB_RETRY, TICK_PERIOD,
    },
    protocol::{msg_type::MsgType, NodeId},
    topics::TopicAssignment,
};

/// Timing and retry parameters shared by the broker and the nodes.
///
/// `Default` takes every value from the compile-time constants; tests build
/// their own to shorten the timers.
#[derive(Debug, Clone)]
pub(crate) struct ProtocolConfig {
    pub(crate) conn_retry: Duration,
    pub(crate) sub_retry: Duration,
    pub(crate) sample_delay: Duration,
    pub(crate) retr_delay: Duration,
    pub(crate) puback_delay: Duration,
    pub(crate) tick_period: Duration,
    /// Retransmissions of one entry before it is reported as undeliverable.
    pub(crate) max_retries: u8,
    /// Consecutive undelivered publishes before a node gives up.
    pub(crate) max_delivery_failures: u8,
    pub(crate) topic_assignment: TopicAssignment,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            conn_retry: CONN_RETRY,
            sub_retry: SUB_RETRY,
            sample_delay: SAMPLE_DELAY,
            retr_delay: RETR_DELAY,
            puback_delay: PUBACK_DELAY,
            tick_period: TICK_PERIOD,
            max_retries: MAX_RETRIES,
            max_delivery_failures: MAX_DELIVERY_FAILURES,
            topic_assignment: if RANDOM_TOPIC_ASSIGNMENT {
                TopicAssignment::Random
            } else {
                TopicAssignment::Static
            },
        }
    }
}

impl ProtocolConfig {
    /// How long `sender` waits for the acknowledgment of a `msg_type` message
    /// before sending it again.
    pub(crate) fn retry_delay_for(&self, msg_type: MsgType, sender: NodeId) -> Duration {
        match msg_type {
            MsgType::Conn => self.conn_retry,
            MsgType::Sub => self.sub_retry,
            _ if sender.is_broker() => self.retr_delay,
            _ => self.puback_delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delays_follow_the_flow() {
        let config = ProtocolConfig {
            retr_delay: Duration::from_millis(300),
            puback_delay: Duration::from_millis(700),
            ..ProtocolConfig::default()
        };

        assert_eq!(config.retry_delay_for(MsgType::Conn, NodeId(3)), CONN_RETRY);
        assert_eq!(config.retry_delay_for(MsgType::Sub, NodeId(3)), SUB_RETRY);
        assert_eq!(config.retry_delay_for(MsgType::Pub, NodeId(3)), Duration::from_millis(700));
        assert_eq!(config.retry_delay_for(MsgType::Pub, NodeId::BROKER), Duration::from_millis(300));
    }
}
