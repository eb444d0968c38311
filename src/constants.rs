use std::time::Duration;

/// Highest node identity in the network, broker included.
pub(crate) const MAX_NODES: u8 = 8;

/// Identity reserved for the broker.
pub(crate) const BROKER_ADDRESS: u8 = 1;

/// First identity assigned to a client node.
pub(crate) const NODE_OFFSET: u8 = 2;

/// Number of topics in the fixed catalog.
pub(crate) const TOPIC_COUNT: usize = 3;

/// Length of a topic display name.
pub(crate) const TOPIC_NAME_LENGTH: usize = 4;

/// Number of supported `QoS` levels (0 and 1).
pub(crate) const QOS_LEVEL_COUNT: u8 = 2;

/// Delay before a CONN is sent again when no CONNACK arrived.
pub(crate) const CONN_RETRY: Duration = Duration::from_millis(1000);

/// Delay before a SUB is sent again when no SUBACK arrived.
pub(crate) const SUB_RETRY: Duration = Duration::from_millis(1000);

/// Period of the sensor sample timer.
pub(crate) const SAMPLE_DELAY: Duration = Duration::from_millis(1000);

/// Delay before the broker forwards a PUB again to a subscriber.
pub(crate) const RETR_DELAY: Duration = Duration::from_millis(500);

/// Delay a node waits for a PUBACK before publishing again.
pub(crate) const PUBACK_DELAY: Duration = Duration::from_millis(500);

/// Period of the retransmission timer.
pub(crate) const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Retransmissions attempted before an entry is given up.
pub(crate) const MAX_RETRIES: u8 = 5;

/// Consecutive undelivered publishes after which a node fails.
pub(crate) const MAX_DELIVERY_FAILURES: u8 = 3;

/// Capacity of the retransmission queue.
pub(crate) const RETR_QUEUE_SIZE: usize = 16;

/// Capacity of the inbound handling queue.
pub(crate) const HANDLE_QUEUE_SIZE: usize = 16;

/// Pick subscriptions at random on node start instead of the static table.
pub(crate) const RANDOM_TOPIC_ASSIGNMENT: bool = false;

/// Active message type carried by every frame of this protocol.
pub(crate) const AM_MY_MSG: u8 = 6;

/// Probability that the simulated medium loses a frame.
pub(crate) const SIMULATED_LOSS_RATE: f64 = 0.1;

/// Probability that the simulated medium delivers a frame twice.
pub(crate) const SIMULATED_DUPLICATE_RATE: f64 = 0.02;

/// Connection request.
/// Sent by: Node to Broker.
pub(crate) const CONN_IDENTIFIER: u8 = 0x00;

/// Connect acknowledgment.
/// Sent by: Broker to Node.
pub(crate) const CONNACK_IDENTIFIER: u8 = 0x01;

/// Subscribe request.
/// Sent by: Node to Broker.
pub(crate) const SUB_IDENTIFIER: u8 = 0x02;

/// Subscribe acknowledgment.
/// Sent by: Broker to Node.
pub(crate) const SUBACK_IDENTIFIER: u8 = 0x03;

/// Publish message.
/// Sent by: Node to Broker or Broker to Node.
pub(crate) const PUB_IDENTIFIER: u8 = 0x04;

/// Publish acknowledgment (`QoS` 1).
/// Sent by: Node to Broker or Broker to Node.
pub(crate) const PUBACK_IDENTIFIER: u8 = 0x05;
