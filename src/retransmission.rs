use std::{error::Error, fmt, time::Duration};

use log::{debug, warn};
use tokio::time::Instant;

use crate::{
    constants::RETR_QUEUE_SIZE,
    link::Link,
    messages::Message,
    protocol::{msg_type::MsgType, NodeId},
};

/// Returned when the queue has no room for another in-flight message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum QueueError {
    QueueFull { capacity: usize },
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull { capacity } => {
                write!(f, "Queue Full: {capacity} messages already awaiting acknowledgment")
            }
        }
    }
}

impl Error for QueueError {}

/// A message that was retransmitted until the retry ceiling without being acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DeliveryFailed {
    pub(crate) dest: NodeId,
    pub(crate) message: Message,
}

/// Identifies one enqueued message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct QueueHandle(u32);

#[derive(Debug)]
struct RetransmissionEntry {
    handle: QueueHandle,
    dest: NodeId,
    message: Message,
    enqueued_at: Instant,
    deadline: Instant,
    delay: Duration,
    retries: u8,
}

/// Messages sent with `QoS` 1 that still wait for their acknowledgment.
///
/// Entries are kept in send order. Capacity is fixed at `RETR_QUEUE_SIZE`
/// and an overflow is reported instead of evicting older entries.
#[derive(Debug)]
pub(crate) struct RetransmissionQueue {
    entries: heapless::Vec<RetransmissionEntry, RETR_QUEUE_SIZE>,
    max_retries: u8,
    next_handle: u32,
}

impl RetransmissionQueue {
    pub(crate) fn new(max_retries: u8) -> Self {
        Self { entries: heapless::Vec::new(), max_retries, next_handle: 0 }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries waiting for an acknowledgment from `dest`.
    pub(crate) fn pending_for(&self, dest: NodeId) -> usize {
        self.entries.iter().filter(|entry| entry.dest == dest).count()
    }

    /// Track `message` for `dest`; its first retransmission is due after `delay`.
    ///
    /// # Errors
    /// - Returns `QueueError::QueueFull` if `RETR_QUEUE_SIZE` entries are already pending.
    pub(crate) fn enqueue(
        &mut self,
        dest: NodeId,
        message: Message,
        now: Instant,
        delay: Duration,
    ) -> Result<QueueHandle, QueueError> {
        let handle = QueueHandle(self.next_handle);

        let entry = RetransmissionEntry {
            handle,
            dest,
            message,
            enqueued_at: now,
            deadline: now + delay,
            delay,
            retries: 0,
        };
        self.entries
            .push(entry)
            .map_err(|_| QueueError::QueueFull { capacity: RETR_QUEUE_SIZE })?;

        self.next_handle = self.next_handle.wrapping_add(1);
        Ok(handle)
    }

    /// Track `message` and transmit it once. Nothing is transmitted when the queue is full.
    pub(crate) fn send<L: Link>(
        &mut self,
        link: &mut L,
        dest: NodeId,
        message: Message,
        now: Instant,
        delay: Duration,
    ) -> Result<QueueHandle, QueueError> {
        let handle = self.enqueue(dest, message.clone(), now, delay)?;
        link.send_message(dest, &message);
        Ok(handle)
    }

    /// Retire the oldest pending `acked_type` message sent to `dest`.
    ///
    /// Returns `false` when nothing matches, i.e. the acknowledgment is a duplicate.
    pub(crate) fn acknowledge(&mut self, dest: NodeId, acked_type: MsgType) -> bool {
        let position = self
            .entries
            .iter()
            .position(|entry| entry.dest == dest && entry.message.msg_type() == acked_type);

        match position {
            Some(index) => {
                let entry = self.entries.remove(index);
                debug!(
                    "{acked_type} #{} to {dest} acknowledged after {} retries",
                    entry.handle.0, entry.retries
                );
                true
            }
            None => false,
        }
    }

    /// Retransmit every entry whose deadline has passed.
    ///
    /// Entries that already used their `max_retries` retransmissions are
    /// dropped and returned instead.
    pub(crate) fn tick<L: Link>(&mut self, now: Instant, link: &mut L) -> Vec<DeliveryFailed> {
        let mut failed = Vec::new();

        let mut index = 0;
        while index < self.entries.len() {
            let entry = &mut self.entries[index];
            if entry.deadline > now {
                index += 1;
                continue;
            }

            if entry.retries >= self.max_retries {
                let entry = self.entries.remove(index);
                warn!(
                    "Giving up on {} to {} after {} retries ({:?} in flight)",
                    entry.message,
                    entry.dest,
                    entry.retries,
                    now.saturating_duration_since(entry.enqueued_at)
                );
                failed.push(DeliveryFailed { dest: entry.dest, message: entry.message });
                continue;
            }

            entry.retries += 1;
            entry.deadline = now + entry.delay;
            debug!("Retry {}/{} of {} to {}", entry.retries, self.max_retries, entry.message, entry.dest);
            link.send_message(entry.dest, &entry.message);

            index += 1;
        }

        failed
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
