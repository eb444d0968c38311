use std::time::Duration;

use bytes::Bytes;
use log::{debug, info, warn};
use tokio::{
    sync::{mpsc, watch},
    time::{self, Instant, MissedTickBehavior},
};

use crate::{
    broker::Broker,
    error::ProtocolError,
    inbox::InboundQueue,
    link::Link,
    node::{Node, NodeState},
    protocol::NodeId,
    sensor::Sensor,
};

/// Event loop of one station on the link.
///
/// Owns the station's transmitter and the frames it receives. Received
/// frames are buffered in an `InboundQueue` and handled one at a time;
/// timers fire between frames, never during one.
pub(crate) struct Session<L> {
    id: NodeId,
    link: L,
    frames: mpsc::Receiver<Bytes>,
    inbox: InboundQueue,
    tick_period: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<L: Link> Session<L> {
    pub(crate) fn new(
        id: NodeId,
        link: L,
        frames: mpsc::Receiver<Bytes>,
        tick_period: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self { id, link, frames, inbox: InboundQueue::new(), tick_period, shutdown }
    }

    /// Drive `broker` until shutdown. The broker is handed back so its state
    /// can be inspected.
    pub(crate) async fn run_broker(mut self, mut broker: Broker) -> anyhow::Result<Broker> {
        let mut tick = self.tick_interval();
        info!("Broker running");

        loop {
            tokio::select! {
                frame = self.frames.recv() => {
                    let Some(frame) = frame else {
                        anyhow::bail!("Radio medium closed");
                    };
                    self.receive(frame);

                    while let Some(frame) = self.inbox.pop() {
                        if let Err(e) = broker.handle_frame(&frame, Instant::now(), &mut self.link) {
                            log_rejection(self.id, &e);
                        }
                    }
                }
                _ = tick.tick() => {
                    broker.on_tick(Instant::now(), &mut self.link);
                }
                _ = self.shutdown.changed() => {
                    info!("Broker shutting down ({} frames dropped on receive)", self.inbox.dropped());
                    return Ok(broker);
                }
            }
        }
    }

    /// Drive `node` until shutdown, publishing a reading from `sensor` every
    /// `sample_delay`.
    ///
    /// Fails once the node gives up on the broker.
    pub(crate) async fn run_node<S: Sensor>(
        mut self,
        mut node: Node,
        mut sensor: S,
        sample_delay: Duration,
    ) -> anyhow::Result<Node> {
        let mut tick = self.tick_interval();
        let mut sample = time::interval_at(Instant::now() + sample_delay, sample_delay);
        sample.set_missed_tick_behavior(MissedTickBehavior::Delay);

        node.start(Instant::now(), &mut self.link)?;

        loop {
            tokio::select! {
                frame = self.frames.recv() => {
                    let Some(frame) = frame else {
                        anyhow::bail!("Radio medium closed");
                    };
                    self.receive(frame);

                    while let Some(frame) = self.inbox.pop() {
                        if let Err(e) = node.handle_frame(&frame, Instant::now(), &mut self.link) {
                            log_rejection(self.id, &e);
                        }
                    }
                }
                _ = tick.tick() => {
                    node.on_tick(Instant::now(), &mut self.link);
                    if node.state() == NodeState::Failed {
                        anyhow::bail!("{} gave up on the broker", self.id);
                    }
                }
                _ = sample.tick() => {
                    let reading = sensor.sample();
                    if let Err(e) = node.on_sample(Instant::now(), reading, &mut self.link) {
                        log_rejection(self.id, &e);
                    }
                }
                _ = self.shutdown.changed() => {
                    info!(
                        "{} shutting down in state {} ({} frames dropped on receive)",
                        self.id,
                        node.state(),
                        self.inbox.dropped()
                    );
                    return Ok(node);
                }
            }
        }
    }

    fn tick_interval(&self) -> time::Interval {
        let mut tick = time::interval(self.tick_period);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tick
    }

    /// Move `first` and every frame already waiting on the channel into the inbox.
    fn receive(&mut self, first: Bytes) {
        self.inbox.push(first);
        while let Ok(frame) = self.frames.try_recv() {
            self.inbox.push(frame);
        }
    }
}

fn log_rejection(id: NodeId, e: &ProtocolError) {
    match e {
        ProtocolError::QueueFull(_) | ProtocolError::Failed | ProtocolError::Malformed(_) => {
            warn!("{id}: {e}")
        }
        ProtocolError::UnknownNode(_)
        | ProtocolError::UnexpectedMessage { .. }
        | ProtocolError::DuplicateAck { .. } => debug!("{id}: {e}"),
    }
}
