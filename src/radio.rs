use std::sync::Arc;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use dashmap::DashMap;
use log::{debug, trace};
use rand::Rng;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{
    constants::{AM_MY_MSG, HANDLE_QUEUE_SIZE},
    link::Link,
    protocol::{MalformedMessageError, NodeId},
};

const ENVELOPE_LEN: usize = 3;

const _: () = assert!(HANDLE_QUEUE_SIZE > 1);

/// Link-layer envelope around a protocol frame.
///
/// # Wire Format
///
/// | Byte | Field            |
/// |------|------------------|
/// | 1    | Destination      |
/// | 2    | Source           |
/// | 3    | AM type          |
/// | 4..  | Payload          |
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RadioFrame {
    pub(crate) dest: NodeId,
    pub(crate) source: NodeId,
    pub(crate) am_type: u8,
    pub(crate) payload: Bytes,
}

impl RadioFrame {
    pub(crate) fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(ENVELOPE_LEN + self.payload.len());
        buf.put_u8(self.dest.0);
        buf.put_u8(self.source.0);
        buf.put_u8(self.am_type);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub(crate) fn decode(mut bytes: Bytes) -> Result<Self, MalformedMessageError> {
        if bytes.len() < ENVELOPE_LEN {
            return Err(MalformedMessageError(format!(
                "Radio envelope requires {ENVELOPE_LEN} bytes, got {}",
                bytes.len()
            )));
        }

        let dest = NodeId(bytes.get_u8());
        let source = NodeId(bytes.get_u8());
        let am_type = bytes.get_u8();

        Ok(Self { dest, source, am_type, payload: bytes })
    }
}

/// Shared medium connecting the broker and the nodes.
///
/// Every transmission may be lost or duplicated according to the configured
/// rates. Only the station named in the envelope receives the frame, and
/// only when it carries `AM_MY_MSG`.
#[derive(Debug, Clone)]
pub(crate) struct RadioMedium {
    receivers: Arc<DashMap<NodeId, mpsc::Sender<Bytes>>>,
    loss_rate: f64,
    duplicate_rate: f64,
}

impl RadioMedium {
    pub(crate) fn new(loss_rate: f64, duplicate_rate: f64) -> Self {
        Self {
            receivers: Arc::new(DashMap::new()),
            loss_rate: loss_rate.clamp(0.0, 1.0),
            duplicate_rate: duplicate_rate.clamp(0.0, 1.0),
        }
    }

    /// A medium that never loses or duplicates a frame.
    #[cfg(test)]
    pub(crate) fn reliable() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Register `id` on the medium. A second attach replaces the first.
    ///
    /// The channel holds one frame less than the inbound queue, so a frame
    /// being received plus a full channel still fits in the queue.
    pub(crate) fn attach(&self, id: NodeId) -> (RadioLink, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(HANDLE_QUEUE_SIZE - 1);
        if self.receivers.insert(id, tx).is_some() {
            debug!("{id} re-attached to the medium");
        }

        (RadioLink { source: id, medium: self.clone() }, rx)
    }

    pub(crate) fn detach(&self, id: NodeId) {
        self.receivers.remove(&id);
    }

    fn transmit(&self, air: Bytes) {
        let mut rng = rand::thread_rng();
        if rng.gen_bool(self.loss_rate) {
            trace!("Frame [{}] lost", hex::encode(&air));
            return;
        }

        let copies = if rng.gen_bool(self.duplicate_rate) { 2 } else { 1 };
        for _ in 0..copies {
            self.deliver(air.clone());
        }
    }

    fn deliver(&self, air: Bytes) {
        let frame = match RadioFrame::decode(air) {
            Ok(frame) => frame,
            Err(e) => {
                debug!("{e}");
                return;
            }
        };

        if frame.am_type != AM_MY_MSG {
            trace!("Ignoring frame with AM type {} from {}", frame.am_type, frame.source);
            return;
        }

        let Some(receiver) = self.receivers.get(&frame.dest) else {
            trace!("No receiver for {}", frame.dest);
            return;
        };

        match receiver.try_send(frame.payload) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("Receive buffer of {} full, frame lost", frame.dest),
            Err(TrySendError::Closed(_)) => trace!("{} is no longer listening", frame.dest),
        }
    }
}

/// A station's transmitter on the `RadioMedium`.
#[derive(Debug, Clone)]
pub(crate) struct RadioLink {
    source: NodeId,
    medium: RadioMedium,
}

impl Link for RadioLink {
    fn send(&mut self, dest: NodeId, frame: Bytes) {
        let envelope = RadioFrame { dest, source: self.source, am_type: AM_MY_MSG, payload: frame };
        self.medium.transmit(envelope.encode());
    }
}
