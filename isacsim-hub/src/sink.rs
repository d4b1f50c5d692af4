//! Delivery endpoints registered with the hub
//!
//! A receiving PHY exposes an [`InBandSink`], a receiving MAC an
//! [`OutOfBandSink`]. The hub keeps only weak references to them.
//!
//! The bundled layers receive through a [`PacketInbox`]: the hub-facing
//! [`PacketQueue`] holds the sending half of an unbounded channel and the
//! owning layer drains the receiving half on its next `run`, so a
//! transmission never calls back into a node that is in the middle of
//! transmitting.

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::trace;

use crate::protocol::{InBandPacket, OutOfBandPacket};

/// In-band (shared medium) intake of a receiver
pub trait InBandSink: Send + Sync {
    /// Accepts one packet; must not block or call back into the hub's
    /// registration functions
    fn deliver_in_band(&self, packet: &InBandPacket);
}

/// Out-of-band (control path) intake of a receiver
pub trait OutOfBandSink: Send + Sync {
    /// Accepts one packet
    fn deliver_out_of_band(&self, packet: &OutOfBandPacket);
}

/// Sending half of a layer's inbox, registered with the hub
#[derive(Debug)]
pub struct PacketQueue<T> {
    tx: UnboundedSender<T>,
}

impl<T> PacketQueue<T> {
    fn push(&self, packet: T) {
        if self.tx.send(packet).is_err() {
            trace!("Inbox closed, packet dropped");
        }
    }
}

impl InBandSink for PacketQueue<InBandPacket> {
    fn deliver_in_band(&self, packet: &InBandPacket) {
        self.push(packet.clone());
    }
}

impl OutOfBandSink for PacketQueue<OutOfBandPacket> {
    fn deliver_out_of_band(&self, packet: &OutOfBandPacket) {
        self.push(packet.clone());
    }
}

/// Packets delivered to one layer, in arrival order
#[derive(Debug)]
pub struct PacketInbox<T> {
    queue: Arc<PacketQueue<T>>,
    rx: UnboundedReceiver<T>,
}

impl<T> PacketInbox<T> {
    /// Creates an empty inbox
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            queue: Arc::new(PacketQueue { tx }),
            rx,
        }
    }

    /// Sending half to hand to the hub. It stays alive as long as the inbox.
    pub fn queue(&self) -> Arc<PacketQueue<T>> {
        Arc::clone(&self.queue)
    }

    /// Removes and returns every queued packet
    pub fn drain(&mut self) -> Vec<T> {
        let mut packets = Vec::with_capacity(self.rx.len());
        while let Ok(packet) = self.rx.try_recv() {
            packets.push(packet);
        }
        packets
    }

    /// Number of queued packets
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Returns true if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for PacketInbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
