//! Application layer and traffic models

use std::collections::BTreeMap;

use bytes::{BufMut, Bytes, BytesMut};
use isacsim_common::{ApplicationConfig, Lcid, Rnti};
use tracing::trace;

use crate::error::NodeError;
use crate::layer::{ApplicationLayer, EnqueueFn, RlcSdu, TrafficModel};

/// Delay returned by an application layer with nothing attached
pub const IDLE_INVOKE_DELAY_US: u64 = 1000;

/// Fixed-size packets at a fixed interval.
///
/// The first packet is due immediately. Each packet starts with a 32-bit
/// big-endian sequence number when it is large enough to hold one.
#[derive(Debug, Clone)]
pub struct PeriodicTraffic {
    packet_size: usize,
    interval_us: u64,
    remaining_us: u64,
    sequence: u32,
}

impl PeriodicTraffic {
    /// Creates a model sending `packet_size` bytes every `interval_us`
    pub fn new(packet_size: usize, interval_us: u64) -> Self {
        Self {
            packet_size,
            interval_us: interval_us.max(1),
            remaining_us: 0,
            sequence: 0,
        }
    }

    /// Model described by an application configuration
    pub fn from_config(config: &ApplicationConfig) -> Self {
        Self::new(config.packet_size, config.interval_us)
    }

    fn packet(&mut self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.packet_size);
        if self.packet_size >= 4 {
            buf.put_u32(self.sequence);
        }
        buf.resize(self.packet_size, 0);
        self.sequence = self.sequence.wrapping_add(1);
        buf.freeze()
    }
}

impl TrafficModel for PeriodicTraffic {
    fn generate(&mut self, elapsed_us: u64, packets: &mut Vec<Bytes>) -> u64 {
        self.remaining_us = self.remaining_us.saturating_sub(elapsed_us);
        if self.remaining_us == 0 {
            packets.push(self.packet());
            self.remaining_us = self.interval_us;
        }
        self.remaining_us
    }
}

/// Per-channel traffic counters of the application layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrafficStats {
    /// Packets generated
    pub tx_packets: u64,
    /// Bytes generated
    pub tx_bytes: u64,
    /// Packets received
    pub rx_packets: u64,
    /// Bytes received
    pub rx_bytes: u64,
}

struct Application {
    peer: Rnti,
    lcid: Lcid,
    model: Box<dyn TrafficModel>,
}

/// Application layer hosting any number of traffic models
#[derive(Default)]
pub struct AppLayer {
    applications: Vec<Application>,
    stats: BTreeMap<(Rnti, Lcid), TrafficStats>,
}

impl AppLayer {
    /// Creates an empty application layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of one channel
    pub fn traffic(&self, peer: Rnti, lcid: Lcid) -> TrafficStats {
        self.stats.get(&(peer, lcid)).copied().unwrap_or_default()
    }
}

impl ApplicationLayer for AppLayer {
    fn add_application(&mut self, peer: Rnti, lcid: Lcid, model: Box<dyn TrafficModel>) {
        self.applications.push(Application { peer, lcid, model });
    }

    fn application_count(&self) -> usize {
        self.applications.len()
    }

    fn run(&mut self, elapsed_us: u64, enqueue: &mut EnqueueFn<'_>) -> Result<u64, NodeError> {
        if self.applications.is_empty() {
            return Ok(IDLE_INVOKE_DELAY_US);
        }

        let mut next_invoke = u64::MAX;
        let mut packets = Vec::new();
        for app in &mut self.applications {
            let delay = app.model.generate(elapsed_us, &mut packets);
            next_invoke = next_invoke.min(delay);

            let stats = self.stats.entry((app.peer, app.lcid)).or_default();
            for payload in packets.drain(..) {
                stats.tx_packets += 1;
                stats.tx_bytes += payload.len() as u64;
                enqueue(RlcSdu {
                    destination: app.peer,
                    lcid: app.lcid,
                    payload,
                })?;
            }
        }
        Ok(next_invoke)
    }

    fn receive_packet(&mut self, peer: Rnti, lcid: Lcid, packet: Bytes) {
        trace!("App RX {} bytes from RNTI {} on LCID {}", packet.len(), peer, lcid);
        let stats = self.stats.entry((peer, lcid)).or_default();
        stats.rx_packets += 1;
        stats.rx_bytes += packet.len() as u64;
    }

    fn traffic_stats(&self) -> Vec<(Rnti, Lcid, TrafficStats)> {
        self.stats
            .iter()
            .map(|(&(peer, lcid), &stats)| (peer, lcid, stats))
            .collect()
    }
}
