//! RLC logical channel entities
//!
//! Every configured logical channel is served by one [`RlcEntity`], either
//! acknowledged mode ([`AmEntity`]) or unacknowledged mode ([`UmEntity`]),
//! chosen from the channel's configured entity type.
//!
//! Entities do not call out to other layers. Reassembled SDUs are returned
//! from [`RlcEntity::receive_pdu`] and buffer occupancy is read with
//! [`RlcEntity::buffer_status`]; the node forwards both.

mod am;
mod segment;
mod stats;
mod timer;
mod um;

use std::collections::VecDeque;

use bytes::Bytes;
use isacsim_common::{log_rlc_pdu, Direction, Lcid, LogicalChannelConfig, NodeRole, RlcDirection, Rnti};
use tracing::warn;

use crate::error::RlcError;

pub use am::AmEntity;
pub use stats::{RlcStatistics, RlcStatsRow, RLC_STATS_COLUMNS};
pub use timer::RlcTimer;
pub use um::UmEntity;

/// Largest SDU an entity accepts. Segment offsets fit the 16 bit SO field.
pub use isacsim_common::MAX_SDU_SIZE;

/// Largest PDU an entity builds in one grant, bounded by the 16 bit MAC
/// length field
pub const MAX_PDU_SIZE: usize = u16::MAX as usize;

/// Rejects SDUs above [`MAX_SDU_SIZE`]
pub(crate) fn check_sdu_len(params: &RlcEntityParams, sdu: &Bytes) -> Result<(), RlcError> {
    if sdu.len() > MAX_SDU_SIZE {
        return Err(RlcError::SduTooLarge {
            rnti: params.rnti,
            lcid: params.lcid,
            len: sdu.len(),
        });
    }
    Ok(())
}

/// Construction parameters of an RLC entity, resolved for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RlcEntityParams {
    /// Peer RNTI
    pub rnti: Rnti,
    /// Logical channel
    pub lcid: Lcid,
    /// Local transmit/receive role
    pub direction: RlcDirection,
    /// SN length of transmitted PDUs
    pub tx_sn_field_length: u8,
    /// SN length of received PDUs
    pub rx_sn_field_length: u8,
    /// Maximum number of queued SDUs
    pub max_tx_buffer_sdus: usize,
    /// Maximum number of SDUs under reassembly
    pub reassembly_capacity: usize,
    /// t-PollRetransmit in ms
    pub poll_retransmit_ms: u32,
    /// t-Reassembly in ms
    pub reassembly_ms: u32,
    /// t-StatusProhibit in ms
    pub status_prohibit_ms: u32,
    /// Poll after this many PDUs
    pub poll_pdu: u32,
}

impl RlcEntityParams {
    /// Resolves a channel configuration for a node of the given role.
    ///
    /// The configured entity type and SN lengths are network-relative
    /// (DL/UL); this maps them onto the node's own transmit and receive
    /// sides. The reassembly buffer holds one SDU per HARQ process.
    pub fn new(
        rnti: Rnti,
        config: &LogicalChannelConfig,
        role: NodeRole,
        harq_processes: usize,
    ) -> Self {
        Self {
            rnti,
            lcid: config.lcid,
            direction: config.entity_type.direction_for(role),
            tx_sn_field_length: config.sn_field_length(role.tx_direction()),
            rx_sn_field_length: config.sn_field_length(role.rx_direction()),
            max_tx_buffer_sdus: config.max_tx_buffer_sdus,
            reassembly_capacity: harq_processes.max(1),
            poll_retransmit_ms: config.poll_retransmit_timer,
            reassembly_ms: config.reassembly_timer,
            status_prohibit_ms: config.status_prohibit_timer,
            poll_pdu: config.poll_pdu.max(1),
        }
    }
}

/// Bounded FIFO of SDUs waiting for a grant
#[derive(Debug)]
pub(crate) struct SduQueue {
    queue: VecDeque<Bytes>,
    bytes: usize,
    capacity: usize,
}

impl SduQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            queue: VecDeque::new(),
            bytes: 0,
            capacity,
        }
    }

    /// Queues an SDU, counting it as dropped when the queue is full
    pub(crate) fn push(&mut self, params: &RlcEntityParams, sdu: Bytes, stats: &mut RlcStatistics) {
        if self.queue.len() >= self.capacity {
            warn!(
                "RLC RNTI {} LCID {}: dropping {} byte SDU ({} SDUs queued)",
                params.rnti,
                params.lcid,
                sdu.len(),
                self.queue.len()
            );
            stats.tx_packets_dropped += 1;
            stats.tx_bytes_dropped += sdu.len() as u64;
            return;
        }
        self.bytes += sdu.len();
        self.queue.push_back(sdu);
    }

    pub(crate) fn front_len(&self) -> Option<usize> {
        self.queue.front().map(Bytes::len)
    }

    pub(crate) fn pop(&mut self) -> Option<Bytes> {
        let sdu = self.queue.pop_front()?;
        self.bytes -= sdu.len();
        Some(sdu)
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub(crate) fn bytes(&self) -> usize {
        self.bytes
    }
}

/// RLC entity of one logical channel
#[derive(Debug)]
pub enum RlcEntity {
    /// Acknowledged mode
    Am(AmEntity),
    /// Unacknowledged mode
    Um(UmEntity),
}

impl RlcEntity {
    /// Creates the entity variant selected by the configured entity type
    pub fn new(
        rnti: Rnti,
        config: &LogicalChannelConfig,
        role: NodeRole,
        harq_processes: usize,
    ) -> Self {
        let params = RlcEntityParams::new(rnti, config, role, harq_processes);
        if config.entity_type.is_am() {
            Self::Am(AmEntity::new(params))
        } else {
            Self::Um(UmEntity::new(params))
        }
    }

    fn params(&self) -> &RlcEntityParams {
        match self {
            Self::Am(e) => e.params(),
            Self::Um(e) => e.params(),
        }
    }

    /// Peer RNTI
    pub fn rnti(&self) -> Rnti {
        self.params().rnti
    }

    /// Logical channel identity
    pub fn lcid(&self) -> Lcid {
        self.params().lcid
    }

    /// Local transmit/receive role
    pub fn direction(&self) -> RlcDirection {
        self.params().direction
    }

    /// Returns true for acknowledged mode
    pub fn is_am(&self) -> bool {
        matches!(self, Self::Am(_))
    }

    /// Queues an SDU for transmission
    pub fn enqueue_sdu(&mut self, sdu: Bytes) -> Result<(), RlcError> {
        match self {
            Self::Am(e) => e.enqueue_sdu(sdu),
            Self::Um(e) => e.enqueue_sdu(sdu),
        }
    }

    /// Builds PDUs totalling at most `grant_size` bytes, capped at
    /// [`MAX_PDU_SIZE`].
    ///
    /// `remaining_grant` is what is left of the transport block for other
    /// channels after this grant.
    pub fn send_pdus(&mut self, grant_size: usize, remaining_grant: usize) -> Vec<Bytes> {
        let pdus = match self {
            Self::Am(e) => e.send_pdus(grant_size),
            Self::Um(e) => e.send_pdus(grant_size),
        };
        tracing::trace!(
            rnti = self.rnti(),
            lcid = self.lcid(),
            grant_size,
            remaining_grant,
            "RLC built {} PDUs",
            pdus.len()
        );
        for pdu in &pdus {
            log_rlc_pdu(Direction::Tx, self.rnti(), pdu);
        }
        pdus
    }

    /// Processes a received PDU and returns the SDUs it completed
    pub fn receive_pdu(&mut self, pdu: Bytes) -> Result<Vec<Bytes>, RlcError> {
        log_rlc_pdu(Direction::Rx, self.rnti(), &pdu);
        match self {
            Self::Am(e) => e.receive_pdu(pdu),
            Self::Um(e) => e.receive_pdu(pdu),
        }
    }

    /// Advances the entity's timers by one millisecond
    pub fn timer_tick(&mut self) {
        match self {
            Self::Am(e) => e.timer_tick(),
            Self::Um(e) => e.timer_tick(),
        }
    }

    /// Bytes waiting for transmission, headers included
    pub fn buffer_status(&self) -> usize {
        match self {
            Self::Am(e) => e.buffer_status(),
            Self::Um(e) => e.buffer_status(),
        }
    }

    /// Counters tagged with RNTI and LCID
    pub fn statistics(&self) -> RlcStatsRow {
        let stats = match self {
            Self::Am(e) => *e.statistics(),
            Self::Um(e) => *e.statistics(),
        };
        RlcStatsRow {
            rnti: self.rnti(),
            lcid: self.lcid(),
            stats,
        }
    }
}
