//! Contracts between the node and its layer collaborators
//!
//! The node owns one application layer, one MAC and one PHY and routes
//! everything that crosses between them:
//!
//! ```text
//!   ApplicationLayer  --RlcSdu-->   Node (RLC table)   --buffer status-->  MacEntity
//!   MacEntity --RlcInterface--> RLC table,  MacEntity --PhyRequest--> PhyEntity
//!   PhyEntity --PhyIndication--> Node --> MacEntity
//! ```
//!
//! Collaborators never hold references to each other. Capabilities such as
//! [`RlcInterface`] are lent for the duration of a call.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use isacsim_common::{
    CarrierConfig, CellId, DuplexMode, Lcid, LinkDirection, LogicalChannelConfig, NodeId,
    NodeRole, Position, Rnti, SimTime, SubcarrierSpacing,
};
use isacsim_hub::{DistributionHub, InBandSink, OutOfBandSink};

use crate::app::TrafficStats;
use crate::error::{LayerError, NodeError, RlcError};

// ============================================================================
// Application layer
// ============================================================================

/// SDU produced by an application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RlcSdu {
    /// Destination UE on a gNB; ignored on a UE
    pub destination: Rnti,
    /// Logical channel carrying the SDU
    pub lcid: Lcid,
    /// SDU bytes
    pub payload: Bytes,
}

/// Callback an application uses to hand SDUs to RLC
pub type EnqueueFn<'a> = dyn FnMut(RlcSdu) -> Result<(), NodeError> + 'a;

/// Traffic generator bound to one logical channel
pub trait TrafficModel: Send {
    /// Advances the model by `elapsed_us`, appending any packets due, and
    /// returns the delay in microseconds until the next packet
    fn generate(&mut self, elapsed_us: u64, packets: &mut Vec<Bytes>) -> u64;
}

/// Application layer of a node
pub trait ApplicationLayer: Send {
    /// Attaches a traffic model sending to `peer` on `lcid`
    fn add_application(&mut self, peer: Rnti, lcid: Lcid, model: Box<dyn TrafficModel>);

    /// Number of attached applications
    fn application_count(&self) -> usize;

    /// Runs the applications for `elapsed_us` of simulated time, handing
    /// generated SDUs to `enqueue`. Returns the delay in microseconds until
    /// the layer wants to run again.
    fn run(&mut self, elapsed_us: u64, enqueue: &mut EnqueueFn<'_>) -> Result<u64, NodeError>;

    /// Accepts an SDU reassembled by RLC
    fn receive_packet(&mut self, peer: Rnti, lcid: Lcid, packet: Bytes);

    /// Generated and received traffic per `(peer, lcid)`
    fn traffic_stats(&self) -> Vec<(Rnti, Lcid, TrafficStats)>;
}

// ============================================================================
// RLC access lent to the MAC
// ============================================================================

/// RLC operations the MAC may invoke while it runs
pub trait RlcInterface {
    /// Pulls PDUs from the channel's entity under `grant_size` bytes
    fn send_rlc_pdus(
        &mut self,
        rnti: Rnti,
        lcid: Lcid,
        grant_size: usize,
        remaining_grant: usize,
    ) -> Result<Vec<Bytes>, RlcError>;

    /// Pushes a received PDU into the channel's entity
    fn receive_rlc_pdu(&mut self, rnti: Rnti, lcid: Lcid, pdu: Bytes) -> Result<(), RlcError>;
}

/// Buffer occupancy of one logical channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStatusUpdate {
    /// Peer RNTI
    pub rnti: Rnti,
    /// Logical channel
    pub lcid: Lcid,
    /// Bytes waiting, headers included
    pub bytes: usize,
}

/// Logical channel descriptor handed to the MAC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogicalChannelInfo {
    /// Peer RNTI
    pub rnti: Rnti,
    /// Logical channel
    pub lcid: Lcid,
    /// Priority, lower is served first
    pub priority: u8,
    /// Logical channel group
    pub lcg_id: u8,
    /// Prioritized bit rate in kB/s
    pub prioritized_bit_rate: u32,
    /// Bucket size duration in ms
    pub bucket_size_duration: u32,
}

impl LogicalChannelInfo {
    /// Reduces a channel configuration to what the MAC needs
    pub fn from_config(rnti: Rnti, config: &LogicalChannelConfig) -> Self {
        Self {
            rnti,
            lcid: config.lcid,
            priority: config.priority,
            lcg_id: config.lcg_id,
            prioritized_bit_rate: config.prioritized_bit_rate,
            bucket_size_duration: config.bucket_size_duration,
        }
    }
}

/// Buffered downlink or uplink data as seen by the MAC
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferStatus {
    /// UE: bytes waiting for uplink transmission
    Uplink(usize),
    /// gNB: bytes waiting for each UE, by RNTI
    Downlink(Vec<(Rnti, usize)>),
}

impl BufferStatus {
    /// Total bytes
    pub fn total(&self) -> usize {
        match self {
            Self::Uplink(bytes) => *bytes,
            Self::Downlink(per_ue) => per_ue.iter().map(|(_, bytes)| bytes).sum(),
        }
    }
}

/// MAC byte accounting of the last transmission time interval
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TtiBytes {
    /// MAC PDU bytes transmitted, subheaders included
    pub throughput: usize,
    /// RLC PDU bytes carried in those MAC PDUs
    pub goodput: usize,
}

// ============================================================================
// MAC <-> PHY
// ============================================================================

/// Identity and location of a node, registered with its PHY
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeInfo {
    /// Node identifier
    pub node_id: NodeId,
    /// Position in meters
    pub position: Position,
    /// Serving (or own) cell
    pub cell_id: CellId,
    /// gNB or UE
    pub role: NodeRole,
    /// Own RNTI on a UE
    pub rnti: Option<Rnti>,
    /// Transmit power in dBm
    pub tx_power_dbm: f64,
}

/// Cell parameters handed to the PHY
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellConfig {
    /// Physical cell identity
    pub cell_id: CellId,
    /// Duplex mode
    pub duplex_mode: DuplexMode,
    /// Resource blocks in the carrier
    pub num_resource_blocks: u32,
    /// Numerology
    pub subcarrier_spacing: SubcarrierSpacing,
}

impl CellConfig {
    /// Cell parameters of `carrier` in cell `cell_id`
    pub fn new(cell_id: CellId, carrier: &CarrierConfig) -> Self {
        Self {
            cell_id,
            duplex_mode: carrier.duplex_mode,
            num_resource_blocks: carrier.num_resource_blocks,
            subcarrier_spacing: carrier.subcarrier_spacing,
        }
    }
}

/// Scheduling control information sent along with data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlInfo {
    /// UE the control information concerns
    pub rnti: Rnti,
    /// Granted or requested bytes
    pub bytes: usize,
}

/// Requests the MAC issues to the PHY
#[derive(Debug, Clone, PartialEq)]
pub enum PhyRequest {
    /// Transmit a MAC PDU
    TxData {
        /// Addressed UE (DL) or own RNTI (UL)
        rnti: Rnti,
        /// MAC PDU
        payload: Bytes,
    },
    /// Expect an uplink transmission from a UE
    RxData {
        /// Scheduled UE
        rnti: Rnti,
    },
    /// Downlink control (grant notification)
    DlControl(ControlInfo),
    /// Uplink control (buffer report notification)
    UlControl(ControlInfo),
}

/// Received MAC PDU
#[derive(Debug, Clone, PartialEq)]
pub struct RxIndication {
    /// UE the PDU was sent to (DL) or by (UL)
    pub rnti: Rnti,
    /// MAC PDU
    pub payload: Bytes,
}

/// Channel measurement reported by the PHY
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelMeasurement {
    /// Measured peer
    pub rnti: Rnti,
    /// Slot the measurement belongs to
    pub slot: u64,
    /// Distance to the peer's transmitter in meters
    pub distance_m: f64,
}

/// Indications the PHY raises towards the MAC
#[derive(Debug, Clone, PartialEq)]
pub enum PhyIndication {
    /// Data received
    Rx(RxIndication),
    /// Sounding reference signal measurement (gNB)
    Srs(ChannelMeasurement),
    /// CSI-RS based channel state (UE)
    Csi(ChannelMeasurement),
}

/// Medium access control entity
pub trait MacEntity: Send {
    /// One scheduling pass. RLC access is lent for the call; returned
    /// requests are forwarded to the PHY in order.
    fn run(&mut self, rlc: &mut dyn RlcInterface) -> Result<Vec<PhyRequest>, LayerError>;

    /// Advances the MAC clock by `symbols`
    fn advance_timer(&mut self, symbols: u32);

    /// Records the buffer occupancy of a logical channel
    fn update_buffer_status(&mut self, update: BufferStatusUpdate);

    /// Adds a logical channel to the MAC's channel table
    fn add_logical_channel_info(&mut self, info: LogicalChannelInfo);

    /// Buffered data as seen by the MAC
    fn buffer_status(&self) -> BufferStatus;

    /// Byte accounting of the last TTI
    fn tti_bytes(&self) -> TtiBytes;

    /// Connects the MAC to the hub for out-of-band transmission
    fn connect(&mut self, node: NodeInfo, hub: Arc<DistributionHub>);

    /// Out-of-band intake registered with the hub
    fn out_of_band_sink(&self) -> Weak<dyn OutOfBandSink>;

    /// Handles received data, demultiplexing it into RLC
    fn rx_indication(
        &mut self,
        indication: RxIndication,
        rlc: &mut dyn RlcInterface,
    ) -> Result<(), LayerError>;

    /// Handles an SRS measurement (gNB)
    fn srs_indication(&mut self, _measurement: ChannelMeasurement) {}

    /// Handles a CSI report (UE)
    fn csi_indication(&mut self, _measurement: ChannelMeasurement) {}

    /// Attaches a scheduling algorithm
    fn add_scheduler(&mut self, scheduler: Box<dyn Scheduler>);
}

/// Physical layer entity
pub trait PhyEntity: Send {
    /// One processing pass, returning indications for the MAC
    fn run(&mut self) -> Result<Vec<PhyIndication>, LayerError>;

    /// Advances the PHY clock by `symbols`
    fn advance_timer(&mut self, symbols: u32);

    /// Current simulation time of the PHY clock
    fn current_time(&self) -> SimTime;

    /// Sets the cell parameters
    fn set_cell_config(&mut self, cell: CellConfig);

    /// Sets the carrier frequencies and bandwidths
    fn set_carrier_information(&mut self, carrier: CarrierConfig);

    /// Registers the owning node's identity and position
    fn register_node(&mut self, node: NodeInfo);

    /// Gives the PHY the hub for in-band transmission
    fn set_in_band_tx(&mut self, hub: Arc<DistributionHub>);

    /// In-band intake registered with the hub
    fn in_band_sink(&self) -> Weak<dyn InBandSink>;

    /// Executes a MAC request
    fn handle_request(&mut self, request: PhyRequest) -> Result<(), LayerError>;
}

// ============================================================================
// Scheduler
// ============================================================================

/// Bytes a UE has waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UeDemand {
    /// UE
    pub rnti: Rnti,
    /// Bytes waiting
    pub bytes: usize,
}

/// Bytes granted to a UE for one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Grant {
    /// UE
    pub rnti: Rnti,
    /// Granted bytes
    pub bytes: usize,
}

/// Resource allocation algorithm attached to a gNB MAC
pub trait Scheduler: Send {
    /// Splits one slot's resources among UEs with data waiting
    fn schedule(&mut self, direction: LinkDirection, demands: &[UeDemand]) -> Vec<Grant>;
}
