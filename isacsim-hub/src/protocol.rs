//! Packet formats carried by the distribution hub
//!
//! In-band packets travel over the modeled shared medium and are matched on
//! carrier frequency. Out-of-band packets travel over a side control path and
//! are matched on cell identity.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use isacsim_common::{CellId, LinkDirection, NodeId, Position, Rnti};
use num_complex::Complex32;

/// Time-domain waveform transmitted by a full PHY
#[derive(Debug, Clone, PartialEq)]
pub struct WaveformPacket {
    /// Complex baseband samples
    pub samples: Arc<[Complex32]>,
    /// Sample rate in Hz
    pub sample_rate: f64,
    /// Carrier frequency in Hz
    pub carrier_frequency: f64,
    /// Transmit power in dBm
    pub tx_power_dbm: f64,
    /// Position of the transmitter
    pub position: Position,
    /// Transmitting node
    pub sender: NodeId,
}

/// Unencoded MAC PDU transmitted by an abstract (passthrough) PHY
#[derive(Debug, Clone, PartialEq)]
pub struct OctetPacket {
    /// MAC PDU bytes
    pub payload: Bytes,
    /// Carrier frequency in Hz
    pub carrier_frequency: f64,
    /// Transmit power in dBm
    pub tx_power_dbm: f64,
    /// Position of the transmitter
    pub position: Position,
    /// Cell the transmission belongs to
    pub cell_id: CellId,
    /// UE the transmission is addressed to (DL) or sent by (UL)
    pub rnti: Rnti,
    /// Link direction
    pub direction: LinkDirection,
    /// Transmitting node
    pub sender: NodeId,
}

/// Packet delivered over the shared medium
#[derive(Debug, Clone, PartialEq)]
pub enum InBandPacket {
    /// Raw waveform samples
    Waveform(WaveformPacket),
    /// Unencoded octets
    Octets(OctetPacket),
}

impl InBandPacket {
    /// Carrier frequency the packet was transmitted on
    pub fn carrier_frequency(&self) -> f64 {
        match self {
            Self::Waveform(p) => p.carrier_frequency,
            Self::Octets(p) => p.carrier_frequency,
        }
    }

    /// Transmitting node
    pub fn sender(&self) -> NodeId {
        match self {
            Self::Waveform(p) => p.sender,
            Self::Octets(p) => p.sender,
        }
    }

    /// Position of the transmitter
    pub fn position(&self) -> Position {
        match self {
            Self::Waveform(p) => p.position,
            Self::Octets(p) => p.position,
        }
    }
}

/// Out-of-band packet type identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OutOfBandType {
    /// UE buffer status report for uplink scheduling
    BufferStatusReport = 1,
    /// Uplink grant from the gNB scheduler
    UplinkGrant = 2,
    /// One-bit scheduling request
    SchedulingRequest = 3,
}

impl OutOfBandType {
    /// Creates an OutOfBandType from a u8 value
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::BufferStatusReport),
            2 => Some(Self::UplinkGrant),
            3 => Some(Self::SchedulingRequest),
            _ => None,
        }
    }
}

impl fmt::Display for OutOfBandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BufferStatusReport => write!(f, "BSR"),
            Self::UplinkGrant => write!(f, "UL grant"),
            Self::SchedulingRequest => write!(f, "SR"),
        }
    }
}

/// Control packet delivered over the side channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutOfBandPacket {
    /// Packet type
    pub packet_type: OutOfBandType,
    /// Encoded control payload
    pub payload: Bytes,
    /// Cell the packet is scoped to
    pub cell_id: CellId,
    /// UE the packet concerns
    pub rnti: Rnti,
    /// Transmitting node
    pub sender: NodeId,
}
