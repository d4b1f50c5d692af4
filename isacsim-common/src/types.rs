//! Core radio types: identifiers, positions, numerology, duplex mode, roles.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigValidationError;

/// Radio Network Temporary Identifier of a UE within a cell.
pub type Rnti = u16;

/// Physical cell identity (0..=1007).
pub type CellId = u16;

/// Logical channel identity.
pub type Lcid = u8;

/// Simulation-wide node identifier.
pub type NodeId = u32;

/// Highest RNTI (and UE count) a cell may use.
pub const MAX_RNTI: u32 = 65519;

/// Highest physical cell identity.
pub const MAX_CELL_ID: u32 = 1007;

/// Maximum number of resource blocks in a carrier.
pub const MAX_RESOURCE_BLOCKS: u32 = 275;

/// OFDM symbols per slot (normal cyclic prefix).
pub const SYMBOLS_PER_SLOT: u32 = 14;

/// Subcarriers per resource block.
pub const SUBCARRIERS_PER_RB: u32 = 12;

/// Largest RLC SDU in bytes.
pub const MAX_SDU_SIZE: usize = 9000;

/// 3D position in meters
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate (meters)
    pub x: f64,
    /// Y coordinate (meters)
    pub y: f64,
    /// Z coordinate (meters)
    pub z: f64,
}

impl Position {
    /// Creates a new position
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns true if every coordinate is finite (no NaN, no infinity)
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Calculates Euclidean distance to another point
    pub fn distance_to(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Duplex mode of a carrier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum DuplexMode {
    /// Frequency division duplex, separate DL and UL carriers
    #[default]
    Fdd = 0,
    /// Time division duplex, one shared carrier
    Tdd = 1,
}

impl TryFrom<u8> for DuplexMode {
    type Error = ConfigValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Fdd),
            1 => Ok(Self::Tdd),
            other => Err(ConfigValidationError::InvalidDuplexMode(other)),
        }
    }
}

impl From<DuplexMode> for u8 {
    fn from(mode: DuplexMode) -> u8 {
        mode as u8
    }
}

impl fmt::Display for DuplexMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplexMode::Fdd => write!(f, "FDD"),
            DuplexMode::Tdd => write!(f, "TDD"),
        }
    }
}

/// NR subcarrier spacing (numerology)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum SubcarrierSpacing {
    /// 15 kHz (mu = 0)
    #[default]
    Khz15,
    /// 30 kHz (mu = 1)
    Khz30,
    /// 60 kHz (mu = 2)
    Khz60,
    /// 120 kHz (mu = 3)
    Khz120,
    /// 240 kHz (mu = 4)
    Khz240,
}

impl SubcarrierSpacing {
    /// Spacing in kHz
    pub const fn khz(self) -> u32 {
        match self {
            Self::Khz15 => 15,
            Self::Khz30 => 30,
            Self::Khz60 => 60,
            Self::Khz120 => 120,
            Self::Khz240 => 240,
        }
    }

    /// Spacing in Hz
    pub fn hz(self) -> f64 {
        f64::from(self.khz()) * 1e3
    }

    /// Slots in one millisecond
    pub const fn slots_per_ms(self) -> u32 {
        self.khz() / 15
    }

    /// OFDM symbols in one millisecond (`14 * scs / 15`)
    pub const fn symbols_per_ms(self) -> u32 {
        SYMBOLS_PER_SLOT * self.slots_per_ms()
    }
}

impl TryFrom<u32> for SubcarrierSpacing {
    type Error = ConfigValidationError;

    fn try_from(khz: u32) -> Result<Self, Self::Error> {
        match khz {
            15 => Ok(Self::Khz15),
            30 => Ok(Self::Khz30),
            60 => Ok(Self::Khz60),
            120 => Ok(Self::Khz120),
            240 => Ok(Self::Khz240),
            other => Err(ConfigValidationError::InvalidSubcarrierSpacing(other)),
        }
    }
}

impl From<SubcarrierSpacing> for u32 {
    fn from(scs: SubcarrierSpacing) -> u32 {
        scs.khz()
    }
}

impl fmt::Display for SubcarrierSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kHz", self.khz())
    }
}

/// Role of a node in the cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeRole {
    /// Base station
    Gnb,
    /// Terminal
    Ue,
}

impl NodeRole {
    /// Direction this role transmits in
    pub const fn tx_direction(self) -> LinkDirection {
        match self {
            Self::Gnb => LinkDirection::Downlink,
            Self::Ue => LinkDirection::Uplink,
        }
    }

    /// Direction this role receives in
    pub const fn rx_direction(self) -> LinkDirection {
        match self {
            Self::Gnb => LinkDirection::Uplink,
            Self::Ue => LinkDirection::Downlink,
        }
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRole::Gnb => write!(f, "gNB"),
            NodeRole::Ue => write!(f, "UE"),
        }
    }
}

/// Link direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkDirection {
    /// gNB to UE
    Downlink,
    /// UE to gNB
    Uplink,
}

impl fmt::Display for LinkDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkDirection::Downlink => write!(f, "DL"),
            LinkDirection::Uplink => write!(f, "UL"),
        }
    }
}

/// Local transmit/receive role of an RLC entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RlcDirection {
    /// Entity only transmits
    TransmitOnly,
    /// Entity only receives
    ReceiveOnly,
    /// Entity transmits and receives
    Bidirectional,
}

impl RlcDirection {
    /// Returns true if the entity accepts SDUs for transmission
    pub const fn transmits(self) -> bool {
        matches!(self, Self::TransmitOnly | Self::Bidirectional)
    }

    /// Returns true if the entity accepts PDUs from MAC
    pub const fn receives(self) -> bool {
        matches!(self, Self::ReceiveOnly | Self::Bidirectional)
    }
}

/// Simulation time in nanoseconds since the start of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// Start of the run
    pub const ZERO: SimTime = SimTime(0);

    /// Creates a time from nanoseconds
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a time from a symbol count at the given numerology.
    ///
    /// Computed from the total count so rounding never accumulates.
    pub fn from_symbols(symbols: u64, scs: SubcarrierSpacing) -> Self {
        Self(symbols * 1_000_000 / u64::from(scs.symbols_per_ms()))
    }

    /// Nanoseconds since start
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Microseconds since start
    pub const fn as_micros(self) -> u64 {
        self.0 / 1_000
    }

    /// Milliseconds since start, fractional
    pub fn as_millis_f64(self) -> f64 {
        self.0 as f64 / 1e6
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3} ms", self.as_millis_f64())
    }
}
