//! Configuration structures for gNB, UE, carriers and logical channels
//!
//! Scenarios are described in YAML and loaded with [`load_scenario_config`].
//! Every structure has a matching `validate` step; validation failures are
//! fatal setup-time errors.
//!
//! # Example
//!
//! ```rust,ignore
//! use isacsim_common::config::{load_scenario_config, validate_scenario_config};
//!
//! let scenario = load_scenario_config("scenarios/single_cell.yaml")?;
//! validate_scenario_config(&scenario)?;
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigValidationError, Error};
use crate::types::{
    CellId, DuplexMode, Lcid, LinkDirection, NodeId, NodeRole, Position, RlcDirection, Rnti,
    SubcarrierSpacing, MAX_CELL_ID, MAX_RESOURCE_BLOCKS, MAX_RNTI, MAX_SDU_SIZE,
    SUBCARRIERS_PER_RB, SYMBOLS_PER_SLOT,
};

/// Default number of logical channels per peer
pub const DEFAULT_MAX_LOGICAL_CHANNELS: usize = 4;

/// Default number of applications per peer
pub const DEFAULT_MAX_APPLICATIONS: usize = 16;

/// Default number of receivers the distribution hub can hold
pub const DEFAULT_MAX_RECEIVERS: usize = 1024;

/// Default number of HARQ processes, bounds RLC reassembly buffers
pub const DEFAULT_HARQ_PROCESSES: usize = 16;

/// Highest logical channel identity usable for data radio bearers
pub const MAX_LCID: Lcid = 32;

/// Carrier configuration shared by a gNB and the UEs it serves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarrierConfig {
    /// Duplex mode (0 = FDD, 1 = TDD)
    #[serde(default)]
    pub duplex_mode: DuplexMode,
    /// Downlink carrier frequency in Hz
    pub dl_carrier_frequency: f64,
    /// Uplink carrier frequency in Hz
    pub ul_carrier_frequency: f64,
    /// Number of resource blocks (1..=275)
    pub num_resource_blocks: u32,
    /// Subcarrier spacing in kHz
    #[serde(default)]
    pub subcarrier_spacing: SubcarrierSpacing,
    /// Downlink bandwidth in Hz (derived from the RB count when absent)
    #[serde(default)]
    pub dl_bandwidth: Option<f64>,
    /// Uplink bandwidth in Hz (derived from the RB count when absent)
    #[serde(default)]
    pub ul_bandwidth: Option<f64>,
}

impl CarrierConfig {
    /// Creates an FDD carrier with bandwidths derived from the RB count
    pub fn fdd(
        dl_carrier_frequency: f64,
        ul_carrier_frequency: f64,
        num_resource_blocks: u32,
        subcarrier_spacing: SubcarrierSpacing,
    ) -> Self {
        Self {
            duplex_mode: DuplexMode::Fdd,
            dl_carrier_frequency,
            ul_carrier_frequency,
            num_resource_blocks,
            subcarrier_spacing,
            dl_bandwidth: None,
            ul_bandwidth: None,
        }
    }

    /// Creates a TDD carrier with bandwidths derived from the RB count
    pub fn tdd(
        carrier_frequency: f64,
        num_resource_blocks: u32,
        subcarrier_spacing: SubcarrierSpacing,
    ) -> Self {
        Self {
            duplex_mode: DuplexMode::Tdd,
            dl_carrier_frequency: carrier_frequency,
            ul_carrier_frequency: carrier_frequency,
            num_resource_blocks,
            subcarrier_spacing,
            dl_bandwidth: None,
            ul_bandwidth: None,
        }
    }

    /// Bandwidth occupied by the configured resource blocks in Hz
    pub fn rb_bandwidth(&self) -> f64 {
        f64::from(self.num_resource_blocks * SUBCARRIERS_PER_RB) * self.subcarrier_spacing.hz()
    }

    /// Downlink bandwidth in Hz
    pub fn dl_bandwidth_hz(&self) -> f64 {
        self.dl_bandwidth.unwrap_or_else(|| self.rb_bandwidth())
    }

    /// Uplink bandwidth in Hz
    pub fn ul_bandwidth_hz(&self) -> f64 {
        self.ul_bandwidth.unwrap_or_else(|| self.rb_bandwidth())
    }

    /// Carrier frequency used in the given direction
    pub fn carrier_frequency(&self, direction: LinkDirection) -> f64 {
        match direction {
            LinkDirection::Downlink => self.dl_carrier_frequency,
            LinkDirection::Uplink => self.ul_carrier_frequency,
        }
    }

    /// Validates RB count and the DL/UL carrier relationship for the duplex mode.
    ///
    /// # Validation Rules
    ///
    /// - RB count must be between 1 and 275
    /// - Carrier frequencies must be positive and finite
    /// - FDD: DL carrier must exceed UL carrier by at least half the combined
    ///   UL + DL bandwidth
    /// - TDD: DL and UL carriers must be equal
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.num_resource_blocks == 0 || self.num_resource_blocks > MAX_RESOURCE_BLOCKS {
            return Err(ConfigValidationError::InvalidResourceBlockCount(
                self.num_resource_blocks,
            ));
        }

        let dl = self.dl_carrier_frequency;
        let ul = self.ul_carrier_frequency;
        if !(dl.is_finite() && ul.is_finite() && dl > 0.0 && ul > 0.0) {
            return Err(ConfigValidationError::InvalidCarrierFrequency {
                dl_carrier_frequency: dl,
                ul_carrier_frequency: ul,
                reason: "carrier frequencies must be positive and finite".to_string(),
            });
        }

        match self.duplex_mode {
            DuplexMode::Fdd => {
                let required_spacing = (self.ul_bandwidth_hz() + self.dl_bandwidth_hz()) / 2.0;
                if dl - ul < required_spacing {
                    return Err(ConfigValidationError::InsufficientDuplexSpacing {
                        dl_carrier_frequency: dl,
                        ul_carrier_frequency: ul,
                        required_spacing,
                    });
                }
            }
            DuplexMode::Tdd => {
                if dl != ul {
                    return Err(ConfigValidationError::InvalidCarrierFrequency {
                        dl_carrier_frequency: dl,
                        ul_carrier_frequency: ul,
                        reason: "TDD requires equal DL and UL carrier frequency".to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// gNB (base station) configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GnbConfig {
    /// Simulation-wide node identifier
    pub node_id: NodeId,
    /// Position in meters
    pub position: Position,
    /// Number of UEs attached to this gNB; UE RNTIs are `1..=num_ues`
    pub num_ues: usize,
    /// Physical cell identity
    pub cell_id: CellId,
    /// Transmit power in dBm
    #[serde(default = "default_gnb_tx_power")]
    pub tx_power_dbm: f64,
}

fn default_gnb_tx_power() -> f64 {
    34.0
}

impl GnbConfig {
    /// Creates a gNB configuration with default transmit power
    pub fn new(node_id: NodeId, position: Position, num_ues: usize, cell_id: CellId) -> Self {
        Self {
            node_id,
            position,
            num_ues,
            cell_id,
            tx_power_dbm: default_gnb_tx_power(),
        }
    }

    /// Validates the construction-time parameters (UE count and position).
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        validate_ue_count(self.num_ues)?;
        validate_position(&self.position)
    }
}

/// UE (terminal) configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UeConfig {
    /// Simulation-wide node identifier
    pub node_id: NodeId,
    /// Position in meters
    pub position: Position,
    /// RNTI assigned by the serving cell
    pub rnti: Rnti,
    /// Serving cell
    pub cell_id: CellId,
    /// Transmit power in dBm
    #[serde(default = "default_ue_tx_power")]
    pub tx_power_dbm: f64,
}

fn default_ue_tx_power() -> f64 {
    23.0
}

impl UeConfig {
    /// Creates a UE configuration with default transmit power
    pub fn new(node_id: NodeId, position: Position, rnti: Rnti, cell_id: CellId) -> Self {
        Self {
            node_id,
            position,
            rnti,
            cell_id,
            tx_power_dbm: default_ue_tx_power(),
        }
    }

    /// Validates the construction-time parameters (position and RNTI).
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        validate_position(&self.position)?;
        validate_rnti(self.rnti)
    }
}

/// RLC entity type, expressed relative to the network (DL = gNB to UE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum RlcEntityType {
    /// Unacknowledged mode, downlink only
    UmDownlink = 0,
    /// Unacknowledged mode, uplink only
    UmUplink = 1,
    /// Unacknowledged mode, both directions
    #[default]
    UmBidirectional = 2,
    /// Acknowledged mode
    Am = 3,
}

impl RlcEntityType {
    /// Returns true for acknowledged mode
    pub const fn is_am(self) -> bool {
        matches!(self, Self::Am)
    }

    /// Local transmit/receive role of an entity of this type on a node.
    ///
    /// The configured type names network directions. A downlink-only UM
    /// channel transmits on the gNB and receives on the UE, so the two
    /// unidirectional encodings swap meaning between the two sides.
    pub const fn direction_for(self, role: NodeRole) -> RlcDirection {
        match (self, role) {
            (Self::UmDownlink, NodeRole::Gnb) | (Self::UmUplink, NodeRole::Ue) => {
                RlcDirection::TransmitOnly
            }
            (Self::UmDownlink, NodeRole::Ue) | (Self::UmUplink, NodeRole::Gnb) => {
                RlcDirection::ReceiveOnly
            }
            (Self::UmBidirectional, _) | (Self::Am, _) => RlcDirection::Bidirectional,
        }
    }
}

impl TryFrom<u8> for RlcEntityType {
    type Error = ConfigValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::UmDownlink),
            1 => Ok(Self::UmUplink),
            2 => Ok(Self::UmBidirectional),
            3 => Ok(Self::Am),
            other => Err(ConfigValidationError::InvalidRlcEntityType(other)),
        }
    }
}

impl From<RlcEntityType> for u8 {
    fn from(entity_type: RlcEntityType) -> u8 {
        entity_type as u8
    }
}

/// Logical channel and RLC entity configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalChannelConfig {
    /// RLC entity type
    #[serde(default)]
    pub entity_type: RlcEntityType,
    /// Logical channel identity (1..=32)
    pub lcid: Lcid,
    /// MAC priority, lower value is higher priority
    #[serde(default = "default_priority")]
    pub priority: u8,
    /// Logical channel group
    #[serde(default = "default_lcg_id")]
    pub lcg_id: u8,
    /// Prioritized bit rate in kilobytes per second
    #[serde(default = "default_prioritized_bit_rate")]
    pub prioritized_bit_rate: u32,
    /// Bucket size duration in milliseconds
    #[serde(default = "default_bucket_size_duration")]
    pub bucket_size_duration: u32,
    /// Downlink sequence number field length in bits
    #[serde(default = "default_sn_field_length")]
    pub sn_field_length_dl: u8,
    /// Uplink sequence number field length in bits
    #[serde(default = "default_sn_field_length")]
    pub sn_field_length_ul: u8,
    /// Maximum number of SDUs held in the transmit buffer
    #[serde(default = "default_max_tx_buffer_sdus")]
    pub max_tx_buffer_sdus: usize,
    /// AM poll retransmit timer in milliseconds
    #[serde(default = "default_poll_retransmit")]
    pub poll_retransmit_timer: u32,
    /// Reassembly timer in milliseconds
    #[serde(default = "default_reassembly")]
    pub reassembly_timer: u32,
    /// AM status prohibit timer in milliseconds
    #[serde(default = "default_status_prohibit")]
    pub status_prohibit_timer: u32,
    /// AM: set the poll bit after this many PDUs
    #[serde(default = "default_poll_pdu")]
    pub poll_pdu: u32,
}

fn default_priority() -> u8 {
    1
}
fn default_lcg_id() -> u8 {
    1
}
fn default_prioritized_bit_rate() -> u32 {
    8
}
fn default_bucket_size_duration() -> u32 {
    5
}
fn default_sn_field_length() -> u8 {
    12
}
fn default_max_tx_buffer_sdus() -> usize {
    64
}
fn default_poll_retransmit() -> u32 {
    20
}
fn default_reassembly() -> u32 {
    10
}
fn default_status_prohibit() -> u32 {
    5
}
fn default_poll_pdu() -> u32 {
    8
}

impl LogicalChannelConfig {
    /// Creates a configuration with default parameters for the given type
    pub fn new(entity_type: RlcEntityType, lcid: Lcid) -> Self {
        Self {
            entity_type,
            lcid,
            priority: default_priority(),
            lcg_id: default_lcg_id(),
            prioritized_bit_rate: default_prioritized_bit_rate(),
            bucket_size_duration: default_bucket_size_duration(),
            sn_field_length_dl: default_sn_field_length(),
            sn_field_length_ul: default_sn_field_length(),
            max_tx_buffer_sdus: default_max_tx_buffer_sdus(),
            poll_retransmit_timer: default_poll_retransmit(),
            reassembly_timer: default_reassembly(),
            status_prohibit_timer: default_status_prohibit(),
            poll_pdu: default_poll_pdu(),
        }
    }

    /// Sets the MAC priority
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Sequence number length used for PDUs travelling in `direction`
    pub fn sn_field_length(&self, direction: LinkDirection) -> u8 {
        match direction {
            LinkDirection::Downlink => self.sn_field_length_dl,
            LinkDirection::Uplink => self.sn_field_length_ul,
        }
    }

    /// Validates LCID range, SN field lengths and buffer size.
    ///
    /// AM allows 12 or 18 bit sequence numbers, UM allows 6 or 12.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.lcid == 0 || self.lcid > MAX_LCID {
            return Err(ConfigValidationError::InvalidLogicalChannel(format!(
                "LCID {} must be between 1 and {}",
                self.lcid, MAX_LCID
            )));
        }

        let allowed: &[u8] = if self.entity_type.is_am() { &[12, 18] } else { &[6, 12] };
        for sn in [self.sn_field_length_dl, self.sn_field_length_ul] {
            if !allowed.contains(&sn) {
                return Err(ConfigValidationError::InvalidLogicalChannel(format!(
                    "LCID {}: SN field length {} not allowed for {:?} (expected {:?})",
                    self.lcid, sn, self.entity_type, allowed
                )));
            }
        }

        if self.max_tx_buffer_sdus == 0 {
            return Err(ConfigValidationError::InvalidLogicalChannel(format!(
                "LCID {}: transmit buffer must hold at least one SDU",
                self.lcid
            )));
        }

        Ok(())
    }
}

/// Per-node capacity limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeLimits {
    /// Logical channels per peer row
    #[serde(default = "default_max_logical_channels")]
    pub max_logical_channels: usize,
    /// Applications per peer
    #[serde(default = "default_max_applications")]
    pub max_applications: usize,
    /// HARQ processes of the MAC, bounds RLC reassembly buffers
    #[serde(default = "default_harq_processes")]
    pub harq_processes: usize,
}

fn default_max_logical_channels() -> usize {
    DEFAULT_MAX_LOGICAL_CHANNELS
}
fn default_max_applications() -> usize {
    DEFAULT_MAX_APPLICATIONS
}
fn default_harq_processes() -> usize {
    DEFAULT_HARQ_PROCESSES
}

impl Default for NodeLimits {
    fn default() -> Self {
        Self {
            max_logical_channels: DEFAULT_MAX_LOGICAL_CHANNELS,
            max_applications: DEFAULT_MAX_APPLICATIONS,
            harq_processes: DEFAULT_HARQ_PROCESSES,
        }
    }
}

impl NodeLimits {
    /// Validates that every limit is usable
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.max_logical_channels == 0 {
            return Err(ConfigValidationError::InvalidLimit(
                "max_logical_channels must be at least 1".to_string(),
            ));
        }
        if self.max_applications == 0 {
            return Err(ConfigValidationError::InvalidLimit(
                "max_applications must be at least 1".to_string(),
            ));
        }
        if self.harq_processes == 0 {
            return Err(ConfigValidationError::InvalidLimit(
                "harq_processes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Distribution hub configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubConfig {
    /// Maximum number of simultaneously registered receivers
    #[serde(default = "default_max_receivers")]
    pub max_receivers: usize,
}

fn default_max_receivers() -> usize {
    DEFAULT_MAX_RECEIVERS
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            max_receivers: DEFAULT_MAX_RECEIVERS,
        }
    }
}

/// Periodic application attached to a logical channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Peer RNTI (destination UE for downlink, the UE itself for uplink)
    pub rnti: Rnti,
    /// Direction of the traffic
    pub direction: LinkDirection,
    /// Logical channel carrying the traffic
    pub lcid: Lcid,
    /// Packet size in bytes
    pub packet_size: usize,
    /// Packet interval in microseconds
    pub interval_us: u64,
}

/// A complete single-cell scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    /// The base station
    pub gnb: GnbConfig,
    /// Terminals served by the base station
    pub ues: Vec<UeConfig>,
    /// Carrier shared by every node
    pub carrier: CarrierConfig,
    /// Logical channels configured for every UE
    #[serde(default)]
    pub logical_channels: Vec<LogicalChannelConfig>,
    /// Traffic sources
    #[serde(default)]
    pub applications: Vec<ApplicationConfig>,
    /// Node capacity limits
    #[serde(default)]
    pub limits: NodeLimits,
    /// Hub capacity
    #[serde(default)]
    pub hub: HubConfig,
    /// Symbols per tick (1 = symbol level, 14 = slot level)
    #[serde(default = "default_tick_granularity")]
    pub tick_granularity: u32,
    /// Run length in milliseconds
    pub duration_ms: u64,
}

fn default_tick_granularity() -> u32 {
    SYMBOLS_PER_SLOT
}

/// Validates a node position (every coordinate finite).
pub fn validate_position(position: &Position) -> Result<(), ConfigValidationError> {
    if !position.is_finite() {
        return Err(ConfigValidationError::InvalidPosition(format!(
            "{position} must have finite, non-NaN coordinates"
        )));
    }
    Ok(())
}

/// Validates the number of UEs attached to a gNB (1..=65519).
pub fn validate_ue_count(num_ues: usize) -> Result<(), ConfigValidationError> {
    if num_ues == 0 || num_ues > MAX_RNTI as usize {
        return Err(ConfigValidationError::InvalidUeCount(num_ues));
    }
    Ok(())
}

/// Validates an RNTI (1..=65519).
pub fn validate_rnti(rnti: Rnti) -> Result<(), ConfigValidationError> {
    let rnti = u32::from(rnti);
    if rnti == 0 || rnti > MAX_RNTI {
        return Err(ConfigValidationError::InvalidRnti(rnti));
    }
    Ok(())
}

/// Validates a physical cell identity (0..=1007).
pub fn validate_cell_id(cell_id: CellId) -> Result<(), ConfigValidationError> {
    if u32::from(cell_id) > MAX_CELL_ID {
        return Err(ConfigValidationError::InvalidCellId(u32::from(cell_id)));
    }
    Ok(())
}

/// Validates a tick granularity (1 = symbol level, 14 = slot level).
pub fn validate_tick_granularity(tick_granularity: u32) -> Result<(), ConfigValidationError> {
    if tick_granularity != 1 && tick_granularity != SYMBOLS_PER_SLOT {
        return Err(ConfigValidationError::InvalidTickGranularity(tick_granularity));
    }
    Ok(())
}

/// Validates a complete scenario.
///
/// Besides the per-structure checks, every UE must be served by the gNB's
/// cell and carry an RNTI within the gNB's UE count, and every application
/// must reference a configured logical channel.
pub fn validate_scenario_config(config: &ScenarioConfig) -> Result<(), ConfigValidationError> {
    config.gnb.validate()?;
    validate_cell_id(config.gnb.cell_id)?;
    config.carrier.validate()?;
    config.limits.validate()?;
    validate_tick_granularity(config.tick_granularity)?;

    for ue in &config.ues {
        ue.validate()?;
        if usize::from(ue.rnti) > config.gnb.num_ues {
            return Err(ConfigValidationError::InvalidRnti(u32::from(ue.rnti)));
        }
        if ue.cell_id != config.gnb.cell_id {
            return Err(ConfigValidationError::InvalidCellId(u32::from(ue.cell_id)));
        }
    }

    if config.logical_channels.len() > config.limits.max_logical_channels {
        return Err(ConfigValidationError::InvalidLimit(format!(
            "{} logical channels configured, limit is {}",
            config.logical_channels.len(),
            config.limits.max_logical_channels
        )));
    }
    for lc in &config.logical_channels {
        lc.validate()?;
    }

    for app in &config.applications {
        if !config.logical_channels.iter().any(|lc| lc.lcid == app.lcid) {
            return Err(ConfigValidationError::InvalidLogicalChannel(format!(
                "application for RNTI {} uses unconfigured LCID {}",
                app.rnti, app.lcid
            )));
        }
        if app.interval_us == 0 {
            return Err(ConfigValidationError::InvalidLogicalChannel(format!(
                "application for RNTI {} on LCID {} has a zero interval",
                app.rnti, app.lcid
            )));
        }
        if app.packet_size > MAX_SDU_SIZE {
            return Err(ConfigValidationError::InvalidLogicalChannel(format!(
                "application for RNTI {} on LCID {} sends {} byte packets, limit is {}",
                app.rnti, app.lcid, app.packet_size, MAX_SDU_SIZE
            )));
        }
    }

    Ok(())
}

/// Loads a scenario configuration from a YAML file.
pub fn load_scenario_config<P: AsRef<Path>>(path: P) -> Result<ScenarioConfig, Error> {
    let contents = std::fs::read_to_string(path.as_ref())?;
    load_scenario_config_from_str(&contents)
}

/// Loads a scenario configuration from a YAML string.
pub fn load_scenario_config_from_str(yaml: &str) -> Result<ScenarioConfig, Error> {
    let config: ScenarioConfig = serde_yaml::from_str(yaml)?;
    Ok(config)
}

/// Loads and validates a scenario configuration in one step.
pub fn load_and_validate_scenario_config<P: AsRef<Path>>(path: P) -> Result<ScenarioConfig, Error> {
    let config = load_scenario_config(path)?;
    validate_scenario_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO_YAML: &str = r#"
gnb:
  node_id: 1
  position: { x: 0.0, y: 0.0, z: 25.0 }
  num_ues: 2
  cell_id: 1
ues:
  - node_id: 2
    position: { x: 100.0, y: 0.0, z: 1.5 }
    rnti: 1
    cell_id: 1
  - node_id: 3
    position: { x: 0.0, y: 100.0, z: 1.5 }
    rnti: 2
    cell_id: 1
carrier:
  duplex_mode: 1
  dl_carrier_frequency: 3.5e9
  ul_carrier_frequency: 3.5e9
  num_resource_blocks: 52
  subcarrier_spacing: 30
logical_channels:
  - entity_type: 3
    lcid: 4
  - entity_type: 2
    lcid: 5
    priority: 2
applications:
  - rnti: 1
    direction: Downlink
    lcid: 4
    packet_size: 200
    interval_us: 500
duration_ms: 10
"#;

    fn valid_fdd() -> CarrierConfig {
        CarrierConfig::fdd(2.16e9, 1.97e9, 52, SubcarrierSpacing::Khz15)
    }

    #[test]
    fn test_load_scenario_from_str() {
        let config = load_scenario_config_from_str(SCENARIO_YAML).unwrap();
        assert_eq!(config.gnb.num_ues, 2);
        assert_eq!(config.ues.len(), 2);
        assert_eq!(config.carrier.duplex_mode, DuplexMode::Tdd);
        assert_eq!(config.carrier.subcarrier_spacing, SubcarrierSpacing::Khz30);
        assert_eq!(config.logical_channels[0].entity_type, RlcEntityType::Am);
        assert_eq!(config.logical_channels[1].priority, 2);
        assert_eq!(config.tick_granularity, 14);
        assert_eq!(config.limits, NodeLimits::default());
        assert!(validate_scenario_config(&config).is_ok());
    }

    #[test]
    fn test_load_rejects_bad_subcarrier_spacing() {
        let yaml = SCENARIO_YAML.replace("subcarrier_spacing: 30", "subcarrier_spacing: 45");
        assert!(matches!(
            load_scenario_config_from_str(&yaml),
            Err(Error::YamlParse(_))
        ));
    }

    #[test]
    fn test_validate_fdd_carrier() {
        assert!(valid_fdd().validate().is_ok());
    }

    #[test]
    fn test_validate_fdd_insufficient_spacing() {
        // 52 RBs at 15 kHz occupy 9.36 MHz per direction
        let carrier = CarrierConfig::fdd(2.0e9 + 9.0e6, 2.0e9, 52, SubcarrierSpacing::Khz15);
        match carrier.validate() {
            Err(ConfigValidationError::InsufficientDuplexSpacing { required_spacing, .. }) => {
                assert!((required_spacing - 9.36e6).abs() < 1.0);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_validate_tdd_requires_equal_carriers() {
        let mut carrier = CarrierConfig::tdd(3.5e9, 52, SubcarrierSpacing::Khz30);
        assert!(carrier.validate().is_ok());
        carrier.ul_carrier_frequency = 3.4e9;
        assert!(matches!(
            carrier.validate(),
            Err(ConfigValidationError::InvalidCarrierFrequency { .. })
        ));
    }

    #[test]
    fn test_validate_rb_count() {
        let mut carrier = valid_fdd();
        carrier.num_resource_blocks = 0;
        assert_eq!(
            carrier.validate(),
            Err(ConfigValidationError::InvalidResourceBlockCount(0))
        );
        carrier.num_resource_blocks = 276;
        assert_eq!(
            carrier.validate(),
            Err(ConfigValidationError::InvalidResourceBlockCount(276))
        );
    }

    #[test]
    fn test_validate_ids_and_counts() {
        assert!(validate_cell_id(1007).is_ok());
        assert_eq!(validate_cell_id(1008), Err(ConfigValidationError::InvalidCellId(1008)));
        assert_eq!(validate_ue_count(0), Err(ConfigValidationError::InvalidUeCount(0)));
        assert!(validate_ue_count(65519).is_ok());
        assert_eq!(validate_ue_count(65520), Err(ConfigValidationError::InvalidUeCount(65520)));
        assert_eq!(validate_rnti(0), Err(ConfigValidationError::InvalidRnti(0)));
        assert!(validate_tick_granularity(1).is_ok());
        assert!(validate_tick_granularity(14).is_ok());
        assert!(validate_tick_granularity(7).is_err());
    }

    #[test]
    fn test_validate_position() {
        assert!(validate_position(&Position::new(1.0, 2.0, 3.0)).is_ok());
        assert!(matches!(
            validate_position(&Position::new(0.0, f64::NAN, 0.0)),
            Err(ConfigValidationError::InvalidPosition(_))
        ));
    }

    #[test]
    fn test_entity_type_direction_mapping() {
        use crate::types::RlcDirection::*;
        assert_eq!(RlcEntityType::UmDownlink.direction_for(NodeRole::Gnb), TransmitOnly);
        assert_eq!(RlcEntityType::UmDownlink.direction_for(NodeRole::Ue), ReceiveOnly);
        assert_eq!(RlcEntityType::UmUplink.direction_for(NodeRole::Gnb), ReceiveOnly);
        assert_eq!(RlcEntityType::UmUplink.direction_for(NodeRole::Ue), TransmitOnly);
        assert_eq!(RlcEntityType::Am.direction_for(NodeRole::Ue), Bidirectional);
    }

    #[test]
    fn test_logical_channel_validation() {
        assert!(LogicalChannelConfig::new(RlcEntityType::Am, 4).validate().is_ok());
        assert!(LogicalChannelConfig::new(RlcEntityType::Am, 0).validate().is_err());
        let mut um = LogicalChannelConfig::new(RlcEntityType::UmBidirectional, 5);
        um.sn_field_length_dl = 18;
        assert!(um.validate().is_err());
    }

    #[test]
    fn test_scenario_rejects_oversized_packets() {
        let mut config = load_scenario_config_from_str(SCENARIO_YAML).unwrap();
        config.applications[0].packet_size = MAX_SDU_SIZE;
        assert!(validate_scenario_config(&config).is_ok());
        config.applications[0].packet_size = MAX_SDU_SIZE + 1;
        assert!(matches!(
            validate_scenario_config(&config),
            Err(ConfigValidationError::InvalidLogicalChannel(_))
        ));
    }

    #[test]
    fn test_scenario_rejects_unknown_application_channel() {
        let mut config = load_scenario_config_from_str(SCENARIO_YAML).unwrap();
        config.applications[0].lcid = 9;
        assert!(matches!(
            validate_scenario_config(&config),
            Err(ConfigValidationError::InvalidLogicalChannel(_))
        ));
    }
}
