//! Error types for isacsim

use thiserror::Error;

/// Errors raised while validating node, carrier or scenario configuration.
///
/// These are fatal setup-time errors: a run must not start with a
/// configuration that produced one of them.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigValidationError {
    /// Node position has a NaN or infinite component
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// Number of UEs attached to a gNB is out of range
    #[error("Invalid UE count {0}: must be between 1 and 65519")]
    InvalidUeCount(usize),

    /// RNTI is out of range
    #[error("Invalid RNTI {0}: must be between 1 and 65519")]
    InvalidRnti(u32),

    /// Number of resource blocks is out of range
    #[error("Invalid resource block count {0}: must be between 1 and 275")]
    InvalidResourceBlockCount(u32),

    /// Physical cell identity is out of range
    #[error("Invalid cell ID {0}: must be between 0 and 1007")]
    InvalidCellId(u32),

    /// Duplex mode is neither FDD (0) nor TDD (1)
    #[error("Invalid duplex mode {0}: expected 0 (FDD) or 1 (TDD)")]
    InvalidDuplexMode(u8),

    /// Subcarrier spacing is not one of the NR numerologies
    #[error("Invalid subcarrier spacing {0} kHz: expected one of 15, 30, 60, 120, 240")]
    InvalidSubcarrierSpacing(u32),

    /// FDD downlink and uplink carriers overlap
    #[error(
        "Insufficient duplex spacing: DL carrier {dl_carrier_frequency} Hz must exceed \
         UL carrier {ul_carrier_frequency} Hz by at least {required_spacing} Hz"
    )]
    InsufficientDuplexSpacing {
        /// Downlink carrier frequency in Hz
        dl_carrier_frequency: f64,
        /// Uplink carrier frequency in Hz
        ul_carrier_frequency: f64,
        /// Minimum required separation in Hz
        required_spacing: f64,
    },

    /// TDD downlink and uplink carriers differ, or a frequency is not positive
    #[error("Invalid carrier frequency: DL {dl_carrier_frequency} Hz, UL {ul_carrier_frequency} Hz ({reason})")]
    InvalidCarrierFrequency {
        /// Downlink carrier frequency in Hz
        dl_carrier_frequency: f64,
        /// Uplink carrier frequency in Hz
        ul_carrier_frequency: f64,
        /// What is wrong with the pair
        reason: String,
    },

    /// Invalid logical channel or RLC entity parameter
    #[error("Invalid logical channel configuration: {0}")]
    InvalidLogicalChannel(String),

    /// RLC entity type is not one of 0..=3
    #[error("Invalid RLC entity type {0}: expected 0 (UM DL), 1 (UM UL), 2 (UM bidirectional) or 3 (AM)")]
    InvalidRlcEntityType(u8),

    /// Tick granularity is neither symbol (1) nor slot (14) based
    #[error("Invalid tick granularity {0}: expected 1 (symbol) or 14 (slot)")]
    InvalidTickGranularity(u32),

    /// A capacity limit is zero or otherwise unusable
    #[error("Invalid limit: {0}")]
    InvalidLimit(String),
}

/// Error types for the isacsim library.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigValidationError),

    /// File I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}
