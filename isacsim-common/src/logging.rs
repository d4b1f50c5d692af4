//! Logging infrastructure for isacsim
//!
//! This module provides configurable logging using the `tracing` crate and
//! per-layer PDU logging helpers with hex payload dumps at trace level.

use std::fmt;
use tracing::Level;
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// Trace level - most verbose
    Trace,
    /// Debug level
    Debug,
    /// Info level (default)
    #[default]
    Info,
    /// Warn level
    Warn,
    /// Error level - least verbose
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Trace => write!(f, "trace"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(format!("unknown log level: {s}")),
        }
    }
}

/// Initialize the tracing subscriber with the specified log level.
///
/// This should be called once at startup. The log level can be overridden
/// by the `RUST_LOG` environment variable.
pub fn init_logging(level: LogLevel) {
    init_logging_with_filter(&level.to_string());
}

/// Initialize logging with a custom filter string.
///
/// # Example
///
/// ```no_run
/// use isacsim_common::logging::init_logging_with_filter;
///
/// // Default to info, but trace the hub's deliveries
/// init_logging_with_filter("info,isacsim_hub=trace");
/// ```
pub fn init_logging_with_filter(filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_span_events(FmtSpan::NONE)
        .init();
}

/// PDU direction for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Incoming/received PDU
    Rx,
    /// Outgoing/transmitted PDU
    Tx,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Rx => write!(f, "RX"),
            Direction::Tx => write!(f, "TX"),
        }
    }
}

/// Log a layer PDU at trace level, with the payload as hex.
///
/// # Arguments
///
/// * `layer` - Layer name (e.g., "RLC", "MAC", "PHY")
/// * `direction` - PDU direction (RX or TX)
/// * `rnti` - Peer RNTI the PDU belongs to
/// * `data` - Raw PDU bytes
pub fn log_layer_pdu(layer: &str, direction: Direction, rnti: u16, data: &[u8]) {
    tracing::trace!(
        layer = layer,
        direction = %direction,
        rnti = rnti,
        len = data.len(),
        hex = %HexDump(data),
        "{} {} PDU",
        direction,
        layer
    );
}

/// Log an RLC PDU
pub fn log_rlc_pdu(direction: Direction, rnti: u16, data: &[u8]) {
    log_layer_pdu("RLC", direction, rnti, data);
}

/// Log a MAC PDU
pub fn log_mac_pdu(direction: Direction, rnti: u16, data: &[u8]) {
    log_layer_pdu("MAC", direction, rnti, data);
}

/// Wrapper for hex dump formatting
pub struct HexDump<'a>(pub &'a [u8]);

impl fmt::Display for HexDump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}
