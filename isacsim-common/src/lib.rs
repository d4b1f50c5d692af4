//! Common types and utilities for isacsim
//!
//! This crate provides shared types, configuration structures, logging and
//! the simulation time base used across all isacsim crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod sim_tick;
pub mod types;

pub use config::{
    load_and_validate_scenario_config, load_scenario_config, load_scenario_config_from_str,
    validate_cell_id, validate_position, validate_rnti, validate_scenario_config,
    validate_tick_granularity, validate_ue_count, ApplicationConfig, CarrierConfig, GnbConfig,
    HubConfig, LogicalChannelConfig, NodeLimits, RlcEntityType, ScenarioConfig, UeConfig,
};
pub use error::{ConfigValidationError, Error};
pub use logging::{
    init_logging, init_logging_with_filter, log_layer_pdu, log_mac_pdu, log_rlc_pdu, Direction,
    HexDump, LogLevel,
};
pub use sim_tick::{SimulationClock, SimulationTick, SimulationTimeConfig};
pub use types::*;
