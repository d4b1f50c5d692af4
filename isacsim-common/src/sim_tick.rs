//! Simulation tick/timestep interface
//!
//! The network advances in ticks of one or more OFDM symbols. A tick counter
//! therefore counts symbols, and wall-clock simulation time is derived from
//! the symbol count and the numerology.

use serde::{Deserialize, Serialize};

use crate::error::ConfigValidationError;
use crate::config::validate_tick_granularity;
use crate::types::{SimTime, SubcarrierSpacing};

/// Simulation tick counter, in OFDM symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimulationTick(u64);

impl SimulationTick {
    /// Creates a new simulation tick
    pub fn new(tick: u64) -> Self {
        Self(tick)
    }

    /// Creates the initial tick (tick 0)
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the tick value
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Advances by N symbols
    pub fn advance(&mut self, n: u64) {
        self.0 += n;
    }

    /// Returns a tick advanced by N symbols without mutating
    pub fn advanced_by(&self, n: u64) -> Self {
        Self(self.0 + n)
    }

    /// Returns true if this is the initial tick
    pub fn is_initial(&self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for SimulationTick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Tick({})", self.0)
    }
}

impl From<u64> for SimulationTick {
    fn from(tick: u64) -> Self {
        Self::new(tick)
    }
}

/// Simulation time configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationTimeConfig {
    /// Numerology the network runs at
    pub subcarrier_spacing: SubcarrierSpacing,
    /// Symbols per tick (1 = symbol level, 14 = slot level)
    pub tick_granularity: u32,
    /// Total simulation duration in milliseconds
    pub duration_ms: u64,
}

impl Default for SimulationTimeConfig {
    fn default() -> Self {
        Self {
            subcarrier_spacing: SubcarrierSpacing::Khz15,
            tick_granularity: 14,
            duration_ms: 100,
        }
    }
}

impl SimulationTimeConfig {
    /// Creates a validated simulation time configuration
    pub fn new(
        subcarrier_spacing: SubcarrierSpacing,
        tick_granularity: u32,
        duration_ms: u64,
    ) -> Result<Self, ConfigValidationError> {
        validate_tick_granularity(tick_granularity)?;
        Ok(Self {
            subcarrier_spacing,
            tick_granularity,
            duration_ms,
        })
    }

    /// Total number of symbols in the run
    pub fn total_symbols(&self) -> u64 {
        self.duration_ms * u64::from(self.subcarrier_spacing.symbols_per_ms())
    }

    /// Converts a tick to simulation time
    pub fn tick_to_time(&self, tick: SimulationTick) -> SimTime {
        SimTime::from_symbols(tick.value(), self.subcarrier_spacing)
    }
}

/// Simulation clock for coordinating timesteps
#[derive(Debug)]
pub struct SimulationClock {
    current_tick: SimulationTick,
    config: SimulationTimeConfig,
}

impl SimulationClock {
    /// Creates a new simulation clock
    pub fn new(config: SimulationTimeConfig) -> Self {
        Self {
            current_tick: SimulationTick::initial(),
            config,
        }
    }

    /// Returns the current tick
    pub fn current_tick(&self) -> SimulationTick {
        self.current_tick
    }

    /// Returns the configuration
    pub fn config(&self) -> &SimulationTimeConfig {
        &self.config
    }

    /// Advances the clock by one tick of the configured granularity
    pub fn tick(&mut self) {
        self.current_tick.advance(u64::from(self.config.tick_granularity));
    }

    /// Returns true if the simulation is complete
    pub fn is_complete(&self) -> bool {
        self.current_tick.value() >= self.config.total_symbols()
    }

    /// Returns the current simulation time
    pub fn current_time(&self) -> SimTime {
        self.config.tick_to_time(self.current_tick)
    }

    /// Resets the clock to initial state
    pub fn reset(&mut self) {
        self.current_tick = SimulationTick::initial();
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(SimulationTimeConfig::default())
    }
}
