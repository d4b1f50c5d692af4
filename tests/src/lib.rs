//! Integration test framework for isacsim
#![allow(missing_docs)]
//!
//! This crate provides scenario fixtures and helpers for running complete
//! networks of gNB and UE nodes through the distribution hub.
//!
//! # Components
//!
//! - [`test_fixtures`] - Scenario builders and network wiring
//! - [`test_utils`] - Logging setup and counter lookups
//!
//! # Test Categories
//!
//! 1. **Data Transfer Tests** - UM and AM traffic in both directions
//! 2. **Multi-UE Tests** - Several UEs sharing a cell, several cells sharing a hub
//! 3. **Hub Registration Tests** - Receiver slots, capacity and wiring errors
//! 4. **Scenario Tests** - YAML scenarios loaded from disk and validated
//! 5. **Parallel Runner Tests** - Independent networks on worker threads

pub mod test_fixtures;
pub mod test_utils;

pub use test_fixtures::{
    build_network, ue_node_id, ScenarioBuilder, GNB_NODE_ID, SCENARIO_YAML, TEST_CELL_ID,
    TEST_LCID,
};
pub use test_utils::{init_test_logging, node_traffic, rlc_stats, traffic, TestResult};
