//! Test utility functions for integration tests
//!
//! Provides common utilities for test setup, logging, and assertions.

use isacsim_common::{Lcid, NodeId, Rnti};
use isacsim_stack::{Network, RlcStatsRow, SimulatedNode, TrafficStats};
use tracing_subscriber::{fmt, EnvFilter};

/// Result type for integration tests
pub type TestResult<T = ()> = anyhow::Result<T>;

/// Initialize logging for tests
///
/// Uses RUST_LOG environment variable if set, otherwise defaults to "info"
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt().with_env_filter(filter).with_test_writer().try_init();
}

/// Application counters of `node` for `(rnti, lcid)`, zero when absent
pub fn traffic(node: &dyn SimulatedNode, rnti: Rnti, lcid: Lcid) -> TrafficStats {
    node.traffic_stats()
        .into_iter()
        .find(|&(r, l, _)| r == rnti && l == lcid)
        .map(|(_, _, stats)| stats)
        .unwrap_or_default()
}

/// Application counters of the node with `node_id`
///
/// Panics if the network has no such node.
pub fn node_traffic(network: &Network, node_id: NodeId, rnti: Rnti, lcid: Lcid) -> TrafficStats {
    let node = network
        .node(node_id)
        .unwrap_or_else(|| panic!("no node {node_id} in network"));
    traffic(node, rnti, lcid)
}

/// RLC counters of `(rnti, lcid)` on the node with `node_id`
///
/// Panics if the node or the channel does not exist.
pub fn rlc_stats(network: &Network, node_id: NodeId, rnti: Rnti, lcid: Lcid) -> RlcStatsRow {
    let node = network
        .node(node_id)
        .unwrap_or_else(|| panic!("no node {node_id} in network"));
    node.rlc_statistics()
        .into_iter()
        .find(|row| row.rnti == rnti && row.lcid == lcid)
        .unwrap_or_else(|| panic!("node {node_id} has no channel RNTI {rnti} LCID {lcid}"))
}
