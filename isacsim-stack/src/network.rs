//! Network driver
//!
//! A [`Network`] owns every node of one simulation instance together with the
//! hub they share, and steps them in lockstep: every node runs, then every
//! node's timers advance by the tick granularity. Independent instances can be
//! run side by side with [`run_parallel`].

use std::sync::Arc;

use isacsim_common::{
    Lcid, NodeId, NodeRole, Rnti, SimTime, SimulationClock, SimulationTimeConfig,
};
use isacsim_hub::DistributionHub;
use tracing::{debug, info};

use crate::app::TrafficStats;
use crate::error::{NetworkError, NodeError};
use crate::node::Node;
use crate::rlc::RlcStatsRow;

/// A node the network can step
///
/// Specializations expose the kernel they wrap; stepping and reporting go
/// through it.
pub trait SimulatedNode: Send {
    /// Kernel of the node
    fn node(&self) -> &Node;

    /// Mutable kernel of the node
    fn node_mut(&mut self) -> &mut Node;

    /// Node identifier
    fn node_id(&self) -> NodeId {
        self.node().node_id()
    }

    /// gNB or UE
    fn role(&self) -> NodeRole {
        self.node().role()
    }

    /// One MAC pass and one PHY pass
    fn run(&mut self) -> Result<(), NodeError> {
        self.node_mut().run()
    }

    /// Advances the node's timers by `tick` symbols
    fn advance_timer(&mut self, tick: u32) -> Result<(), NodeError> {
        self.node_mut().advance_timer(tick)
    }

    /// PHY clock of the node
    fn current_time(&self) -> SimTime {
        self.node().current_time()
    }

    /// Counters of every active logical channel
    fn rlc_statistics(&self) -> Vec<RlcStatsRow> {
        self.node().all_rlc_statistics()
    }

    /// Application traffic counters
    fn traffic_stats(&self) -> Vec<(Rnti, Lcid, TrafficStats)> {
        self.node().traffic_stats()
    }
}

impl SimulatedNode for Node {
    fn node(&self) -> &Node {
        self
    }

    fn node_mut(&mut self) -> &mut Node {
        self
    }
}

/// End-of-run report of one node
#[derive(Debug, Clone)]
pub struct NodeSummary {
    /// Node identifier
    pub node_id: NodeId,
    /// gNB or UE
    pub role: NodeRole,
    /// Counters of every active logical channel
    pub rlc_stats: Vec<RlcStatsRow>,
    /// Application traffic counters
    pub traffic: Vec<(Rnti, Lcid, TrafficStats)>,
}

/// End-of-run report of a network
#[derive(Debug, Clone)]
pub struct SimulationSummary {
    /// Simulated time covered
    pub elapsed: SimTime,
    /// Ticks executed
    pub ticks: u64,
    /// Per-node reports in insertion order
    pub nodes: Vec<NodeSummary>,
}

impl SimulationSummary {
    /// Report of the node with `node_id`
    pub fn node(&self, node_id: NodeId) -> Option<&NodeSummary> {
        self.nodes.iter().find(|node| node.node_id == node_id)
    }
}

/// One simulation instance: a hub and the nodes wired to it
pub struct Network {
    hub: Arc<DistributionHub>,
    nodes: Vec<Box<dyn SimulatedNode>>,
    clock: SimulationClock,
    ticks: u64,
}

impl std::fmt::Debug for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Network")
            .field("nodes", &self.nodes.len())
            .field("clock", &self.clock)
            .field("ticks", &self.ticks)
            .finish()
    }
}

impl Network {
    /// Creates an empty network over `hub`
    pub fn new(hub: Arc<DistributionHub>, time: SimulationTimeConfig) -> Self {
        Self {
            hub,
            nodes: Vec::new(),
            clock: SimulationClock::new(time),
            ticks: 0,
        }
    }

    /// Adds a node. Nodes are stepped in insertion order.
    pub fn add_node(&mut self, node: Box<dyn SimulatedNode>) -> usize {
        debug!("Network: adding {} node {}", node.role(), node.node_id());
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Shared hub
    pub fn hub(&self) -> &Arc<DistributionHub> {
        &self.hub
    }

    /// Simulation clock
    pub fn clock(&self) -> &SimulationClock {
        &self.clock
    }

    /// Ticks executed so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &dyn SimulatedNode> {
        self.nodes.iter().map(|node| node.as_ref())
    }

    /// Node with `node_id`
    pub fn node(&self, node_id: NodeId) -> Option<&dyn SimulatedNode> {
        self.nodes().find(|node| node.node_id() == node_id)
    }

    /// Mutable node with `node_id`
    pub fn node_mut(&mut self, node_id: NodeId) -> Option<&mut (dyn SimulatedNode + 'static)> {
        self.nodes
            .iter_mut()
            .find(|node| node.node_id() == node_id)
            .map(|node| node.as_mut())
    }

    /// One tick: every node runs, then every node advances by the tick
    /// granularity, then the clock moves on
    pub fn step(&mut self) -> Result<(), NetworkError> {
        let granularity = self.clock.config().tick_granularity;

        for node in &mut self.nodes {
            node.run().map_err(|source| NetworkError::Node {
                node_id: node.node_id(),
                source,
            })?;
        }
        for node in &mut self.nodes {
            node.advance_timer(granularity)
                .map_err(|source| NetworkError::Node {
                    node_id: node.node_id(),
                    source,
                })?;
        }

        self.clock.tick();
        self.ticks += 1;
        Ok(())
    }

    /// Executes `ticks` ticks
    pub fn run_for(&mut self, ticks: u64) -> Result<(), NetworkError> {
        for _ in 0..ticks {
            self.step()?;
        }
        Ok(())
    }

    /// Steps until the configured duration has elapsed and reports
    pub fn run_to_completion(&mut self) -> Result<SimulationSummary, NetworkError> {
        let config = *self.clock.config();
        info!(
            "Running {} nodes for {} ms at {} ({} symbols per tick)",
            self.nodes.len(),
            config.duration_ms,
            config.subcarrier_spacing,
            config.tick_granularity
        );
        while !self.clock.is_complete() {
            self.step()?;
        }
        let summary = self.summary();
        info!("Simulation finished at {} after {} ticks", summary.elapsed, summary.ticks);
        Ok(summary)
    }

    /// Current report
    pub fn summary(&self) -> SimulationSummary {
        SimulationSummary {
            elapsed: self.clock.current_time(),
            ticks: self.ticks,
            nodes: self
                .nodes
                .iter()
                .map(|node| NodeSummary {
                    node_id: node.node_id(),
                    role: node.role(),
                    rlc_stats: node.rlc_statistics(),
                    traffic: node.traffic_stats(),
                })
                .collect(),
        }
    }
}

/// Runs independent networks to completion on blocking worker threads.
///
/// Results are returned in input order. Networks share nothing, so a failure
/// in one leaves the others untouched.
pub async fn run_parallel(networks: Vec<Network>) -> Vec<Result<SimulationSummary, NetworkError>> {
    let handles: Vec<_> = networks
        .into_iter()
        .map(|mut network| tokio::task::spawn_blocking(move || network.run_to_completion()))
        .collect();

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(match handle.await {
            Ok(result) => result,
            Err(e) => Err(NetworkError::Worker(e.to_string())),
        });
    }
    results
}
