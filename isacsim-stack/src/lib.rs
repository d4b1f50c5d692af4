//! Layered node kernel for isacsim
//!
//! This crate provides the pieces every simulated node is built from:
//!
//! - [`rlc`]: RLC entities in acknowledged and unacknowledged mode
//! - [`table`]: the per-peer logical channel table holding them
//! - [`layer`]: contracts for the application, MAC, PHY and scheduler
//!   collaborators a node is assembled from
//! - [`node`]: the [`Node`] kernel that routes data between layers and
//!   sequences them in simulated time
//! - [`app`], [`mac`], [`phy`], [`scheduler`]: reference collaborators that
//!   let a network run end to end
//! - [`network`]: the tick loop driving a set of nodes, and the parallel
//!   scenario runner

pub mod app;
pub mod error;
pub mod layer;
pub mod mac;
pub mod network;
pub mod node;
pub mod phy;
pub mod rlc;
pub mod scheduler;
pub mod table;

pub use app::{AppLayer, PeriodicTraffic, TrafficStats};
pub use error::{LayerError, NetworkError, NodeError, RlcError};
pub use layer::{
    ApplicationLayer, BufferStatus, BufferStatusUpdate, CellConfig, ChannelMeasurement,
    ControlInfo, Grant, LogicalChannelInfo, MacEntity, NodeInfo, PhyEntity, PhyIndication,
    PhyRequest, RlcInterface, RlcSdu, RxIndication, Scheduler, TrafficModel, TtiBytes, UeDemand,
};
pub use mac::ReferenceMac;
pub use network::{run_parallel, Network, NodeSummary, SimulatedNode, SimulationSummary};
pub use node::{Node, APP_WINDOW_US};
pub use phy::PassthroughPhy;
pub use rlc::{RlcEntity, RlcStatistics, RlcStatsRow};
pub use scheduler::RoundRobinScheduler;
pub use table::LogicalChannelTable;
