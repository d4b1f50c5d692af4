//! UE node
//!
//! A [`UeNode`] is a [`Node`] with a single logical channel row holding its
//! own channels. Every SDU it generates is addressed to the serving gNB.

use std::ops::Deref;
use std::sync::Arc;

use bytes::Bytes;
use isacsim_common::{
    CarrierConfig, Lcid, LogicalChannelConfig, NodeLimits, NodeRole, Rnti, UeConfig,
};
use isacsim_hub::DistributionHub;
use isacsim_stack::{
    AppLayer, ApplicationLayer, MacEntity, Node, NodeError, NodeInfo, PassthroughPhy, PhyEntity,
    ReferenceMac, RlcEntity, RlcSdu, RlcStatsRow, SimulatedNode, TrafficModel,
};
use tracing::{debug, info};

/// Terminal node
pub struct UeNode {
    config: UeConfig,
    node: Node,
    los: bool,
}

impl std::fmt::Debug for UeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UeNode")
            .field("config", &self.config)
            .field("node", &self.node)
            .field("los", &self.los)
            .finish()
    }
}

impl UeNode {
    /// Creates a UE.
    ///
    /// Fails if the position is not finite or the RNTI is outside
    /// `1..=65519`. The UE starts out without line of sight to its gNB.
    pub fn new(
        config: UeConfig,
        limits: NodeLimits,
        app: Box<dyn ApplicationLayer>,
        mac: Box<dyn MacEntity>,
        phy: Box<dyn PhyEntity>,
    ) -> Result<Self, NodeError> {
        config.validate()?;
        limits.validate()?;

        let info = NodeInfo {
            node_id: config.node_id,
            position: config.position,
            cell_id: config.cell_id,
            role: NodeRole::Ue,
            rnti: Some(config.rnti),
            tx_power_dbm: config.tx_power_dbm,
        };
        let node = Node::new(info, 1, limits, limits.max_applications, app, mac, phy);
        info!(
            "UE {} created: RNTI {}, cell {}, position {}",
            config.node_id, config.rnti, config.cell_id, config.position
        );

        Ok(Self {
            config,
            node,
            los: false,
        })
    }

    /// Creates a UE with the reference application layer, MAC and PHY
    pub fn with_reference_stack(config: UeConfig, limits: NodeLimits) -> Result<Self, NodeError> {
        Self::new(
            config,
            limits,
            Box::new(AppLayer::new()),
            Box::new(ReferenceMac::new(NodeRole::Ue)),
            Box::new(PassthroughPhy::new(NodeRole::Ue)),
        )
    }

    /// Construction parameters
    pub fn config(&self) -> &UeConfig {
        &self.config
    }

    /// Own RNTI
    pub fn ue_rnti(&self) -> Rnti {
        self.config.rnti
    }

    /// Line-of-sight condition towards the serving gNB
    pub fn los(&self) -> bool {
        self.los
    }

    /// Sets the line-of-sight condition
    pub fn set_los(&mut self, los: bool) {
        if los != self.los {
            debug!("UE {} line of sight: {}", self.config.node_id, los);
        }
        self.los = los;
    }

    /// Validates and applies the carrier, as on the gNB
    pub fn configure_phy(&mut self, carrier: CarrierConfig) -> Result<(), NodeError> {
        self.node.configure_phy(carrier)
    }

    /// Wires MAC, PHY and hub, and registers the downlink receive path
    /// under the UE's RNTI. Returns the hub slot.
    pub fn set_phy_interface(&mut self, hub: Arc<DistributionHub>) -> Result<usize, NodeError> {
        self.node.set_phy_interface(hub)
    }

    /// Attaches an uplink application on `lcid`
    pub fn add_application(
        &mut self,
        lcid: Lcid,
        model: Box<dyn TrafficModel>,
    ) -> Result<(), NodeError> {
        self.node.add_application(self.config.rnti, lcid, model)
    }

    /// Configures one of the UE's logical channels. Returns its column.
    pub fn configure_logical_channel(
        &mut self,
        config: &LogicalChannelConfig,
    ) -> Result<usize, NodeError> {
        self.node.configure_logical_channel(self.config.rnti, config)
    }

    /// Entity serving `lcid`
    pub fn rlc_entity(&self, lcid: Lcid) -> Option<&RlcEntity> {
        self.node.rlc_entity(self.config.rnti, lcid)
    }

    /// Routes an application SDU to its entity
    pub fn enqueue_rlc_sdu(&mut self, sdu: RlcSdu) -> Result<(), NodeError> {
        self.node.enqueue_rlc_sdu(sdu)
    }

    /// Pulls uplink PDUs under `grant_size` bytes
    pub fn send_rlc_pdus(
        &mut self,
        lcid: Lcid,
        grant_size: usize,
        remaining_grant: usize,
    ) -> Result<Vec<Bytes>, NodeError> {
        self.node
            .send_rlc_pdus(self.config.rnti, lcid, grant_size, remaining_grant)
    }

    /// Pushes a downlink PDU into its entity
    pub fn receive_rlc_pdu(&mut self, lcid: Lcid, pdu: Bytes) -> Result<(), NodeError> {
        self.node.receive_rlc_pdu(self.config.rnti, lcid, pdu)
    }

    /// Counters of every active channel
    pub fn rlc_statistics(&self) -> Vec<RlcStatsRow> {
        self.node.rlc_statistics(self.config.rnti)
    }

    /// One MAC pass and one PHY pass
    pub fn run(&mut self) -> Result<(), NodeError> {
        self.node.run()
    }

    /// Advances the node's timers by `tick` symbols
    pub fn advance_timer(&mut self, tick: u32) -> Result<(), NodeError> {
        self.node.advance_timer(tick)
    }
}

impl Deref for UeNode {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl SimulatedNode for UeNode {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }
}
