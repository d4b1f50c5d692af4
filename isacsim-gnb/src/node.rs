//! gNB node
//!
//! A [`GnbNode`] is a [`Node`] with one logical channel row per served UE.
//! UE RNTIs are `1..=num_ues`; RNTI `r` owns row `r - 1`.

use std::ops::Deref;
use std::sync::Arc;

use bytes::Bytes;
use isacsim_common::{
    CarrierConfig, GnbConfig, Lcid, LogicalChannelConfig, NodeLimits, NodeRole, Rnti,
};
use isacsim_hub::DistributionHub;
use isacsim_stack::{
    AppLayer, ApplicationLayer, MacEntity, Node, NodeError, NodeInfo, PassthroughPhy, PhyEntity,
    ReferenceMac, RlcEntity, RlcSdu, RlcStatsRow, RoundRobinScheduler, Scheduler, SimulatedNode,
    TrafficModel,
};
use tracing::{debug, info};

/// Base station node
pub struct GnbNode {
    config: GnbConfig,
    node: Node,
    default_scheduler: bool,
    scheduler_attached: bool,
}

impl std::fmt::Debug for GnbNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GnbNode")
            .field("config", &self.config)
            .field("node", &self.node)
            .field("scheduler_attached", &self.scheduler_attached)
            .finish()
    }
}

impl GnbNode {
    /// Creates a gNB serving `config.num_ues` UEs.
    ///
    /// Fails if the UE count is outside `1..=65519` or the position is not
    /// finite. Application capacity is `max_applications` per UE.
    pub fn new(
        config: GnbConfig,
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
            role: NodeRole::Gnb,
            rnti: None,
            tx_power_dbm: config.tx_power_dbm,
        };
        let max_applications = limits.max_applications * config.num_ues;
        let node = Node::new(info, config.num_ues, limits, max_applications, app, mac, phy);
        info!(
            "gNB {} created: cell {}, {} UEs, position {}",
            config.node_id, config.cell_id, config.num_ues, config.position
        );

        Ok(Self {
            config,
            node,
            default_scheduler: false,
            scheduler_attached: false,
        })
    }

    /// Creates a gNB with the reference application layer, MAC and PHY.
    ///
    /// Unless a scheduler is attached first, a [`RoundRobinScheduler`] sized
    /// for the carrier is attached by [`GnbNode::configure_phy`].
    pub fn with_reference_stack(config: GnbConfig, limits: NodeLimits) -> Result<Self, NodeError> {
        let mut gnb = Self::new(
            config,
            limits,
            Box::new(AppLayer::new()),
            Box::new(ReferenceMac::new(NodeRole::Gnb)),
            Box::new(PassthroughPhy::new(NodeRole::Gnb)),
        )?;
        gnb.default_scheduler = true;
        Ok(gnb)
    }

    /// Construction parameters
    pub fn config(&self) -> &GnbConfig {
        &self.config
    }

    /// Number of UEs served
    pub fn num_ues(&self) -> usize {
        self.config.num_ues
    }

    /// Returns true once a scheduler is attached to the MAC
    pub fn has_scheduler(&self) -> bool {
        self.scheduler_attached
    }

    /// Validates and applies the carrier.
    ///
    /// Checks the RB count, cell id, duplex mode and numerology, and the
    /// duplex spacing on FDD, then hands cell parameters and carrier to the
    /// PHY.
    pub fn configure_phy(&mut self, carrier: CarrierConfig) -> Result<(), NodeError> {
        self.node.configure_phy(carrier)?;
        if self.default_scheduler && !self.scheduler_attached {
            if let Some(carrier) = self.node.carrier() {
                let scheduler = RoundRobinScheduler::for_carrier(carrier);
                debug!(
                    "gNB {} default scheduler: {} bytes per slot",
                    self.config.node_id,
                    scheduler.bytes_per_slot()
                );
                self.add_scheduler(Box::new(scheduler));
            }
        }
        Ok(())
    }

    /// Wires MAC, PHY and hub, and registers the uplink receive path.
    /// Returns the hub slot.
    pub fn set_phy_interface(&mut self, hub: Arc<DistributionHub>) -> Result<usize, NodeError> {
        self.node.set_phy_interface(hub)
    }

    /// Attaches a scheduling algorithm to the MAC
    pub fn add_scheduler(&mut self, scheduler: Box<dyn Scheduler>) {
        self.node.add_scheduler(scheduler);
        self.scheduler_attached = true;
    }

    /// Attaches a downlink application sending to UE `rnti` on `lcid`
    pub fn add_application(
        &mut self,
        rnti: Rnti,
        lcid: Lcid,
        model: Box<dyn TrafficModel>,
    ) -> Result<(), NodeError> {
        self.node.add_application(rnti, lcid, model)
    }

    /// Configures a logical channel towards UE `rnti`. Returns its column.
    pub fn configure_logical_channel(
        &mut self,
        rnti: Rnti,
        config: &LogicalChannelConfig,
    ) -> Result<usize, NodeError> {
        self.node.configure_logical_channel(rnti, config)
    }

    /// Entity serving `(rnti, lcid)`
    pub fn rlc_entity(&self, rnti: Rnti, lcid: Lcid) -> Option<&RlcEntity> {
        self.node.rlc_entity(rnti, lcid)
    }

    /// Routes an application SDU to the entity of its destination UE
    pub fn enqueue_rlc_sdu(&mut self, sdu: RlcSdu) -> Result<(), NodeError> {
        self.node.enqueue_rlc_sdu(sdu)
    }

    /// Pulls PDUs for UE `rnti` under `grant_size` bytes
    pub fn send_rlc_pdus(
        &mut self,
        rnti: Rnti,
        lcid: Lcid,
        grant_size: usize,
        remaining_grant: usize,
    ) -> Result<Vec<Bytes>, NodeError> {
        self.node.send_rlc_pdus(rnti, lcid, grant_size, remaining_grant)
    }

    /// Pushes a PDU received from UE `rnti` into its entity
    pub fn receive_rlc_pdu(&mut self, rnti: Rnti, lcid: Lcid, pdu: Bytes) -> Result<(), NodeError> {
        self.node.receive_rlc_pdu(rnti, lcid, pdu)
    }

    /// Counters of every active channel of UE `rnti`
    pub fn rlc_statistics(&self, rnti: Rnti) -> Vec<RlcStatsRow> {
        self.node.rlc_statistics(rnti)
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

impl Deref for GnbNode {
    type Target = Node;

    fn deref(&self) -> &Node {
        &self.node
    }
}

impl SimulatedNode for GnbNode {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use isacsim_common::config::DEFAULT_MAX_APPLICATIONS;
    use isacsim_common::{ConfigValidationError, Position, RlcEntityType, SubcarrierSpacing};
    use isacsim_stack::PeriodicTraffic;

    fn gnb_config(num_ues: usize) -> GnbConfig {
        GnbConfig::new(1, Position::new(0.0, 0.0, 25.0), num_ues, 1)
    }

    fn um(lcid: Lcid) -> LogicalChannelConfig {
        LogicalChannelConfig::new(RlcEntityType::UmBidirectional, lcid)
    }

    #[test]
    fn test_construction_validation() {
        let err = GnbNode::with_reference_stack(gnb_config(0), NodeLimits::default()).unwrap_err();
        assert_eq!(err, NodeError::Config(ConfigValidationError::InvalidUeCount(0)));

        let err =
            GnbNode::with_reference_stack(gnb_config(65520), NodeLimits::default()).unwrap_err();
        assert_eq!(err, NodeError::Config(ConfigValidationError::InvalidUeCount(65520)));

        let mut config = gnb_config(2);
        config.position = Position::new(f64::NAN, 0.0, 0.0);
        assert!(matches!(
            GnbNode::with_reference_stack(config, NodeLimits::default()),
            Err(NodeError::Config(ConfigValidationError::InvalidPosition(_)))
        ));
    }

    #[test]
    fn test_one_row_per_ue() {
        let gnb = GnbNode::with_reference_stack(gnb_config(3), NodeLimits::default()).unwrap();
        assert_eq!(gnb.num_ues(), 3);
        assert_eq!(gnb.logical_channels().num_rows(), 3);
        assert_eq!(gnb.role(), NodeRole::Gnb);
        assert_eq!(gnb.rnti(), None);
    }

    #[test]
    fn test_application_capacity_scales_with_ues() {
        let mut gnb = GnbNode::with_reference_stack(gnb_config(2), NodeLimits::default()).unwrap();
        for i in 0..2 * DEFAULT_MAX_APPLICATIONS {
            let rnti = (i % 2 + 1) as Rnti;
            gnb.add_application(rnti, 1, Box::new(PeriodicTraffic::new(10, 1000)))
                .unwrap();
        }
        assert_eq!(
            gnb.add_application(1, 1, Box::new(PeriodicTraffic::new(10, 1000))),
            Err(NodeError::TooManyApplications {
                max: 2 * DEFAULT_MAX_APPLICATIONS
            })
        );
    }

    #[test]
    fn test_logical_channels_per_ue() {
        let mut gnb = GnbNode::with_reference_stack(gnb_config(2), NodeLimits::default()).unwrap();
        assert_eq!(gnb.configure_logical_channel(2, &um(1)).unwrap(), 0);
        assert_eq!(gnb.configure_logical_channel(2, &um(2)).unwrap(), 1);
        assert_eq!(gnb.configure_logical_channel(1, &um(1)).unwrap(), 0);
        assert_eq!(gnb.rlc_entity(2, 2).unwrap().rnti(), 2);
        assert_eq!(gnb.rlc_statistics(2).len(), 2);
        assert_eq!(
            gnb.configure_logical_channel(3, &um(1)),
            Err(NodeError::UnknownPeer { rnti: 3, rows: 2 })
        );
    }

    #[test]
    fn test_default_scheduler_attached_with_carrier() {
        let mut gnb = GnbNode::with_reference_stack(gnb_config(1), NodeLimits::default()).unwrap();
        assert!(!gnb.has_scheduler());
        gnb.configure_phy(CarrierConfig::tdd(3.5e9, 52, SubcarrierSpacing::Khz30))
            .unwrap();
        assert!(gnb.has_scheduler());
        assert_eq!(gnb.symbols_per_ms(), 28);
    }

    #[test]
    fn test_invalid_carrier_rejected() {
        let mut gnb = GnbNode::with_reference_stack(gnb_config(1), NodeLimits::default()).unwrap();
        let err = gnb
            .configure_phy(CarrierConfig::tdd(3.5e9, 276, SubcarrierSpacing::Khz30))
            .unwrap_err();
        assert!(matches!(
            err,
            NodeError::Config(ConfigValidationError::InvalidResourceBlockCount(276))
        ));
        assert!(!gnb.has_scheduler());
        assert!(gnb.carrier().is_none());
    }

    #[test]
    fn test_registers_uplink_receive_path() {
        let hub = Arc::new(DistributionHub::with_capacity(4));
        let mut gnb = GnbNode::with_reference_stack(gnb_config(1), NodeLimits::default()).unwrap();
        assert_eq!(
            gnb.set_phy_interface(Arc::clone(&hub)),
            Err(NodeError::CarrierNotConfigured { node_id: 1 })
        );

        gnb.configure_phy(CarrierConfig::fdd(2.14e9, 1.95e9, 25, SubcarrierSpacing::Khz15))
            .unwrap();
        assert_eq!(gnb.set_phy_interface(Arc::clone(&hub)).unwrap(), 0);
        assert_eq!(hub.receiver_count(), 1);
        assert_eq!(gnb.hub_slot(), Some(0));
    }
}
