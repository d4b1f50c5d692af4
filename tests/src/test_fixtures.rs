//! Test fixtures and configuration helpers
//!
//! Provides pre-configured single-cell scenarios and builds runnable
//! networks from them with the reference node stack.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use isacsim_common::{
    validate_scenario_config, ApplicationConfig, CarrierConfig, GnbConfig, HubConfig, Lcid,
    LinkDirection, LogicalChannelConfig, NodeId, NodeLimits, Position, RlcEntityType, Rnti,
    ScenarioConfig, SimulationTimeConfig, SubcarrierSpacing, UeConfig, SYMBOLS_PER_SLOT,
};
use isacsim_gnb::GnbNode;
use isacsim_hub::DistributionHub;
use isacsim_stack::{Network, PeriodicTraffic};
use isacsim_ue::UeNode;

/// Node id of the fixture gNB
pub const GNB_NODE_ID: NodeId = 1;

/// Cell served by the fixture gNB
pub const TEST_CELL_ID: u16 = 1;

/// Logical channel configured by the fixtures
pub const TEST_LCID: Lcid = 1;

/// Node id of the UE with `rnti` in fixture scenarios
pub fn ue_node_id(rnti: Rnti) -> NodeId {
    100 + NodeId::from(rnti)
}

/// Scenario in YAML form, as a user would write it
pub const SCENARIO_YAML: &str = r#"
gnb:
  node_id: 1
  position: { x: 0.0, y: 0.0, z: 25.0 }
  num_ues: 2
  cell_id: 1
ues:
  - node_id: 101
    position: { x: 150.0, y: 0.0, z: 1.5 }
    rnti: 1
    cell_id: 1
  - node_id: 102
    position: { x: 0.0, y: -80.0, z: 1.5 }
    rnti: 2
    cell_id: 1
carrier:
  duplex_mode: 0
  dl_carrier_frequency: 2.14e9
  ul_carrier_frequency: 1.95e9
  num_resource_blocks: 52
  subcarrier_spacing: 15
logical_channels:
  - entity_type: 2
    lcid: 1
applications:
  - rnti: 1
    direction: Downlink
    lcid: 1
    packet_size: 120
    interval_us: 1000
  - rnti: 2
    direction: Uplink
    lcid: 1
    packet_size: 60
    interval_us: 2000
duration_ms: 20
"#;

/// Builder for single-cell test scenarios
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    config: ScenarioConfig,
}

impl ScenarioBuilder {
    /// One gNB at the origin with `num_ues` UEs (RNTIs `1..=num_ues`) on a
    /// 52-RB TDD carrier at 15 kHz, one bidirectional UM channel, slot-level
    /// ticks and no traffic
    pub fn single_cell(num_ues: usize) -> Self {
        let ues = (1..=num_ues)
            .map(|i| {
                let rnti = Rnti::try_from(i).unwrap_or(Rnti::MAX);
                UeConfig::new(
                    ue_node_id(rnti),
                    Position::new(50.0 * i as f64, 0.0, 1.5),
                    rnti,
                    TEST_CELL_ID,
                )
            })
            .collect();

        Self {
            config: ScenarioConfig {
                gnb: GnbConfig::new(
                    GNB_NODE_ID,
                    Position::new(0.0, 0.0, 25.0),
                    num_ues,
                    TEST_CELL_ID,
                ),
                ues,
                carrier: CarrierConfig::tdd(3.5e9, 52, SubcarrierSpacing::Khz15),
                logical_channels: vec![LogicalChannelConfig::new(
                    RlcEntityType::UmBidirectional,
                    TEST_LCID,
                )],
                applications: Vec::new(),
                limits: NodeLimits::default(),
                hub: HubConfig::default(),
                tick_granularity: SYMBOLS_PER_SLOT,
                duration_ms: 20,
            },
        }
    }

    /// Replaces the carrier
    pub fn carrier(mut self, carrier: CarrierConfig) -> Self {
        self.config.carrier = carrier;
        self
    }

    /// Uses RLC entities of `entity_type` on the test channel
    pub fn entity_type(mut self, entity_type: RlcEntityType) -> Self {
        self.config.logical_channels = vec![LogicalChannelConfig::new(entity_type, TEST_LCID)];
        self
    }

    /// Symbols per tick
    pub fn tick_granularity(mut self, tick_granularity: u32) -> Self {
        self.config.tick_granularity = tick_granularity;
        self
    }

    /// Run length
    pub fn duration_ms(mut self, duration_ms: u64) -> Self {
        self.config.duration_ms = duration_ms;
        self
    }

    /// Downlink traffic from the gNB to UE `rnti` on the test channel
    pub fn downlink(self, rnti: Rnti, packet_size: usize, interval_us: u64) -> Self {
        self.application(rnti, LinkDirection::Downlink, packet_size, interval_us)
    }

    /// Uplink traffic from UE `rnti` on the test channel
    pub fn uplink(self, rnti: Rnti, packet_size: usize, interval_us: u64) -> Self {
        self.application(rnti, LinkDirection::Uplink, packet_size, interval_us)
    }

    fn application(
        mut self,
        rnti: Rnti,
        direction: LinkDirection,
        packet_size: usize,
        interval_us: u64,
    ) -> Self {
        self.config.applications.push(ApplicationConfig {
            rnti,
            direction,
            lcid: TEST_LCID,
            packet_size,
            interval_us,
        });
        self
    }

    /// Finished scenario
    pub fn build(self) -> ScenarioConfig {
        self.config
    }
}

/// Builds a runnable network from a scenario.
///
/// Every node gets the reference stack and is wired to a fresh hub. Every
/// configured logical channel is created for every UE, on both ends. Nodes
/// are stepped gNB first, then UEs in configuration order.
pub fn build_network(scenario: &ScenarioConfig) -> anyhow::Result<Network> {
    validate_scenario_config(scenario).context("invalid scenario")?;

    let hub = Arc::new(DistributionHub::new(scenario.hub));
    let time = SimulationTimeConfig::new(
        scenario.carrier.subcarrier_spacing,
        scenario.tick_granularity,
        scenario.duration_ms,
    )?;

    let mut gnb = GnbNode::with_reference_stack(scenario.gnb.clone(), scenario.limits)?;
    gnb.configure_phy(scenario.carrier.clone())?;
    gnb.set_phy_interface(Arc::clone(&hub))?;

    let mut ues = Vec::with_capacity(scenario.ues.len());
    for config in &scenario.ues {
        let mut ue = UeNode::with_reference_stack(config.clone(), scenario.limits)?;
        ue.configure_phy(scenario.carrier.clone())?;
        ue.set_phy_interface(Arc::clone(&hub))?;
        for channel in &scenario.logical_channels {
            gnb.configure_logical_channel(config.rnti, channel)?;
            ue.configure_logical_channel(channel)?;
        }
        ues.push(ue);
    }

    for app in &scenario.applications {
        let model = Box::new(PeriodicTraffic::from_config(app));
        match app.direction {
            LinkDirection::Downlink => gnb.add_application(app.rnti, app.lcid, model)?,
            LinkDirection::Uplink => {
                let ue = ues
                    .iter_mut()
                    .find(|ue| ue.ue_rnti() == app.rnti)
                    .ok_or_else(|| anyhow!("no UE with RNTI {} for uplink traffic", app.rnti))?;
                ue.add_application(app.lcid, model)?;
            }
        }
    }

    let mut network = Network::new(hub, time);
    network.add_node(Box::new(gnb));
    for ue in ues {
        network.add_node(Box::new(ue));
    }
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use isacsim_common::load_scenario_config_from_str;

    #[test]
    fn test_single_cell_builder() {
        let scenario = ScenarioBuilder::single_cell(3)
            .downlink(2, 100, 1000)
            .uplink(3, 40, 500)
            .build();
        assert_eq!(scenario.ues.len(), 3);
        assert_eq!(scenario.ues[2].rnti, 3);
        assert_eq!(scenario.ues[2].node_id, ue_node_id(3));
        assert_eq!(scenario.applications.len(), 2);
        assert!(validate_scenario_config(&scenario).is_ok());
    }

    #[test]
    fn test_build_network_wires_every_node() {
        let network = build_network(&ScenarioBuilder::single_cell(2).build()).unwrap();
        assert_eq!(network.nodes().count(), 3);
        assert_eq!(network.hub().receiver_count(), 3);
        assert_eq!(network.node(GNB_NODE_ID).unwrap().rlc_statistics().len(), 2);
        assert_eq!(network.node(ue_node_id(2)).unwrap().rlc_statistics().len(), 1);
    }

    #[test]
    fn test_yaml_scenario_builds() {
        let scenario = load_scenario_config_from_str(SCENARIO_YAML).unwrap();
        let network = build_network(&scenario).unwrap();
        assert_eq!(network.nodes().count(), 3);
    }
}
