//! Hub registration integration tests
//!
//! Receiver slots, hub capacity and the errors raised when nodes are wired
//! incompletely.

use std::sync::Arc;

use integration_tests::{init_test_logging, TestResult};
use isacsim_common::{
    CarrierConfig, GnbConfig, NodeLimits, Position, SimulationTimeConfig, SubcarrierSpacing,
    UeConfig, SYMBOLS_PER_SLOT,
};
use isacsim_gnb::GnbNode;
use isacsim_hub::{DistributionHub, HubError};
use isacsim_stack::{Network, NetworkError, NodeError};
use isacsim_ue::UeNode;

fn carrier() -> CarrierConfig {
    CarrierConfig::fdd(2.14e9, 1.95e9, 52, SubcarrierSpacing::Khz15)
}

fn gnb(node_id: u32) -> GnbNode {
    let config = GnbConfig::new(node_id, Position::new(0.0, 0.0, 25.0), 4, 1);
    let mut gnb = GnbNode::with_reference_stack(config, NodeLimits::default()).unwrap();
    gnb.configure_phy(carrier()).unwrap();
    gnb
}

fn ue(node_id: u32, rnti: u16) -> UeNode {
    let config = UeConfig::new(node_id, Position::new(80.0, 0.0, 1.5), rnti, 1);
    let mut ue = UeNode::with_reference_stack(config, NodeLimits::default()).unwrap();
    ue.configure_phy(carrier()).unwrap();
    ue
}

/// The hub rejects registrations beyond its capacity
#[test]
fn test_capacity_exceeded() -> TestResult {
    init_test_logging();

    let hub = Arc::new(DistributionHub::with_capacity(2));
    let mut gnb = gnb(1);
    let mut first = ue(11, 1);
    let mut second = ue(12, 2);

    assert_eq!(gnb.set_phy_interface(Arc::clone(&hub))?, 0);
    assert_eq!(first.set_phy_interface(Arc::clone(&hub))?, 1);
    assert_eq!(
        second.set_phy_interface(Arc::clone(&hub)),
        Err(NodeError::Hub(HubError::CapacityExceeded { max: 2 }))
    );
    assert_eq!(hub.receiver_count(), 2);
    assert_eq!(second.hub_slot(), None);
    Ok(())
}

/// Wiring a node twice keeps its slot
#[test]
fn test_rewiring_keeps_slot() -> TestResult {
    init_test_logging();

    let hub = Arc::new(DistributionHub::with_capacity(4));
    let mut gnb = gnb(1);
    let mut ue = ue(11, 1);

    assert_eq!(gnb.set_phy_interface(Arc::clone(&hub))?, 0);
    assert_eq!(ue.set_phy_interface(Arc::clone(&hub))?, 1);
    assert_eq!(ue.set_phy_interface(Arc::clone(&hub))?, 1);
    assert_eq!(hub.receiver_count(), 2);
    assert_eq!(ue.hub_slot(), Some(1));
    Ok(())
}

/// A freed slot is reused by the next registration
#[test]
fn test_unregistered_slot_reused() -> TestResult {
    init_test_logging();

    let hub = Arc::new(DistributionHub::with_capacity(3));
    let mut gnb = gnb(1);
    let mut first = ue(11, 1);
    let mut second = ue(12, 2);
    let mut third = ue(13, 3);

    gnb.set_phy_interface(Arc::clone(&hub))?;
    let slot = first.set_phy_interface(Arc::clone(&hub))?;
    second.set_phy_interface(Arc::clone(&hub))?;

    let removed = hub.unregister(slot).expect("slot was registered");
    assert_eq!(removed.rnti, Some(1));
    assert_eq!(hub.receiver_count(), 2);

    assert_eq!(third.set_phy_interface(Arc::clone(&hub))?, slot);
    assert_eq!(hub.receiver_count(), 3);
    Ok(())
}

/// A node that was never wired stops the network and is named in the error
#[test]
fn test_unwired_node_fails_step() {
    init_test_logging();

    let hub = Arc::new(DistributionHub::with_capacity(4));
    let time = SimulationTimeConfig::new(SubcarrierSpacing::Khz15, SYMBOLS_PER_SLOT, 10).unwrap();

    let mut wired = gnb(1);
    wired.set_phy_interface(Arc::clone(&hub)).unwrap();

    let mut network = Network::new(hub, time);
    network.add_node(Box::new(wired));
    network.add_node(Box::new(ue(11, 1)));

    match network.step() {
        Err(NetworkError::Node { node_id, source }) => {
            assert_eq!(node_id, 11);
            assert_eq!(source, NodeError::PhyInterfaceNotSet { node_id: 11 });
        }
        other => panic!("expected node error, got {other:?}"),
    }
}

/// Wiring before the carrier is known is refused
#[test]
fn test_wiring_requires_carrier() {
    init_test_logging();

    let hub = Arc::new(DistributionHub::with_capacity(4));
    let config = UeConfig::new(11, Position::new(80.0, 0.0, 1.5), 1, 1);
    let mut ue = UeNode::with_reference_stack(config, NodeLimits::default()).unwrap();

    assert_eq!(
        ue.set_phy_interface(hub.clone()),
        Err(NodeError::CarrierNotConfigured { node_id: 11 })
    );
    assert_eq!(hub.receiver_count(), 0);
}
