//! Multiple UE scenario integration tests
//!
//! Several UEs sharing one cell, and several cells sharing one hub. Each UE
//! must see only the traffic addressed to it.

use std::sync::Arc;

use integration_tests::{
    build_network, init_test_logging, node_traffic, rlc_stats, traffic, ue_node_id,
    ScenarioBuilder, GNB_NODE_ID, TEST_LCID,
};
use isacsim_common::{
    CarrierConfig, GnbConfig, LogicalChannelConfig, NodeLimits, Position, RlcEntityType,
    SimulationTimeConfig, SubcarrierSpacing, UeConfig, SYMBOLS_PER_SLOT,
};
use isacsim_gnb::GnbNode;
use isacsim_hub::DistributionHub;
use isacsim_stack::{Network, PeriodicTraffic};
use isacsim_ue::UeNode;

/// Every UE receives exactly its own downlink stream
#[test]
fn test_independent_downlink_streams() {
    init_test_logging();

    let sizes = [100usize, 150, 200];
    let mut builder = ScenarioBuilder::single_cell(sizes.len());
    for (i, &size) in sizes.iter().enumerate() {
        builder = builder.downlink(i as u16 + 1, size, 1000);
    }
    let mut network = build_network(&builder.build()).unwrap();
    network.run_for(10).unwrap();

    for (i, &size) in sizes.iter().enumerate() {
        let rnti = i as u16 + 1;
        let ue = network.node(ue_node_id(rnti)).unwrap();
        let stats = traffic(ue, rnti, TEST_LCID);
        assert_eq!(stats.rx_packets, 10, "UE {rnti}");
        assert_eq!(stats.rx_bytes, size as u64 * 10, "UE {rnti}");

        // No traffic for other RNTIs ever reaches the UE
        assert_eq!(ue.traffic_stats().len(), 1, "UE {rnti}");
    }

    let gnb = network.node(GNB_NODE_ID).unwrap();
    assert_eq!(gnb.traffic_stats().len(), sizes.len());
}

/// Two backlogged UEs on a one-RB carrier split each slot evenly
#[test]
fn test_round_robin_contention() {
    init_test_logging();

    // 12 subcarriers x 14 symbols x 2 bits = 42 bytes per slot
    let scenario = ScenarioBuilder::single_cell(2)
        .carrier(CarrierConfig::tdd(3.5e9, 1, SubcarrierSpacing::Khz15))
        .downlink(1, 100, 1000)
        .downlink(2, 100, 1000)
        .build();
    let mut network = build_network(&scenario).unwrap();
    network.run_for(10).unwrap();

    let first = rlc_stats(&network, ue_node_id(1), 1, TEST_LCID).stats;
    let second = rlc_stats(&network, ue_node_id(2), 2, TEST_LCID).stats;
    assert!(first.rx_data_bytes > 0);
    assert_eq!(first.rx_data_bytes, second.rx_data_bytes);
    // Nine scheduled slots, at most 21 MAC bytes each
    assert!(first.rx_data_bytes <= 9 * 18, "{} bytes", first.rx_data_bytes);

    // Both UEs are still backlogged: the last slot carried RLC data for
    // both, within their 18-byte shares
    let gnb = network.node(GNB_NODE_ID).unwrap();
    let tti = gnb.node().tti_bytes();
    assert!(tti.goodput > 0 && tti.goodput <= 2 * 18, "{tti:?}");

    let sent = node_traffic(&network, GNB_NODE_ID, 1, TEST_LCID);
    let received = node_traffic(&network, ue_node_id(1), 1, TEST_LCID);
    assert!(received.rx_packets < sent.tx_packets);
}

fn cell(
    hub: &Arc<DistributionHub>,
    gnb_id: u32,
    ue_id: u32,
    cell_id: u16,
    packet_size: usize,
) -> (GnbNode, UeNode) {
    let carrier = CarrierConfig::tdd(3.5e9, 52, SubcarrierSpacing::Khz15);
    let channel = LogicalChannelConfig::new(RlcEntityType::UmBidirectional, TEST_LCID);

    let mut gnb = GnbNode::with_reference_stack(
        GnbConfig::new(gnb_id, Position::new(0.0, 0.0, 25.0), 1, cell_id),
        NodeLimits::default(),
    )
    .unwrap();
    gnb.configure_phy(carrier.clone()).unwrap();
    gnb.set_phy_interface(Arc::clone(hub)).unwrap();
    gnb.configure_logical_channel(1, &channel).unwrap();
    gnb.add_application(1, TEST_LCID, Box::new(PeriodicTraffic::new(packet_size, 1000)))
        .unwrap();

    let mut ue = UeNode::with_reference_stack(
        UeConfig::new(ue_id, Position::new(120.0, 0.0, 1.5), 1, cell_id),
        NodeLimits::default(),
    )
    .unwrap();
    ue.configure_phy(carrier).unwrap();
    ue.set_phy_interface(Arc::clone(hub)).unwrap();
    ue.configure_logical_channel(&channel).unwrap();

    (gnb, ue)
}

/// Two cells on the same carrier share a hub; RNTI 1 exists in both and
/// each UE only decodes its own cell
#[test]
fn test_cells_isolated_on_shared_hub() {
    init_test_logging();

    let hub = Arc::new(DistributionHub::with_capacity(8));
    let (gnb_a, ue_a) = cell(&hub, 1, 11, 1, 100);
    let (gnb_b, ue_b) = cell(&hub, 2, 12, 2, 60);
    assert_eq!(hub.receiver_count(), 4);

    let time = SimulationTimeConfig::new(SubcarrierSpacing::Khz15, SYMBOLS_PER_SLOT, 20).unwrap();
    let mut network = Network::new(hub, time);
    network.add_node(Box::new(gnb_a));
    network.add_node(Box::new(gnb_b));
    network.add_node(Box::new(ue_a));
    network.add_node(Box::new(ue_b));
    network.run_for(10).unwrap();

    let a = node_traffic(&network, 11, 1, TEST_LCID);
    assert_eq!(a.rx_packets, 10);
    assert_eq!(a.rx_bytes, 1000);

    let b = node_traffic(&network, 12, 1, TEST_LCID);
    assert_eq!(b.rx_packets, 10);
    assert_eq!(b.rx_bytes, 600);

    // Nothing from the other cell was accepted
    assert_eq!(rlc_stats(&network, 11, 1, TEST_LCID).stats.rx_data_pdu, 10);
    assert_eq!(rlc_stats(&network, 12, 1, TEST_LCID).stats.rx_data_pdu, 10);
}
