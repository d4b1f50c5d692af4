//! End-to-end data transfer through the hub
//!
//! Application traffic is carried gNB to UE and UE to gNB through the whole
//! stack: application layer, RLC, reference MAC, passthrough PHY and the
//! distribution hub.

use integration_tests::{
    build_network, init_test_logging, node_traffic, rlc_stats, ue_node_id, ScenarioBuilder,
    GNB_NODE_ID, TEST_LCID,
};
use isacsim_common::{CarrierConfig, RlcEntityType, SimTime, SubcarrierSpacing};

/// Downlink UM traffic reaches the UE one slot after it is generated
#[test]
fn test_downlink_um_transfer() {
    init_test_logging();

    let scenario = ScenarioBuilder::single_cell(1).downlink(1, 100, 1000).build();
    let mut network = build_network(&scenario).unwrap();
    network.run_for(10).unwrap();

    // The first application pass sends the packet due at t = 0 and the one
    // due at the end of the window; every later pass sends one
    let sent = node_traffic(&network, GNB_NODE_ID, 1, TEST_LCID);
    assert_eq!(sent.tx_packets, 11);

    // The packet of the last pass is still queued at the gNB
    let received = node_traffic(&network, ue_node_id(1), 1, TEST_LCID);
    assert_eq!(received.rx_packets, 10);
    assert_eq!(received.rx_bytes, 1000);

    let gnb_rlc = rlc_stats(&network, GNB_NODE_ID, 1, TEST_LCID);
    assert_eq!(gnb_rlc.stats.tx_data_pdu, 10);
    // One byte of UM header per complete SDU
    assert_eq!(gnb_rlc.stats.tx_data_bytes, 1010);

    let ue_rlc = rlc_stats(&network, ue_node_id(1), 1, TEST_LCID);
    assert_eq!(ue_rlc.stats.rx_data_pdu, 10);
    assert_eq!(ue_rlc.stats.rx_data_bytes_dropped, 0);
}

/// Uplink UM traffic needs a buffer status report and a grant before the
/// UE may transmit
#[test]
fn test_uplink_um_transfer() {
    init_test_logging();

    let scenario = ScenarioBuilder::single_cell(1).uplink(1, 50, 1000).build();
    let mut network = build_network(&scenario).unwrap();
    network.run_for(30).unwrap();

    let sent = node_traffic(&network, ue_node_id(1), 1, TEST_LCID);
    assert_eq!(sent.tx_packets, 31);

    let received = node_traffic(&network, GNB_NODE_ID, 1, TEST_LCID);
    assert!(
        received.rx_packets >= 25 && received.rx_packets <= 30,
        "gNB received {} packets",
        received.rx_packets
    );
    assert_eq!(received.rx_bytes, 50 * received.rx_packets);

    assert!(rlc_stats(&network, ue_node_id(1), 1, TEST_LCID).stats.tx_data_pdu > 0);
    assert!(rlc_stats(&network, GNB_NODE_ID, 1, TEST_LCID).stats.rx_data_pdu > 0);
}

/// AM in both directions: data flows and status reports are exchanged
#[test]
fn test_acknowledged_mode_both_directions() {
    init_test_logging();

    let scenario = ScenarioBuilder::single_cell(1)
        .entity_type(RlcEntityType::Am)
        .downlink(1, 200, 1000)
        .uplink(1, 80, 1000)
        .build();
    let mut network = build_network(&scenario).unwrap();
    network.run_for(40).unwrap();

    let gnb = node_traffic(&network, GNB_NODE_ID, 1, TEST_LCID);
    let ue = node_traffic(&network, ue_node_id(1), 1, TEST_LCID);

    assert_eq!(gnb.tx_packets, 41);
    assert_eq!(ue.rx_packets, 40);
    assert_eq!(ue.rx_bytes, 40 * 200);

    assert_eq!(ue.tx_packets, 41);
    assert!(gnb.rx_packets >= 30, "gNB received {} packets", gnb.rx_packets);
    assert_eq!(gnb.rx_bytes, 80 * gnb.rx_packets);

    // Polls in each direction are answered by the peer
    let gnb_rlc = rlc_stats(&network, GNB_NODE_ID, 1, TEST_LCID).stats;
    let ue_rlc = rlc_stats(&network, ue_node_id(1), 1, TEST_LCID).stats;
    assert!(ue_rlc.tx_control_pdu > 0);
    assert!(gnb_rlc.rx_control_pdu > 0);
    assert!(gnb_rlc.tx_control_pdu > 0);
    assert!(ue_rlc.rx_control_pdu > 0);
}

/// Symbol-level ticks: the MAC still runs once per slot and the application
/// layer once per millisecond
#[test]
fn test_symbol_level_downlink() {
    init_test_logging();

    let scenario = ScenarioBuilder::single_cell(1)
        .carrier(CarrierConfig::tdd(3.5e9, 52, SubcarrierSpacing::Khz30))
        .tick_granularity(1)
        .downlink(1, 100, 500)
        .build();
    let mut network = build_network(&scenario).unwrap();

    // 5 ms at 30 kHz
    network.run_for(140).unwrap();
    assert_eq!(network.clock().current_time(), SimTime::from_nanos(5_000_000));

    for node in network.nodes() {
        assert_eq!(node.node().timer_broadcasts(), 5);
        assert_eq!(node.node().app_passes(), 5);
        assert_eq!(node.current_time(), SimTime::from_nanos(5_000_000));
    }

    // Three packets in the first pass, two in each later one
    let sent = node_traffic(&network, GNB_NODE_ID, 1, TEST_LCID);
    assert_eq!(sent.tx_packets, 11);
    let received = node_traffic(&network, ue_node_id(1), 1, TEST_LCID);
    assert_eq!(received.rx_packets, 9);
}
