//! Parallel runner integration tests
//!
//! Independent networks run to completion side by side; results come back in
//! submission order and a failing network does not disturb the others.

use std::sync::Arc;

use integration_tests::{build_network, init_test_logging, ue_node_id, ScenarioBuilder, TEST_LCID};
use isacsim_common::{
    GnbConfig, NodeLimits, Position, SimulationTimeConfig, SubcarrierSpacing, SYMBOLS_PER_SLOT,
};
use isacsim_gnb::GnbNode;
use isacsim_hub::DistributionHub;
use isacsim_stack::{run_parallel, Network, NetworkError, NodeError};

fn loaded_cell(num_ues: usize) -> Network {
    let mut builder = ScenarioBuilder::single_cell(num_ues).duration_ms(10);
    for rnti in 1..=num_ues as u16 {
        builder = builder.downlink(rnti, 100, 1000).uplink(rnti, 40, 1000);
    }
    build_network(&builder.build()).unwrap()
}

/// A gNB without a carrier or hub fails on its first step
fn broken_network() -> Network {
    let hub = Arc::new(DistributionHub::with_capacity(4));
    let time = SimulationTimeConfig::new(SubcarrierSpacing::Khz15, SYMBOLS_PER_SLOT, 10).unwrap();
    let gnb = GnbNode::with_reference_stack(
        GnbConfig::new(42, Position::new(0.0, 0.0, 25.0), 1, 3),
        NodeLimits::default(),
    )
    .unwrap();

    let mut network = Network::new(hub, time);
    network.add_node(Box::new(gnb));
    network
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_parallel_networks_complete_in_order() {
    init_test_logging();

    let sizes = [1usize, 2, 4];
    let mut networks: Vec<Network> = sizes.iter().map(|&n| loaded_cell(n)).collect();
    networks.insert(1, broken_network());

    let results = run_parallel(networks).await;
    assert_eq!(results.len(), 4);

    match &results[1] {
        Err(NetworkError::Node { node_id, source }) => {
            assert_eq!(*node_id, 42);
            assert_eq!(*source, NodeError::PhyInterfaceNotSet { node_id: 42 });
        }
        other => panic!("expected node error, got {other:?}"),
    }

    let summaries: Vec<_> = [&results[0], &results[2], &results[3]]
        .into_iter()
        .map(|result| result.as_ref().expect("network completes"))
        .collect();
    for (summary, &num_ues) in summaries.iter().zip(&sizes) {
        assert_eq!(summary.ticks, 10);
        assert_eq!(summary.nodes.len(), num_ues + 1);

        // Every UE got the same downlink service regardless of the cell size
        for rnti in 1..=num_ues as u16 {
            let ue = summary.node(ue_node_id(rnti)).expect("UE in summary");
            let (_, _, stats) = ue
                .traffic
                .iter()
                .find(|(r, l, _)| *r == rnti && *l == TEST_LCID)
                .expect("UE traffic");
            assert_eq!(stats.rx_packets, 10, "{num_ues} UEs, RNTI {rnti}");
            assert_eq!(stats.tx_packets, 11, "{num_ues} UEs, RNTI {rnti}");
        }
    }
}

#[tokio::test]
async fn test_parallel_empty_input() {
    assert!(run_parallel(Vec::new()).await.is_empty());
}
