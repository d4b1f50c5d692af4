//! Scenario configuration integration tests
//!
//! Scenarios loaded from YAML files, validated, wired and run to completion.

use std::path::PathBuf;

use integration_tests::{
    build_network, init_test_logging, ue_node_id, ScenarioBuilder, TestResult, GNB_NODE_ID,
    SCENARIO_YAML, TEST_LCID,
};
use isacsim_common::{
    load_and_validate_scenario_config, load_scenario_config_from_str, ConfigValidationError,
    DuplexMode, Error, NodeRole, SimTime,
};

fn scenario_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("isacsim-{}-{}.yaml", name, std::process::id()))
}

/// A scenario file runs for its configured duration and carries traffic in
/// both directions
#[test]
fn test_yaml_scenario_runs_to_completion() -> TestResult {
    init_test_logging();

    let path = scenario_path("fdd");
    std::fs::write(&path, SCENARIO_YAML)?;
    let scenario = load_and_validate_scenario_config(&path);
    std::fs::remove_file(&path)?;
    let scenario = scenario?;

    assert_eq!(scenario.carrier.duplex_mode, DuplexMode::Fdd);
    assert_eq!(scenario.tick_granularity, 14);

    let mut network = build_network(&scenario)?;
    let summary = network.run_to_completion()?;
    assert_eq!(summary.ticks, 20);
    assert_eq!(summary.elapsed, SimTime::from_nanos(20_000_000));
    assert_eq!(summary.nodes.len(), 3);
    assert_eq!(summary.nodes[0].role, NodeRole::Gnb);

    let ue = summary.node(ue_node_id(1)).expect("UE 1 in summary");
    let (_, _, downlink) = ue
        .traffic
        .iter()
        .find(|(rnti, lcid, _)| *rnti == 1 && *lcid == TEST_LCID)
        .expect("downlink traffic on UE 1");
    assert_eq!(downlink.rx_packets, 20);
    assert_eq!(downlink.rx_bytes, 2400);

    let gnb = summary.node(GNB_NODE_ID).expect("gNB in summary");
    let (_, _, uplink) = gnb
        .traffic
        .iter()
        .find(|(rnti, lcid, _)| *rnti == 2 && *lcid == TEST_LCID)
        .expect("uplink traffic from UE 2");
    assert!(uplink.rx_packets >= 5, "gNB received {} packets", uplink.rx_packets);
    assert_eq!(uplink.rx_bytes, 60 * uplink.rx_packets);

    // Both RLC rows of the gNB report
    assert_eq!(gnb.rlc_stats.len(), 2);
    Ok(())
}

/// A UE with an RNTI beyond the gNB's UE count is rejected
#[test]
fn test_rnti_outside_cell_rejected() {
    init_test_logging();

    let mut scenario = ScenarioBuilder::single_cell(2).build();
    scenario.ues[1].rnti = 3;

    let err = build_network(&scenario).unwrap_err();
    assert_eq!(
        err.downcast_ref::<ConfigValidationError>(),
        Some(&ConfigValidationError::InvalidRnti(3))
    );
}

/// Applications must use a configured logical channel
#[test]
fn test_application_on_unknown_channel_rejected() {
    let mut scenario = ScenarioBuilder::single_cell(1).downlink(1, 100, 1000).build();
    scenario.applications[0].lcid = 7;

    let err = build_network(&scenario).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ConfigValidationError>(),
        Some(ConfigValidationError::InvalidLogicalChannel(_))
    ));
}

/// Malformed YAML and missing files surface as distinct errors
#[test]
fn test_load_errors() {
    assert!(matches!(
        load_scenario_config_from_str("gnb: [1, 2"),
        Err(Error::YamlParse(_))
    ));
    assert!(matches!(
        load_and_validate_scenario_config(scenario_path("missing")),
        Err(Error::Io(_))
    ));
}

/// Validation runs after parsing
#[test]
fn test_invalid_file_rejected() -> TestResult {
    let path = scenario_path("granularity");
    let yaml = format!("{SCENARIO_YAML}tick_granularity: 7\n");
    std::fs::write(&path, yaml)?;
    let result = load_and_validate_scenario_config(&path);
    std::fs::remove_file(&path)?;

    assert!(matches!(
        result,
        Err(Error::Config(ConfigValidationError::InvalidTickGranularity(7)))
    ));
    Ok(())
}
