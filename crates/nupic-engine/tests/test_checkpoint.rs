// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/// Checkpoint Tests
///
/// Saves running networks into `.nta` bundles and restores them into fresh
/// networks, checking that execution continues exactly where it stopped.
use nupic_config::EngineConfig;
use nupic_engine::{
    BundleIo, EngineError, EngineResult, Network, NetworkState, NupicRuntime, ParameterMap, ParameterValue,
    RegionContext, RegionImpl, RegionIo, RegionTypeEntry, StdPlatform, TestNode,
};
use nupic_types::Dimensions;
use std::collections::BTreeSet;
use std::sync::Arc;
use tempfile::tempdir;

fn create_test_runtime() -> Arc<NupicRuntime> {
    let runtime = Arc::new(NupicRuntime::new(EngineConfig::default(), Box::new(StdPlatform)));
    runtime.init().expect("Failed to init runtime");
    runtime
}

fn output_values(net: &Network, region: &str) -> Vec<f64> {
    net.get_region(region)
        .unwrap()
        .get_output("bottomUpOut")
        .unwrap()
        .data()
        .as_slice::<f64>()
        .unwrap()
        .to_vec()
}

/// sensor[4] --TestFanIn2--> pooler[2], pooler in phase 1
fn build_two_region_network(runtime: &Arc<NupicRuntime>) -> Network {
    let mut net = Network::new(runtime).unwrap();
    net.add_region("sensor", "TestNode", r#"{"int32Param": 11}"#).unwrap();
    net.add_region("pooler", "TestNode", "").unwrap();
    net.set_region_dimensions("sensor", Dimensions::new(vec![4])).unwrap();
    net.link("sensor", "", "pooler", "", "TestFanIn2", "").unwrap();
    net.set_phases("pooler", BTreeSet::from([1])).unwrap();
    net
}

// ============================================================================
// TEST 1: Save, load into a fresh network, continue identically
// ============================================================================

#[test]
fn test_save_load_continues_identically() {
    let runtime = create_test_runtime();
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("two_region.nta");

    let mut original = build_two_region_network(&runtime);
    original.run(3).unwrap();
    original
        .get_region_mut("pooler")
        .unwrap()
        .execute_command(&["setDelta", "0.5"])
        .unwrap();
    original.save(&bundle).unwrap();
    assert_eq!(original.state(), NetworkState::Serialized);
    assert!(bundle.join("network.json").is_file());

    let mut restored = Network::from_bundle(&runtime, &bundle).unwrap();
    assert_eq!(restored.region_count(), 2);
    assert_eq!(restored.link_count(), 1);
    assert_eq!(
        restored.get_region("pooler").unwrap().dimensions(),
        &Dimensions::new(vec![2])
    );
    assert_eq!(restored.get_phases("pooler").unwrap(), &BTreeSet::from([1]));
    assert_eq!(
        restored.get_region("sensor").unwrap().get_parameter("int32Param").unwrap(),
        ParameterValue::Int32(11)
    );

    original.run(1).unwrap();
    restored.run(1).unwrap();
    for region in ["sensor", "pooler"] {
        assert_eq!(
            output_values(&original, region),
            output_values(&restored, region),
            "region '{}' diverged after restore",
            region
        );
    }
    assert_eq!(
        restored.get_region("pooler").unwrap().get_parameter("iteration").unwrap(),
        ParameterValue::UInt64(4)
    );
}

// ============================================================================
// TEST 2: Saving over an existing bundle replaces it
// ============================================================================

#[test]
fn test_resave_replaces_bundle() {
    let runtime = create_test_runtime();
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("net.nta");

    let mut net = build_two_region_network(&runtime);
    net.run(1).unwrap();
    net.save(&bundle).unwrap();
    net.remove_link("sensor", "bottomUpOut", "pooler", "bottomUpIn").unwrap();
    net.remove_region("pooler").unwrap();
    net.run(1).unwrap();
    net.save(&bundle).unwrap();

    let restored = Network::from_bundle(&runtime, &bundle).unwrap();
    assert_eq!(restored.region_count(), 1);
    assert_eq!(restored.link_count(), 0);
}

// ============================================================================
// TEST 3: Bad bundle paths
// ============================================================================

#[test]
fn test_bad_bundle_paths() {
    let runtime = create_test_runtime();
    let dir = tempdir().unwrap();
    let mut net = build_two_region_network(&runtime);

    assert!(matches!(
        net.save(&dir.path().join("net.tar")),
        Err(EngineError::InvalidParameter(_))
    ));

    let stray = dir.path().join("stray.nta");
    std::fs::create_dir(&stray).unwrap();
    std::fs::write(stray.join("notes.txt"), "not a network").unwrap();
    assert!(matches!(net.save(&stray), Err(EngineError::BadCheckpoint(_))));
    assert!(stray.join("notes.txt").is_file());

    assert!(matches!(
        Network::from_bundle(&runtime, &dir.path().join("missing.nta")),
        Err(EngineError::BadCheckpoint(_))
    ));
}

#[test]
fn test_load_requires_empty_network() {
    let runtime = create_test_runtime();
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("net.nta");

    let mut net = build_two_region_network(&runtime);
    net.save(&bundle).unwrap();
    assert!(matches!(net.load(&bundle), Err(EngineError::InvalidState(_))));
    assert_eq!(net.region_count(), 2);
}

#[test]
fn test_corrupt_region_stream_leaves_network_empty() {
    let runtime = create_test_runtime();
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("net.nta");

    let mut net = build_two_region_network(&runtime);
    net.run(1).unwrap();
    net.save(&bundle).unwrap();
    std::fs::write(bundle.join("network.pooler.aux"), "tampered\n").unwrap();

    let mut fresh = Network::new(&runtime).unwrap();
    assert!(fresh.load(&bundle).is_err());
    assert_eq!(fresh.region_count(), 0);
    assert_eq!(fresh.link_count(), 0);
}

// ============================================================================
// TEST 4: A failed save keeps the previous bundle
// ============================================================================

/// Region whose state can never be written
struct UnwritableRegion;

impl UnwritableRegion {
    fn create(_: &ParameterMap, _: &RegionContext<'_>) -> EngineResult<Box<dyn RegionImpl>> {
        Ok(Box::new(UnwritableRegion))
    }
}

impl RegionImpl for UnwritableRegion {
    fn compute(&mut self, _io: &mut RegionIo<'_>) -> EngineResult<()> {
        Ok(())
    }

    fn serialize(&self, _bundle: &mut BundleIo) -> EngineResult<()> {
        Err(EngineError::Compute("device full".into()))
    }

    fn node_output_element_count(&self, _output: &str) -> EngineResult<usize> {
        Ok(2)
    }
}

#[test]
fn test_failed_save_keeps_previous_bundle() {
    let runtime = create_test_runtime();
    runtime
        .factory()
        .register_builtin(
            "UnwritableNode",
            RegionTypeEntry {
                create: UnwritableRegion::create,
                ..TestNode::entry()
            },
        )
        .unwrap();
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("net.nta");

    let mut net = Network::new(&runtime).unwrap();
    net.add_region("sensor", "TestNode", "").unwrap();
    net.set_region_dimensions("sensor", Dimensions::new(vec![4])).unwrap();
    net.save(&bundle).unwrap();

    net.add_region("broken", "UnwritableNode", "").unwrap();
    assert!(net.save(&bundle).is_err());

    let restored = Network::from_bundle(&runtime, &bundle).unwrap();
    assert_eq!(restored.region_count(), 1);
    assert!(restored.get_region("broken").is_err());

    // nothing but the bundle is left next to it
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries, vec![std::ffi::OsString::from("net.nta")]);

    // a first save that fails leaves nothing behind
    let fresh = dir.path().join("fresh.nta");
    assert!(net.save(&fresh).is_err());
    assert!(!fresh.exists());
}

// ============================================================================
// TEST 5: Restoring a single region into a live network
// ============================================================================

#[test]
fn test_add_region_from_bundle() {
    let runtime = create_test_runtime();
    let dir = tempdir().unwrap();
    let bundle = dir.path().join("two_region.nta");
    let label = runtime.config().network.default_checkpoint_label.clone();

    let mut original = build_two_region_network(&runtime);
    original.run(3).unwrap();
    original.save(&bundle).unwrap();

    let mut live = Network::new(&runtime).unwrap();
    live.add_region("pooler", "TestNode", "").unwrap();
    let sensor = live
        .add_region_from_bundle("sensor", "TestNode", Dimensions::new(vec![4]), &bundle, &label)
        .unwrap();
    assert_eq!(sensor.dimensions(), &Dimensions::new(vec![4]));
    assert_eq!(sensor.get_parameter("int32Param").unwrap(), ParameterValue::Int32(11));
    assert_eq!(sensor.get_parameter("iteration").unwrap(), ParameterValue::UInt64(3));
    assert_eq!(live.get_phases("sensor").unwrap(), &BTreeSet::from([0]));
    assert_eq!(live.state(), NetworkState::Unconfigured);

    live.link("sensor", "", "pooler", "", "TestFanIn2", "").unwrap();
    live.run(1).unwrap();
    assert_eq!(live.get_region("pooler").unwrap().dimensions(), &Dimensions::new(vec![2]));

    // same name twice, unknown region in the bundle, wrong label
    assert!(matches!(
        live.add_region_from_bundle("sensor", "TestNode", Dimensions::new(vec![4]), &bundle, &label),
        Err(EngineError::DuplicateName(_))
    ));
    assert!(matches!(
        live.add_region_from_bundle("ghost", "TestNode", Dimensions::new(vec![1]), &bundle, &label),
        Err(EngineError::ImplementationConstructionFailed { .. })
    ));
    assert!(live
        .add_region_from_bundle("other", "TestNode", Dimensions::new(vec![4]), &bundle, "elsewhere")
        .is_err());
    assert_eq!(live.region_count(), 2);
}
