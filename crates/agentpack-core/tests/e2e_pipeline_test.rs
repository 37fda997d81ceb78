//! E2E Test: intake to integrity report
//!
//! Runs the reference intake through every stage against a copy of the
//! canonical templates.

mod common;

use agentpack_core::intake::IntakeValidator;
use agentpack_core::mapper::{CanonicalMapper, MappingAction};
use agentpack_core::telemetry::{EventName, TelemetryRing};
use agentpack_core::{
    AgentpackConfig, ContractMode, PackError, Pipeline, PipelineOptions, CATALOG,
};
use common::{generated, intake, quiet, seed_build_root, snapshot_bytes};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tempfile::TempDir;

fn pipeline() -> Pipeline {
    Pipeline::from_config(&AgentpackConfig::default(), quiet())
}

#[test]
fn e2e_full_run_produces_a_clean_report() {
    let root = seed_build_root();
    let outcome = pipeline()
        .run(&intake(), root.path(), PipelineOptions::default())
        .expect("pipeline should succeed");

    assert_eq!(outcome.apply.mapping_report.len(), 19);
    assert_eq!(outcome.plan.order.len(), CATALOG.len());
    assert!(outcome.plan.is_clean());
    assert!(outcome.integrity.ok(), "{:?}", outcome.integrity.failures());
    assert!(outcome.integrity.parity.values().all(|&flag| flag));
    assert!(outcome.ok());
    assert_eq!(outcome.apply.output_dir, generated(root.path()));
}

#[test]
fn e2e_mapping_report_follows_routing_table() {
    let root = seed_build_root();
    let validated = IntakeValidator::with_sink(quiet()).validate(&intake()).unwrap();
    let outcome = CanonicalMapper::with_sink(quiet())
        .apply(&validated, root.path(), true)
        .unwrap();

    let first = &outcome.mapping_report[0];
    assert_eq!(first.source_field, "metadata.agent_name");
    assert_eq!(first.target_pack, "01_Org_Profile_v1");
    assert_eq!(first.target_path, "/agent/name");
    assert_eq!(first.action, MappingAction::Overwrite);

    let roles = outcome
        .mapping_report
        .iter()
        .find(|e| e.source_field == "rbac.roles")
        .unwrap();
    assert_eq!(roles.action, MappingAction::ReplaceList);

    let gates: Vec<&str> = outcome
        .mapping_report
        .iter()
        .filter(|e| e.source_field == "gates")
        .map(|e| e.target_pack.as_str())
        .collect();
    assert_eq!(
        gates,
        vec!["02_Global_Instructions_v2", "11_Evaluation_Suite_v1", "14_KPI_Gates_v1"]
    );
}

#[test]
fn e2e_dry_run_never_writes() {
    let root = seed_build_root();
    let before = snapshot_bytes(root.path());

    let outcome = pipeline()
        .run(
            &intake(),
            root.path(),
            PipelineOptions {
                dry_run: true,
                mode: ContractMode::Full,
            },
        )
        .unwrap();

    assert!(outcome.apply.dry_run);
    assert!(!outcome.apply.mapping_report.is_empty());
    assert!(outcome.apply.diff_report.iter().any(|d| !d.unified_diff.is_empty()));
    assert_eq!(outcome.apply.changed_files.len(), CATALOG.len());
    assert_eq!(snapshot_bytes(root.path()), before);
    assert!(!generated(root.path()).exists());
}

#[test]
fn e2e_reapply_is_byte_identical() {
    let root = seed_build_root();
    let validated = IntakeValidator::with_sink(quiet()).validate(&intake()).unwrap();
    let mapper = CanonicalMapper::with_sink(quiet());

    let canon = snapshot_bytes(root.path());
    let first = mapper.apply(&validated, root.path(), false).unwrap();
    let written = snapshot_bytes(&generated(root.path()));
    let second = mapper.apply(&validated, root.path(), false).unwrap();

    assert_eq!(snapshot_bytes(&generated(root.path())), written);
    assert_eq!(snapshot_bytes(root.path()), canon);
    assert_eq!(first.digests, second.digests);
    assert!(second.changed_files.is_empty());
    assert_eq!(first.diff_report, second.diff_report);
}

#[test]
fn e2e_later_intake_replaces_earlier_output() {
    let validator = IntakeValidator::with_sink(quiet());
    let mapper = CanonicalMapper::with_sink(quiet());

    let first = validator.validate(&intake()).unwrap();
    let mut document = intake();
    document["determinism"]
        .as_object_mut()
        .unwrap()
        .remove("strict_mode");
    document["reporting"]["decision_event_fields"]
        .as_object_mut()
        .unwrap()
        .remove("approved");
    document["reporting"]["templates"][0]["fields"]
        .as_array_mut()
        .unwrap()
        .truncate(2);
    let second = validator.validate(&document).unwrap();

    let reused = seed_build_root();
    mapper.apply(&first, reused.path(), false).unwrap();
    let replaced = mapper.apply(&second, reused.path(), false).unwrap();

    let fresh = seed_build_root();
    let only = mapper.apply(&second, fresh.path(), false).unwrap();

    assert_eq!(
        snapshot_bytes(&generated(reused.path())),
        snapshot_bytes(&generated(fresh.path()))
    );
    assert_eq!(replaced.digests, only.digests);
    assert_eq!(replaced.diff_report, only.diff_report);

    let packs = generated(reused.path());
    let instructions = common::read_pack(&packs, "02_Global_Instructions_v2");
    assert!(instructions["determinism"].get("strict_mode").is_none());
    let observability = common::read_pack(&packs, "12_Observability_v1");
    assert!(observability["decision_event_fields"].get("approved").is_none());
}

/// Rebuild every object with its keys in reverse order
fn reverse_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let reversed: Map<String, Value> = map
                .iter()
                .rev()
                .map(|(k, v)| (k.clone(), reverse_keys(v)))
                .collect();
            Value::Object(reversed)
        }
        Value::Array(items) => Value::Array(items.iter().map(reverse_keys).collect()),
        other => other.clone(),
    }
}

#[test]
fn e2e_output_is_independent_of_input_key_order() {
    let (one, two) = (seed_build_root(), seed_build_root());
    let validator = IntakeValidator::with_sink(quiet());
    let mapper = CanonicalMapper::with_sink(quiet());

    let forward = validator.validate(&intake()).unwrap();
    let backward = validator.validate(&reverse_keys(&intake())).unwrap();
    let a = mapper.apply(&forward, one.path(), false).unwrap();
    let b = mapper.apply(&backward, two.path(), false).unwrap();

    assert_eq!(
        snapshot_bytes(&generated(one.path())),
        snapshot_bytes(&generated(two.path()))
    );
    assert_eq!(a.digests, b.digests);
}

#[test]
fn e2e_invalid_intake_stops_before_mapping() {
    let root = seed_build_root();
    let before = snapshot_bytes(root.path());
    let mut document = intake();
    document["metadata"]["environment"] = json!("qa");
    document["gates"]["max_latency_ms"] = json!(0);

    let err = pipeline()
        .run(&document, root.path(), PipelineOptions::default())
        .unwrap_err();

    let PackError::Validation(failure) = &err else {
        panic!("expected validation failure, got {err}");
    };
    assert_eq!(
        failure.render(),
        "/gates/max_latency_ms: must be greater than 0\n\
         /metadata/environment: must be one of [dev, staging, prod], found 'qa'"
    );
    assert_eq!(snapshot_bytes(root.path()), before);
}

#[test]
fn e2e_missing_template_is_structural() {
    let root = seed_build_root();
    std::fs::remove_file(root.path().join("12_Observability_v1.json")).unwrap();
    let err = pipeline()
        .run(&intake(), root.path(), PipelineOptions::default())
        .unwrap_err();
    assert!(matches!(err, PackError::MissingTemplate(_)));

    let empty = TempDir::new().unwrap();
    let err = pipeline()
        .run(&intake(), &empty.path().join("nowhere"), PipelineOptions::default())
        .unwrap_err();
    assert!(matches!(err, PackError::MissingBuildRoot(_)));
}

#[test]
fn e2e_stage_events_share_one_sink() {
    let root = seed_build_root();
    let ring = Arc::new(TelemetryRing::with_capacity(64));
    Pipeline::from_config(&AgentpackConfig::default(), ring.clone())
        .run(&intake(), root.path(), PipelineOptions::default())
        .unwrap();

    let stages: Vec<(EventName, String)> = ring
        .snapshot()
        .iter()
        .map(|e| (e.name, e.payload["stage"].as_str().unwrap_or_default().to_string()))
        .collect();
    let expected: Vec<(EventName, String)> = ["validate", "apply", "resolve", "integrity"]
        .iter()
        .flat_map(|stage| {
            [
                (EventName::StageStart, stage.to_string()),
                (EventName::StageSuccess, stage.to_string()),
            ]
        })
        .collect();
    assert_eq!(stages, expected);
}
