//! Intake validation: complete, ordered, duplicate-free diagnostics

mod common;

use agentpack_core::intake::IntakeValidator;
use agentpack_core::ValidationError;
use common::{intake, quiet};
use proptest::prelude::*;
use serde_json::{json, Value};

type Corruption = (&'static str, fn(&mut Value));

/// Independent corruptions of the reference intake, each breaking exactly
/// one rule at the given path
const CORRUPTIONS: &[Corruption] = &[
    ("/metadata/environment", |d| d["metadata"]["environment"] = json!("qa")),
    ("/gates/min_accuracy", |d| d["gates"]["min_accuracy"] = json!(1.5)),
    ("/surprise", |d| d["surprise"] = json!(true)),
    ("/rbac/roles/0/read", |d| d["rbac"]["roles"][0]["read"] = json!([])),
    ("/determinism/seed", |d| d["determinism"]["seed"] = json!(-1)),
    ("/memory/retention_days", |d| d["memory"]["retention_days"] = json!(0)),
    ("/connectors/0/kind", |d| d["connectors"][0]["kind"] = json!("ftp")),
    ("/workflows/0/nodes/1/id", |d| d["workflows"][0]["nodes"][1]["id"] = json!("")),
];

fn validator() -> IntakeValidator {
    IntakeValidator::with_sink(quiet())
}

#[test]
fn test_reference_intake_is_valid() {
    assert!(validator().check(&intake()).is_empty());
}

#[test]
fn test_each_corruption_yields_one_error() {
    for (path, corrupt) in CORRUPTIONS {
        let mut document = intake();
        corrupt(&mut document);
        let errors = validator().check(&document);
        assert_eq!(errors.len(), 1, "{path}: {errors:?}");
        assert_eq!(errors[0].path, *path);
    }
}

proptest! {
    #[test]
    fn prop_n_violations_yield_n_sorted_errors(mask in prop::collection::vec(any::<bool>(), CORRUPTIONS.len())) {
        let mut document = intake();
        let mut expected: Vec<&str> = Vec::new();
        for ((path, corrupt), &apply) in CORRUPTIONS.iter().zip(&mask) {
            if apply {
                corrupt(&mut document);
                expected.push(*path);
            }
        }
        expected.sort();

        let errors = validator().check(&document);
        let paths: Vec<&str> = errors.iter().map(|e| e.path.as_str()).collect();
        prop_assert_eq!(paths, expected);

        let mut sorted: Vec<ValidationError> = errors.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(&sorted, &errors);
        prop_assert_eq!(validator().check(&document), errors);
    }
}
