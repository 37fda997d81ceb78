//! Shared helpers for integration tests

#![allow(dead_code)]

use agentpack_core::mapper::GENERATED_DIR;
use agentpack_core::telemetry::{NoopSink, SharedSink};
use agentpack_core::CATALOG;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub fn fixtures() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Fresh build root holding a copy of every canonical template
pub fn seed_build_root() -> TempDir {
    let dir = TempDir::new().expect("create temp dir");
    for slot in CATALOG {
        fs::copy(
            fixtures().join("canon").join(slot.file_name()),
            dir.path().join(slot.file_name()),
        )
        .expect("copy template");
    }
    dir
}

/// Directory where `apply` writes the packs generated for `root`
pub fn generated(root: &Path) -> PathBuf {
    root.join(GENERATED_DIR)
}

/// The reference intake document
pub fn intake() -> Value {
    let text = fs::read_to_string(fixtures().join("intake.json")).expect("read intake fixture");
    serde_json::from_str(&text).expect("parse intake fixture")
}

pub fn quiet() -> SharedSink {
    Arc::new(NoopSink)
}

pub fn read_pack(root: &Path, name: &str) -> Value {
    let text = fs::read_to_string(root.join(format!("{name}.json"))).expect("read pack");
    serde_json::from_str(&text).expect("parse pack")
}

pub fn write_pack(root: &Path, name: &str, payload: &Value) {
    fs::write(
        root.join(format!("{name}.json")),
        serde_json::to_string_pretty(payload).expect("serialize pack"),
    )
    .expect("write pack");
}

/// Read, edit and write back one pack
pub fn edit_pack(root: &Path, name: &str, edit: impl FnOnce(&mut Value)) {
    let mut payload = read_pack(root, name);
    edit(&mut payload);
    write_pack(root, name, &payload);
}

/// Bytes of every catalog pack under `root`, in catalog order
pub fn snapshot_bytes(root: &Path) -> Vec<String> {
    CATALOG
        .iter()
        .map(|slot| fs::read_to_string(root.join(slot.file_name())).expect("read pack"))
        .collect()
}
