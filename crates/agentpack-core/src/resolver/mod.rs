//! Pack Dependency Resolver
//!
//! Reads a pack set (templates or generated output) from a directory and
//! works out a build order:
//!
//! - [`discovery`]: lazy listing of canonically named pack files
//! - [`PackResolver::validate`]: required-key check per pack family
//! - [`graph`]: stable topological order; cycles become warnings
//!
//! Precedence edges come from each pack's `depends_on` header: a pack
//! listing `D` must be built after `D`.
//!
//! # Examples
//!
//! ```
//! use agentpack_core::resolver::topological_order;
//!
//! let resolution = topological_order(&["a", "b", "c"], &[("a", "b"), ("b", "c")]);
//! assert_eq!(resolution.order, vec!["a", "b", "c"]);
//! assert!(resolution.warnings.is_empty());
//! ```

pub mod discovery;
pub mod graph;

pub use discovery::{discover, DiscoveryIter, PackDiscovery, PackFile};
pub use graph::{topological_order, Resolution, ResolverWarning};

use crate::error::{PackError, Result, ResultExt};
use crate::pack::{PackDocument, PackName, ValueKind, HEADER_SECTIONS};
use crate::telemetry::{self, global_sink, payload, EventName, SharedSink, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Structural check of one pack file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackValidation {
    /// Pack name without extension
    pub name: String,
    /// File that was read
    pub path: PathBuf,
    /// Parsed payload
    pub payload: Value,
    /// Absent keys as `key`, mistyped ones as `key: expected list, found object`
    pub missing_keys: Vec<String>,
}

impl PackValidation {
    /// No missing or mistyped keys
    pub fn is_valid(&self) -> bool {
        self.missing_keys.is_empty()
    }

    /// Named payload, for reading `depends_on`
    pub fn document(&self) -> PackDocument {
        PackDocument::new(self.name.clone(), self.payload.clone())
    }
}

/// Ordered build plan for a pack set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildPlan {
    /// Packs in build order
    pub order: Vec<String>,
    /// Cycles, unknown dependencies and duplicates
    pub warnings: Vec<ResolverWarning>,
    /// Packs with missing or mistyped required keys
    pub invalid: BTreeMap<String, Vec<String>>,
}

impl BuildPlan {
    /// No warnings and every pack structurally valid
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.invalid.is_empty()
    }
}

/// Load `path` and check the required keys of its pack family
///
/// Packs outside the catalog are held to the header keys only.
///
/// # Errors
///
/// `Structural` when the file name is not canonical or the payload is not a
/// JSON object; `Io` / `Serialization` when it cannot be read or parsed.
pub fn validate_pack(path: &Path) -> Result<PackValidation> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(PackName::from_file_name)
        .ok_or_else(|| {
            PackError::Structural(format!("not a canonical pack file: {}", path.display()))
        })?;

    let raw = fs::read_to_string(path)
        .map_err(PackError::from)
        .with_context(|| format!("reading {}", path.display()))?;
    let payload: Value = serde_json::from_str(&raw)
        .map_err(PackError::from)
        .with_context(|| format!("parsing {}", path.display()))?;
    let Some(object) = payload.as_object() else {
        return Err(PackError::Structural(format!(
            "pack {name} is not a JSON object"
        )));
    };

    let required: Vec<(&str, ValueKind)> = match name.slot() {
        Some(slot) => slot.required_sections().collect(),
        None => HEADER_SECTIONS.to_vec(),
    };
    let missing_keys = required
        .into_iter()
        .filter_map(|(key, expected)| match object.get(key) {
            None => Some(key.to_string()),
            Some(value) if ValueKind::of(value) != expected => Some(format!(
                "{key}: expected {expected}, found {}",
                ValueKind::of(value)
            )),
            Some(_) => None,
        })
        .collect();

    Ok(PackValidation {
        name: name.to_string(),
        path: path.to_path_buf(),
        payload,
        missing_keys,
    })
}

/// Discovers, validates and orders packs
#[derive(Debug, Clone)]
pub struct PackResolver {
    sink: SharedSink,
}

impl PackResolver {
    /// Resolver reporting to the process-wide telemetry ring
    pub fn new() -> Self {
        Self::with_sink(global_sink())
    }

    /// Resolver reporting to `sink`
    pub fn with_sink(sink: SharedSink) -> Self {
        Self { sink }
    }

    /// Lazy listing of the pack files under `root`
    pub fn discover(&self, root: &Path) -> Result<PackDiscovery> {
        PackDiscovery::new(root)
    }

    /// Load one pack file and check its required keys
    pub fn validate(&self, path: &Path) -> Result<PackValidation> {
        validate_pack(path)
    }

    /// [`graph::topological_order`], recording a telemetry event per cycle
    pub fn topological_order<S: AsRef<str>>(&self, nodes: &[S], edges: &[(S, S)]) -> Resolution {
        let resolution = topological_order(nodes, edges);
        for warning in &resolution.warnings {
            if let ResolverWarning::Cycle { node, members } = warning {
                self.sink.emit(
                    EventName::CycleWarning,
                    payload([("node", json!(node)), ("members", json!(members))]),
                );
            }
        }
        resolution
    }

    /// Validate every discovered pack, in file-name order
    pub fn load(&self, root: &Path) -> Result<Vec<PackValidation>> {
        self.discover(root)?
            .iter()
            .map(|file| self.validate(&file?.path))
            .collect()
    }

    /// Discovery, validation and ordering in one pass
    pub fn plan(&self, root: &Path) -> Result<BuildPlan> {
        telemetry::stage_start(self.sink.as_ref(), Stage::Resolve);
        let plan = self.build_plan(root);
        match &plan {
            Ok(plan) => telemetry::stage_success(
                self.sink.as_ref(),
                Stage::Resolve,
                payload([
                    ("packs", json!(plan.order.len())),
                    ("warnings", json!(plan.warnings.len())),
                    ("invalid", json!(plan.invalid.len())),
                ]),
            ),
            Err(err) => {
                telemetry::stage_failure(self.sink.as_ref(), Stage::Resolve, &err.to_string())
            }
        }
        plan
    }

    fn build_plan(&self, root: &Path) -> Result<BuildPlan> {
        let packs = self.load(root)?;

        let mut invalid = BTreeMap::new();
        let mut nodes = Vec::with_capacity(packs.len());
        let mut edges = Vec::new();
        for pack in &packs {
            if !pack.is_valid() {
                debug!(pack = %pack.name, missing = ?pack.missing_keys, "pack failed required-key check");
                invalid.insert(pack.name.clone(), pack.missing_keys.clone());
            }
            nodes.push(pack.name.clone());
            for dependency in pack.document().depends_on() {
                edges.push((dependency, pack.name.clone()));
            }
        }

        let Resolution { order, warnings } = self.topological_order(&nodes, &edges);
        info!(
            root = %root.display(),
            packs = order.len(),
            warnings = warnings.len(),
            "build order resolved"
        );
        Ok(BuildPlan {
            order,
            warnings,
            invalid,
        })
    }
}

impl Default for PackResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{NoopSink, TelemetryRing};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, payload: Value) {
        fs::write(dir.join(name), serde_json::to_string_pretty(&payload).unwrap()).unwrap();
    }

    fn resolver() -> PackResolver {
        PackResolver::with_sink(Arc::new(NoopSink))
    }

    #[test]
    fn test_valid_pack_has_no_missing_keys() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "08_Workflow_Graphs_v1.json",
            json!({"schema_version": "1.0", "depends_on": [], "graphs": []}),
        );
        let validation = validate_pack(&dir.path().join("08_Workflow_Graphs_v1.json")).unwrap();
        assert!(validation.is_valid());
        assert_eq!(validation.name, "08_Workflow_Graphs_v1");
    }

    #[test]
    fn test_missing_and_mistyped_keys() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "14_KPI_Gates_v1.json",
            json!({"schema_version": "1.0", "gates": [], "kpis": []}),
        );
        let validation = validate_pack(&dir.path().join("14_KPI_Gates_v1.json")).unwrap();
        assert_eq!(
            validation.missing_keys,
            vec!["depends_on", "gates: expected object, found list"]
        );
    }

    #[test]
    fn test_unknown_slot_checks_header_only() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "15_Custom_Extension_v1.json",
            json!({"schema_version": "1.0", "depends_on": []}),
        );
        let validation = validate_pack(&dir.path().join("15_Custom_Extension_v1.json")).unwrap();
        assert!(validation.is_valid());
    }

    #[test]
    fn test_non_object_payload_is_structural() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("03_RBAC_Policy_v1.json"), "[]").unwrap();
        let err = validate_pack(&dir.path().join("03_RBAC_Policy_v1.json")).unwrap_err();
        assert!(matches!(err, PackError::Structural(_)));
    }

    #[test]
    fn test_plan_orders_by_depends_on() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "01_Org_Profile_v1.json",
            json!({"schema_version": "1.0", "depends_on": ["07_Prompt_Modules_v1"], "agent": {}}),
        );
        write(
            dir.path(),
            "07_Prompt_Modules_v1.json",
            json!({"schema_version": "1.0", "depends_on": [], "modules": []}),
        );
        write(
            dir.path(),
            "08_Workflow_Graphs_v1.json",
            json!({"schema_version": "1.0", "depends_on": ["07_Prompt_Modules_v1", "99_Ghost_v1"]}),
        );

        let plan = resolver().plan(dir.path()).unwrap();
        assert_eq!(
            plan.order,
            vec!["07_Prompt_Modules_v1", "01_Org_Profile_v1", "08_Workflow_Graphs_v1"]
        );
        assert_eq!(
            plan.warnings,
            vec![ResolverWarning::UnknownNode {
                from: "99_Ghost_v1".into(),
                to: "08_Workflow_Graphs_v1".into(),
                missing: "99_Ghost_v1".into(),
            }]
        );
        assert_eq!(plan.invalid["08_Workflow_Graphs_v1"], vec!["graphs"]);
        assert!(!plan.is_clean());
    }

    #[test]
    fn test_cycle_is_reported_through_telemetry() {
        let dir = TempDir::new().unwrap();
        write(
            dir.path(),
            "01_Org_Profile_v1.json",
            json!({"schema_version": "1.0", "depends_on": ["02_Global_Instructions_v2"], "agent": {}}),
        );
        write(
            dir.path(),
            "02_Global_Instructions_v2.json",
            json!({"schema_version": "1.0", "depends_on": ["01_Org_Profile_v1"],
                   "determinism": {}, "gates": {}, "instructions": []}),
        );

        let ring = Arc::new(TelemetryRing::with_capacity(16));
        let plan = PackResolver::with_sink(ring.clone()).plan(dir.path()).unwrap();

        assert_eq!(plan.order.len(), 2);
        assert_eq!(plan.warnings.len(), 1);
        let names: Vec<EventName> = ring.snapshot().iter().map(|e| e.name).collect();
        assert_eq!(
            names,
            vec![EventName::StageStart, EventName::CycleWarning, EventName::StageSuccess]
        );
    }

    #[test]
    fn test_plan_on_missing_root_fails() {
        let dir = TempDir::new().unwrap();
        let err = resolver().plan(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, PackError::MissingBuildRoot(_)));
    }
}
