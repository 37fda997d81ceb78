//! Canonical Mapper / Differ
//!
//! Projects a validated intake onto the canonical pack templates found in a
//! build root:
//!
//! 1. Load every catalog template (missing root or template is fatal)
//! 2. Apply the routing table in order, recording one report entry per
//!    routed field
//! 3. Deep-sort each payload and serialize it canonically
//! 4. Diff canon against mapped output per pack
//! 5. Write changed packs to the output directory unless `dry_run`
//!
//! Templates are never written. Generated packs land in
//! `<build_root>/generated` unless another directory is configured, so
//! every run starts from the same canon.
//!
//! # Examples
//!
//! ```no_run
//! use agentpack_core::intake::IntakeValidator;
//! use agentpack_core::mapper::CanonicalMapper;
//! use std::path::Path;
//!
//! let document = serde_json::from_str(&std::fs::read_to_string("intake.json")?)?;
//! let intake = IntakeValidator::new().validate(&document)?;
//! let outcome = CanonicalMapper::new().apply(&intake, Path::new("build"), true)?;
//! for entry in &outcome.mapping_report {
//!     println!("{} -> {}{}", entry.source_field, entry.target_pack, entry.target_path);
//! }
//! println!("packs go to {}", outcome.output_dir.display());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod canonical;
pub mod routing;

pub use canonical::{canonicalize, digest, to_canonical_string};
pub use routing::{merge_at, MappingAction, Route, ROUTES};

use crate::error::{PackError, Result, ResultExt};
use crate::intake::ValidatedIntake;
use crate::pack::{PackSlot, CATALOG};
use crate::telemetry::{self, global_sink, payload, SharedSink, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Directory under the build root receiving generated packs by default
pub const GENERATED_DIR: &str = "generated";

/// One routed field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingEntry {
    /// Dotted intake field, e.g. `metadata.agent_name`
    pub source_field: String,
    /// Pack the field was routed into
    pub target_pack: String,
    /// JSON pointer inside the target pack
    pub target_path: String,
    /// How the value was merged
    pub action: MappingAction,
}

/// Canon-versus-mapped diff for one pack
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Pack name without extension
    pub pack_name: String,
    /// Whether the mapped payload differs from the canon
    pub changed: bool,
    /// Unified diff of the canonical template against the canonical mapped
    /// payload; empty when nothing changed
    pub unified_diff: String,
}

/// Result of one `apply` pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    /// One entry per routed field, in routing-table order
    pub mapping_report: Vec<MappingEntry>,
    /// One entry per catalog pack, in catalog order
    pub diff_report: Vec<DiffEntry>,
    /// Generated pack files whose bytes differ from the previous output
    /// (written unless `dry_run`)
    pub changed_files: Vec<PathBuf>,
    /// Whether writing was skipped
    pub dry_run: bool,
    /// Directory holding the generated packs
    pub output_dir: PathBuf,
    /// blake3 digest of each mapped pack's canonical bytes
    pub digests: BTreeMap<String, String>,
}

struct LoadedTemplate {
    slot: &'static PackSlot,
    baseline: Value,
    mapped: Value,
}

/// Applies validated intake to canonical templates
#[derive(Debug, Clone)]
pub struct CanonicalMapper {
    sink: SharedSink,
    output_dir: Option<PathBuf>,
}

impl CanonicalMapper {
    /// Mapper reporting to the process-wide telemetry ring
    pub fn new() -> Self {
        Self::with_sink(global_sink())
    }

    /// Mapper reporting to `sink`
    pub fn with_sink(sink: SharedSink) -> Self {
        Self {
            sink,
            output_dir: None,
        }
    }

    /// Write generated packs to `dir` instead of `<build_root>/generated`
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Where generated packs for `build_root` are written
    pub fn output_dir(&self, build_root: &Path) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| build_root.join(GENERATED_DIR))
    }

    /// Map `intake` onto the templates under `build_root`
    ///
    /// # Errors
    ///
    /// - `MissingBuildRoot` if `build_root` is not a directory
    /// - `MissingTemplate` if any catalog template is absent
    /// - `Structural` for a non-object template, or an output directory
    ///   that is the build root itself
    /// - `Serialization` / `Io` for unreadable templates or failed writes
    pub fn apply(
        &self,
        intake: &ValidatedIntake,
        build_root: &Path,
        dry_run: bool,
    ) -> Result<ApplyOutcome> {
        telemetry::stage_start(self.sink.as_ref(), Stage::Apply);
        let outcome = self.run(intake, build_root, dry_run);
        match &outcome {
            Ok(result) => telemetry::stage_success(
                self.sink.as_ref(),
                Stage::Apply,
                payload([
                    ("mapped_fields", json!(result.mapping_report.len())),
                    ("changed", json!(result.changed_files.len())),
                    ("dry_run", json!(dry_run)),
                ]),
            ),
            Err(err) => telemetry::stage_failure(self.sink.as_ref(), Stage::Apply, &err.to_string()),
        }
        outcome
    }

    fn run(&self, intake: &ValidatedIntake, build_root: &Path, dry_run: bool) -> Result<ApplyOutcome> {
        if !build_root.is_dir() {
            return Err(PackError::MissingBuildRoot(build_root.to_path_buf()));
        }
        let output_dir = self.output_dir(build_root);
        if output_dir == build_root {
            return Err(PackError::Structural(format!(
                "output directory {} would overwrite the templates",
                output_dir.display()
            )));
        }

        let mut templates = CATALOG
            .iter()
            .map(|slot| load_template(build_root, slot))
            .collect::<Result<Vec<_>>>()?;

        let spec = intake.spec();
        let mut mapping_report = Vec::new();
        for route in ROUTES {
            let Some(value) = route.extract(spec)? else {
                continue;
            };
            let Some(template) = templates.iter_mut().find(|t| t.slot.ordinal == route.target) else {
                continue;
            };
            let action = merge_at(&mut template.mapped, route.target_path, value);
            debug!(field = route.source_field, pack = %template.slot.name(), ?action, "routed field");
            mapping_report.push(MappingEntry {
                source_field: route.source_field.to_string(),
                target_pack: template.slot.name(),
                target_path: route.target_path.to_string(),
                action,
            });
        }

        let mut diff_report = Vec::with_capacity(templates.len());
        let mut changed_files = Vec::new();
        let mut digests = BTreeMap::new();
        if !dry_run {
            fs::create_dir_all(&output_dir)
                .map_err(PackError::from)
                .with_context(|| format!("creating {}", output_dir.display()))?;
        }
        for template in &templates {
            let name = template.slot.name();
            let before = to_canonical_string(&template.baseline)?;
            let after = to_canonical_string(&template.mapped)?;

            let changed = before != after;
            let unified_diff = if changed {
                diffy::create_patch(&before, &after).to_string()
            } else {
                String::new()
            };
            diff_report.push(DiffEntry {
                pack_name: name.clone(),
                changed,
                unified_diff,
            });

            let path = output_dir.join(template.slot.file_name());
            if previous_output(&path)?.as_deref() != Some(after.as_str()) {
                if !dry_run {
                    fs::write(&path, &after)
                        .map_err(PackError::from)
                        .with_context(|| format!("writing {}", path.display()))?;
                }
                changed_files.push(path);
            }
            digests.insert(name, digest(&after));
        }

        info!(
            root = %build_root.display(),
            output = %output_dir.display(),
            mapped = mapping_report.len(),
            changed = changed_files.len(),
            dry_run,
            "mapping applied"
        );

        Ok(ApplyOutcome {
            mapping_report,
            diff_report,
            changed_files,
            dry_run,
            output_dir,
            digests,
        })
    }
}

impl Default for CanonicalMapper {
    fn default() -> Self {
        Self::new()
    }
}

fn load_template(build_root: &Path, slot: &'static PackSlot) -> Result<LoadedTemplate> {
    let path = build_root.join(slot.file_name());
    if !path.is_file() {
        return Err(PackError::MissingTemplate(path));
    }
    let raw = fs::read_to_string(&path)
        .map_err(PackError::from)
        .with_context(|| format!("reading {}", path.display()))?;
    let baseline: Value = serde_json::from_str(&raw)
        .map_err(PackError::from)
        .with_context(|| format!("parsing {}", path.display()))?;
    if !baseline.is_object() {
        return Err(PackError::Structural(format!(
            "template {} is not a JSON object",
            path.display()
        )));
    }
    Ok(LoadedTemplate {
        slot,
        mapped: baseline.clone(),
        baseline,
    })
}

fn previous_output(path: &Path) -> Result<Option<String>> {
    if !path.is_file() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(PackError::from)
        .with_context(|| format!("reading {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intake::IntakeValidator;
    use crate::telemetry::{EventName, NoopSink, TelemetryRing};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn seed_templates(dir: &Path) {
        for slot in CATALOG {
            let mut payload = json!({"schema_version": "1.0", "depends_on": []});
            for (section, kind) in slot.sections {
                payload[*section] = match kind {
                    crate::pack::ValueKind::List => json!([]),
                    crate::pack::ValueKind::Object => json!({}),
                    _ => json!("unset"),
                };
            }
            fs::write(dir.join(slot.file_name()), serde_json::to_string(&payload).unwrap()).unwrap();
        }
    }

    fn intake() -> ValidatedIntake {
        IntakeValidator::with_sink(Arc::new(NoopSink))
            .validate(&intake_document())
            .unwrap()
    }

    fn intake_document() -> Value {
        json!({
            "metadata": {"agent_name": "triage", "org_name": "Acme", "environment": "prod", "classification": "internal"},
            "determinism": {"temperature": 0.2, "seed": 7},
            "rbac": {"roles": [{"name": "ops", "read": ["tickets"], "write": ["tickets"]}]},
            "memory": {"mode": "none", "retention_days": 0},
            "governance": {"pii_redaction": true, "audit_logging": true, "human_approval_required": false},
            "gates": {"min_accuracy": 0.9, "min_groundedness": 0.8, "max_latency_ms": 2000},
            "prompt_modules": [{"id": "classify", "purpose": "route tickets"}]
        })
    }

    fn mapper() -> CanonicalMapper {
        CanonicalMapper::with_sink(Arc::new(NoopSink))
    }

    #[test]
    fn test_missing_build_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = mapper()
            .apply(&intake(), &dir.path().join("absent"), true)
            .unwrap_err();
        assert!(matches!(err, PackError::MissingBuildRoot(_)));
    }

    #[test]
    fn test_missing_template_is_fatal() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        fs::remove_file(dir.path().join("09_Governance_v1.json")).unwrap();
        let err = mapper().apply(&intake(), dir.path(), true).unwrap_err();
        match err {
            PackError::MissingTemplate(path) => assert!(path.ends_with("09_Governance_v1.json")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_object_template_is_structural() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        fs::write(dir.path().join("04_Memory_Policy_v1.json"), "[1, 2]").unwrap();
        let err = mapper().apply(&intake(), dir.path(), true).unwrap_err();
        assert!(matches!(err, PackError::Structural(_)));
    }

    #[test]
    fn test_report_follows_routing_table_order() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        let outcome = mapper().apply(&intake(), dir.path(), true).unwrap();

        let fields: Vec<&str> = outcome
            .mapping_report
            .iter()
            .map(|e| e.source_field.as_str())
            .collect();
        // Absent optional sections (connectors, workflows, ...) are not routed.
        assert_eq!(
            fields,
            vec![
                "metadata.agent_name",
                "metadata.org_name",
                "metadata.environment",
                "metadata.classification",
                "determinism",
                "gates",
                "rbac.roles",
                "memory",
                "prompt_modules",
                "governance",
                "gates",
                "metadata.environment",
                "gates",
            ]
        );
        assert_eq!(outcome.mapping_report[0].action, MappingAction::Insert);
        assert_eq!(outcome.mapping_report[6].action, MappingAction::ReplaceList);
        assert_eq!(outcome.mapping_report[11].action, MappingAction::Overwrite);
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        let before = fs::read_to_string(dir.path().join("14_KPI_Gates_v1.json")).unwrap();

        let outcome = mapper().apply(&intake(), dir.path(), true).unwrap();

        assert!(outcome.dry_run);
        assert!(!outcome.mapping_report.is_empty());
        assert!(outcome.diff_report.iter().any(|d| d.changed));
        assert_eq!(outcome.changed_files.len(), CATALOG.len());
        assert!(!dir.path().join(GENERATED_DIR).exists());
        let after = fs::read_to_string(dir.path().join("14_KPI_Gates_v1.json")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_templates_are_never_written() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        let canon = fs::read_to_string(dir.path().join("02_Global_Instructions_v2.json")).unwrap();

        let outcome = mapper().apply(&intake(), dir.path(), false).unwrap();

        assert_eq!(outcome.output_dir, dir.path().join(GENERATED_DIR));
        assert!(outcome
            .changed_files
            .iter()
            .all(|p| p.starts_with(&outcome.output_dir)));
        assert_eq!(
            fs::read_to_string(dir.path().join("02_Global_Instructions_v2.json")).unwrap(),
            canon
        );
        let written = fs::read_to_string(outcome.output_dir.join("02_Global_Instructions_v2.json")).unwrap();
        assert!(written.contains("\"seed\": 7"));
    }

    #[test]
    fn test_explicit_output_dir() {
        let dir = TempDir::new().unwrap();
        let out = TempDir::new().unwrap();
        seed_templates(dir.path());

        let outcome = mapper()
            .with_output_dir(out.path().join("packs"))
            .apply(&intake(), dir.path(), false)
            .unwrap();

        assert_eq!(outcome.output_dir, out.path().join("packs"));
        assert!(out.path().join("packs/01_Org_Profile_v1.json").is_file());
        assert!(!dir.path().join(GENERATED_DIR).exists());
    }

    #[test]
    fn test_output_dir_cannot_be_the_build_root() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        let err = mapper()
            .with_output_dir(dir.path())
            .apply(&intake(), dir.path(), false)
            .unwrap_err();
        assert!(matches!(err, PackError::Structural(_)));
    }

    #[test]
    fn test_dropped_fields_do_not_survive_a_later_apply() {
        let with_strict = |strict: bool| {
            let mut determinism = json!({"temperature": 0.2, "seed": 7});
            if strict {
                determinism["strict_mode"] = json!(true);
            }
            let mut document = intake_document();
            document["determinism"] = determinism;
            IntakeValidator::with_sink(Arc::new(NoopSink))
                .validate(&document)
                .unwrap()
        };

        let reused = TempDir::new().unwrap();
        seed_templates(reused.path());
        mapper().apply(&with_strict(true), reused.path(), false).unwrap();
        let second = mapper().apply(&with_strict(false), reused.path(), false).unwrap();

        let fresh = TempDir::new().unwrap();
        seed_templates(fresh.path());
        let only = mapper().apply(&with_strict(false), fresh.path(), false).unwrap();

        let generated = |root: &Path| -> Vec<String> {
            CATALOG
                .iter()
                .map(|s| fs::read_to_string(root.join(GENERATED_DIR).join(s.file_name())).unwrap())
                .collect()
        };
        assert_eq!(generated(reused.path()), generated(fresh.path()));
        assert_eq!(second.digests, only.digests);
        assert_eq!(second.diff_report, only.diff_report);
        assert!(!generated(reused.path())[1].contains("strict_mode"));
    }

    #[test]
    fn test_diff_shows_routed_values() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        let outcome = mapper().apply(&intake(), dir.path(), true).unwrap();

        let kpi = outcome
            .diff_report
            .iter()
            .find(|d| d.pack_name == "14_KPI_Gates_v1")
            .unwrap();
        assert!(kpi.changed);
        assert!(kpi.unified_diff.contains("+    \"min_accuracy\": 0.9"));

        let connectors = outcome
            .diff_report
            .iter()
            .find(|d| d.pack_name == "05_Connectors_v1")
            .unwrap();
        assert!(!connectors.changed);
        assert!(connectors.unified_diff.is_empty());
    }

    #[test]
    fn test_second_apply_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        let out = dir.path().join(GENERATED_DIR);

        let first = mapper().apply(&intake(), dir.path(), false).unwrap();
        let bytes: Vec<String> = CATALOG
            .iter()
            .map(|s| fs::read_to_string(out.join(s.file_name())).unwrap())
            .collect();

        let second = mapper().apply(&intake(), dir.path(), false).unwrap();
        let again: Vec<String> = CATALOG
            .iter()
            .map(|s| fs::read_to_string(out.join(s.file_name())).unwrap())
            .collect();

        assert_eq!(bytes, again);
        assert_eq!(first.digests, second.digests);
        assert_eq!(first.changed_files.len(), CATALOG.len());
        assert!(second.changed_files.is_empty());
        // Both runs diff against the same canon.
        assert_eq!(first.diff_report, second.diff_report);
    }

    #[test]
    fn test_emits_stage_events() {
        let dir = TempDir::new().unwrap();
        seed_templates(dir.path());
        let ring = Arc::new(TelemetryRing::with_capacity(8));
        CanonicalMapper::with_sink(ring.clone())
            .apply(&intake(), dir.path(), true)
            .unwrap();
        let events = ring.snapshot();
        assert_eq!(events[0].name, EventName::StageStart);
        assert_eq!(events[1].name, EventName::StageSuccess);
        assert_eq!(events[1].payload["mapped_fields"], json!(13));
    }
}
