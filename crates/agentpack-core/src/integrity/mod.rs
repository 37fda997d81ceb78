//! Contract & Cross-Reference Integrity Checker
//!
//! Reads the generated pack set and folds every consistency check into one
//! [`IntegrityReport`]:
//!
//! - **contract**: per-pack field types ([`contract`])
//! - **cross-references**: links between packs resolve ([`crossref`])
//! - **parity**: linked values agree, one flag per pair ([`parity`])
//! - **completeness**: packs required by the contract mode are present and
//!   carry every required section
//!
//! None of these abort the check; they degrade the report. Only an
//! unreadable build root or pack is fatal.
//!
//! # Examples
//!
//! ```
//! use agentpack_core::config::ContractMode;
//! use agentpack_core::integrity::IntegrityChecker;
//! use std::collections::BTreeMap;
//!
//! let report = IntegrityChecker::new().check_packs(&BTreeMap::new(), ContractMode::Minimal);
//! assert!(!report.packs_complete);
//! assert_eq!(report.missing_packs.len(), 6);
//! assert!(!report.ok());
//! ```

pub mod contract;
pub mod crossref;
pub mod parity;

pub use contract::{check_contract, contract_for, ContractViolation, CONTRACTS};
pub use crossref::{check_crossrefs, CrossRefIssue, CrossRefKind};
pub use parity::{check_parity, PARITY_RULES};

use crate::config::{AgentpackConfig, ContractMode, ContractModeTable};
use crate::error::Result;
use crate::pack::{self, slot_by_name};
use crate::resolver::{discover, validate_pack};
use crate::telemetry::{self, global_sink, payload, EventName, SharedSink, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Read-only view of a pack set keyed by pack name
#[derive(Debug, Clone, Copy)]
pub struct PackSet<'a> {
    packs: &'a BTreeMap<String, Value>,
}

impl<'a> PackSet<'a> {
    /// View over `packs`
    pub fn new(packs: &'a BTreeMap<String, Value>) -> Self {
        Self { packs }
    }

    /// Payload of the pack occupying catalog slot `ordinal`
    pub fn payload(&self, ordinal: u8) -> Option<&'a Value> {
        self.packs.get(&self.slot_name(ordinal))
    }

    /// Canonical name of catalog slot `ordinal`
    pub fn slot_name(&self, ordinal: u8) -> String {
        pack::slot(ordinal)
            .map(|s| s.name())
            .unwrap_or_else(|| format!("{ordinal:02}"))
    }

    /// Whether a pack called `name` is present
    pub fn contains(&self, name: &str) -> bool {
        self.packs.contains_key(name)
    }

    /// Packs in name order
    pub fn iter(&self) -> impl Iterator<Item = (&'a String, &'a Value)> {
        self.packs.iter()
    }
}

/// The single authoritative result of an integrity pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityReport {
    /// Contract mode the report was computed under
    pub mode: ContractMode,

    /// Every present pack satisfies its field-type contract
    pub contract_ok: bool,
    /// Mistyped contract fields
    pub contract_violations: Vec<ContractViolation>,
    /// Contract fields absent per pack
    pub missing_keys: BTreeMap<String, Vec<String>>,

    /// Every cross-pack reference resolves with a matching type
    pub crossref_ok: bool,
    /// Dangling or mismatched references
    pub crossref_issues: Vec<CrossRefIssue>,

    /// Every required pack is present with all its sections
    pub packs_complete: bool,
    /// Packs required by `mode` that were not found
    pub missing_packs: Vec<String>,
    /// Required top-level sections absent per present pack
    pub missing_sections: BTreeMap<String, Vec<String>>,

    /// Every parity flag, individually
    pub parity: BTreeMap<String, bool>,
    /// All parity flags whose packs are both required under `mode` hold
    pub parity_ok: bool,
}

impl IntegrityReport {
    /// Release gate: every sub-check passed
    pub fn ok(&self) -> bool {
        self.contract_ok && self.crossref_ok && self.packs_complete && self.parity_ok
    }

    /// Names of the failing sub-checks
    pub fn failures(&self) -> Vec<String> {
        let mut failures = Vec::new();
        if !self.contract_ok {
            failures.push("contract".to_string());
        }
        if !self.crossref_ok {
            failures.push("crossref".to_string());
        }
        if !self.packs_complete {
            failures.push("completeness".to_string());
        }
        if !self.parity_ok {
            failures.push("parity".to_string());
        }
        failures
    }
}

/// Runs contract, cross-reference, parity and completeness checks
#[derive(Debug, Clone)]
pub struct IntegrityChecker {
    modes: ContractModeTable,
    sink: SharedSink,
}

impl IntegrityChecker {
    /// Checker with the built-in contract modes and the global sink
    pub fn new() -> Self {
        Self::from_config(&AgentpackConfig::default())
    }

    /// Checker using the contract modes of `config` and the global sink
    pub fn from_config(config: &AgentpackConfig) -> Self {
        Self {
            modes: config.contract_modes.clone(),
            sink: global_sink(),
        }
    }

    /// Report to `sink` instead
    pub fn with_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// Check every pack discovered under `root`
    ///
    /// # Errors
    ///
    /// `MissingBuildRoot` when `root` is absent; `Structural`, `Io` or
    /// `Serialization` when a pack cannot be read as a JSON object.
    pub fn check(&self, root: &Path, mode: ContractMode) -> Result<IntegrityReport> {
        telemetry::stage_start(self.sink.as_ref(), Stage::Integrity);
        let packs = match load_packs(root) {
            Ok(packs) => packs,
            Err(err) => {
                telemetry::stage_failure(self.sink.as_ref(), Stage::Integrity, &err.to_string());
                return Err(err);
            }
        };
        let report = self.evaluate(&packs, mode);
        info!(root = %root.display(), mode = %mode, ok = report.ok(), "integrity checked");
        self.finish(&report);
        Ok(report)
    }

    /// Check an in-memory pack set keyed by pack name
    pub fn check_packs(&self, packs: &BTreeMap<String, Value>, mode: ContractMode) -> IntegrityReport {
        telemetry::stage_start(self.sink.as_ref(), Stage::Integrity);
        let report = self.evaluate(packs, mode);
        self.finish(&report);
        report
    }

    fn evaluate(&self, packs: &BTreeMap<String, Value>, mode: ContractMode) -> IntegrityReport {
        let set = PackSet::new(packs);

        let mut contract_violations = Vec::new();
        let mut missing_keys = BTreeMap::new();
        for (name, document) in set.iter() {
            let check = check_contract(name, document);
            for violation in &check.violations {
                warn!(%violation, "contract violation");
                self.sink.emit(
                    EventName::ContractViolation,
                    payload_of_violation(violation),
                );
            }
            contract_violations.extend(check.violations);
            if !check.missing_keys.is_empty() {
                debug!(pack = %name, missing = ?check.missing_keys, "contract keys missing");
                missing_keys.insert(name.clone(), check.missing_keys);
            }
        }

        let crossref_issues = check_crossrefs(&set);
        for issue in &crossref_issues {
            warn!(%issue, "cross-reference mismatch");
            self.sink.emit(
                EventName::CrossrefMismatch,
                payload([
                    ("pack", json!(issue.pack)),
                    ("field", json!(issue.field)),
                    ("reference", json!(issue.reference)),
                    ("kind", json!(issue.kind)),
                ]),
            );
        }

        let required = self.modes.required_packs(mode);
        let missing_packs: Vec<String> = required
            .iter()
            .filter(|name| !set.contains(name))
            .cloned()
            .collect();
        let missing_sections = find_missing_sections(&set);

        let parity = check_parity(&set);
        let parity_ok = PARITY_RULES.iter().all(|(flag, (left, _), (right, _))| {
            let counts = [left, right]
                .iter()
                .all(|&&ordinal| required.contains(&set.slot_name(ordinal)));
            !counts || parity.get(*flag).copied().unwrap_or(false)
        });

        IntegrityReport {
            mode,
            contract_ok: contract_violations.is_empty() && missing_keys.is_empty(),
            contract_violations,
            missing_keys,
            crossref_ok: crossref_issues.is_empty(),
            crossref_issues,
            packs_complete: missing_packs.is_empty() && missing_sections.is_empty(),
            missing_packs,
            missing_sections,
            parity,
            parity_ok,
        }
    }

    fn finish(&self, report: &IntegrityReport) {
        if !report.ok() {
            warn!(failures = ?report.failures(), "integrity report not OK");
        }
        telemetry::stage_success(
            self.sink.as_ref(),
            Stage::Integrity,
            payload([
                ("ok", json!(report.ok())),
                ("contract_ok", json!(report.contract_ok)),
                ("crossref_ok", json!(report.crossref_ok)),
                ("packs_complete", json!(report.packs_complete)),
            ]),
        );
    }
}

impl Default for IntegrityChecker {
    fn default() -> Self {
        Self::new()
    }
}

fn payload_of_violation(violation: &ContractViolation) -> telemetry::EventPayload {
    payload([
        ("pack", json!(violation.pack)),
        ("field", json!(violation.field)),
        ("expected_type", json!(violation.expected_type)),
        ("actual_type", json!(violation.actual_type)),
    ])
}

/// Required catalog sections absent from each present pack
fn find_missing_sections(set: &PackSet<'_>) -> BTreeMap<String, Vec<String>> {
    set.iter()
        .filter_map(|(name, document)| {
            let slot = slot_by_name(name)?;
            let missing: Vec<String> = slot
                .required_sections()
                .filter(|(section, _)| document.get(section).is_none())
                .map(|(section, _)| section.to_string())
                .collect();
            (!missing.is_empty()).then(|| (name.clone(), missing))
        })
        .collect()
}

/// Payloads of every discovered pack, keyed by pack name
pub fn load_packs(root: &Path) -> Result<BTreeMap<String, Value>> {
    discover(root)?
        .into_iter()
        .map(|file| {
            let validation = validate_pack(&file.path)?;
            Ok((validation.name, validation.payload))
        })
        .collect()
}
