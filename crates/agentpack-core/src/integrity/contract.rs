//! Per-pack field-type contracts
//!
//! Keyed by canonical file name. Fields are JSON pointers so a contract
//! can reach below the top level where cross-pack checks rely on a shape.

use crate::pack::{ValueKind, PACK_EXTENSION};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Expected container type of one field
pub type FieldContract = (&'static str, ValueKind);

const HEADER: [FieldContract; 2] = [
    ("/schema_version", ValueKind::String),
    ("/depends_on", ValueKind::List),
];

/// Contract table: canonical file name to field expectations (header
/// fields are implied for every entry)
pub static CONTRACTS: &[(&str, &[FieldContract])] = &[
    (
        "01_Org_Profile_v1.json",
        &[
            ("/agent", ValueKind::Object),
            ("/agent/name", ValueKind::String),
            ("/agent/environment", ValueKind::String),
        ],
    ),
    (
        "02_Global_Instructions_v2.json",
        &[
            ("/determinism", ValueKind::Object),
            ("/gates", ValueKind::Object),
            ("/instructions", ValueKind::List),
        ],
    ),
    ("03_RBAC_Policy_v1.json", &[("/roles", ValueKind::List)]),
    ("04_Memory_Policy_v1.json", &[("/memory", ValueKind::Object)]),
    ("05_Connectors_v1.json", &[("/connectors", ValueKind::List)]),
    ("06_Data_Sources_v1.json", &[("/data_sources", ValueKind::List)]),
    ("07_Prompt_Modules_v1.json", &[("/modules", ValueKind::List)]),
    ("08_Workflow_Graphs_v1.json", &[("/graphs", ValueKind::List)]),
    ("09_Governance_v1.json", &[("/governance", ValueKind::Object)]),
    ("10_Human_Approval_v1.json", &[("/approval_gates", ValueKind::List)]),
    (
        "11_Evaluation_Suite_v1.json",
        &[("/pass_gates", ValueKind::Object), ("/suites", ValueKind::List)],
    ),
    (
        "12_Observability_v1.json",
        &[
            ("/decision_event_fields", ValueKind::Object),
            ("/environment", ValueKind::String),
        ],
    ),
    ("13_Report_Templates_v1.json", &[("/templates", ValueKind::List)]),
    (
        "14_KPI_Gates_v1.json",
        &[("/gates", ValueKind::Object), ("/kpis", ValueKind::List)],
    ),
];

/// Field expectations for a pack name, header included; `None` for packs
/// outside the table
pub fn contract_for(pack_name: &str) -> Option<Vec<FieldContract>> {
    let file_name = format!("{pack_name}.{PACK_EXTENSION}");
    CONTRACTS
        .iter()
        .find(|(name, _)| *name == file_name)
        .map(|(_, fields)| HEADER.iter().chain(fields.iter()).copied().collect())
}

/// A present field whose type breaks its contract
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContractViolation {
    /// Pack holding the field
    pub pack: String,
    /// JSON pointer of the field
    pub field: String,
    /// Kind the contract requires
    pub expected_type: ValueKind,
    /// Kind actually found
    pub actual_type: ValueKind,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}: expected {}, found {}",
            self.pack, self.field, self.expected_type, self.actual_type
        )
    }
}

/// Outcome of checking one pack against its contract
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractCheck {
    /// Present fields of the wrong kind
    pub violations: Vec<ContractViolation>,
    /// Contract fields that are absent
    pub missing_keys: Vec<String>,
}

/// Check `payload` against the contract for `pack_name`
///
/// Absent fields are reported as missing keys, not violations. A field
/// below an absent or mistyped parent counts as missing.
pub fn check_contract(pack_name: &str, payload: &Value) -> ContractCheck {
    let mut result = ContractCheck::default();
    let Some(fields) = contract_for(pack_name) else {
        return result;
    };
    for (field, expected) in fields {
        match payload.pointer(field) {
            None => result.missing_keys.push(field.to_string()),
            Some(value) if ValueKind::of(value) != expected => {
                result.violations.push(ContractViolation {
                    pack: pack_name.to_string(),
                    field: field.to_string(),
                    expected_type: expected,
                    actual_type: ValueKind::of(value),
                })
            }
            Some(_) => {}
        }
    }
    result
}
