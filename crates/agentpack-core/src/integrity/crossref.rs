//! Cross-pack reference checks
//!
//! Packs are generated independently, so every semantic link between them
//! is re-checked here:
//!
//! | source | field | target |
//! |---|---|---|
//! | 08 workflow graphs | `nodes[].module` | 07 `modules[].id` |
//! | 13 report templates | `fields[].name` / `type` | 12 `decision_event_fields` |
//! | 06 data sources | `connector` | 05 `connectors[].id` |
//! | 10 human approval | `approver_role` | 03 `roles[].name` |
//!
//! A check only runs when its source pack is present. A missing target
//! pack leaves every reference dangling.

use super::PackSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Kind of cross-reference failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossRefKind {
    /// The referenced entity does not exist in the target pack
    Dangling,
    /// The entity exists but its declared type disagrees
    TypeMismatch,
}

/// One unresolved or mismatched reference
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CrossRefIssue {
    /// Pack holding the reference
    pub pack: String,
    /// JSON pointer of the reference inside `pack`
    pub field: String,
    /// The referenced value
    pub reference: String,
    /// Dangling or mismatched
    pub kind: CrossRefKind,
    /// Explanation naming the target pack
    pub detail: String,
}

impl fmt::Display for CrossRefIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} '{}': {}", self.pack, self.field, self.reference, self.detail)
    }
}

const PROMPT_MODULES: u8 = 7;
const WORKFLOW_GRAPHS: u8 = 8;
const OBSERVABILITY: u8 = 12;
const REPORT_TEMPLATES: u8 = 13;
const CONNECTORS: u8 = 5;
const DATA_SOURCES: u8 = 6;
const RBAC_POLICY: u8 = 3;
const HUMAN_APPROVAL: u8 = 10;

/// Run every cross-reference check, issues in check-table order
pub fn check_crossrefs(packs: &PackSet<'_>) -> Vec<CrossRefIssue> {
    let mut issues = Vec::new();
    check_ids(
        packs,
        (WORKFLOW_GRAPHS, "graphs"),
        (PROMPT_MODULES, "modules", "id"),
        "module",
        &mut issues,
    );
    check_report_fields(packs, &mut issues);
    check_ids(
        packs,
        (DATA_SOURCES, "data_sources"),
        (CONNECTORS, "connectors", "id"),
        "connector",
        &mut issues,
    );
    check_ids(
        packs,
        (HUMAN_APPROVAL, "approval_gates"),
        (RBAC_POLICY, "roles", "name"),
        "approver_role",
        &mut issues,
    );
    issues
}

/// `key` values of the objects listed under `section`
fn declared(payload: Option<&Value>, section: &str, key: &str) -> BTreeSet<String> {
    payload
        .and_then(|p| p.get(section))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.get(key).and_then(Value::as_str))
        .map(str::to_string)
        .collect()
}

/// Resolve `reference_key` strings in the `source` pack against the ids
/// declared by `target`; keys are looked up on each listed item and on the
/// entries of its `nodes` list
fn check_ids(
    packs: &PackSet<'_>,
    (source, section): (u8, &str),
    (target, target_section, target_key): (u8, &str, &str),
    reference_key: &str,
    issues: &mut Vec<CrossRefIssue>,
) {
    let Some(payload) = packs.payload(source) else {
        return;
    };
    let target_payload = packs.payload(target);
    let known = declared(target_payload, target_section, target_key);
    let target_name = packs.slot_name(target);

    for (i, item) in payload
        .get(section)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .enumerate()
    {
        let mut references = Vec::new();
        if let Some(value) = item.get(reference_key).and_then(Value::as_str) {
            references.push((format!("/{section}/{i}/{reference_key}"), value));
        }
        for (j, node) in item
            .get("nodes")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .enumerate()
        {
            if let Some(value) = node.get(reference_key).and_then(Value::as_str) {
                references.push((format!("/{section}/{i}/nodes/{j}/{reference_key}"), value));
            }
        }

        for (field, value) in references {
            if known.contains(value) {
                continue;
            }
            let detail = if target_payload.is_some() {
                format!("not declared in {target_name} /{target_section}")
            } else {
                format!("target pack {target_name} is missing")
            };
            issues.push(CrossRefIssue {
                pack: packs.slot_name(source),
                field,
                reference: value.to_string(),
                kind: CrossRefKind::Dangling,
                detail,
            });
        }
    }
}

/// Report template fields must exist in the decision-event map with the
/// same primitive type
fn check_report_fields(packs: &PackSet<'_>, issues: &mut Vec<CrossRefIssue>) {
    let Some(payload) = packs.payload(REPORT_TEMPLATES) else {
        return;
    };
    let observability = packs.payload(OBSERVABILITY);
    let event_fields: BTreeMap<&str, &str> = observability
        .and_then(|p| p.get("decision_event_fields"))
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .filter_map(|(name, kind)| Some((name.as_str(), kind.as_str()?)))
        .collect();
    let target_name = packs.slot_name(OBSERVABILITY);
    let pack = packs.slot_name(REPORT_TEMPLATES);

    let templates = payload.get("templates").and_then(Value::as_array);
    for (i, template) in templates.into_iter().flatten().enumerate() {
        let fields = template.get("fields").and_then(Value::as_array);
        for (j, field) in fields.into_iter().flatten().enumerate() {
            let Some(name) = field.get("name").and_then(Value::as_str) else {
                continue;
            };
            let pointer = format!("/templates/{i}/fields/{j}");
            let declared_type = event_fields.get(name);
            let issue = match (declared_type, field.get("type").and_then(Value::as_str)) {
                (None, _) => CrossRefIssue {
                    pack: pack.clone(),
                    field: format!("{pointer}/name"),
                    reference: name.to_string(),
                    kind: CrossRefKind::Dangling,
                    detail: if observability.is_some() {
                        format!("not declared in {target_name} /decision_event_fields")
                    } else {
                        format!("target pack {target_name} is missing")
                    },
                },
                (Some(expected), actual) if Some(*expected) != actual => CrossRefIssue {
                    pack: pack.clone(),
                    field: format!("{pointer}/type"),
                    reference: name.to_string(),
                    kind: CrossRefKind::TypeMismatch,
                    detail: format!(
                        "declared {expected} in {target_name}, found {}",
                        actual.unwrap_or("no type")
                    ),
                },
                _ => continue,
            };
            issues.push(issue);
        }
    }
}
