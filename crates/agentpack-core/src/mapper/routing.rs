//! Field routing table and merge semantics
//!
//! The table is fixed and ordered; mapping reports follow its order. Each
//! route extracts one intake field and writes it at a JSON pointer inside a
//! target pack. Fields absent from the intake are not routed.

use crate::intake::IntakeSpec;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

type Extract = fn(&IntakeSpec) -> serde_json::Result<Option<Value>>;

/// One entry of the routing table
#[derive(Debug, Clone, Copy)]
pub struct Route {
    /// Dotted intake field name used in reports
    pub source_field: &'static str,
    /// Ordinal of the target catalog slot
    pub target: u8,
    /// JSON pointer inside the target payload
    pub target_path: &'static str,
    extract: Extract,
}

impl Route {
    /// The routed value, `None` when the intake omits the field
    pub fn extract(&self, spec: &IntakeSpec) -> serde_json::Result<Option<Value>> {
        (self.extract)(spec)
    }
}

fn some<T: Serialize>(value: &T) -> serde_json::Result<Option<Value>> {
    serde_json::to_value(value).map(Some)
}

fn opt<T: Serialize>(value: Option<&T>) -> serde_json::Result<Option<Value>> {
    value.map(serde_json::to_value).transpose()
}

/// The routing table, in report order
pub static ROUTES: &[Route] = &[
    Route {
        source_field: "metadata.agent_name",
        target: 1,
        target_path: "/agent/name",
        extract: |s| some(&s.metadata.agent_name),
    },
    Route {
        source_field: "metadata.org_name",
        target: 1,
        target_path: "/agent/org",
        extract: |s| some(&s.metadata.org_name),
    },
    Route {
        source_field: "metadata.environment",
        target: 1,
        target_path: "/agent/environment",
        extract: |s| some(&s.metadata.environment),
    },
    Route {
        source_field: "metadata.classification",
        target: 1,
        target_path: "/agent/classification",
        extract: |s| some(&s.metadata.classification),
    },
    Route {
        source_field: "determinism",
        target: 2,
        target_path: "/determinism",
        extract: |s| some(&s.determinism),
    },
    Route {
        source_field: "gates",
        target: 2,
        target_path: "/gates",
        extract: |s| some(&s.gates),
    },
    Route {
        source_field: "rbac.roles",
        target: 3,
        target_path: "/roles",
        extract: |s| some(&s.rbac.roles),
    },
    Route {
        source_field: "memory",
        target: 4,
        target_path: "/memory",
        extract: |s| some(&s.memory),
    },
    Route {
        source_field: "connectors",
        target: 5,
        target_path: "/connectors",
        extract: |s| opt(s.connectors.as_ref()),
    },
    Route {
        source_field: "data_sources",
        target: 6,
        target_path: "/data_sources",
        extract: |s| opt(s.data_sources.as_ref()),
    },
    Route {
        source_field: "prompt_modules",
        target: 7,
        target_path: "/modules",
        extract: |s| opt(s.prompt_modules.as_ref()),
    },
    Route {
        source_field: "workflows",
        target: 8,
        target_path: "/graphs",
        extract: |s| opt(s.workflows.as_ref()),
    },
    Route {
        source_field: "governance",
        target: 9,
        target_path: "/governance",
        extract: |s| some(&s.governance),
    },
    Route {
        source_field: "approval_gates",
        target: 10,
        target_path: "/approval_gates",
        extract: |s| opt(s.approval_gates.as_ref()),
    },
    Route {
        source_field: "gates",
        target: 11,
        target_path: "/pass_gates",
        extract: |s| some(&s.gates),
    },
    Route {
        source_field: "metadata.environment",
        target: 12,
        target_path: "/environment",
        extract: |s| some(&s.metadata.environment),
    },
    Route {
        source_field: "reporting.decision_event_fields",
        target: 12,
        target_path: "/decision_event_fields",
        extract: |s| opt(s.reporting.as_ref().and_then(|r| r.decision_event_fields.as_ref())),
    },
    Route {
        source_field: "reporting.templates",
        target: 13,
        target_path: "/templates",
        extract: |s| opt(s.reporting.as_ref().and_then(|r| r.templates.as_ref())),
    },
    Route {
        source_field: "gates",
        target: 14,
        target_path: "/gates",
        extract: |s| some(&s.gates),
    },
];

/// How a routed value landed in its pack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MappingAction {
    /// The target path did not exist in the baseline
    Insert,
    /// A scalar replaced a previous value
    Overwrite,
    /// A list replaced the previous value wholesale
    ReplaceList,
    /// An object merged recursively into an existing object
    MergeObject,
}

impl MappingAction {
    /// Name shown in mapping reports
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Overwrite => "overwrite",
            Self::ReplaceList => "replace_list",
            Self::MergeObject => "merge_object",
        }
    }
}

impl fmt::Display for MappingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Write `value` at `pointer` inside `payload`, creating intermediate objects
///
/// Lists replace wholesale and never append; objects merge recursively
/// with the same rules; scalars overwrite.
pub fn merge_at(payload: &mut Value, pointer: &str, value: Value) -> MappingAction {
    let segments: Vec<String> = pointer
        .split('/')
        .skip(1)
        .map(|s| s.replace("~1", "/").replace("~0", "~"))
        .collect();

    let mut cursor = payload;
    for segment in &segments[..segments.len().saturating_sub(1)] {
        cursor = object_mut(cursor)
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
    }

    let Some(leaf) = segments.last() else {
        deep_merge(cursor, value);
        return MappingAction::MergeObject;
    };

    let target = object_mut(cursor);
    match target.get_mut(leaf) {
        None => {
            target.insert(leaf.clone(), value);
            MappingAction::Insert
        }
        Some(existing) => {
            let action = match (&*existing, &value) {
                (_, Value::Array(_)) => MappingAction::ReplaceList,
                (Value::Object(_), Value::Object(_)) => MappingAction::MergeObject,
                _ => MappingAction::Overwrite,
            };
            deep_merge(existing, value);
            action
        }
    }
}

/// Coerce `value` into an object, replacing any non-object
fn object_mut(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}

fn deep_merge(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match existing.get_mut(&key) {
                    Some(slot) if slot.is_object() && value.is_object() => deep_merge(slot, value),
                    _ => {
                        existing.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack;
    use serde_json::json;

    #[test]
    fn test_every_route_targets_a_catalog_slot() {
        for route in ROUTES {
            assert!(pack::slot(route.target).is_some(), "{}", route.source_field);
            assert!(route.target_path.starts_with('/'));
        }
    }

    #[test]
    fn test_routes_are_grouped_by_ascending_slot() {
        let targets: Vec<u8> = ROUTES.iter().map(|r| r.target).collect();
        let mut sorted = targets.clone();
        sorted.sort();
        assert_eq!(targets, sorted);
    }

    #[test]
    fn test_insert_creates_intermediate_objects() {
        let mut payload = json!({"schema_version": "1"});
        let action = merge_at(&mut payload, "/agent/name", json!("triage"));
        assert_eq!(action, MappingAction::Insert);
        assert_eq!(payload["agent"]["name"], json!("triage"));
    }

    #[test]
    fn test_scalar_overwrites() {
        let mut payload = json!({"environment": "dev"});
        let action = merge_at(&mut payload, "/environment", json!("prod"));
        assert_eq!(action, MappingAction::Overwrite);
        assert_eq!(payload["environment"], json!("prod"));
    }

    #[test]
    fn test_lists_replace_instead_of_append() {
        let mut payload = json!({"roles": [{"name": "default"}]});
        let action = merge_at(&mut payload, "/roles", json!([{"name": "analyst"}]));
        assert_eq!(action, MappingAction::ReplaceList);
        assert_eq!(payload["roles"], json!([{"name": "analyst"}]));

        // Applying twice is idempotent.
        merge_at(&mut payload, "/roles", json!([{"name": "analyst"}]));
        assert_eq!(payload["roles"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_objects_merge_recursively() {
        let mut payload = json!({"gates": {"min_accuracy": 0.5, "notes": "baseline", "nested": {"a": [1, 2], "b": 1}}});
        let action = merge_at(
            &mut payload,
            "/gates",
            json!({"min_accuracy": 0.9, "nested": {"a": [3]}}),
        );
        assert_eq!(action, MappingAction::MergeObject);
        assert_eq!(action.to_string(), "merge_object");
        assert_eq!(
            payload["gates"],
            json!({"min_accuracy": 0.9, "notes": "baseline", "nested": {"a": [3], "b": 1}})
        );
    }

    #[test]
    fn test_non_object_intermediate_is_replaced() {
        let mut payload = json!({"agent": "legacy"});
        merge_at(&mut payload, "/agent/name", json!("x"));
        assert_eq!(payload["agent"], json!({"name": "x"}));
    }
}
