//! Telemetry event vocabulary

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Small flat payload attached to an event
pub type EventPayload = BTreeMap<String, Value>;

/// Build a payload from literal key/value pairs
pub fn payload<const N: usize>(entries: [(&str, Value); N]) -> EventPayload {
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Fixed event-name vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventName {
    /// A pipeline stage began
    StageStart,

    /// A pipeline stage finished without aborting
    StageSuccess,

    /// A pipeline stage aborted with a fatal error
    StageFailure,

    /// Intake validation rejected the document
    ValidationError,

    /// The dependency resolver broke a cycle
    CycleWarning,

    /// A pack failed its field-type contract
    ContractViolation,

    /// A cross-pack reference dangled or mismatched
    CrossrefMismatch,
}

impl EventName {
    /// Wire name of the event
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StageStart => "stage_start",
            Self::StageSuccess => "stage_success",
            Self::StageFailure => "stage_failure",
            Self::ValidationError => "validation_error",
            Self::CycleWarning => "cycle_warning",
            Self::ContractViolation => "contract_violation",
            Self::CrossrefMismatch => "crossref_mismatch",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline stage named in stage events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Intake validation
    Validate,
    /// Mapping and writing
    Apply,
    /// Discovery and build ordering
    Resolve,
    /// Integrity checking
    Integrity,
}

impl Stage {
    /// Name carried in the `stage` payload key
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Apply => "apply",
            Self::Resolve => "resolve",
            Self::Integrity => "integrity",
        }
    }
}

/// A recorded telemetry event
///
/// `ordinal` is the zero-based emission sequence number within the ring
/// that recorded it, assigned under the ring lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Event kind
    pub name: EventName,
    /// Small flat payload
    pub payload: EventPayload,
    /// Emission sequence number
    pub ordinal: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_name_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(EventName::CycleWarning).unwrap(),
            json!("cycle_warning")
        );
        assert_eq!(EventName::CrossrefMismatch.to_string(), "crossref_mismatch");
    }

    #[test]
    fn test_payload_builder() {
        let p = payload([("stage", json!("apply")), ("packs", json!(14))]);
        assert_eq!(p.len(), 2);
        assert_eq!(p["stage"], json!("apply"));
    }
}
