//! Typed intake entities
//!
//! These are only ever built from a document that already passed
//! validation, so the mapper can rely on every field being well-formed.
//! Optional collections stay `Option` so "absent" (nothing to route) is
//! distinct from "empty" (route an empty list).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Deployment environment of the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Development
    Dev,
    /// Pre-production
    Staging,
    /// Production
    Prod,
}

impl Environment {
    /// Accepted spellings, in declaration order
    pub const ALLOWED: &'static [&'static str] = &["dev", "staging", "prod"];
}

/// Data classification level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// No handling restrictions
    Public,
    /// Organisation-internal
    Internal,
    /// Needs PII redaction
    Confidential,
    /// Needs PII redaction; most restricted
    Restricted,
}

impl Classification {
    /// Accepted spellings, least to most restricted
    pub const ALLOWED: &'static [&'static str] =
        &["public", "internal", "confidential", "restricted"];

    /// Levels that require PII redaction
    pub fn is_sensitive(name: &str) -> bool {
        matches!(name, "confidential" | "restricted")
    }
}

/// How long the agent keeps conversational memory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryMode {
    /// Nothing retained; retention must be 0
    None,
    /// Retained for the session only
    Session,
    /// Retained across sessions; retention must be positive
    Persistent,
}

impl MemoryMode {
    /// Accepted spellings
    pub const ALLOWED: &'static [&'static str] = &["none", "session", "persistent"];
}

/// Transport of an external connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    /// HTTP API
    Http,
    /// SQL or document database
    Database,
    /// Message queue
    Queue,
    /// Local or mounted filesystem
    Filesystem,
}

impl ConnectorKind {
    /// Accepted spellings
    pub const ALLOWED: &'static [&'static str] = &["http", "database", "queue", "filesystem"];
}

/// Primitive type of a decision-event or report field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// JSON string
    String,
    /// JSON number
    Number,
    /// JSON boolean
    Boolean,
}

impl FieldType {
    /// Accepted spellings
    pub const ALLOWED: &'static [&'static str] = &["string", "number", "boolean"];
}

/// A validated intake document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeSpec {
    /// Agent identity and handling level
    pub metadata: Metadata,
    /// Sampling settings
    pub determinism: Determinism,
    /// Access-control roles
    pub rbac: Rbac,
    /// Memory retention policy
    pub memory: MemoryPolicy,
    /// Governance switches
    pub governance: Governance,
    /// Release gating thresholds
    pub gates: Gates,
    /// External systems the agent talks to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connectors: Option<Vec<Connector>>,
    /// Datasets read through connectors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_sources: Option<Vec<DataSource>>,
    /// Actions that need a human sign-off
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval_gates: Option<Vec<ApprovalGate>>,
    /// Prompt module catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_modules: Option<Vec<PromptModule>>,
    /// Workflow graphs over prompt modules
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflows: Option<Vec<Workflow>>,
    /// Decision-event schema and report templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reporting: Option<Reporting>,
}

/// Agent identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Non-empty agent name
    pub agent_name: String,
    /// Owning organisation
    pub org_name: String,
    /// Deployment environment
    pub environment: Environment,
    /// Data classification level
    pub classification: Classification,
}

/// Sampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Determinism {
    /// In `[0, 1]`
    pub temperature: f64,
    /// RNG seed
    pub seed: u64,
    /// Strict determinism requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strict_mode: Option<bool>,
}

/// Role-based access rules
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rbac {
    /// Non-empty, names unique
    pub roles: Vec<Role>,
}

/// An access-control entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Unique role name
    pub name: String,
    /// Readable scopes; never empty
    pub read: Vec<String>,
    /// Writable scopes; may be empty
    pub write: Vec<String>,
}

/// Memory retention policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryPolicy {
    /// Retention mode
    pub mode: MemoryMode,
    /// Days kept; consistent with `mode`
    pub retention_days: u64,
}

/// An external system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connector {
    /// Unique connector id
    pub id: String,
    /// Transport
    pub kind: ConnectorKind,
    /// Granted scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// A dataset read through a connector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    /// Unique data source id
    pub id: String,
    /// Id of a declared connector
    pub connector: String,
    /// Classification of the data
    pub classification: Classification,
}

/// Governance switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Governance {
    /// Redact PII before logging or reporting
    pub pii_redaction: bool,
    /// Keep an audit log of decisions
    pub audit_logging: bool,
    /// Require at least one approval gate
    pub human_approval_required: bool,
}

/// An action that needs a human sign-off
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalGate {
    /// Gated action
    pub action: String,
    /// Name of a declared role
    pub approver_role: String,
}

/// Release gating thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gates {
    /// In `[0, 1]`
    pub min_accuracy: f64,
    /// In `[0, 1]`
    pub min_groundedness: f64,
    /// Positive
    pub max_latency_ms: u64,
}

/// One entry of the prompt module catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptModule {
    /// Unique module id
    pub id: String,
    /// Free-form description
    #[serde(default)]
    pub purpose: String,
}

/// A workflow graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    /// Unique workflow id
    pub id: String,
    /// Nodes in execution order
    pub nodes: Vec<WorkflowNode>,
}

/// A workflow step running one prompt module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Id unique within the workflow
    pub id: String,
    /// Id of a declared prompt module
    pub module: String,
}

/// Decision-event schema and report templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reporting {
    /// Field name to primitive type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_event_fields: Option<BTreeMap<String, FieldType>>,
    /// Report templates over decision-event fields
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates: Option<Vec<ReportTemplate>>,
}

/// A report layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTemplate {
    /// Template id
    pub id: String,
    /// Columns
    pub fields: Vec<ReportField>,
}

/// One report column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportField {
    /// Decision-event field shown in this column
    pub name: String,
    /// Expected primitive type
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

/// Proof that an intake document passed validation
///
/// Only [`IntakeValidator`](super::IntakeValidator) constructs this, which
/// is what lets the mapper accept it without re-checking anything.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedIntake {
    spec: IntakeSpec,
}

impl ValidatedIntake {
    pub(crate) fn new(spec: IntakeSpec) -> Self {
        Self { spec }
    }

    /// Borrow the typed document
    pub fn spec(&self) -> &IntakeSpec {
        &self.spec
    }

    /// Take the typed document
    pub fn into_spec(self) -> IntakeSpec {
        self.spec
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_report_field_type_key() {
        let field: ReportField =
            serde_json::from_value(json!({"name": "latency", "type": "number"})).unwrap();
        assert_eq!(field.field_type, FieldType::Number);
        assert_eq!(
            serde_json::to_value(&field).unwrap(),
            json!({"name": "latency", "type": "number"})
        );
    }

    #[test]
    fn test_absent_optional_sections_are_skipped() {
        let reporting = Reporting {
            decision_event_fields: None,
            templates: Some(vec![]),
        };
        assert_eq!(serde_json::to_value(&reporting).unwrap(), json!({"templates": []}));
    }

    #[test]
    fn test_enum_allowed_lists_match_serde() {
        for name in Environment::ALLOWED {
            assert!(serde_json::from_value::<Environment>(json!(name)).is_ok());
        }
        for name in Classification::ALLOWED {
            assert!(serde_json::from_value::<Classification>(json!(name)).is_ok());
        }
        for name in MemoryMode::ALLOWED {
            assert!(serde_json::from_value::<MemoryMode>(json!(name)).is_ok());
        }
        for name in ConnectorKind::ALLOWED {
            assert!(serde_json::from_value::<ConnectorKind>(json!(name)).is_ok());
        }
        for name in FieldType::ALLOWED {
            assert!(serde_json::from_value::<FieldType>(json!(name)).is_ok());
        }
    }
}
