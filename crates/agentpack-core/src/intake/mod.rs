//! Intake - validation of submitted agent specifications
//!
//! Raw intake arrives as a loosely typed JSON tree. [`IntakeValidator`]
//! checks it once at the boundary, reporting every violation, and converts
//! it into [`ValidatedIntake`]. Downstream stages only ever see the typed
//! form.
//!
//! # Examples
//!
//! ```
//! use agentpack_core::intake::IntakeValidator;
//! use serde_json::json;
//!
//! let validator = IntakeValidator::new();
//! let errors = validator.check(&json!({"metadata": {}}));
//! assert!(errors.iter().any(|e| e.path == "/metadata/agent_name"));
//! assert!(errors.iter().any(|e| e.path == "/gates"));
//! ```

pub mod model;
pub mod validator;

pub use model::{
    ApprovalGate, Classification, Connector, ConnectorKind, DataSource, Determinism, Environment,
    FieldType, Gates, Governance, IntakeSpec, MemoryMode, MemoryPolicy, Metadata, PromptModule,
    Rbac, ReportField, ReportTemplate, Reporting, Role, ValidatedIntake, Workflow, WorkflowNode,
};
pub use validator::IntakeValidator;
