//! Intake Validator - complete multi-error validation of raw intake
//!
//! Every rule runs regardless of earlier failures; the result is the full,
//! sorted, deduplicated set of violations. Objects are closed: any key not
//! in the contract is reported. Cross-field rules only fire when the fields
//! they relate were themselves well-formed, so one mistake yields one error.

use super::model::{
    Classification, ConnectorKind, Environment, FieldType, IntakeSpec, MemoryMode,
    ValidatedIntake,
};
use crate::error::{PackError, Result, ValidationError, ValidationFailure};
use crate::pack::ValueKind;
use crate::telemetry::{self, global_sink, payload, EventName, SharedSink, Stage};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

const REQUIRED_SECTIONS: &[&str] = &[
    "metadata",
    "determinism",
    "rbac",
    "memory",
    "governance",
    "gates",
];

const OPTIONAL_LISTS: &[&str] = &[
    "connectors",
    "data_sources",
    "approval_gates",
    "prompt_modules",
    "workflows",
];

const OPTIONAL_OBJECTS: &[&str] = &["reporting"];

/// Validates raw intake documents against the closed intake contract
#[derive(Debug, Clone)]
pub struct IntakeValidator {
    sink: SharedSink,
}

impl IntakeValidator {
    /// Validator reporting to the process-wide telemetry ring
    pub fn new() -> Self {
        Self::with_sink(global_sink())
    }

    /// Validator reporting to `sink`
    pub fn with_sink(sink: SharedSink) -> Self {
        Self { sink }
    }

    /// All violations in `document`, sorted by `(path, message)`
    ///
    /// Pure: emits no telemetry. An empty result means the document is valid.
    pub fn check(&self, document: &Value) -> Vec<ValidationError> {
        let mut checks = Checks::default();
        checks.document(document);
        ValidationFailure::new(checks.errors).errors().to_vec()
    }

    /// Validate and convert into the typed intake
    ///
    /// # Errors
    ///
    /// `PackError::Validation` carrying every violation when the document
    /// breaks the contract.
    pub fn validate(&self, document: &Value) -> Result<ValidatedIntake> {
        telemetry::stage_start(self.sink.as_ref(), Stage::Validate);

        let errors = self.check(document);
        if let Some(first) = errors.first() {
            warn!(errors = errors.len(), first = %first, "intake validation failed");
            self.sink.emit(
                EventName::ValidationError,
                payload([
                    ("errors", json!(errors.len())),
                    ("first_path", json!(first.path)),
                ]),
            );
            telemetry::stage_failure(self.sink.as_ref(), Stage::Validate, "validation_failure");
            return Err(ValidationFailure::new(errors).into());
        }

        let spec: IntakeSpec = serde_json::from_value(document.clone()).map_err(|e| {
            telemetry::stage_failure(self.sink.as_ref(), Stage::Validate, "conversion");
            PackError::Structural(format!("validated intake did not convert: {e}"))
        })?;

        info!(agent = %spec.metadata.agent_name, "intake validated");
        telemetry::stage_success(
            self.sink.as_ref(),
            Stage::Validate,
            payload([("agent", json!(spec.metadata.agent_name))]),
        );
        Ok(ValidatedIntake::new(spec))
    }
}

impl Default for IntakeValidator {
    fn default() -> Self {
        Self::new()
    }
}

/// JSON pointer of `key` under `path`
fn child(path: &str, key: &str) -> String {
    format!("{}/{}", path, key.replace('~', "~0").replace('/', "~1"))
}

fn at(path: &str, index: usize) -> String {
    format!("{path}/{index}")
}

fn found(value: &Value) -> ValueKind {
    ValueKind::of(value)
}

#[derive(Debug, Default)]
struct Checks {
    errors: Vec<ValidationError>,
}

impl Checks {
    fn fail(&mut self, path: &str, message: impl Into<String>) {
        self.errors.push(ValidationError::new(path, message));
    }

    // --- document ----------------------------------------------------------

    fn document(&mut self, document: &Value) {
        let Some(root) = document.as_object() else {
            self.fail("/", format!("expected object, found {}", found(document)));
            return;
        };

        for key in root.keys() {
            let known = REQUIRED_SECTIONS.contains(&key.as_str())
                || OPTIONAL_LISTS.contains(&key.as_str())
                || OPTIONAL_OBJECTS.contains(&key.as_str());
            if !known {
                self.fail(&child("", key), "unknown top-level key");
            }
        }

        let classification = self
            .section(root, "metadata")
            .and_then(|m| self.metadata(m, "/metadata"));
        if let Some(d) = self.section(root, "determinism") {
            self.determinism(d, "/determinism");
        }
        let roles = self.section(root, "rbac").and_then(|r| self.rbac(r, "/rbac"));
        if let Some(m) = self.section(root, "memory") {
            self.memory(m, "/memory");
        }
        let approval_required = self
            .section(root, "governance")
            .and_then(|g| self.governance(g, "/governance", classification));
        if let Some(g) = self.section(root, "gates") {
            self.gates(g, "/gates");
        }

        let connectors = match self.optional_list(root, "connectors") {
            Listed::Absent => Some(BTreeSet::new()),
            Listed::Malformed => None,
            Listed::Present(items) => Some(self.connectors(items, "/connectors")),
        };
        if let Listed::Present(items) = self.optional_list(root, "data_sources") {
            self.data_sources(items, "/data_sources", connectors.as_ref());
        }
        let gate_count = match self.optional_list(root, "approval_gates") {
            Listed::Absent => Some(0),
            Listed::Malformed => None,
            Listed::Present(items) => Some(self.approval_gates(items, "/approval_gates", roles.as_ref())),
        };
        if approval_required == Some(true) && gate_count == Some(0) {
            self.fail(
                "/approval_gates",
                "must declare at least one gate when governance.human_approval_required is true",
            );
        }
        let modules = match self.optional_list(root, "prompt_modules") {
            Listed::Absent => Some(BTreeSet::new()),
            Listed::Malformed => None,
            Listed::Present(items) => Some(self.prompt_modules(items, "/prompt_modules")),
        };
        if let Listed::Present(items) = self.optional_list(root, "workflows") {
            self.workflows(items, "/workflows", modules.as_ref());
        }
        if let Some(value) = root.get("reporting") {
            if let Some(r) = self.expect_object(value, "/reporting") {
                self.reporting(r, "/reporting");
            }
        }
    }

    // --- sections ----------------------------------------------------------

    /// Returns the classification name when it is valid
    fn metadata<'a>(&mut self, m: &'a Map<String, Value>, path: &str) -> Option<&'a str> {
        self.closed(
            m,
            path,
            &["agent_name", "org_name", "environment", "classification"],
        );
        self.name(m, path, "agent_name");
        self.string(m, path, "org_name");
        self.one_of(m, path, "environment", Environment::ALLOWED);
        self.one_of(m, path, "classification", Classification::ALLOWED)
    }

    fn determinism(&mut self, d: &Map<String, Value>, path: &str) {
        self.closed(d, path, &["temperature", "seed", "strict_mode"]);
        self.unit_interval(d, path, "temperature");
        self.count(d, path, "seed");
        if d.contains_key("strict_mode") {
            self.boolean(d, path, "strict_mode");
        }
    }

    /// Returns declared role names when the role list itself is well-formed
    fn rbac(&mut self, r: &Map<String, Value>, path: &str) -> Option<BTreeSet<String>> {
        self.closed(r, path, &["roles"]);
        let roles = self.list(r, path, "roles")?;
        let roles_path = child(path, "roles");
        if roles.is_empty() {
            self.fail(&roles_path, "must declare at least one role");
        }

        let mut names = BTreeSet::new();
        for (item_path, role) in self.objects(roles, &roles_path) {
            self.closed(role, &item_path, &["name", "read", "write"]);
            if let Some(name) = self.name(role, &item_path, "name") {
                if !names.insert(name.to_string()) {
                    self.fail(&child(&item_path, "name"), format!("duplicate role name '{name}'"));
                }
            }
            self.string_list(role, &item_path, "read", true);
            self.string_list(role, &item_path, "write", false);
        }
        Some(names)
    }

    fn memory(&mut self, m: &Map<String, Value>, path: &str) {
        self.closed(m, path, &["mode", "retention_days"]);
        let mode = self.one_of(m, path, "mode", MemoryMode::ALLOWED);
        let retention = self.count(m, path, "retention_days");

        match (mode, retention) {
            (Some("none"), Some(days)) if days != 0 => self.fail(
                &child(path, "retention_days"),
                "must be 0 when mode is none",
            ),
            (Some("persistent"), Some(0)) => self.fail(
                &child(path, "retention_days"),
                "must be greater than 0 when mode is persistent",
            ),
            _ => {}
        }
    }

    /// Returns `human_approval_required` when it is a boolean
    fn governance(
        &mut self,
        g: &Map<String, Value>,
        path: &str,
        classification: Option<&str>,
    ) -> Option<bool> {
        self.closed(
            g,
            path,
            &["pii_redaction", "audit_logging", "human_approval_required"],
        );
        let pii = self.boolean(g, path, "pii_redaction");
        self.boolean(g, path, "audit_logging");
        let approval = self.boolean(g, path, "human_approval_required");

        if let (Some(level), Some(false)) = (classification, pii) {
            if Classification::is_sensitive(level) {
                self.fail(
                    &child(path, "pii_redaction"),
                    format!("must be true when classification is {level}"),
                );
            }
        }
        approval
    }

    fn gates(&mut self, g: &Map<String, Value>, path: &str) {
        self.closed(g, path, &["min_accuracy", "min_groundedness", "max_latency_ms"]);
        self.unit_interval(g, path, "min_accuracy");
        self.unit_interval(g, path, "min_groundedness");
        if let Some(0) = self.count(g, path, "max_latency_ms") {
            self.fail(&child(path, "max_latency_ms"), "must be greater than 0");
        }
    }

    fn connectors(&mut self, items: &[Value], path: &str) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        for (item_path, connector) in self.objects(items, path) {
            self.closed(connector, &item_path, &["id", "kind", "scopes"]);
            self.unique_id(connector, &item_path, &mut ids);
            self.one_of(connector, &item_path, "kind", ConnectorKind::ALLOWED);
            if connector.contains_key("scopes") {
                self.string_list(connector, &item_path, "scopes", false);
            }
        }
        ids
    }

    fn data_sources(&mut self, items: &[Value], path: &str, connectors: Option<&BTreeSet<String>>) {
        let mut ids = BTreeSet::new();
        for (item_path, source) in self.objects(items, path) {
            self.closed(source, &item_path, &["id", "connector", "classification"]);
            self.unique_id(source, &item_path, &mut ids);
            if let (Some(name), Some(known)) = (self.name(source, &item_path, "connector"), connectors) {
                if !known.contains(name) {
                    self.fail(
                        &child(&item_path, "connector"),
                        format!("references unknown connector '{name}'"),
                    );
                }
            }
            self.one_of(source, &item_path, "classification", Classification::ALLOWED);
        }
    }

    fn approval_gates(
        &mut self,
        items: &[Value],
        path: &str,
        roles: Option<&BTreeSet<String>>,
    ) -> usize {
        for (item_path, gate) in self.objects(items, path) {
            self.closed(gate, &item_path, &["action", "approver_role"]);
            self.name(gate, &item_path, "action");
            if let (Some(role), Some(known)) = (self.name(gate, &item_path, "approver_role"), roles) {
                if !known.contains(role) {
                    self.fail(
                        &child(&item_path, "approver_role"),
                        format!("references unknown role '{role}'"),
                    );
                }
            }
        }
        items.len()
    }

    fn prompt_modules(&mut self, items: &[Value], path: &str) -> BTreeSet<String> {
        let mut ids = BTreeSet::new();
        for (item_path, module) in self.objects(items, path) {
            self.closed(module, &item_path, &["id", "purpose"]);
            self.unique_id(module, &item_path, &mut ids);
            if module.contains_key("purpose") {
                self.string(module, &item_path, "purpose");
            }
        }
        ids
    }

    fn workflows(&mut self, items: &[Value], path: &str, modules: Option<&BTreeSet<String>>) {
        let mut ids = BTreeSet::new();
        for (item_path, workflow) in self.objects(items, path) {
            self.closed(workflow, &item_path, &["id", "nodes"]);
            self.unique_id(workflow, &item_path, &mut ids);
            let Some(nodes) = self.list(workflow, &item_path, "nodes") else {
                continue;
            };
            let mut node_ids = BTreeSet::new();
            for (node_path, node) in self.objects(nodes, &child(&item_path, "nodes")) {
                self.closed(node, &node_path, &["id", "module"]);
                self.unique_id(node, &node_path, &mut node_ids);
                if let (Some(module), Some(known)) = (self.name(node, &node_path, "module"), modules) {
                    if !known.contains(module) {
                        self.fail(
                            &child(&node_path, "module"),
                            format!("references unknown prompt module '{module}'"),
                        );
                    }
                }
            }
        }
    }

    fn reporting(&mut self, r: &Map<String, Value>, path: &str) {
        self.closed(r, path, &["decision_event_fields", "templates"]);

        if let Some(value) = r.get("decision_event_fields") {
            let fields_path = child(path, "decision_event_fields");
            if let Some(fields) = self.expect_object(value, &fields_path) {
                for (name, kind) in fields {
                    self.one_of_value(kind, &child(&fields_path, name), FieldType::ALLOWED);
                }
            }
        }

        if r.contains_key("templates") {
            let Some(templates) = self.list(r, path, "templates") else {
                return;
            };
            let mut ids = BTreeSet::new();
            for (item_path, template) in self.objects(templates, &child(path, "templates")) {
                self.closed(template, &item_path, &["id", "fields"]);
                self.unique_id(template, &item_path, &mut ids);
                let Some(fields) = self.list(template, &item_path, "fields") else {
                    continue;
                };
                for (field_path, field) in self.objects(fields, &child(&item_path, "fields")) {
                    self.closed(field, &field_path, &["name", "type"]);
                    self.name(field, &field_path, "name");
                    self.one_of(field, &field_path, "type", FieldType::ALLOWED);
                }
            }
        }
    }

    // --- structural helpers -------------------------------------------------

    fn section<'a>(&mut self, root: &'a Map<String, Value>, key: &str) -> Option<&'a Map<String, Value>> {
        let path = child("", key);
        match root.get(key) {
            None => {
                self.fail(&path, "required section is missing");
                None
            }
            Some(value) => self.expect_object(value, &path),
        }
    }

    fn optional_list<'a>(&mut self, root: &'a Map<String, Value>, key: &str) -> Listed<'a> {
        match root.get(key) {
            None => Listed::Absent,
            Some(Value::Array(items)) => Listed::Present(items),
            Some(other) => {
                self.fail(&child("", key), format!("expected list, found {}", found(other)));
                Listed::Malformed
            }
        }
    }

    fn expect_object<'a>(&mut self, value: &'a Value, path: &str) -> Option<&'a Map<String, Value>> {
        let object = value.as_object();
        if object.is_none() {
            self.fail(path, format!("expected object, found {}", found(value)));
        }
        object
    }

    /// Elements of `items` that are objects, reporting the rest
    fn objects<'a>(&mut self, items: &'a [Value], path: &str) -> Vec<(String, &'a Map<String, Value>)> {
        let mut objects = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let item_path = at(path, i);
            if let Some(object) = self.expect_object(item, &item_path) {
                objects.push((item_path, object));
            }
        }
        objects
    }

    fn closed(&mut self, object: &Map<String, Value>, path: &str, allowed: &[&str]) {
        for key in object.keys() {
            if !allowed.contains(&key.as_str()) {
                self.fail(&child(path, key), "unknown key");
            }
        }
    }

    fn required<'a>(&mut self, object: &'a Map<String, Value>, path: &str, key: &str) -> Option<&'a Value> {
        let value = object.get(key);
        if value.is_none() {
            self.fail(&child(path, key), "is required");
        }
        value
    }

    // --- field helpers ------------------------------------------------------

    fn string<'a>(&mut self, object: &'a Map<String, Value>, path: &str, key: &str) -> Option<&'a str> {
        let value = self.required(object, path, key)?;
        let text = value.as_str();
        if text.is_none() {
            self.fail(&child(path, key), format!("expected string, found {}", found(value)));
        }
        text
    }

    /// Non-empty string
    fn name<'a>(&mut self, object: &'a Map<String, Value>, path: &str, key: &str) -> Option<&'a str> {
        let text = self.string(object, path, key)?;
        if text.trim().is_empty() {
            self.fail(&child(path, key), "must not be empty");
            return None;
        }
        Some(text)
    }

    fn unique_id(&mut self, object: &Map<String, Value>, path: &str, seen: &mut BTreeSet<String>) {
        if let Some(id) = self.name(object, path, "id") {
            if !seen.insert(id.to_string()) {
                self.fail(&child(path, "id"), format!("duplicate id '{id}'"));
            }
        }
    }

    fn one_of<'a>(
        &mut self,
        object: &'a Map<String, Value>,
        path: &str,
        key: &str,
        allowed: &[&str],
    ) -> Option<&'a str> {
        let value = self.required(object, path, key)?;
        self.one_of_value(value, &child(path, key), allowed)
    }

    fn one_of_value<'a>(&mut self, value: &'a Value, path: &str, allowed: &[&str]) -> Option<&'a str> {
        let Some(text) = value.as_str() else {
            self.fail(path, format!("expected string, found {}", found(value)));
            return None;
        };
        if !allowed.contains(&text) {
            self.fail(
                path,
                format!("must be one of [{}], found '{}'", allowed.join(", "), text),
            );
            return None;
        }
        Some(text)
    }

    fn boolean(&mut self, object: &Map<String, Value>, path: &str, key: &str) -> Option<bool> {
        let value = self.required(object, path, key)?;
        let flag = value.as_bool();
        if flag.is_none() {
            self.fail(&child(path, key), format!("expected boolean, found {}", found(value)));
        }
        flag
    }

    fn unit_interval(&mut self, object: &Map<String, Value>, path: &str, key: &str) -> Option<f64> {
        let value = self.required(object, path, key)?;
        let Some(number) = value.as_f64() else {
            self.fail(&child(path, key), format!("expected number, found {}", found(value)));
            return None;
        };
        if !(0.0..=1.0).contains(&number) {
            self.fail(
                &child(path, key),
                format!("must be between 0 and 1, found {number}"),
            );
            return None;
        }
        Some(number)
    }

    /// Non-negative integer
    fn count(&mut self, object: &Map<String, Value>, path: &str, key: &str) -> Option<u64> {
        let value = self.required(object, path, key)?;
        let count = value.as_u64();
        if count.is_none() {
            self.fail(
                &child(path, key),
                format!("expected non-negative integer, found {value}"),
            );
        }
        count
    }

    fn list<'a>(&mut self, object: &'a Map<String, Value>, path: &str, key: &str) -> Option<&'a Vec<Value>> {
        let value = self.required(object, path, key)?;
        let items = value.as_array();
        if items.is_none() {
            self.fail(&child(path, key), format!("expected list, found {}", found(value)));
        }
        items
    }

    fn string_list(&mut self, object: &Map<String, Value>, path: &str, key: &str, non_empty: bool) {
        let Some(items) = self.list(object, path, key) else {
            return;
        };
        let list_path = child(path, key);
        if non_empty && items.is_empty() {
            self.fail(&list_path, "must not be empty");
        }
        for (i, item) in items.iter().enumerate() {
            match item.as_str() {
                Some(text) if text.trim().is_empty() => self.fail(&at(&list_path, i), "must not be empty"),
                Some(_) => {}
                None => self.fail(
                    &at(&list_path, i),
                    format!("expected string, found {}", found(item)),
                ),
            }
        }
        debug!(path = %list_path, items = items.len(), "checked scope list");
    }
}

enum Listed<'a> {
    Absent,
    Malformed,
    Present(&'a [Value]),
}
