//! End-to-end pipeline: validate → apply → plan → check
//!
//! The stages share one telemetry sink. Plan and check read the generated
//! packs written by `apply`; on a dry run nothing is written and they read
//! the templates in the build root instead.

use crate::config::{AgentpackConfig, ContractMode};
use crate::error::Result;
use crate::intake::IntakeValidator;
use crate::integrity::{IntegrityChecker, IntegrityReport};
use crate::mapper::{ApplyOutcome, CanonicalMapper};
use crate::resolver::{BuildPlan, PackResolver};
use crate::telemetry::{global_sink, SharedSink};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

/// Per-run knobs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOptions {
    /// Map without writing generated packs
    pub dry_run: bool,
    /// Contract mode for the integrity check
    pub mode: ContractMode,
}

/// Everything one run produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Mapping, diff and write results
    pub apply: ApplyOutcome,
    /// Build order of the checked pack set
    pub plan: BuildPlan,
    /// Integrity of the checked pack set
    pub integrity: IntegrityReport,
}

impl PipelineOutcome {
    /// Integrity passed and the build plan raised no warnings
    pub fn ok(&self) -> bool {
        self.integrity.ok() && self.plan.warnings.is_empty()
    }
}

/// The four core stages wired together
#[derive(Debug, Clone)]
pub struct Pipeline {
    validator: IntakeValidator,
    mapper: CanonicalMapper,
    resolver: PackResolver,
    checker: IntegrityChecker,
}

impl Pipeline {
    /// Pipeline with built-in configuration, reporting to the global ring
    pub fn new() -> Self {
        Self::from_config(&AgentpackConfig::default(), global_sink())
    }

    /// Pipeline using `config` for contract modes, reporting to `sink`
    pub fn from_config(config: &AgentpackConfig, sink: SharedSink) -> Self {
        Self {
            validator: IntakeValidator::with_sink(sink.clone()),
            mapper: CanonicalMapper::with_sink(sink.clone()),
            resolver: PackResolver::with_sink(sink.clone()),
            checker: IntegrityChecker::from_config(config).with_sink(sink),
        }
    }

    /// Run every stage against `build_root`
    ///
    /// # Errors
    ///
    /// Stops at the first `Validation` or structural failure; cycle
    /// warnings and integrity findings are carried in the outcome instead.
    pub fn run(
        &self,
        document: &Value,
        build_root: &Path,
        options: PipelineOptions,
    ) -> Result<PipelineOutcome> {
        let intake = self.validator.validate(document)?;
        let apply = self.mapper.apply(&intake, build_root, options.dry_run)?;
        let packs = if apply.dry_run {
            build_root
        } else {
            apply.output_dir.as_path()
        };
        let plan = self.resolver.plan(packs)?;
        let integrity = self.checker.check(packs, options.mode)?;

        info!(
            agent = %intake.spec().metadata.agent_name,
            changed = apply.changed_files.len(),
            ok = integrity.ok(),
            "pipeline finished"
        );
        Ok(PipelineOutcome {
            apply,
            plan,
            integrity,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}
