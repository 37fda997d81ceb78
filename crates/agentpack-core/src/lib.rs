//! Agentpack Core - compilation engine for agent configuration bundles
//!
//! Turns a submitted intake document into a bundle of interdependent packs
//! and proves the bundle consistent.
//!
//! # Architecture
//!
//! 1. **Intake** (`intake`): closed-schema validation with full multi-error
//!    diagnostics, then conversion to a typed `IntakeSpec`
//! 2. **Mapper** (`mapper`): routes validated fields into canonical pack
//!    templates, deep-sorts and diffs them, optionally writes the generated
//!    packs to a directory apart from the templates
//! 3. **Resolver** (`resolver`): discovers pack files, checks required
//!    keys, orders them by `depends_on`, warns on cycles
//! 4. **Integrity** (`integrity`): field-type contracts, cross-pack
//!    references, parity flags and completeness in one report
//! 5. **Telemetry** (`telemetry`): bounded thread-safe event ring fed by
//!    every stage
//!
//! # Quick Start
//!
//! ```no_run
//! use agentpack_core::{Pipeline, PipelineOptions};
//! use std::path::Path;
//!
//! let document = serde_json::from_str(&std::fs::read_to_string("intake.json")?)?;
//! let outcome = Pipeline::new().run(&document, Path::new("build"), PipelineOptions::default())?;
//!
//! println!("build order: {:?}", outcome.plan.order);
//! if !outcome.integrity.ok() {
//!     eprintln!("integrity failures: {:?}", outcome.integrity.failures());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Failure model
//!
//! Only intake validation failures and structural failures (missing build
//! root or template, unreadable pack) are errors. Contract violations,
//! cycle warnings and cross-reference mismatches are recorded in the
//! returned reports.

#![deny(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod config;
pub mod error;
pub mod intake;
pub mod integrity;
pub mod mapper;
pub mod pack;
pub mod pipeline;
pub mod resolver;
pub mod telemetry;

// Re-export commonly used types for convenience
pub use config::{AgentpackConfig, ContractMode, ContractModeTable};
pub use error::{PackError, Result, ValidationError, ValidationFailure};
pub use intake::{IntakeSpec, IntakeValidator, ValidatedIntake};
pub use integrity::{ContractViolation, CrossRefIssue, IntegrityChecker, IntegrityReport};
pub use mapper::{ApplyOutcome, CanonicalMapper, DiffEntry, MappingAction, MappingEntry};
pub use pack::{PackDocument, PackName, PackSlot, CATALOG};
pub use pipeline::{Pipeline, PipelineOptions, PipelineOutcome};
pub use resolver::{BuildPlan, PackResolver, Resolution, ResolverWarning};
pub use telemetry::{EventName, TelemetryEvent, TelemetryRing, TelemetrySink};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
