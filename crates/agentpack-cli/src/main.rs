use agentpack_core::telemetry::{SharedSink, TelemetryRing};
use agentpack_core::{
    AgentpackConfig, CanonicalMapper, ContractMode, IntakeValidator, IntegrityChecker, PackError,
    PackResolver,
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod render;

/// Exit code when intake validation fails
const EXIT_INVALID: u8 = 2;
/// Exit code when the integrity report is not OK
const EXIT_NOT_OK: u8 = 1;

/// Agentpack - compile agent intake into a consistent pack bundle
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); built-in defaults when omitted
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an intake document
    Validate {
        /// Intake JSON file
        intake: PathBuf,

        /// Output errors as JSON
        #[arg(long)]
        json: bool,
    },

    /// Map an intake onto the canonical templates in a build root
    Apply {
        /// Intake JSON file
        intake: PathBuf,

        /// Build root holding the pack templates
        root: PathBuf,

        /// Directory for generated packs; `<root>/generated` when omitted
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Compute reports without writing any file
        #[arg(long)]
        dry_run: bool,

        /// Print unified diffs of changed packs
        #[arg(long)]
        diff: bool,

        /// Output the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the build order of the packs in a build root
    Plan {
        /// Build root holding the packs
        root: PathBuf,

        /// Output the plan as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the integrity checks over a build root
    Check {
        /// Build root holding the packs
        root: PathBuf,

        /// Contract mode (minimal | full); config default when omitted
        #[arg(short, long)]
        mode: Option<ContractMode>,

        /// Output the report as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => AgentpackConfig::from_file(path)?,
        None => AgentpackConfig::default(),
    };
    let ring = Arc::new(config.telemetry_ring());
    let sink: SharedSink = ring.clone();

    let code = run(cli.command, &config, sink)?;
    log_telemetry(&ring);
    Ok(code)
}

fn run(command: Commands, config: &AgentpackConfig, sink: SharedSink) -> anyhow::Result<ExitCode> {
    match command {
        Commands::Validate { intake, json } => {
            let document = read_intake(&intake)?;
            let errors = IntakeValidator::with_sink(sink).check(&document);
            if json {
                println!("{}", serde_json::to_string_pretty(&errors)?);
            } else if errors.is_empty() {
                println!("{}: valid", intake.display());
            } else {
                for error in &errors {
                    println!("{error}");
                }
            }
            if !errors.is_empty() {
                return Ok(ExitCode::from(EXIT_INVALID));
            }
        }
        Commands::Apply {
            intake,
            root,
            out,
            dry_run,
            diff,
            json,
        } => {
            let document = read_intake(&intake)?;
            let validated = match IntakeValidator::with_sink(sink.clone()).validate(&document) {
                Ok(validated) => validated,
                Err(PackError::Validation(failure)) => {
                    eprintln!("{}", failure.render());
                    return Ok(ExitCode::from(EXIT_INVALID));
                }
                Err(err) => return Err(err.into()),
            };
            let mut mapper = CanonicalMapper::with_sink(sink);
            if let Some(out) = out {
                mapper = mapper.with_output_dir(out);
            }
            let outcome = mapper.apply(&validated, &root, dry_run)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                render::apply(&outcome, diff);
            }
        }
        Commands::Plan { root, json } => {
            let plan = PackResolver::with_sink(sink).plan(&root)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&plan)?);
            } else {
                render::plan(&plan);
            }
        }
        Commands::Check { root, mode, json } => {
            let mode = mode.unwrap_or(config.default_mode);
            let report = IntegrityChecker::from_config(config)
                .with_sink(sink)
                .check(&root, mode)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                render::integrity(&report);
            }
            if !report.ok() {
                return Ok(ExitCode::from(EXIT_NOT_OK));
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(verbose)
        .with_writer(std::io::stderr)
        .init();
}

fn log_telemetry(ring: &TelemetryRing) {
    for event in ring.snapshot() {
        let payload = serde_json::to_string(&event.payload).unwrap_or_default();
        debug!(ordinal = event.ordinal, %payload, "{}", event.name);
    }
}

fn read_intake(path: &Path) -> anyhow::Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading intake {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing intake {}", path.display()))
}
