//! Configuration for agentpack
//!
//! The mapping from contract mode to the set of mandatory packs is
//! configuration data, not code. Built-in defaults cover both modes and can
//! be overridden from a TOML file:
//!
//! ```toml
//! default_mode = "full"
//! telemetry_capacity = 256
//!
//! [contract_modes]
//! minimal = ["01_Org_Profile_v1", "02_Global_Instructions_v2"]
//! full = ["01_Org_Profile_v1", "02_Global_Instructions_v2", "14_KPI_Gates_v1"]
//! ```

use crate::error::{PackError, Result, ResultExt};
use crate::pack::CATALOG;
use crate::telemetry::{TelemetryRing, DEFAULT_CAPACITY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Selects which subset of the bundle is mandatory for completeness
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractMode {
    /// Only the packs a runnable agent needs
    Minimal,
    /// Every catalog pack
    Full,
}

impl ContractMode {
    /// Lowercase name used in config files and reports
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minimal => "minimal",
            Self::Full => "full",
        }
    }
}

impl Default for ContractMode {
    fn default() -> Self {
        Self::Full
    }
}

impl fmt::Display for ContractMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractMode {
    type Err = PackError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minimal" => Ok(Self::Minimal),
            "full" => Ok(Self::Full),
            other => Err(PackError::Structural(format!(
                "unknown contract mode '{other}' (expected minimal or full)"
            ))),
        }
    }
}

/// Mandatory pack names per contract mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractModeTable {
    /// Packs required under `minimal`
    pub minimal: Vec<String>,
    /// Packs required under `full`
    pub full: Vec<String>,
}

impl ContractModeTable {
    /// Pack names required under `mode`, in declaration order
    pub fn required_packs(&self, mode: ContractMode) -> &[String] {
        match mode {
            ContractMode::Minimal => &self.minimal,
            ContractMode::Full => &self.full,
        }
    }
}

impl Default for ContractModeTable {
    fn default() -> Self {
        let minimal = [1u8, 2, 3, 7, 8, 14];
        Self {
            minimal: CATALOG
                .iter()
                .filter(|s| minimal.contains(&s.ordinal))
                .map(|s| s.name())
                .collect(),
            full: CATALOG.iter().map(|s| s.name()).collect(),
        }
    }
}

/// Top-level agentpack configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentpackConfig {
    /// Contract mode used when the caller does not pick one
    pub default_mode: ContractMode,

    /// Capacity of dedicated telemetry rings built from this config
    pub telemetry_capacity: usize,

    /// Mandatory packs per contract mode
    pub contract_modes: ContractModeTable,
}

impl Default for AgentpackConfig {
    fn default() -> Self {
        Self {
            default_mode: ContractMode::default(),
            telemetry_capacity: DEFAULT_CAPACITY,
            contract_modes: ContractModeTable::default(),
        }
    }
}

impl AgentpackConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default contract mode
    pub fn with_default_mode(mut self, mode: ContractMode) -> Self {
        self.default_mode = mode;
        self
    }

    /// Parse configuration from TOML text; absent keys keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(PackError::from)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing config {}", path.display()))
    }

    /// A fresh ring sized by `telemetry_capacity`
    pub fn telemetry_ring(&self) -> TelemetryRing {
        TelemetryRing::with_capacity(self.telemetry_capacity)
    }

    fn check(&self) -> Result<()> {
        if self.telemetry_capacity == 0 {
            return Err(PackError::Structural(
                "telemetry_capacity must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
