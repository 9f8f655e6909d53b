//! Run configuration loaded from TOML.
//!
//! One file describes a whole readiness run: the strategy under test, the
//! stress scenarios, the survival limits and the gate criteria.

use crate::gate::GateCriteria;
use crate::scenario::ScenarioSpec;
use crate::survival::SurvivalLimits;
use gatelab_core::config::SCHEMA_VERSION;
use gatelab_core::{ConfigError, StrategyConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse run config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid strategy: {0}")]
    Strategy(#[from] ConfigError),

    #[error("unsupported schema_version {found} (expected {expected})")]
    UnsupportedSchema { found: u32, expected: u32 },

    #[error("invalid threshold: {0}")]
    Threshold(#[from] ThresholdError),

    #[error("invalid run config: {0}")]
    Invalid(String),
}

/// A survival limit or gate criterion outside its domain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ThresholdError {
    #[error("{field} must be in {range}, got {value}")]
    OutOfRange {
        field: &'static str,
        range: &'static str,
        value: f64,
    },

    #[error("{field} must be finite, got {value}")]
    NonFinite { field: &'static str, value: f64 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    pub strategy: StrategyConfig,

    #[serde(default)]
    pub scenarios: Vec<ScenarioSpec>,

    #[serde(default)]
    pub survival: SurvivalLimits,

    #[serde(default)]
    pub gate: GateCriteria,

    /// Worker cap for scenario fan-out; `None` uses the global rayon pool.
    #[serde(default)]
    pub threads: Option<usize>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl RunConfig {
    pub fn new(strategy: StrategyConfig) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            strategy,
            scenarios: Vec::new(),
            survival: SurvivalLimits::default(),
            gate: GateCriteria::default(),
            threads: None,
        }
    }

    /// Read, parse and validate a TOML run config.
    pub fn load(path: &Path) -> Result<Self, RunConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| RunConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RunConfigError> {
        let config: RunConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RunConfigError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(RunConfigError::UnsupportedSchema {
                found: self.schema_version,
                expected: SCHEMA_VERSION,
            });
        }
        self.strategy.validate()?;

        let mut names = HashSet::new();
        for scenario in &self.scenarios {
            if scenario.name.trim().is_empty() {
                return Err(RunConfigError::Invalid("scenario name is empty".into()));
            }
            if !names.insert(scenario.name.as_str()) {
                return Err(RunConfigError::Invalid(format!(
                    "duplicate scenario name '{}'",
                    scenario.name
                )));
            }
        }

        self.survival.validate()?;
        self.gate.validate()?;

        if self.threads == Some(0) {
            return Err(RunConfigError::Invalid("threads must be at least 1".into()));
        }
        Ok(())
    }
}

/// The parts of a run config that determine its results.
///
/// Execution settings such as `threads` are left out.
#[derive(Serialize)]
struct HashedInputs<'a> {
    schema_version: u32,
    strategy: &'a StrategyConfig,
    scenarios: &'a [ScenarioSpec],
    survival: &'a SurvivalLimits,
    gate: &'a GateCriteria,
}

/// BLAKE3 hash of the canonical JSON form of the config's result-determining inputs.
///
/// Identical inputs hash identically whatever the worker count; reports carry
/// this instead of a wall-clock timestamp.
pub fn config_hash(config: &RunConfig) -> Result<String, serde_json::Error> {
    let inputs = HashedInputs {
        schema_version: config.schema_version,
        strategy: &config.strategy,
        scenarios: &config.scenarios,
        survival: &config.survival,
        gate: &config.gate,
    };
    let json = serde_json::to_string(&inputs)?;
    Ok(blake3::hash(json.as_bytes()).to_hex().to_string())
}
