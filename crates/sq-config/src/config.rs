//! Configuration types.
//!
//! Every field has a default so an empty file (or no file) is a valid
//! configuration.

use crate::validate::{early_stop_budget, ValidationResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Complete agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub oracle: OracleConfig,
}

fn default_schema_version() -> String {
    crate::CONFIG_SCHEMA_VERSION.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            search: SearchConfig::default(),
            query: QueryConfig::default(),
            oracle: OracleConfig::default(),
        }
    }
}

/// Dominating-policy search settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Wall-clock budget in seconds. `None` searches to completion.
    ///
    /// When the budget runs out the search returns what it has found so far
    /// and reports the result as incomplete.
    #[serde(default)]
    pub early_stop_secs: Option<f64>,

    /// Skip subsets covered by a recorded dominance rule.
    #[serde(default = "default_true")]
    pub prune: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            early_stop_secs: None,
            prune: true,
        }
    }
}

impl SearchConfig {
    /// Unbounded search with pruning.
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Search with a wall-clock budget.
    pub fn with_budget(secs: f64) -> Self {
        Self {
            early_stop_secs: Some(secs),
            ..Self::default()
        }
    }

    /// Disable dominance pruning.
    pub fn without_pruning(mut self) -> Self {
        self.prune = false;
        self
    }

    /// Budget as a `Duration`; `Ok(None)` means search to completion.
    ///
    /// An unusable budget is an error, never a silent switch to unbounded.
    pub fn budget(&self) -> ValidationResult<Option<Duration>> {
        self.early_stop_secs.map(early_stop_budget).transpose()
    }
}

/// Query-session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Cost charged for posing one query; querying stops once no query's
    /// EVOI reaches it.
    #[serde(default = "default_cost_of_query")]
    pub cost_of_query: f64,

    /// Upper bound on rounds in a simulated session.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,

    /// Seed for the dominating-policy sampler. `None` seeds from entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_cost_of_query() -> f64 {
    0.1
}

fn default_max_rounds() -> usize {
    100
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            cost_of_query: default_cost_of_query(),
            max_rounds: default_max_rounds(),
            seed: None,
        }
    }
}

/// Policy-oracle settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OracleConfig {
    #[serde(default)]
    pub backend: OracleBackend,
}

/// Which optimization backend answers policy-feasibility problems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OracleBackend {
    /// Built-in exact solver for deterministic episodic MDPs.
    #[default]
    Path,
    /// Caller supplies the oracle in-process.
    External,
}

/// Error for an unrecognised backend name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBackend(pub String);

impl fmt::Display for UnknownBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown optimization backend: {}", self.0)
    }
}

impl std::error::Error for UnknownBackend {}

impl FromStr for OracleBackend {
    type Err = UnknownBackend;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "path" | "deterministic_path" => Ok(OracleBackend::Path),
            "external" => Ok(OracleBackend::External),
            _ => Err(UnknownBackend(s.to_string())),
        }
    }
}

impl TryFrom<String> for OracleBackend {
    type Error = UnknownBackend;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<OracleBackend> for String {
    fn from(backend: OracleBackend) -> Self {
        backend.to_string()
    }
}

impl fmt::Display for OracleBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OracleBackend::Path => write!(f, "path"),
            OracleBackend::External => write!(f, "external"),
        }
    }
}
