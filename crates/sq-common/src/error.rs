//! Error types for safe-query.
//!
//! [`Error`] is what the binary reports. Each variant keeps its numeric code
//! across releases; [`Error::remediation`] adds a hint for whoever reads
//! stderr.
//!
//! Library crates keep their own narrow error enums; they are folded into
//! [`Error`] at the binary boundary.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Result type alias for safe-query operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse grouping of [`Error`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration and problem-file errors.
    Config,
    /// Policy oracle failures (not infeasibility, which is a normal outcome).
    Oracle,
    /// Belief or constraint-partition invariants broken by the query protocol.
    Belief,
    /// Dominating-policy search and EVOI computation errors.
    Search,
    /// Reading files and (de)serializing JSON.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Oracle => write!(f, "oracle"),
            ErrorCategory::Belief => write!(f, "belief"),
            ErrorCategory::Search => write!(f, "search"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for safe-query.
#[derive(Error, Debug)]
pub enum Error {
    // 10-19
    #[error("configuration error: {0}")]
    Config(String),

    #[error("unknown optimization backend: {0}")]
    UnknownBackend(String),

    #[error("invalid problem description: {0}")]
    InvalidProblem(String),

    #[error("invalid argument {flag}: {reason}")]
    InvalidArgument { flag: String, reason: String },

    // 20-29
    #[error("policy oracle failed: {0}")]
    Oracle(String),

    #[error("no safe policy exists under the current constraints")]
    NoSafePolicy,

    // 30-39
    #[error("belief collapse: {0}")]
    BeliefCollapse(String),

    #[error("constraint {index} is not unknown")]
    NotUnknown { index: usize },

    #[error("no probability given for constraint {index}")]
    MissingProbability { index: usize },

    // 40-49
    #[error("negative EVOI {evoi} for query {query}")]
    NegativeEvoi { query: String, evoi: f64 },

    #[error("search failed: {0}")]
    Search(String),

    #[error("internal invariant broken: {0}")]
    Invariant(String),

    // 60-69
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Numeric code, one decade per category: config 1x, oracle 2x,
    /// belief 3x, search 4x, I/O 6x.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::UnknownBackend(_) => 11,
            Error::InvalidProblem(_) => 12,
            Error::InvalidArgument { .. } => 13,
            Error::Oracle(_) => 20,
            Error::NoSafePolicy => 21,
            Error::BeliefCollapse(_) => 30,
            Error::NotUnknown { .. } => 31,
            Error::MissingProbability { .. } => 32,
            Error::NegativeEvoi { .. } => 40,
            Error::Search(_) => 41,
            Error::Invariant(_) => 42,
            Error::Io(_) => 60,
            Error::Json(_) => 61,
        }
    }

    /// Category this variant belongs to.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_)
            | Error::UnknownBackend(_)
            | Error::InvalidProblem(_)
            | Error::InvalidArgument { .. } => ErrorCategory::Config,
            Error::Oracle(_) | Error::NoSafePolicy => ErrorCategory::Oracle,
            Error::BeliefCollapse(_)
            | Error::NotUnknown { .. }
            | Error::MissingProbability { .. } => ErrorCategory::Belief,
            Error::NegativeEvoi { .. } | Error::Search(_) | Error::Invariant(_) => {
                ErrorCategory::Search
            }
            Error::Io(_) | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Returns whether this error is potentially recoverable by the caller.
    ///
    /// Belief and EVOI errors signal a broken invariant inside a session and
    /// are never recoverable within it.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Config(_)
            | Error::UnknownBackend(_)
            | Error::InvalidProblem(_)
            | Error::InvalidArgument { .. } => true,
            Error::Oracle(_) => true,
            Error::NoSafePolicy => false,
            Error::BeliefCollapse(_)
            | Error::NotUnknown { .. }
            | Error::MissingProbability { .. } => false,
            Error::NegativeEvoi { .. } | Error::Search(_) | Error::Invariant(_) => false,
            Error::Io(_) | Error::Json(_) => true,
        }
    }

    /// What the user can do about it.
    pub fn remediation(&self) -> &'static str {
        match self {
            Error::Config(_) => "Run 'sq-core config validate' and check the config file syntax.",
            Error::UnknownBackend(_) => {
                "Set oracle.backend to one of the supported backends ('path' or 'external')."
            }
            Error::InvalidProblem(_) => {
                "Check the problem file: indices must be in range and probabilities in [0, 1]."
            }
            Error::InvalidArgument { .. } => "Check the flag values against --help.",
            Error::Oracle(_) => "The policy oracle failed. Check the MDP is well formed.",
            Error::NoSafePolicy => {
                "Enforcing every unknown constraint leaves no feasible policy; relax the goal set."
            }
            Error::BeliefCollapse(_) => {
                "The answers contradict every reward hypothesis. Check the responder."
            }
            Error::NotUnknown { .. } => "Only constraints that are still unknown can be resolved.",
            Error::MissingProbability { .. } => {
                "Supply a free-probability for every constraint, or use the adversarial setting."
            }
            Error::NegativeEvoi { .. } => {
                "The oracle violated monotonicity or the model is inconsistent. Report the problem."
            }
            Error::Search(_) => "Retry with a larger search budget.",
            Error::Invariant(_) => "A model invariant was broken. Report the problem file.",
            Error::Io(_) => "Check file paths and permissions.",
            Error::Json(_) => "Invalid JSON. Check syntax with 'jq .'.",
        }
    }
}

/// The `error` object printed on stderr when a command fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// See [`Error::code`].
    pub code: u32,

    pub category: ErrorCategory,

    pub message: String,

    pub recoverable: bool,

    pub remediation: String,

    /// Extra fields, e.g. the offending path or constraint.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub context: HashMap<String, serde_json::Value>,
}

impl From<&Error> for StructuredError {
    fn from(err: &Error) -> Self {
        let mut context = HashMap::new();

        match err {
            Error::NotUnknown { index } | Error::MissingProbability { index } => {
                context.insert("constraint".to_string(), serde_json::json!(index));
            }
            Error::InvalidArgument { flag, .. } => {
                context.insert("flag".to_string(), serde_json::json!(flag));
            }
            Error::NegativeEvoi { query, evoi } => {
                context.insert("query".to_string(), serde_json::json!(query));
                context.insert("evoi".to_string(), serde_json::json!(evoi));
            }
            _ => {}
        }

        StructuredError {
            code: err.code(),
            category: err.category(),
            message: err.to_string(),
            recoverable: err.is_recoverable(),
            remediation: err.remediation().to_string(),
            context,
        }
    }
}

impl StructuredError {
    /// Compact JSON; falls back to a code-only object if serialization fails.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":{},"error":"serialization_failed"}}"#, self.code)
        })
    }
}
