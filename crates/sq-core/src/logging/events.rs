//! Structured event names and correlation context.
//!
//! Every log line emitted by the core carries an `event` field with one of
//! the stable names below, so JSON-lines output can be filtered by event.

use serde::{Deserialize, Serialize};

/// Phases of a command invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Startup, config and problem loading.
    Init,
    /// Dominating-policy search.
    Search,
    /// Query selection.
    Query,
    /// Query session rounds.
    Session,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Init => "init",
            Stage::Search => "search",
            Stage::Query => "query",
            Stage::Session => "session",
        };
        write!(f, "{}", s)
    }
}

/// Standard event names used in logging.
pub mod event_names {
    // Search engine
    pub const SEARCH_STARTED: &str = "search.started";
    pub const SEARCH_SUBSET_EVALUATED: &str = "search.subset_evaluated";
    pub const SEARCH_SUBSET_PRUNED: &str = "search.subset_pruned";
    pub const SEARCH_BUDGET_EXHAUSTED: &str = "search.budget_exhausted";
    pub const SEARCH_FINISHED: &str = "search.finished";

    // Query selection
    pub const QUERY_EVOI: &str = "query.evoi";
    pub const QUERY_SELECTED: &str = "query.selected";
    pub const QUERY_STOP: &str = "query.stop";

    // Agent state
    pub const BELIEF_UPDATED: &str = "belief.updated";
    pub const CONSTRAINT_RESOLVED: &str = "constraint.resolved";
    pub const SAMPLER_RESAMPLED: &str = "sampler.resampled";

    // Sessions
    pub const SESSION_ROUND: &str = "session.round";
    pub const SESSION_FINISHED: &str = "session.finished";

    // Config/init
    pub const CONFIG_LOADED: &str = "config.loaded";
    pub const PROBLEM_LOADED: &str = "problem.loaded";
}

/// Correlation IDs attached to a command's log lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogContext {
    /// Unique ID for this invocation.
    pub run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl LogContext {
    pub fn new(run_id: impl Into<String>) -> Self {
        LogContext {
            run_id: run_id.into(),
            session_id: None,
        }
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Span carrying the correlation IDs; events inside it inherit them.
    pub fn span(&self, stage: Stage) -> tracing::Span {
        tracing::info_span!(
            "sq",
            run_id = %self.run_id,
            session_id = self.session_id.as_deref().unwrap_or(""),
            stage = %stage
        )
    }
}
