//! Relevant-constraint and dominating-policy search.

pub mod dompi;

pub use dompi::{
    BetaRule, ConstraintSubset, DomPiSearch, DominatingPolicy, SearchOutcome, SearchStats,
};

use crate::agent::AgentError;
use sq_config::ValidationError;
use thiserror::Error;

/// Errors from the search engine. Oracle infeasibility is not one of them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SearchError {
    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("{0} unknown constraints is too many to enumerate exhaustively")]
    TooManyConstraints(usize),

    #[error("invalid search budget: {0}")]
    InvalidBudget(#[from] ValidationError),
}

impl From<SearchError> for sq_common::Error {
    fn from(err: SearchError) -> Self {
        match err {
            SearchError::Agent(inner) => inner.into(),
            SearchError::InvalidBudget(inner) => sq_common::Error::Config(inner.to_string()),
            other => sq_common::Error::Search(other.to_string()),
        }
    }
}
