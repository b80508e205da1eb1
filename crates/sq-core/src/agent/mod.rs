//! Query agents: the constraint agent and the joint-uncertainty agent built on it.

pub mod constraint;
pub mod joint;

pub use constraint::{AgentUnderView, ConstraintQueryAgent, ConstraintSet, ConstraintSolver};
pub use joint::JointUncertaintyAgent;

use crate::mdp::MdpError;
use crate::oracle::OracleError;
use sq_common::{Answer, ConstraintId, Query, StateId};
use sq_math::BeliefError;
use thiserror::Error;

/// Errors from agent operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AgentError {
    #[error("constraint {index}: {reason}")]
    InvalidConstraint { index: ConstraintId, reason: String },

    #[error("goal state {0} out of range")]
    InvalidGoal(StateId),

    #[error("got {len} constraint probabilities for {expected} constraints")]
    ProbabilityShape { len: usize, expected: usize },

    #[error("probability {value} for constraint {index} is outside [0, 1]")]
    InvalidProbability { index: ConstraintId, value: f64 },

    #[error("probability computation failed: {0}")]
    Probability(String),

    #[error("cost of query must be finite and non-negative, got {0}")]
    InvalidCost(f64),

    #[error("constraint {index} is not unknown")]
    NotUnknown { index: ConstraintId },

    #[error("no probability given for constraint {index}")]
    MissingProbability { index: ConstraintId },

    #[error("no safe policy exists under the current constraints")]
    NoSafePolicy,

    #[error("belief collapse: {reason}")]
    BeliefCollapse { reason: String },

    #[error("answer {answer:?} does not fit query {query}")]
    MismatchedAnswer { query: Query, answer: Answer },

    #[error(transparent)]
    Belief(#[from] BeliefError),

    #[error(transparent)]
    Mdp(#[from] MdpError),

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

impl From<AgentError> for sq_common::Error {
    fn from(err: AgentError) -> Self {
        use sq_common::Error;
        match err {
            AgentError::NotUnknown { index } => Error::NotUnknown {
                index: index.index(),
            },
            AgentError::MissingProbability { index } => Error::MissingProbability {
                index: index.index(),
            },
            AgentError::NoSafePolicy => Error::NoSafePolicy,
            AgentError::BeliefCollapse { .. } | AgentError::Belief(_) => {
                Error::BeliefCollapse(err.to_string())
            }
            AgentError::Oracle(OracleError::ExternalBackend) => {
                Error::UnknownBackend(err.to_string())
            }
            AgentError::Oracle(_) => Error::Oracle(err.to_string()),
            AgentError::MismatchedAnswer { .. } => Error::Search(err.to_string()),
            _ => Error::InvalidProblem(err.to_string()),
        }
    }
}
