//! Query selection: EVOI arbitration, greedy proposers, and the two
//! session-level query agents (myopic EVOI and dominating-policy sampling).

pub mod evoi;
pub mod myopic;
pub mod proposer;
pub mod sampler;

pub use evoi::{compute_evoi, select_query, ScoredQuery, EVOI_TOLERANCE};
pub use myopic::MyopicQueryAgent;
pub use proposer::{
    FeatureQueryProposer, GreedyFeatureProposer, GreedyRewardSetProposer, RewardQueryProposer,
};
pub use sampler::{DomPiData, DomPiSamplingAgent, SamplerError};

use crate::agent::{AgentError, JointUncertaintyAgent};
use crate::search::SearchError;
use sq_common::{Answer, Query};
use thiserror::Error;

/// Errors from EVOI computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvoiError {
    #[error("EVOI {evoi} of query {query} is negative")]
    NegativeEvoi { query: Query, evoi: f64 },

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Search(#[from] SearchError),
}

/// Errors from a query agent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error(transparent)]
    Evoi(#[from] EvoiError),

    #[error(transparent)]
    Sampler(#[from] SamplerError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

/// A strategy that proposes one query per round and absorbs the answer.
pub trait QueryAgent {
    /// Short strategy name for reports.
    fn name(&self) -> &'static str;

    /// Next query, or `None` to stop.
    fn find_query(&mut self) -> Result<Option<Query>, QueryError>;

    fn apply_answer(&mut self, query: &Query, answer: Answer) -> Result<(), QueryError>;

    fn joint(&self) -> &JointUncertaintyAgent;
}

impl From<EvoiError> for sq_common::Error {
    fn from(err: EvoiError) -> Self {
        match err {
            EvoiError::NegativeEvoi { query, evoi } => sq_common::Error::NegativeEvoi {
                query: query.to_string(),
                evoi,
            },
            EvoiError::Agent(inner) => inner.into(),
            EvoiError::Search(inner) => inner.into(),
        }
    }
}

impl From<QueryError> for sq_common::Error {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Evoi(inner) => inner.into(),
            QueryError::Sampler(inner) => inner.into(),
            QueryError::Agent(inner) => inner.into(),
        }
    }
}
