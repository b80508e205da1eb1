//! Query sessions.
//!
//! A session alternates between a [`QueryAgent`] proposing a query and a
//! [`Responder`] answering it, until the agent stops or the round limit is
//! hit. The report records every exchange and evaluates the policy the agent
//! would commit to at the end.

use crate::agent::AgentError;
use crate::logging::event_names;
use crate::mdp::FixedRewardOverlay;
use crate::policy::Occupancy;
use crate::query::{QueryAgent, QueryError};
use serde::{Deserialize, Serialize};
use sq_common::{Answer, ConstraintId, Query, RewardIndex, SessionId};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from a session run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("responder failed: {0}")]
    Responder(String),
}

impl From<SessionError> for sq_common::Error {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Query(inner) => inner.into(),
            SessionError::Agent(inner) => inner.into(),
            other => sq_common::Error::Search(other.to_string()),
        }
    }
}

/// Source of answers to queries.
pub trait Responder {
    fn answer(&mut self, query: &Query) -> Result<Answer, SessionError>;

    /// The true reward, when the responder knows it.
    fn true_reward(&self) -> Option<RewardIndex> {
        None
    }
}

/// Hidden state of the world a simulated responder answers from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundTruth {
    /// Constraints that are actually locked; every other one is free.
    #[serde(default)]
    pub locked: BTreeSet<ConstraintId>,
    pub reward: RewardIndex,
}

/// Answers truthfully from a [`GroundTruth`].
#[derive(Debug, Clone)]
pub struct SimulatedResponder {
    truth: GroundTruth,
}

impl SimulatedResponder {
    pub fn new(truth: GroundTruth) -> Self {
        Self { truth }
    }
}

impl Responder for SimulatedResponder {
    fn answer(&mut self, query: &Query) -> Result<Answer, SessionError> {
        Ok(match query {
            Query::Constraint(index) if self.truth.locked.contains(index) => Answer::Locked,
            Query::Constraint(_) => Answer::Free,
            Query::Reward(set) if set.contains(&self.truth.reward) => Answer::InSet,
            Query::Reward(_) => Answer::NotInSet,
        })
    }

    fn true_reward(&self) -> Option<RewardIndex> {
        Some(self.truth.reward)
    }
}

/// One query and its answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecord {
    pub round: usize,
    pub query: Query,
    pub answer: Answer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The agent found no query worth asking.
    NoQuery,
    /// The round limit was reached.
    MaxRounds,
}

/// Outcome of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub session_id: SessionId,
    pub method: String,
    pub rounds: usize,
    pub queries: Vec<QueryRecord>,
    pub stop_reason: StopReason,
    /// Safely-optimal value under the final posterior-mean reward; `None`
    /// when no safe policy exists.
    pub safe_value: Option<f64>,
    /// The safely-optimal policy the agent commits to.
    pub policy: Option<Occupancy>,
    /// Value of that policy under the true reward, when known.
    pub true_value: Option<f64>,
}

/// Run a session of at most `max_rounds` queries.
pub fn run_session(
    agent: &mut dyn QueryAgent,
    responder: &mut dyn Responder,
    max_rounds: usize,
) -> Result<SessionReport, SessionError> {
    let session_id = SessionId::new();
    let span = tracing::info_span!("session", session_id = %session_id, method = agent.name());
    let _guard = span.enter();

    let mut queries = Vec::new();
    let mut stop_reason = StopReason::MaxRounds;
    while queries.len() < max_rounds {
        let Some(query) = agent.find_query()? else {
            stop_reason = StopReason::NoQuery;
            break;
        };
        let answer = responder.answer(&query)?;
        agent.apply_answer(&query, answer)?;
        let round = queries.len() + 1;
        debug!(
            event = event_names::SESSION_ROUND,
            round,
            query = %query,
            answer = ?answer,
            "round complete"
        );
        queries.push(QueryRecord {
            round,
            query,
            answer,
        });
    }

    let joint = agent.joint();
    let (safe_value, policy) = match joint.current_safely_opt_pi() {
        Ok((value, pi)) => (Some(value), Some(pi)),
        Err(AgentError::NoSafePolicy) => (None, None),
        Err(e) => return Err(e.into()),
    };
    let true_value = match (responder.true_reward(), &policy) {
        (Some(reward), Some(pi)) => {
            let overlay = FixedRewardOverlay::new(joint.constraints().mdp(), reward)
                .map_err(AgentError::from)?;
            Some(pi.value(&overlay))
        }
        _ => None,
    };

    info!(
        event = event_names::SESSION_FINISHED,
        rounds = queries.len(),
        stop_reason = ?stop_reason,
        safe_value = ?safe_value,
        true_value = ?true_value,
        "session finished"
    );
    Ok(SessionReport {
        session_id,
        method: agent.name().to_string(),
        rounds: queries.len(),
        queries,
        stop_reason,
        safe_value,
        policy,
        true_value,
    })
}
