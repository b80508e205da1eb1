//! Expected value of information for constraint and reward queries.
//!
//! # Mathematical Foundation
//!
//! ```text
//! prior     = V(enforce U | ψ)
//! EVOI(f)   = p_f · V(enforce U \ {f} | ψ) + (1 - p_f) · V(enforce U | ψ) - prior
//! EVOI(R)   = ψ(R) · V(enforce U | ψ|R) + ψ(¬R) · V(enforce U | ψ|¬R) - prior
//! ```
//!
//! where `U` is the unknown set, `p_f` the probability that `f` is free and
//! `ψ|R` the belief conditioned on the true reward lying in `R`. Under
//! Bayesian updating EVOI is never negative; a negative value means the
//! oracle is not monotone or the model is broken, and is reported as an
//! error instead of being clamped. Branches with zero probability are not
//! evaluated.

use super::EvoiError;
use crate::agent::{AgentError, JointUncertaintyAgent};
use crate::logging::event_names;
use crate::mdp::BeliefOverlay;
use sq_common::{Query, RewardIndex};
use sq_math::{mass, restrict_to};
use tracing::{debug, info};

/// Round-off allowance below zero before EVOI counts as negative.
pub const EVOI_TOLERANCE: f64 = 1e-9;

/// EVOI of one query against the agent's current state.
pub fn compute_evoi(agent: &JointUncertaintyAgent, query: &Query) -> Result<f64, EvoiError> {
    let prior = agent.current_safely_opt_pi_value()?;
    let expected = match query {
        Query::Constraint(feat) => {
            let constraints = agent.constraints();
            if !constraints.unknown().contains(feat) {
                return Err(AgentError::NotUnknown { index: *feat }.into());
            }
            let p_free = constraints.free_prob(*feat)?;
            let if_free = if p_free > 0.0 {
                let mut relaxed = constraints.unknown().clone();
                relaxed.remove(feat);
                constraints
                    .find_constrained_opt_pi(&relaxed, true)?
                    .obj()
                    .ok_or(AgentError::NoSafePolicy)?
            } else {
                0.0
            };
            p_free * if_free + (1.0 - p_free) * prior
        }
        Query::Reward(set) => {
            let psi = agent.psi();
            let inside: Vec<usize> = set.iter().map(|r| r.index()).collect();
            let outside: Vec<usize> = (0..psi.len())
                .filter(|i| !set.contains(&RewardIndex(*i)))
                .collect();
            let p_in = mass(psi, &inside);
            let p_out = mass(psi, &outside);
            posterior_value(agent, &inside, p_in)? + posterior_value(agent, &outside, p_out)?
        }
    };

    let evoi = expected - prior;
    debug!(
        event = event_names::QUERY_EVOI,
        query = %query,
        evoi,
        prior,
        "evoi computed"
    );
    if evoi < -EVOI_TOLERANCE {
        return Err(EvoiError::NegativeEvoi {
            query: query.clone(),
            evoi,
        });
    }
    Ok(evoi)
}

/// `weight · V(enforce U | ψ restricted to keep)`, zero when `weight` is zero.
fn posterior_value(
    agent: &JointUncertaintyAgent,
    keep: &[usize],
    weight: f64,
) -> Result<f64, EvoiError> {
    if weight <= 0.0 {
        return Ok(0.0);
    }
    let psi = restrict_to(agent.psi(), keep).map_err(AgentError::from)?;
    let overlay = BeliefOverlay::new(agent.constraints().mdp(), &psi);
    Ok(weight * agent.safely_opt_value_under(&overlay)?)
}

/// A candidate query with its EVOI.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredQuery {
    pub query: Query,
    pub evoi: f64,
}

/// Pick between the best reward query and the best constraint query.
///
/// Returns `None` when neither candidate's EVOI reaches the cost of a
/// query. An absent candidate never wins. On an exact EVOI tie the reward
/// query is chosen.
pub fn select_query(
    agent: &JointUncertaintyAgent,
    reward_query: Option<Query>,
    feature_query: Option<Query>,
) -> Result<Option<Query>, EvoiError> {
    let score = |query: Option<Query>| -> Result<Option<ScoredQuery>, EvoiError> {
        query
            .map(|query| compute_evoi(agent, &query).map(|evoi| ScoredQuery { query, evoi }))
            .transpose()
    };
    let reward = score(reward_query)?;
    let feature = score(feature_query)?;

    let best = match (reward, feature) {
        (Some(r), Some(f)) => Some(if r.evoi >= f.evoi { r } else { f }),
        (r, f) => r.or(f),
    };
    let cost = agent.cost_of_query();
    match best {
        Some(best) if best.evoi >= cost => {
            info!(
                event = event_names::QUERY_SELECTED,
                query = %best.query,
                evoi = best.evoi,
                cost,
                "query selected"
            );
            Ok(Some(best.query))
        }
        best => {
            info!(
                event = event_names::QUERY_STOP,
                best_evoi = ?best.map(|b| b.evoi),
                cost,
                "no query worth its cost"
            );
            Ok(None)
        }
    }
}
