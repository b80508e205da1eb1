//! Single-kind query proposers used by the myopic agent.
//!
//! Each proposer suggests the best query of one kind (constraint or reward)
//! for the agent's current state; the myopic agent then arbitrates between
//! the two by EVOI.

use super::evoi::compute_evoi;
use super::EvoiError;
use crate::agent::{AgentError, JointUncertaintyAgent};
use crate::search::DomPiSearch;
use sq_common::{ConstraintId, Query, RewardIndex};
use sq_config::SearchConfig;
use std::collections::BTreeSet;

/// Proposes one constraint to ask about.
pub trait FeatureQueryProposer {
    fn propose(
        &mut self,
        agent: &JointUncertaintyAgent,
    ) -> Result<Option<ConstraintId>, EvoiError>;
}

/// Proposes one set of reward hypotheses to ask about.
pub trait RewardQueryProposer {
    fn propose(
        &mut self,
        agent: &JointUncertaintyAgent,
    ) -> Result<Option<BTreeSet<RewardIndex>>, EvoiError>;
}

/// Highest-EVOI relevant constraint under the posterior-mean reward.
///
/// Runs the dominating-policy search first, so constraints no optimal
/// policy depends on are never proposed.
#[derive(Debug, Clone, Default)]
pub struct GreedyFeatureProposer {
    search: DomPiSearch,
}

impl GreedyFeatureProposer {
    pub fn new(config: SearchConfig) -> Self {
        Self {
            search: DomPiSearch::new(config),
        }
    }
}

impl FeatureQueryProposer for GreedyFeatureProposer {
    fn propose(
        &mut self,
        agent: &JointUncertaintyAgent,
    ) -> Result<Option<ConstraintId>, EvoiError> {
        let outcome = self.search.run(agent.constraints())?;
        let mut best: Option<(ConstraintId, f64)> = None;
        for &feat in outcome.relevant.intersection(agent.constraints().unknown()) {
            let evoi = compute_evoi(agent, &Query::Constraint(feat))?;
            if best.map_or(true, |(_, b)| evoi > b) {
                best = Some((feat, evoi));
            }
        }
        Ok(best.map(|(feat, _)| feat))
    }
}

/// Greedily grown reward-hypothesis set.
///
/// Starts from the best single hypothesis and keeps adding the hypothesis
/// that most increases EVOI, stopping when nothing improves it. The set
/// never covers the whole consistent support, since that answer is certain.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyRewardSetProposer;

impl RewardQueryProposer for GreedyRewardSetProposer {
    fn propose(
        &mut self,
        agent: &JointUncertaintyAgent,
    ) -> Result<Option<BTreeSet<RewardIndex>>, EvoiError> {
        let support = agent.consistent_reward_indices();
        if support.is_empty() {
            return Err(AgentError::BeliefCollapse {
                reason: "reward belief has no support".to_string(),
            }
            .into());
        }
        if support.len() == 1 {
            return Ok(None);
        }

        let mut chosen: BTreeSet<RewardIndex> = BTreeSet::new();
        let mut chosen_evoi = f64::NEG_INFINITY;
        while chosen.len() + 1 < support.len() {
            let mut step: Option<(RewardIndex, f64)> = None;
            for &candidate in support.difference(&chosen) {
                let mut trial = chosen.clone();
                trial.insert(candidate);
                let evoi = compute_evoi(agent, &Query::Reward(trial))?;
                if step.map_or(true, |(_, b)| evoi > b) {
                    step = Some((candidate, evoi));
                }
            }
            match step {
                Some((candidate, evoi)) if evoi > chosen_evoi => {
                    chosen.insert(candidate);
                    chosen_evoi = evoi;
                }
                _ => break,
            }
        }
        Ok(Some(chosen))
    }
}
