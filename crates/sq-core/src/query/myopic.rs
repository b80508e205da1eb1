//! Myopic (one-step lookahead) query selection.
//!
//! Each round the agent asks its reward proposer and its feature proposer
//! for their best query, scores both by EVOI and poses the better one, or
//! stops when neither is worth the cost of asking.

use super::evoi::{compute_evoi, select_query};
use super::proposer::{
    FeatureQueryProposer, GreedyFeatureProposer, GreedyRewardSetProposer, RewardQueryProposer,
};
use super::{EvoiError, QueryAgent, QueryError};
use crate::agent::{AgentError, JointUncertaintyAgent};
use sq_common::{Answer, Query};
use sq_config::SearchConfig;

/// EVOI-arbitrated agent over a feature proposer and a reward proposer.
pub struct MyopicQueryAgent<F = GreedyFeatureProposer, R = GreedyRewardSetProposer> {
    agent: JointUncertaintyAgent,
    feature: F,
    reward: R,
}

impl MyopicQueryAgent {
    /// Agent with the greedy proposers.
    pub fn new(agent: JointUncertaintyAgent, search: SearchConfig) -> Self {
        Self::with_proposers(agent, GreedyFeatureProposer::new(search), GreedyRewardSetProposer)
    }
}

impl<F, R> MyopicQueryAgent<F, R>
where
    F: FeatureQueryProposer,
    R: RewardQueryProposer,
{
    pub fn with_proposers(agent: JointUncertaintyAgent, feature: F, reward: R) -> Self {
        Self {
            agent,
            feature,
            reward,
        }
    }

    /// Best reward query, or `None` once the true reward is known.
    pub fn find_reward_query(&mut self) -> Result<Option<Query>, EvoiError> {
        let support = self.agent.consistent_reward_indices();
        if support.is_empty() {
            return Err(AgentError::BeliefCollapse {
                reason: "reward belief has no support".to_string(),
            }
            .into());
        }
        if support.len() == 1 {
            return Ok(None);
        }
        Ok(self.reward.propose(&self.agent)?.map(Query::Reward))
    }

    /// Best constraint query, or `None` when no unknown constraint matters.
    pub fn find_feature_query(&mut self) -> Result<Option<Query>, EvoiError> {
        Ok(self.feature.propose(&self.agent)?.map(Query::Constraint))
    }

    pub fn compute_evoi(&self, query: &Query) -> Result<f64, EvoiError> {
        compute_evoi(&self.agent, query)
    }

    pub fn into_inner(self) -> JointUncertaintyAgent {
        self.agent
    }
}

impl<F, R> QueryAgent for MyopicQueryAgent<F, R>
where
    F: FeatureQueryProposer,
    R: RewardQueryProposer,
{
    fn name(&self) -> &'static str {
        "myopic"
    }

    fn find_query(&mut self) -> Result<Option<Query>, QueryError> {
        let reward = self.find_reward_query()?;
        let feature = self.find_feature_query()?;
        Ok(select_query(&self.agent, reward, feature)?)
    }

    fn apply_answer(&mut self, query: &Query, answer: Answer) -> Result<(), QueryError> {
        Ok(self.agent.apply_answer(query, answer)?)
    }

    fn joint(&self) -> &JointUncertaintyAgent {
        &self.agent
    }
}
