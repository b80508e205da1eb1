//! Dominating-policy sampling agent.
//!
//! Instead of scoring queries by EVOI, this agent samples one "object"
//! dominating policy in proportion to how likely it is to be both safe and
//! optimal, then asks whatever would confirm or refute it:
//!
//! ```text
//! weight(π) = Σ_r  P(violated(π) all free) · ψ(r) · V_r(π)
//! ```
//!
//! where `r` ranges over the consistent rewards under which `π` is dominating.
//!
//! The object is kept across rounds and resampled only once an answer rules
//! it out: one of its relevant constraints turned out locked, or none of the
//! rewards it optimizes is still consistent with the belief.

use super::{QueryAgent, QueryError};
use crate::agent::{AgentError, JointUncertaintyAgent};
use crate::logging::event_names;
use crate::mdp::FixedRewardOverlay;
use crate::policy::Occupancy;
use crate::search::{DomPiSearch, SearchError};
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use sq_common::{Answer, ConstraintId, Query, RewardIndex};
use sq_config::SearchConfig;
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from the sampling agent.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SamplerError {
    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("no dominating policy is feasible under any consistent reward")]
    NoViablePolicy,

    #[error("dominating policy has negative weight {weight}")]
    NegativeWeight { weight: f64 },

    #[error("cannot build sampling distribution: {0}")]
    Distribution(String),
}

impl From<SamplerError> for sq_common::Error {
    fn from(err: SamplerError) -> Self {
        match err {
            SamplerError::Search(inner) => inner.into(),
            SamplerError::Agent(inner) => inner.into(),
            SamplerError::NoViablePolicy => sq_common::Error::BeliefCollapse(err.to_string()),
            SamplerError::NegativeWeight { .. } | SamplerError::Distribution(_) => {
                sq_common::Error::Invariant(err.to_string())
            }
        }
    }
}

/// A dominating policy pooled across reward hypotheses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomPiData {
    pub policy: Occupancy,
    /// Sampling weight before normalization.
    pub weighted_value: f64,
    /// Rewards under which the policy is dominating.
    pub optimized_rewards: BTreeSet<RewardIndex>,
    /// Unknown constraints the policy visits, as of sampling time.
    pub violated: BTreeSet<ConstraintId>,
}

pub struct DomPiSamplingAgent {
    agent: JointUncertaintyAgent,
    search: DomPiSearch,
    rng: StdRng,
    object: Option<DomPiData>,
}

impl DomPiSamplingAgent {
    /// Sampling agent; `seed` makes the draws reproducible.
    pub fn new(agent: JointUncertaintyAgent, search: SearchConfig, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            agent,
            search: DomPiSearch::new(search),
            rng,
            object: None,
        }
    }

    /// The currently held object policy, if one was sampled.
    pub fn object(&self) -> Option<&DomPiData> {
        self.object.as_ref()
    }

    /// Every dominating policy under some consistent reward, with its weight.
    pub fn weighted_policies(&self) -> Result<Vec<DomPiData>, SamplerError> {
        let constraints = self.agent.constraints();
        let psi = self.agent.psi();
        let mut pool: Vec<DomPiData> = Vec::new();

        for reward in self.agent.consistent_reward_indices() {
            let overlay =
                FixedRewardOverlay::new(constraints.mdp(), reward).map_err(AgentError::from)?;
            let outcome = self.search.run(&constraints.under(&overlay))?;
            for dom in outcome.dominating {
                let safe = constraints.prob_feats_free(&dom.violated)?;
                let weight = safe * psi[reward.index()] * dom.value;
                match pool.iter_mut().find(|d| d.policy == dom.policy) {
                    Some(existing) => {
                        existing.weighted_value += weight;
                        existing.optimized_rewards.insert(reward);
                    }
                    None => pool.push(DomPiData {
                        policy: dom.policy,
                        weighted_value: weight,
                        optimized_rewards: [reward].into_iter().collect(),
                        violated: dom.violated,
                    }),
                }
            }
        }
        Ok(pool)
    }

    /// Draw one dominating policy in proportion to its weight.
    ///
    /// Falls back to a uniform draw when every weight is zero.
    pub fn sample_dom_pi(&mut self) -> Result<DomPiData, SamplerError> {
        let mut pool = self.weighted_policies()?;
        if pool.is_empty() {
            return Err(SamplerError::NoViablePolicy);
        }
        if let Some(bad) = pool.iter().find(|d| d.weighted_value < 0.0) {
            return Err(SamplerError::NegativeWeight {
                weight: bad.weighted_value,
            });
        }

        let index = if pool.iter().all(|d| d.weighted_value == 0.0) {
            self.rng.random_range(0..pool.len())
        } else {
            let dist = WeightedIndex::new(pool.iter().map(|d| d.weighted_value))
                .map_err(|e| SamplerError::Distribution(e.to_string()))?;
            dist.sample(&mut self.rng)
        };
        debug!(
            candidates = pool.len(),
            index,
            weight = pool[index].weighted_value,
            "dominating policy sampled"
        );
        Ok(pool.swap_remove(index))
    }

    /// False once the object is unreachable or optimizes no consistent reward.
    pub fn object_is_consistent(&self, object: &DomPiData) -> bool {
        let constraints = self.agent.constraints();
        let consistent = self.agent.consistent_reward_indices();
        constraints.known_locked().is_disjoint(&object.violated)
            && !consistent.is_disjoint(&object.optimized_rewards)
    }

    /// Next query derived from the (possibly resampled) object policy.
    pub fn find_query(&mut self) -> Result<Option<Query>, SamplerError> {
        let object = match self.object.take() {
            Some(object) if self.object_is_consistent(&object) => object,
            previous => {
                if previous.is_some() {
                    info!(
                        event = event_names::SAMPLER_RESAMPLED,
                        "object policy ruled out; resampling"
                    );
                }
                self.sample_dom_pi()?
            }
        };
        let query = self.query_for(&object);
        self.object = Some(object);
        query
    }

    fn query_for(&mut self, object: &DomPiData) -> Result<Option<Query>, SamplerError> {
        let unresolved: Vec<ConstraintId> = object
            .violated
            .intersection(self.agent.constraints().unknown())
            .copied()
            .collect();
        if let Some(&feat) = unresolved.choose(&mut self.rng) {
            return Ok(Some(Query::Constraint(feat)));
        }

        let consistent = self.agent.consistent_reward_indices();
        if consistent.is_empty() {
            return Err(AgentError::BeliefCollapse {
                reason: "reward belief has no support".to_string(),
            }
            .into());
        }
        if consistent.len() == 1 {
            return Ok(None);
        }
        let target: BTreeSet<RewardIndex> = object
            .optimized_rewards
            .intersection(&consistent)
            .copied()
            .collect();
        // a set covering the whole support would be answered "yes" for sure
        if target == consistent {
            return Ok(None);
        }
        Ok(Some(Query::Reward(target)))
    }

    pub fn into_inner(self) -> JointUncertaintyAgent {
        self.agent
    }
}

impl QueryAgent for DomPiSamplingAgent {
    fn name(&self) -> &'static str {
        "sampling"
    }

    fn find_query(&mut self) -> Result<Option<Query>, QueryError> {
        Ok(DomPiSamplingAgent::find_query(self)?)
    }

    fn apply_answer(&mut self, query: &Query, answer: Answer) -> Result<(), QueryError> {
        Ok(self.agent.apply_answer(query, answer)?)
    }

    fn joint(&self) -> &JointUncertaintyAgent {
        &self.agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ConstraintQueryAgent, ConstraintSet};
    use crate::oracle::DeterministicPathOracle;
    use crate::test_utils::{fork_agent, fork_mdp};
    use sq_common::StateId;

    fn sampler(
        psi: Vec<f64>,
        probs: [f64; 2],
        known_free: &[usize],
        seed: u64,
    ) -> DomPiSamplingAgent {
        DomPiSamplingAgent::new(
            fork_agent(psi, probs, known_free, 0.0),
            SearchConfig::default(),
            Some(seed),
        )
    }

    fn rewards(ids: &[usize]) -> BTreeSet<RewardIndex> {
        ids.iter().map(|&i| RewardIndex(i)).collect()
    }

    #[test]
    fn test_weights_pool_across_rewards() {
        let agent = sampler(vec![0.5, 0.5], [0.5, 0.5], &[], 0);
        let pool = agent.weighted_policies().unwrap();
        assert_eq!(pool.len(), 3);

        let top = pool.iter().find(|d| d.violated == BTreeSet::from([ConstraintId(0)])).unwrap();
        assert!((top.weighted_value - 0.25).abs() < 1e-12);
        assert_eq!(top.optimized_rewards, rewards(&[0]));

        // the safe route is dominating under both rewards
        let safe = pool.iter().find(|d| d.violated.is_empty()).unwrap();
        assert!((safe.weighted_value - 0.2).abs() < 1e-12);
        assert_eq!(safe.optimized_rewards, rewards(&[0, 1]));
    }

    #[test]
    fn test_zero_probability_routes_never_sampled() {
        // free probability 0 zeroes every risky route; only the safe one has weight
        let mut agent = sampler(vec![0.5, 0.5], [0.0, 0.0], &[], 3);
        let object = agent.sample_dom_pi().unwrap();
        assert!(object.violated.is_empty());
        // the safe route optimizes every consistent reward, so nothing is worth asking
        assert_eq!(agent.find_query().unwrap(), None);
    }

    #[test]
    fn test_reward_query_then_stop() {
        // no unknown constraints: each reward has exactly one dominating route
        let mut agent = sampler(vec![0.5, 0.5], [0.5, 0.5], &[0, 1], 11);
        let query = agent.find_query().unwrap().unwrap();
        let Query::Reward(set) = &query else {
            panic!("expected reward query, got {query}");
        };
        assert_eq!(set.len(), 1);

        // ground truth is r1
        let answer = if set.contains(&RewardIndex(1)) {
            Answer::InSet
        } else {
            Answer::NotInSet
        };
        QueryAgent::apply_answer(&mut agent, &query, answer).unwrap();
        assert_eq!(agent.find_query().unwrap(), None);
        assert_eq!(agent.object().unwrap().optimized_rewards, rewards(&[1]));
    }

    #[test]
    fn test_resamples_after_locked_answer() {
        let mut found = false;
        for seed in 0..32 {
            let mut agent = sampler(vec![1.0, 0.0], [0.5, 0.5], &[], seed);
            let Some(query) = agent.find_query().unwrap() else {
                continue;
            };
            assert_eq!(query, Query::Constraint(ConstraintId(0)));
            found = true;

            QueryAgent::apply_answer(&mut agent, &query, Answer::Locked).unwrap();
            assert!(!agent.object_is_consistent(agent.object().unwrap()));
            // only the safe route is left, and r0 is the only consistent reward
            assert_eq!(agent.find_query().unwrap(), None);
            assert!(agent.object().unwrap().violated.is_empty());
            break;
        }
        assert!(found, "no seed sampled the risky route");
    }

    #[test]
    fn test_no_viable_policy() {
        // goal s1 lies behind a known-locked constraint
        let constraints = ConstraintSet::new(vec![
            [StateId(1)].into_iter().collect(),
            [StateId(2)].into_iter().collect(),
        ])
        .with_free_probs(vec![0.5, 0.5])
        .with_goal_states([StateId(1)].into_iter().collect())
        .with_known_locked([ConstraintId(0)].into_iter().collect());
        let inner = ConstraintQueryAgent::new(
            fork_mdp(vec![0.5, 0.5]),
            DeterministicPathOracle::new(),
            constraints,
        )
        .unwrap();
        let joint = JointUncertaintyAgent::new(inner, 0.0).unwrap();
        let mut agent = DomPiSamplingAgent::new(joint, SearchConfig::default(), Some(1));
        assert_eq!(agent.find_query(), Err(SamplerError::NoViablePolicy));
        assert!(agent.object().is_none());
    }

    #[test]
    fn test_bad_weights_are_internal_errors() {
        use crate::exit_codes::ExitCode;

        for err in [
            SamplerError::NegativeWeight { weight: -0.25 },
            SamplerError::Distribution("all weights zero".into()),
        ] {
            let common: sq_common::Error = err.into();
            assert!(matches!(common, sq_common::Error::Invariant(_)), "{common}");
            assert!(!common.is_recoverable());
            assert_eq!(ExitCode::from_error(&common), ExitCode::InternalError);
        }
    }
}
