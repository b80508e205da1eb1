//! Agent under joint reward and constraint uncertainty.
//!
//! Wraps a [`ConstraintQueryAgent`] with the belief ψ over candidate reward
//! functions (stored on the agent's MDP) and the cost of posing a query.
//! The conservative baseline value is the optimum with every unknown
//! constraint enforced under the posterior-mean reward.

use super::{AgentError, ConstraintQueryAgent};
use crate::logging::event_names;
use crate::mdp::MdpView;
use crate::oracle::Solution;
use crate::policy::Occupancy;
use sq_common::{Answer, ConstraintId, Query, RewardIndex};
use sq_config::QueryConfig;
use sq_math::{consistent_indices, restrict_to, BeliefError};
use std::collections::BTreeSet;
use tracing::debug;

pub struct JointUncertaintyAgent {
    inner: ConstraintQueryAgent,
    cost_of_query: f64,
}

impl JointUncertaintyAgent {
    pub fn new(inner: ConstraintQueryAgent, cost_of_query: f64) -> Result<Self, AgentError> {
        if !cost_of_query.is_finite() || cost_of_query < 0.0 {
            return Err(AgentError::InvalidCost(cost_of_query));
        }
        Ok(Self {
            inner,
            cost_of_query,
        })
    }

    pub fn from_config(
        inner: ConstraintQueryAgent,
        config: &QueryConfig,
    ) -> Result<Self, AgentError> {
        Self::new(inner, config.cost_of_query)
    }

    pub fn constraints(&self) -> &ConstraintQueryAgent {
        &self.inner
    }

    pub fn cost_of_query(&self) -> f64 {
        self.cost_of_query
    }

    pub fn psi(&self) -> &[f64] {
        self.inner.mdp().psi()
    }

    /// Resolve at most one constraint as free and at most one as locked.
    ///
    /// Both indices are checked before anything changes, so a failed call
    /// leaves the partition untouched.
    pub fn update_feats(
        &mut self,
        new_free: Option<ConstraintId>,
        new_locked: Option<ConstraintId>,
    ) -> Result<(), AgentError> {
        for index in new_free.iter().chain(new_locked.iter()) {
            if !self.inner.unknown().contains(index) {
                return Err(AgentError::NotUnknown { index: *index });
            }
        }
        if let (Some(free), Some(locked)) = (new_free, new_locked) {
            if free == locked {
                return Err(AgentError::InvalidConstraint {
                    index: free,
                    reason: "cannot be resolved both free and locked".to_string(),
                });
            }
        }
        if let Some(index) = new_free {
            self.inner.resolve(index, false)?;
        }
        if let Some(index) = new_locked {
            self.inner.resolve(index, true)?;
        }
        Ok(())
    }

    /// Condition ψ on the true reward lying in `consistent`.
    pub fn update_reward(&mut self, consistent: &BTreeSet<RewardIndex>) -> Result<(), AgentError> {
        let psi = Self::update_reward_distribution(consistent, self.psi())?;
        self.inner.mdp_mut().update_psi(psi)?;
        debug!(
            event = event_names::BELIEF_UPDATED,
            support = self.consistent_reward_indices().len(),
            "reward belief updated"
        );
        Ok(())
    }

    /// ψ with zero mass outside `consistent`, renormalized.
    pub fn update_reward_distribution(
        consistent: &BTreeSet<RewardIndex>,
        psi: &[f64],
    ) -> Result<Vec<f64>, AgentError> {
        let keep: Vec<usize> = consistent.iter().map(|r| r.index()).collect();
        restrict_to(psi, &keep).map_err(|e| match e {
            BeliefError::EmptySupport => AgentError::BeliefCollapse {
                reason: "no reward hypothesis with positive mass remains".to_string(),
            },
            other => AgentError::Belief(other),
        })
    }

    /// Reward hypotheses with positive mass.
    pub fn consistent_reward_indices(&self) -> BTreeSet<RewardIndex> {
        consistent_indices(self.psi())
            .into_iter()
            .map(RewardIndex)
            .collect()
    }

    /// Optimal value with every unknown constraint enforced.
    pub fn current_safely_opt_pi_value(&self) -> Result<f64, AgentError> {
        self.safely_opt_value_under(self.inner.mdp())
    }

    /// Safely-optimal value under an arbitrary view of the model.
    pub fn safely_opt_value_under(&self, view: &dyn MdpView) -> Result<f64, AgentError> {
        self.inner
            .find_constrained_opt_pi_in(self.inner.unknown(), true, view)?
            .obj()
            .ok_or(AgentError::NoSafePolicy)
    }

    /// Safely-optimal policy and its value under the current belief.
    pub fn current_safely_opt_pi(&self) -> Result<(f64, Occupancy), AgentError> {
        match self.inner.find_constrained_opt_pi(self.inner.unknown(), true)? {
            Solution::Feasible { obj, pi } => Ok((obj, pi)),
            Solution::Infeasible => Err(AgentError::NoSafePolicy),
        }
    }

    /// Fold a query answer into the agent's state.
    pub fn apply_answer(&mut self, query: &Query, answer: Answer) -> Result<(), AgentError> {
        match (query, answer) {
            (Query::Constraint(index), Answer::Free) => self.update_feats(Some(*index), None),
            (Query::Constraint(index), Answer::Locked) => self.update_feats(None, Some(*index)),
            (Query::Reward(set), Answer::InSet) => self.update_reward(set),
            (Query::Reward(set), Answer::NotInSet) => {
                let complement = (0..self.psi().len())
                    .map(RewardIndex)
                    .filter(|r| !set.contains(r))
                    .collect();
                self.update_reward(&complement)
            }
            _ => Err(AgentError::MismatchedAnswer {
                query: query.clone(),
                answer,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ConstraintSet;
    use crate::mdp::{Mdp, Transition};
    use crate::oracle::DeterministicPathOracle;
    use sq_common::{ActionId, StateId};

    /// s0 -a0-> s1 -> s2 (terminal), s0 -a1-> s3 -> s2.
    /// r0 pays 1 at s1, r1 pays 1 at s3. Constraint 0 covers s1, 1 covers s3.
    fn joint(psi: Vec<f64>) -> JointUncertaintyAgent {
        let t = |s, a, n| Transition {
            state: StateId(s),
            action: ActionId(a),
            next: StateId(n),
            prob: 1.0,
        };
        let mut r0 = vec![0.0; 8];
        r0[2] = 1.0;
        let mut r1 = vec![0.0; 8];
        r1[6] = 1.0;
        let mdp = Mdp::new(
            4,
            2,
            vec![t(0, 0, 1), t(0, 1, 3), t(1, 0, 2), t(3, 0, 2)],
            StateId(0),
            [StateId(2)].into_iter().collect(),
            1.0,
            vec![r0, r1],
            psi,
        )
        .unwrap();
        let constraints = ConstraintSet::new(vec![
            [StateId(1)].into_iter().collect(),
            [StateId(3)].into_iter().collect(),
        ])
        .with_free_probs(vec![0.5, 0.5]);
        let inner =
            ConstraintQueryAgent::new(mdp, DeterministicPathOracle::new(), constraints).unwrap();
        JointUncertaintyAgent::new(inner, 0.1).unwrap()
    }

    fn rewards(ids: &[usize]) -> BTreeSet<RewardIndex> {
        ids.iter().map(|&i| RewardIndex(i)).collect()
    }

    #[test]
    fn test_update_feats_moves_constraint() {
        let mut agent = joint(vec![0.5, 0.5]);
        agent.update_feats(Some(ConstraintId(0)), None).unwrap();
        assert!(agent.constraints().known_free().contains(&ConstraintId(0)));
        assert_eq!(agent.constraints().unknown().len(), 1);

        let err = agent.update_feats(Some(ConstraintId(0)), None).unwrap_err();
        assert_eq!(err, AgentError::NotUnknown { index: ConstraintId(0) });
    }

    #[test]
    fn test_update_feats_is_atomic() {
        let mut agent = joint(vec![0.5, 0.5]);
        agent.update_feats(None, Some(ConstraintId(1))).unwrap();
        // 0 is unknown, 1 is not: nothing may change
        assert!(agent
            .update_feats(Some(ConstraintId(0)), Some(ConstraintId(1)))
            .is_err());
        assert!(agent.constraints().unknown().contains(&ConstraintId(0)));
    }

    #[test]
    fn test_update_reward_normalizes() {
        let mut agent = joint(vec![0.25, 0.75]);
        agent.update_reward(&rewards(&[0])).unwrap();
        assert_eq!(agent.psi(), &[1.0, 0.0]);
        assert_eq!(agent.consistent_reward_indices(), rewards(&[0]));
    }

    #[test]
    fn test_update_reward_rejects_collapse() {
        let mut agent = joint(vec![1.0, 0.0]);
        let err = agent.update_reward(&rewards(&[1])).unwrap_err();
        assert!(matches!(err, AgentError::BeliefCollapse { .. }));
        // belief untouched on failure
        assert_eq!(agent.psi(), &[1.0, 0.0]);
    }

    #[test]
    fn test_safely_opt_value() {
        let mut agent = joint(vec![0.5, 0.5]);
        // both unknown constraints block the only two routes
        assert_eq!(
            agent.current_safely_opt_pi_value(),
            Err(AgentError::NoSafePolicy)
        );
        agent.update_feats(Some(ConstraintId(1)), None).unwrap();
        assert_eq!(agent.current_safely_opt_pi_value(), Ok(0.5));
        let (value, pi) = agent.current_safely_opt_pi().unwrap();
        assert_eq!(value, 0.5);
        assert!(pi.get(StateId(3), ActionId(0)) > 0.0);
    }

    #[test]
    fn test_apply_answer() {
        let mut agent = joint(vec![0.5, 0.5]);
        let query = Query::Reward(rewards(&[0]));
        agent.apply_answer(&query, Answer::NotInSet).unwrap();
        assert_eq!(agent.consistent_reward_indices(), rewards(&[1]));

        let query = Query::Constraint(ConstraintId(0));
        agent.apply_answer(&query, Answer::Locked).unwrap();
        assert!(agent.constraints().known_locked().contains(&ConstraintId(0)));

        assert!(matches!(
            agent.apply_answer(&query, Answer::InSet),
            Err(AgentError::MismatchedAnswer { .. })
        ));
    }

    #[test]
    fn test_rejects_negative_cost() {
        let agent = joint(vec![1.0, 0.0]);
        let inner = agent.inner;
        assert!(matches!(
            JointUncertaintyAgent::new(inner, -1.0),
            Err(AgentError::InvalidCost(_))
        ));
    }
}
