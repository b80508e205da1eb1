//! Constraint query agent.
//!
//! Owns the partition of constraint indices into known-locked, known-free and
//! unknown, turns a set of enforced constraints into zero-visitation pairs,
//! and hands the resulting problem to the policy oracle.

use super::AgentError;
use crate::logging::event_names;
use crate::mdp::{Mdp, MdpView};
use crate::oracle::{OracleProblem, PairSet, PolicyOracle, Solution};
use crate::policy::Occupancy;
use sq_common::{ConstraintId, StateId};
use sq_math::{prob_all_false, prob_all_true};
use std::collections::BTreeSet;
use tracing::debug;

/// Constraint model handed to an agent at construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConstraintSet {
    /// States touched by each constraint, indexed by constraint.
    pub states: Vec<BTreeSet<StateId>>,
    /// Marginal probability that each constraint is free. `None` is the
    /// adversarial setting: every probability helper then fails.
    pub free_probs: Option<Vec<f64>>,
    /// States that must be visited; expanded over all actions.
    pub goal_states: BTreeSet<StateId>,
    pub known_locked: BTreeSet<ConstraintId>,
    pub known_free: BTreeSet<ConstraintId>,
}

impl ConstraintSet {
    pub fn new(states: Vec<BTreeSet<StateId>>) -> Self {
        Self {
            states,
            ..Self::default()
        }
    }

    pub fn with_free_probs(mut self, probs: Vec<f64>) -> Self {
        self.free_probs = Some(probs);
        self
    }

    pub fn with_goal_states(mut self, goal_states: BTreeSet<StateId>) -> Self {
        self.goal_states = goal_states;
        self
    }

    pub fn with_known_locked(mut self, locked: BTreeSet<ConstraintId>) -> Self {
        self.known_locked = locked;
        self
    }

    pub fn with_known_free(mut self, free: BTreeSet<ConstraintId>) -> Self {
        self.known_free = free;
        self
    }
}

/// What the dominating-policy search needs from an agent.
pub trait ConstraintSolver {
    /// Constraints whose status is still open.
    fn unknown(&self) -> &BTreeSet<ConstraintId>;

    /// Solve with `active` plus every known-locked constraint enforced.
    fn solve_enforcing(&self, active: &BTreeSet<ConstraintId>) -> Result<Solution, AgentError>;

    /// Unknown constraints whose states the policy visits.
    fn violated_constraints(&self, pi: &Occupancy) -> BTreeSet<ConstraintId>;

    /// Value of a policy under the reward this solver optimizes.
    fn value_of(&self, pi: &Occupancy) -> f64;
}

/// Agent answering feasibility queries for constraint subsets.
pub struct ConstraintQueryAgent {
    mdp: Mdp,
    oracle: Box<dyn PolicyOracle>,
    constraint_states: Vec<BTreeSet<StateId>>,
    free_probs: Option<Vec<f64>>,
    goal: PairSet,
    known_locked: BTreeSet<ConstraintId>,
    known_free: BTreeSet<ConstraintId>,
    unknown: BTreeSet<ConstraintId>,
}

impl ConstraintQueryAgent {
    pub fn new(
        mdp: Mdp,
        oracle: impl PolicyOracle + 'static,
        constraints: ConstraintSet,
    ) -> Result<Self, AgentError> {
        let count = constraints.states.len();
        for (index, states) in constraints.states.iter().enumerate() {
            if let Some(&state) = states.iter().find(|s| s.index() >= mdp.num_states()) {
                return Err(AgentError::InvalidConstraint {
                    index: ConstraintId(index),
                    reason: format!("state {} out of range", state),
                });
            }
        }
        if let Some(probs) = &constraints.free_probs {
            if probs.len() != count {
                return Err(AgentError::ProbabilityShape {
                    len: probs.len(),
                    expected: count,
                });
            }
            if let Some((index, &value)) = probs
                .iter()
                .enumerate()
                .find(|(_, p)| !(0.0..=1.0).contains(*p))
            {
                return Err(AgentError::InvalidProbability {
                    index: ConstraintId(index),
                    value,
                });
            }
        }
        if let Some(&state) = constraints
            .goal_states
            .iter()
            .find(|s| s.index() >= mdp.num_states())
        {
            return Err(AgentError::InvalidGoal(state));
        }
        for &index in constraints.known_locked.iter().chain(&constraints.known_free) {
            if index.index() >= count {
                return Err(AgentError::InvalidConstraint {
                    index,
                    reason: "index out of range".to_string(),
                });
            }
        }
        if let Some(&index) = constraints
            .known_locked
            .intersection(&constraints.known_free)
            .next()
        {
            return Err(AgentError::InvalidConstraint {
                index,
                reason: "listed as both locked and free".to_string(),
            });
        }

        let goal = constraints
            .goal_states
            .iter()
            .flat_map(|&s| mdp.actions().map(move |a| (s, a)))
            .collect();
        let unknown = (0..count)
            .map(ConstraintId)
            .filter(|c| {
                !constraints.known_locked.contains(c) && !constraints.known_free.contains(c)
            })
            .collect();

        Ok(Self {
            mdp,
            oracle: Box::new(oracle),
            constraint_states: constraints.states,
            free_probs: constraints.free_probs,
            goal,
            known_locked: constraints.known_locked,
            known_free: constraints.known_free,
            unknown,
        })
    }

    pub fn mdp(&self) -> &Mdp {
        &self.mdp
    }

    pub(crate) fn mdp_mut(&mut self) -> &mut Mdp {
        &mut self.mdp
    }

    pub fn num_constraints(&self) -> usize {
        self.constraint_states.len()
    }

    pub fn unknown(&self) -> &BTreeSet<ConstraintId> {
        &self.unknown
    }

    pub fn known_locked(&self) -> &BTreeSet<ConstraintId> {
        &self.known_locked
    }

    pub fn known_free(&self) -> &BTreeSet<ConstraintId> {
        &self.known_free
    }

    pub fn goal_pairs(&self) -> &PairSet {
        &self.goal
    }

    pub fn constraint_states(&self, index: ConstraintId) -> Option<&BTreeSet<StateId>> {
        self.constraint_states.get(index.index())
    }

    /// True when no probabilities were given.
    pub fn is_adversarial(&self) -> bool {
        self.free_probs.is_none()
    }

    /// Marginal probability that `index` is free.
    pub fn free_prob(&self, index: ConstraintId) -> Result<f64, AgentError> {
        self.free_probs
            .as_ref()
            .and_then(|p| p.get(index.index()))
            .copied()
            .ok_or(AgentError::MissingProbability { index })
    }

    /// Whether enforcing every unknown constraint still admits a policy.
    pub fn initial_safe_policy_exists(&self) -> Result<bool, AgentError> {
        Ok(self.find_constrained_opt_pi(&self.unknown, true)?.is_feasible())
    }

    /// Optimal policy with `active` enforced, under the agent's own model.
    pub fn find_constrained_opt_pi(
        &self,
        active: &BTreeSet<ConstraintId>,
        add_known_locked: bool,
    ) -> Result<Solution, AgentError> {
        self.find_constrained_opt_pi_in(active, add_known_locked, &self.mdp)
    }

    /// Optimal policy with `active` enforced, under an arbitrary view of the
    /// model (e.g. a hypothetical belief).
    ///
    /// With `add_known_locked`, `active` may only name unknown constraints and
    /// the known-locked ones are added. Without it, `active` may also name
    /// known-locked constraints. Known-free constraints are never enforceable.
    pub fn find_constrained_opt_pi_in(
        &self,
        active: &BTreeSet<ConstraintId>,
        add_known_locked: bool,
        mdp: &dyn MdpView,
    ) -> Result<Solution, AgentError> {
        for &index in active {
            let allowed = self.unknown.contains(&index)
                || (!add_known_locked && self.known_locked.contains(&index));
            if !allowed {
                return Err(AgentError::NotUnknown { index });
            }
        }

        let zero = if add_known_locked {
            self.zero_pairs(active.iter().chain(&self.known_locked))
        } else {
            self.zero_pairs(active)
        };
        let solution = self.oracle.solve(&OracleProblem {
            mdp,
            zero: &zero,
            positive: &self.goal,
        })?;
        Ok(solution)
    }

    /// `(state, action)` pairs forbidden when `constraints` are locked.
    pub fn zero_pairs<'c, I>(&self, constraints: I) -> PairSet
    where
        I: IntoIterator<Item = &'c ConstraintId>,
    {
        let mut pairs = PairSet::new();
        for index in constraints {
            if let Some(states) = self.constraint_states.get(index.index()) {
                for &s in states {
                    pairs.extend(self.mdp.actions().map(|a| (s, a)));
                }
            }
        }
        pairs
    }

    /// Unknown constraints whose state set the policy visits.
    pub fn find_violated_constraints(&self, pi: &Occupancy) -> BTreeSet<ConstraintId> {
        self.unknown
            .iter()
            .copied()
            .filter(|c| pi.touches(&self.constraint_states[c.index()]))
            .collect()
    }

    /// True if the policy visits none of `constraints`' states among the unknown.
    pub fn pi_satisfies_cons(&self, pi: &Occupancy, constraints: &BTreeSet<ConstraintId>) -> bool {
        self.find_violated_constraints(pi).is_disjoint(constraints)
    }

    /// Value of the policy under the agent's current reward.
    pub fn compute_value(&self, pi: &Occupancy) -> f64 {
        pi.value(&self.mdp)
    }

    /// Probability that every constraint in `feats` is free.
    pub fn prob_feats_free(&self, feats: &BTreeSet<ConstraintId>) -> Result<f64, AgentError> {
        let probs = self.probs_for(feats)?;
        prob_all_true(probs).map_err(|e| AgentError::Probability(e.to_string()))
    }

    /// Probability that every constraint in `feats` is locked.
    pub fn prob_feats_locked(&self, feats: &BTreeSet<ConstraintId>) -> Result<f64, AgentError> {
        let probs = self.probs_for(feats)?;
        prob_all_false(probs).map_err(|e| AgentError::Probability(e.to_string()))
    }

    fn probs_for(&self, feats: &BTreeSet<ConstraintId>) -> Result<Vec<f64>, AgentError> {
        feats.iter().map(|&f| self.free_prob(f)).collect()
    }

    /// Move an unknown constraint into a known set. Resolutions never revert.
    pub(crate) fn resolve(&mut self, index: ConstraintId, locked: bool) -> Result<(), AgentError> {
        if !self.unknown.remove(&index) {
            return Err(AgentError::NotUnknown { index });
        }
        if locked {
            self.known_locked.insert(index);
        } else {
            self.known_free.insert(index);
        }
        debug!(
            event = event_names::CONSTRAINT_RESOLVED,
            constraint = %index,
            locked,
            remaining = self.unknown.len(),
            "constraint resolved"
        );
        Ok(())
    }

    /// View this agent through a different reward model.
    pub fn under<'a>(&'a self, view: &'a dyn MdpView) -> AgentUnderView<'a> {
        AgentUnderView { agent: self, view }
    }
}

impl ConstraintSolver for ConstraintQueryAgent {
    fn unknown(&self) -> &BTreeSet<ConstraintId> {
        &self.unknown
    }

    fn solve_enforcing(&self, active: &BTreeSet<ConstraintId>) -> Result<Solution, AgentError> {
        self.find_constrained_opt_pi(active, true)
    }

    fn violated_constraints(&self, pi: &Occupancy) -> BTreeSet<ConstraintId> {
        self.find_violated_constraints(pi)
    }

    fn value_of(&self, pi: &Occupancy) -> f64 {
        self.compute_value(pi)
    }
}

/// An agent paired with an overriding model view.
#[derive(Clone, Copy)]
pub struct AgentUnderView<'a> {
    agent: &'a ConstraintQueryAgent,
    view: &'a dyn MdpView,
}

impl ConstraintSolver for AgentUnderView<'_> {
    fn unknown(&self) -> &BTreeSet<ConstraintId> {
        self.agent.unknown()
    }

    fn solve_enforcing(&self, active: &BTreeSet<ConstraintId>) -> Result<Solution, AgentError> {
        self.agent.find_constrained_opt_pi_in(active, true, self.view)
    }

    fn violated_constraints(&self, pi: &Occupancy) -> BTreeSet<ConstraintId> {
        self.agent.find_violated_constraints(pi)
    }

    fn value_of(&self, pi: &Occupancy) -> f64 {
        pi.value(self.view)
    }
}
