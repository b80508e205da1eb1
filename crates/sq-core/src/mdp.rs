//! Finite MDP model with a family of candidate reward functions.
//!
//! The model is immutable apart from two hooks: [`Mdp::set_reward`] pins
//! which reward function is active, and [`Mdp::update_psi`] replaces the
//! belief over reward functions. Hypothetical posteriors are evaluated through
//! read-only overlays ([`BeliefOverlay`], [`FixedRewardOverlay`]) that borrow
//! the base model and override only the reward side.

use serde::{Deserialize, Serialize};
use sq_common::{ActionId, RewardIndex, StateId};
use sq_math::{is_normalized, stable_sum, BeliefError};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised while building or updating an MDP.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MdpError {
    #[error("MDP must have at least one state and one action")]
    Empty,

    #[error("state {0} out of range")]
    StateOutOfRange(StateId),

    #[error("action {0} out of range")]
    ActionOutOfRange(ActionId),

    #[error("transition ({state}, {action}) -> {next} has invalid probability {prob}")]
    InvalidTransition {
        state: StateId,
        action: ActionId,
        next: StateId,
        prob: f64,
    },

    #[error("{states} states x {actions} actions overflows the reward table")]
    TooLarge { states: usize, actions: usize },

    #[error("discount {0} must lie in (0, 1]")]
    InvalidDiscount(f64),

    #[error("reward function {index} has {len} entries, expected {expected}")]
    RewardShape {
        index: usize,
        len: usize,
        expected: usize,
    },

    #[error("reward function {index} contains a non-finite value")]
    NonFiniteReward { index: usize },

    #[error("reward index {0} out of range")]
    RewardOutOfRange(RewardIndex),

    #[error("belief has {len} entries for {expected} reward functions")]
    BeliefShape { len: usize, expected: usize },

    #[error("belief over reward functions is not normalized")]
    BeliefNotNormalized,

    #[error(transparent)]
    Belief(#[from] BeliefError),
}

/// One entry of the sparse transition model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: StateId,
    pub action: ActionId,
    pub next: StateId,
    pub prob: f64,
}

/// Which reward the model reports through [`MdpView::reward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "index")]
pub enum ActiveReward {
    /// Expectation of the reward family under ψ.
    #[default]
    Mean,
    /// One reward function, regardless of ψ.
    Fixed(RewardIndex),
}

/// Finite MDP with an indexed family of reward functions and a belief ψ.
#[derive(Debug, Clone, PartialEq)]
pub struct Mdp {
    num_states: usize,
    num_actions: usize,
    successors: BTreeMap<(StateId, ActionId), Vec<(StateId, f64)>>,
    initial: StateId,
    terminal: BTreeSet<StateId>,
    discount: f64,
    /// Row-major `[state * num_actions + action]` per reward function.
    rewards: Vec<Vec<f64>>,
    psi: Vec<f64>,
    active: ActiveReward,
}

impl Mdp {
    /// Build and validate an MDP.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        num_states: usize,
        num_actions: usize,
        transitions: Vec<Transition>,
        initial: StateId,
        terminal: BTreeSet<StateId>,
        discount: f64,
        rewards: Vec<Vec<f64>>,
        psi: Vec<f64>,
    ) -> Result<Self, MdpError> {
        if num_states == 0 || num_actions == 0 {
            return Err(MdpError::Empty);
        }
        if !(discount > 0.0 && discount <= 1.0) {
            return Err(MdpError::InvalidDiscount(discount));
        }
        let check_state = |s: StateId| {
            if s.index() < num_states {
                Ok(())
            } else {
                Err(MdpError::StateOutOfRange(s))
            }
        };
        check_state(initial)?;
        for &s in &terminal {
            check_state(s)?;
        }

        let mut successors: BTreeMap<(StateId, ActionId), Vec<(StateId, f64)>> = BTreeMap::new();
        for t in transitions {
            check_state(t.state)?;
            check_state(t.next)?;
            if t.action.index() >= num_actions {
                return Err(MdpError::ActionOutOfRange(t.action));
            }
            if !(t.prob > 0.0 && t.prob <= 1.0) {
                return Err(MdpError::InvalidTransition {
                    state: t.state,
                    action: t.action,
                    next: t.next,
                    prob: t.prob,
                });
            }
            successors
                .entry((t.state, t.action))
                .or_default()
                .push((t.next, t.prob));
        }

        let expected = num_states
            .checked_mul(num_actions)
            .ok_or(MdpError::TooLarge {
                states: num_states,
                actions: num_actions,
            })?;
        for (index, r) in rewards.iter().enumerate() {
            if r.len() != expected {
                return Err(MdpError::RewardShape {
                    index,
                    len: r.len(),
                    expected,
                });
            }
            if r.iter().any(|v| !v.is_finite()) {
                return Err(MdpError::NonFiniteReward { index });
            }
        }

        let mut mdp = Self {
            num_states,
            num_actions,
            successors,
            initial,
            terminal,
            discount,
            rewards,
            psi: Vec::new(),
            active: ActiveReward::Mean,
        };
        mdp.update_psi(psi)?;
        Ok(mdp)
    }

    pub fn num_states(&self) -> usize {
        self.num_states
    }

    pub fn num_actions(&self) -> usize {
        self.num_actions
    }

    pub fn states(&self) -> impl Iterator<Item = StateId> {
        (0..self.num_states).map(StateId)
    }

    pub fn actions(&self) -> impl Iterator<Item = ActionId> {
        (0..self.num_actions).map(ActionId)
    }

    pub fn initial_state(&self) -> StateId {
        self.initial
    }

    pub fn is_terminal(&self, state: StateId) -> bool {
        self.terminal.contains(&state)
    }

    pub fn discount(&self) -> f64 {
        self.discount
    }

    /// Successor distribution for `(state, action)`; empty if the action is
    /// unavailable there.
    pub fn successors(&self, state: StateId, action: ActionId) -> &[(StateId, f64)] {
        self.successors
            .get(&(state, action))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn num_rewards(&self) -> usize {
        self.rewards.len()
    }

    pub fn psi(&self) -> &[f64] {
        &self.psi
    }

    pub fn active_reward(&self) -> ActiveReward {
        self.active
    }

    /// Reward of one candidate function at `(state, action)`.
    pub fn reward_of(&self, index: RewardIndex, state: StateId, action: ActionId) -> f64 {
        self.rewards
            .get(index.index())
            .and_then(|r| {
                if state.index() >= self.num_states || action.index() >= self.num_actions {
                    return None;
                }
                r.get(state.index() * self.num_actions + action.index())
            })
            .copied()
            .unwrap_or(0.0)
    }

    /// Expected reward at `(state, action)` under an arbitrary belief.
    pub fn mean_reward(&self, psi: &[f64], state: StateId, action: ActionId) -> f64 {
        stable_sum(
            psi.iter()
                .enumerate()
                .filter(|(_, &p)| p > 0.0)
                .map(|(i, &p)| p * self.reward_of(RewardIndex(i), state, action)),
        )
    }

    /// Pin the active reward function.
    pub fn set_reward(&mut self, active: ActiveReward) -> Result<(), MdpError> {
        if let ActiveReward::Fixed(index) = active {
            if index.index() >= self.rewards.len() {
                return Err(MdpError::RewardOutOfRange(index));
            }
        }
        self.active = active;
        Ok(())
    }

    /// Replace ψ. The new belief must match the reward family and be normalized.
    pub fn update_psi(&mut self, psi: Vec<f64>) -> Result<(), MdpError> {
        if psi.len() != self.rewards.len() {
            return Err(MdpError::BeliefShape {
                len: psi.len(),
                expected: self.rewards.len(),
            });
        }
        if !is_normalized(&psi) {
            return Err(MdpError::BeliefNotNormalized);
        }
        self.psi = psi;
        Ok(())
    }
}

/// Read access to an MDP as seen by the policy oracle.
///
/// Structure always comes from the base model; implementors decide which
/// reward vector is in force.
pub trait MdpView {
    fn model(&self) -> &Mdp;

    fn reward(&self, state: StateId, action: ActionId) -> f64;
}

impl MdpView for Mdp {
    fn model(&self) -> &Mdp {
        self
    }

    fn reward(&self, state: StateId, action: ActionId) -> f64 {
        match self.active {
            ActiveReward::Mean => self.mean_reward(&self.psi, state, action),
            ActiveReward::Fixed(index) => self.reward_of(index, state, action),
        }
    }
}

/// The base model under a hypothetical belief.
#[derive(Debug, Clone, Copy)]
pub struct BeliefOverlay<'a> {
    base: &'a Mdp,
    psi: &'a [f64],
}

impl<'a> BeliefOverlay<'a> {
    pub fn new(base: &'a Mdp, psi: &'a [f64]) -> Self {
        Self { base, psi }
    }

    pub fn psi(&self) -> &[f64] {
        self.psi
    }
}

impl MdpView for BeliefOverlay<'_> {
    fn model(&self) -> &Mdp {
        self.base
    }

    fn reward(&self, state: StateId, action: ActionId) -> f64 {
        self.base.mean_reward(self.psi, state, action)
    }
}

/// The base model with one reward function known to be true.
#[derive(Debug, Clone, Copy)]
pub struct FixedRewardOverlay<'a> {
    base: &'a Mdp,
    index: RewardIndex,
}

impl<'a> FixedRewardOverlay<'a> {
    pub fn new(base: &'a Mdp, index: RewardIndex) -> Result<Self, MdpError> {
        if index.index() >= base.num_rewards() {
            return Err(MdpError::RewardOutOfRange(index));
        }
        Ok(Self { base, index })
    }

    pub fn reward_index(&self) -> RewardIndex {
        self.index
    }
}

impl MdpView for FixedRewardOverlay<'_> {
    fn model(&self) -> &Mdp {
        self.base
    }

    fn reward(&self, state: StateId, action: ActionId) -> f64 {
        self.base.reward_of(self.index, state, action)
    }
}
