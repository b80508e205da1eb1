//! Problem files.
//!
//! A problem file is a JSON description of one MDP, its candidate reward
//! functions and prior, the constraints with their free-probabilities, and
//! optionally the ground truth a simulated session answers from.
//!
//! ```json
//! {
//!   "states": 3, "actions": 1,
//!   "transitions": [{"state": 0, "action": 0, "next": 1}, {"state": 1, "action": 0, "next": 2}],
//!   "initial_state": 0, "terminal_states": [2],
//!   "rewards": [[{"state": 1, "value": 1.0}]],
//!   "constraints": [{"states": [1], "free_prob": 0.5}]
//! }
//! ```

use crate::agent::{AgentError, ConstraintQueryAgent, ConstraintSet, JointUncertaintyAgent};
use crate::mdp::{Mdp, MdpError, Transition};
use crate::oracle::PolicyOracle;
use crate::session::GroundTruth;
use serde::{Deserialize, Serialize};
use sq_common::{ActionId, ConstraintId, StateId};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from loading or validating a problem file.
#[derive(Debug, Error)]
pub enum ProblemError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed problem file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("problem has no reward functions")]
    NoRewards,

    #[error(
        "{states} states x {actions} actions x {rewards} rewards exceeds {max} reward cells",
        max = MAX_REWARD_CELLS
    )]
    TooLarge {
        states: usize,
        actions: usize,
        rewards: usize,
    },

    #[error("reward {reward} entry {entry}: {reason}")]
    InvalidReward {
        reward: usize,
        entry: usize,
        reason: String,
    },

    #[error("free probabilities must be given for all constraints or for none")]
    PartialProbabilities,

    #[error("ground truth: {0}")]
    InvalidTruth(String),

    #[error(transparent)]
    Mdp(#[from] MdpError),

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl From<ProblemError> for sq_common::Error {
    fn from(err: ProblemError) -> Self {
        match err {
            ProblemError::Io { source, .. } => sq_common::Error::Io(source),
            ProblemError::Agent(inner) => inner.into(),
            other => sq_common::Error::InvalidProblem(other.to_string()),
        }
    }
}

/// Upper bound on `states * actions * rewards`, the size of the dense
/// reward tables a problem file expands into.
pub const MAX_REWARD_CELLS: usize = 1 << 22;

fn default_prob() -> f64 {
    1.0
}

fn default_discount() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub state: usize,
    pub action: usize,
    pub next: usize,
    #[serde(default = "default_prob")]
    pub prob: f64,
}

/// One non-zero reward entry. Without `action` it applies to every action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardEntry {
    pub state: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<usize>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintSpec {
    pub states: BTreeSet<StateId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub free_prob: Option<f64>,
}

/// Serialized problem description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProblemSpec {
    pub states: usize,
    pub actions: usize,
    pub transitions: Vec<TransitionSpec>,
    pub initial_state: usize,
    #[serde(default)]
    pub terminal_states: BTreeSet<StateId>,
    #[serde(default = "default_discount")]
    pub discount: f64,
    /// Sparse reward functions, one list of entries per hypothesis.
    pub rewards: Vec<Vec<RewardEntry>>,
    /// Prior over reward functions; uniform when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub psi: Option<Vec<f64>>,
    #[serde(default)]
    pub constraints: Vec<ConstraintSpec>,
    #[serde(default)]
    pub goal_states: BTreeSet<StateId>,
    #[serde(default)]
    pub known_locked: BTreeSet<ConstraintId>,
    #[serde(default)]
    pub known_free: BTreeSet<ConstraintId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truth: Option<GroundTruth>,
}

/// A validated problem.
#[derive(Debug, Clone)]
pub struct Problem {
    pub mdp: Mdp,
    pub constraints: ConstraintSet,
    pub truth: Option<GroundTruth>,
}

impl ProblemSpec {
    pub fn from_json_str(json: &str) -> Result<Self, ProblemError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ProblemError> {
        let content = std::fs::read_to_string(path).map_err(|source| ProblemError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    /// Validate and build the model and constraint inputs.
    pub fn build(&self) -> Result<Problem, ProblemError> {
        if self.rewards.is_empty() {
            return Err(ProblemError::NoRewards);
        }
        let width = self
            .states
            .checked_mul(self.actions)
            .filter(|w| {
                w.checked_mul(self.rewards.len())
                    .is_some_and(|cells| cells <= MAX_REWARD_CELLS)
            })
            .ok_or(ProblemError::TooLarge {
                states: self.states,
                actions: self.actions,
                rewards: self.rewards.len(),
            })?;
        let mut rewards = Vec::with_capacity(self.rewards.len());
        for (reward, entries) in self.rewards.iter().enumerate() {
            let mut dense = vec![0.0; width];
            for (entry, e) in entries.iter().enumerate() {
                let invalid = |reason: String| ProblemError::InvalidReward {
                    reward,
                    entry,
                    reason,
                };
                if e.state >= self.states {
                    return Err(invalid(format!("state {} out of range", e.state)));
                }
                match e.action {
                    Some(a) if a >= self.actions => {
                        return Err(invalid(format!("action {} out of range", a)));
                    }
                    Some(a) => dense[e.state * self.actions + a] = e.value,
                    None => {
                        for a in 0..self.actions {
                            dense[e.state * self.actions + a] = e.value;
                        }
                    }
                }
            }
            rewards.push(dense);
        }

        let psi = match &self.psi {
            Some(psi) => psi.clone(),
            None => vec![1.0 / self.rewards.len() as f64; self.rewards.len()],
        };
        let transitions = self
            .transitions
            .iter()
            .map(|t| Transition {
                state: StateId(t.state),
                action: ActionId(t.action),
                next: StateId(t.next),
                prob: t.prob,
            })
            .collect();
        let mdp = Mdp::new(
            self.states,
            self.actions,
            transitions,
            StateId(self.initial_state),
            self.terminal_states.clone(),
            self.discount,
            rewards,
            psi,
        )?;

        let probs: Vec<Option<f64>> = self.constraints.iter().map(|c| c.free_prob).collect();
        let free_probs = if probs.iter().all(Option::is_some) && !probs.is_empty() {
            Some(probs.into_iter().flatten().collect())
        } else if probs.iter().all(Option::is_none) {
            None
        } else {
            return Err(ProblemError::PartialProbabilities);
        };

        let mut constraints =
            ConstraintSet::new(self.constraints.iter().map(|c| c.states.clone()).collect())
                .with_goal_states(self.goal_states.clone())
                .with_known_locked(self.known_locked.clone())
                .with_known_free(self.known_free.clone());
        if let Some(probs) = free_probs {
            constraints = constraints.with_free_probs(probs);
        }

        if let Some(truth) = &self.truth {
            if truth.reward.index() >= self.rewards.len() {
                return Err(ProblemError::InvalidTruth(format!(
                    "reward {} out of range",
                    truth.reward
                )));
            }
            if let Some(c) = truth.locked.iter().find(|c| c.index() >= self.constraints.len()) {
                return Err(ProblemError::InvalidTruth(format!("constraint {} out of range", c)));
            }
        }

        Ok(Problem {
            mdp,
            constraints,
            truth: self.truth.clone(),
        })
    }
}

impl Problem {
    /// Constraint agent over this problem.
    pub fn constraint_agent(
        self,
        oracle: impl PolicyOracle + 'static,
    ) -> Result<ConstraintQueryAgent, ProblemError> {
        Ok(ConstraintQueryAgent::new(self.mdp, oracle, self.constraints)?)
    }

    /// Joint-uncertainty agent over this problem.
    pub fn joint_agent(
        self,
        oracle: impl PolicyOracle + 'static,
        cost_of_query: f64,
    ) -> Result<JointUncertaintyAgent, ProblemError> {
        let inner = self.constraint_agent(oracle)?;
        Ok(JointUncertaintyAgent::new(inner, cost_of_query)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::DeterministicPathOracle;

    const CORRIDOR: &str = r#"{
        "states": 3, "actions": 1,
        "transitions": [{"state": 0, "action": 0, "next": 1}, {"state": 1, "action": 0, "next": 2}],
        "initial_state": 0, "terminal_states": [2],
        "rewards": [[{"state": 1, "value": 1.0}], [{"state": 0, "action": 0, "value": 0.5}]],
        "constraints": [{"states": [1], "free_prob": 0.5}]
    }"#;

    #[test]
    fn test_build_corridor() {
        let problem = ProblemSpec::from_json_str(CORRIDOR).unwrap().build().unwrap();
        assert_eq!(problem.mdp.num_states(), 3);
        assert_eq!(problem.mdp.psi(), &[0.5, 0.5]);
        assert_eq!(problem.mdp.discount(), 1.0);
        assert!(problem.truth.is_none());

        let agent = problem.constraint_agent(DeterministicPathOracle::new()).unwrap();
        assert_eq!(agent.free_prob(ConstraintId(0)), Ok(0.5));
        assert!(!agent.initial_safe_policy_exists().unwrap());
    }

    #[test]
    fn test_partial_probabilities_rejected() {
        let mut spec = ProblemSpec::from_json_str(CORRIDOR).unwrap();
        spec.constraints.push(ConstraintSpec {
            states: [StateId(2)].into_iter().collect(),
            free_prob: None,
        });
        assert!(matches!(spec.build(), Err(ProblemError::PartialProbabilities)));
    }

    #[test]
    fn test_adversarial_when_no_probabilities() {
        let mut spec = ProblemSpec::from_json_str(CORRIDOR).unwrap();
        spec.constraints[0].free_prob = None;
        let agent = spec
            .build()
            .unwrap()
            .constraint_agent(DeterministicPathOracle::new())
            .unwrap();
        assert!(agent.is_adversarial());
    }

    #[test]
    fn test_reward_entry_out_of_range() {
        let mut spec = ProblemSpec::from_json_str(CORRIDOR).unwrap();
        spec.rewards[0].push(RewardEntry {
            state: 0,
            action: Some(4),
            value: 1.0,
        });
        let err = spec.build().unwrap_err();
        assert!(err.to_string().contains("action 4 out of range"), "{err}");
    }

    #[test]
    fn test_huge_dimensions_are_an_error_not_a_panic() {
        for (states, actions) in [(usize::MAX / 2, 3), (MAX_REWARD_CELLS, 2), (3, usize::MAX)] {
            let mut spec = ProblemSpec::from_json_str(CORRIDOR).unwrap();
            spec.states = states;
            spec.actions = actions;
            let err = spec.build().unwrap_err();
            match &err {
                ProblemError::TooLarge {
                    states: s,
                    actions: a,
                    rewards,
                } => assert_eq!((*s, *a, *rewards), (states, actions, 2)),
                other => panic!("expected TooLarge, got {other}"),
            }
            assert!(matches!(
                sq_common::Error::from(err),
                sq_common::Error::InvalidProblem(_)
            ));
        }
    }

    #[test]
    fn test_largest_allowed_table_still_builds() {
        let mut spec = ProblemSpec::from_json_str(CORRIDOR).unwrap();
        spec.states = MAX_REWARD_CELLS / 2;
        assert!(spec.build().is_ok());
    }

    #[test]
    fn test_truth_validated() {
        let mut spec = ProblemSpec::from_json_str(CORRIDOR).unwrap();
        spec.truth = Some(GroundTruth {
            locked: BTreeSet::new(),
            reward: sq_common::RewardIndex(7),
        });
        assert!(matches!(spec.build(), Err(ProblemError::InvalidTruth(_))));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let json = CORRIDOR.replacen("\"states\": 3", "\"sates\": 3, \"states\": 3", 1);
        assert!(matches!(
            ProblemSpec::from_json_str(&json),
            Err(ProblemError::Parse(_))
        ));
    }

    #[test]
    fn test_bad_discount_surfaces_mdp_error() {
        let mut spec = ProblemSpec::from_json_str(CORRIDOR).unwrap();
        spec.discount = 0.0;
        assert!(matches!(
            spec.build(),
            Err(ProblemError::Mdp(MdpError::InvalidDiscount(_)))
        ));
    }
}
