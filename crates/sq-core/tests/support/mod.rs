//! Shared fixtures for sq-core integration tests.
#![allow(dead_code)]

use sq_common::{ActionId, ConstraintId, RewardIndex, StateId};
use sq_core::agent::{ConstraintQueryAgent, ConstraintSet, JointUncertaintyAgent};
use sq_core::mdp::{Mdp, Transition};
use sq_core::oracle::DeterministicPathOracle;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const START: usize = 0;
pub const TERMINAL: usize = 1;

/// One route from the start state to the terminal.
#[derive(Debug, Clone)]
pub struct Route {
    /// Intermediate states on the route; must be at least one.
    pub len: usize,
    /// Reward each hypothesis pays on the route's first state.
    pub payoffs: Vec<f64>,
}

impl Route {
    pub fn new(len: usize, payoffs: &[f64]) -> Self {
        Self {
            len,
            payoffs: payoffs.to_vec(),
        }
    }
}

/// Parallel routes from state 0 to the terminal state 1.
///
/// Route `i` is entered with action `i` from the start state and then follows
/// action 0 through its own states.
#[derive(Debug, Clone)]
pub struct RouteWorld {
    pub mdp: Mdp,
    /// States of each route, in visiting order.
    pub route_states: Vec<Vec<StateId>>,
}

impl RouteWorld {
    pub fn new(routes: &[Route], psi: Vec<f64>) -> Self {
        let actions = routes.len().max(1);
        let num_states = 2 + routes.iter().map(|r| r.len).sum::<usize>();
        let mut rewards = vec![vec![0.0; num_states * actions]; psi.len()];
        let mut transitions = Vec::new();
        let mut route_states = Vec::new();

        let mut next_state = 2;
        for (i, route) in routes.iter().enumerate() {
            assert!(route.len > 0, "route {i} has no states");
            let states: Vec<StateId> = (next_state..next_state + route.len).map(StateId).collect();
            next_state += route.len;

            transitions.push(step(START, i, states[0].index()));
            for pair in states.windows(2) {
                transitions.push(step(pair[0].index(), 0, pair[1].index()));
            }
            transitions.push(step(states[route.len - 1].index(), 0, TERMINAL));

            for (reward, payoff) in rewards.iter_mut().zip(&route.payoffs) {
                reward[states[0].index() * actions] = *payoff;
            }
            route_states.push(states);
        }

        let mdp = Mdp::new(
            num_states,
            actions,
            transitions,
            StateId(START),
            [StateId(TERMINAL)].into_iter().collect(),
            1.0,
            rewards,
            psi,
        )
        .expect("route world is a valid MDP");
        Self { mdp, route_states }
    }

    /// Every non-start, non-terminal state, in index order.
    pub fn inner_states(&self) -> Vec<StateId> {
        self.route_states.iter().flatten().copied().collect()
    }
}

pub fn step(state: usize, action: usize, next: usize) -> Transition {
    Transition {
        state: StateId(state),
        action: ActionId(action),
        next: StateId(next),
        prob: 1.0,
    }
}

pub fn ids(raw: &[usize]) -> BTreeSet<ConstraintId> {
    raw.iter().map(|&i| ConstraintId(i)).collect()
}

pub fn rewards(raw: &[usize]) -> BTreeSet<RewardIndex> {
    raw.iter().map(|&i| RewardIndex(i)).collect()
}

pub fn states(raw: &[usize]) -> BTreeSet<StateId> {
    raw.iter().map(|&i| StateId(i)).collect()
}

pub fn constraint_agent(mdp: Mdp, constraints: ConstraintSet) -> ConstraintQueryAgent {
    ConstraintQueryAgent::new(mdp, DeterministicPathOracle::new(), constraints)
        .expect("constraints are valid")
}

pub fn joint_agent(mdp: Mdp, constraints: ConstraintSet, cost: f64) -> JointUncertaintyAgent {
    JointUncertaintyAgent::new(constraint_agent(mdp, constraints), cost).expect("cost is valid")
}

/// Three routes from s0 to the terminal s3 with two constraints and two
/// reward hypotheses; the ground truth says reward 1 and nothing locked.
///
/// ```text
/// a0: s0 -> s1 -> s3   (constraint 0 covers s1; r0 pays 1.0)
/// a1: s0 -> s2 -> s3   (constraint 1 covers s2; r1 pays 1.0)
/// a2: s0 -> s4 -> s3   (unconstrained; both pay 0.2)
/// ```
pub const FORK_PROBLEM: &str = r#"{
    "states": 5,
    "actions": 3,
    "transitions": [
        {"state": 0, "action": 0, "next": 1},
        {"state": 0, "action": 1, "next": 2},
        {"state": 0, "action": 2, "next": 4},
        {"state": 1, "action": 0, "next": 3},
        {"state": 2, "action": 0, "next": 3},
        {"state": 4, "action": 0, "next": 3}
    ],
    "initial_state": 0,
    "terminal_states": [3],
    "rewards": [
        [{"state": 1, "action": 0, "value": 1.0}, {"state": 4, "action": 0, "value": 0.2}],
        [{"state": 2, "action": 0, "value": 1.0}, {"state": 4, "action": 0, "value": 0.2}]
    ],
    "constraints": [
        {"states": [1], "free_prob": 0.5},
        {"states": [2], "free_prob": 0.5}
    ],
    "truth": {"locked": [], "reward": 1}
}"#;

/// Write `json` to `name` under `dir` and return the path.
pub fn write_file(dir: &Path, name: &str, json: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, json).expect("write fixture file");
    path
}
