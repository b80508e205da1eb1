//! Fuzz target for dominating-policy search and EVOI.
//!
//! Builds small deterministic problems from structured input and checks the
//! search and EVOI invariants that must hold for any model.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sq_common::{ConstraintId, Query, StateId};
use sq_config::SearchConfig;
use sq_core::oracle::DeterministicPathOracle;
use sq_core::problem::{ConstraintSpec, ProblemSpec, RewardEntry, TransitionSpec};
use sq_core::query::compute_evoi;
use sq_core::search::DomPiSearch;
use std::collections::BTreeSet;

const MAX_STATES: u8 = 8;
const MAX_ACTIONS: u8 = 3;

#[derive(Debug, Arbitrary)]
struct Input {
    states: u8,
    actions: u8,
    edges: Vec<(u8, u8, u8)>,
    rewards: [Vec<(u8, i8)>; 2],
    constraints: Vec<(Vec<u8>, u8)>,
}

impl Input {
    fn spec(&self) -> ProblemSpec {
        let states = usize::from(self.states % MAX_STATES) + 2;
        let actions = usize::from(self.actions % MAX_ACTIONS) + 1;
        let state = |raw: u8| usize::from(raw) % states;

        let mut seen = BTreeSet::new();
        let transitions = self
            .edges
            .iter()
            .map(|&(s, a, n)| (state(s), usize::from(a) % actions, state(n)))
            .filter(|&(s, a, _)| s != 1 && seen.insert((s, a)))
            .map(|(state, action, next)| TransitionSpec {
                state,
                action,
                next,
                prob: 1.0,
            })
            .collect();
        let rewards = self
            .rewards
            .iter()
            .map(|entries| {
                entries
                    .iter()
                    .map(|&(s, v)| RewardEntry {
                        state: state(s),
                        action: None,
                        value: f64::from(v) / 16.0,
                    })
                    .collect()
            })
            .collect();
        let constraints = self
            .constraints
            .iter()
            .take(4)
            .map(|(covered, p)| ConstraintSpec {
                states: covered.iter().map(|&s| StateId(state(s))).collect(),
                free_prob: Some(f64::from(*p) / 255.0),
            })
            .collect();

        ProblemSpec {
            states,
            actions,
            transitions,
            initial_state: 0,
            terminal_states: [StateId(1)].into_iter().collect(),
            discount: 1.0,
            rewards,
            psi: None,
            constraints,
            goal_states: BTreeSet::new(),
            known_locked: BTreeSet::new(),
            known_free: BTreeSet::new(),
            truth: None,
        }
    }
}

fuzz_target!(|input: Input| {
    let Ok(problem) = input.spec().build() else {
        return;
    };
    let Ok(joint) = problem.joint_agent(DeterministicPathOracle::new(), 0.0) else {
        return;
    };
    let agent = joint.constraints();

    let search = DomPiSearch::new(SearchConfig::default());
    let outcome = search.run(agent).expect("search on a deterministic model");
    let exhaustive = search.brute_force(agent).expect("brute force on a deterministic model");
    assert_eq!(outcome.relevant, exhaustive.relevant);

    if joint.current_safely_opt_pi_value().is_err() {
        return;
    }
    for feat in 0..agent.num_constraints() {
        let evoi = compute_evoi(&joint, &Query::Constraint(ConstraintId(feat)));
        assert!(evoi.is_ok(), "{feat}: {evoi:?}");
    }
});
