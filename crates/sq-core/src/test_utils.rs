//! Fixtures shared by unit tests.

use crate::agent::{ConstraintQueryAgent, ConstraintSet, JointUncertaintyAgent};
use crate::mdp::{Mdp, Transition};
use crate::oracle::DeterministicPathOracle;
use sq_common::{ActionId, ConstraintId, StateId};

pub(crate) fn transition(state: usize, action: usize, next: usize) -> Transition {
    Transition {
        state: StateId(state),
        action: ActionId(action),
        next: StateId(next),
        prob: 1.0,
    }
}

/// Three routes from s0 to the terminal s3:
///
/// ```text
/// a0: s0 -> s1 -> s3   (constraint 0 covers s1; r0 pays 1.0 at s1)
/// a1: s0 -> s2 -> s3   (constraint 1 covers s2; r1 pays 1.0 at s2)
/// a2: s0 -> s4 -> s3   (unconstrained; both rewards pay 0.2 at s4)
/// ```
pub(crate) fn fork_mdp(psi: Vec<f64>) -> Mdp {
    let actions = 3;
    let at = |s: usize, a: usize| s * actions + a;
    let mut r0 = vec![0.0; 5 * actions];
    let mut r1 = vec![0.0; 5 * actions];
    r0[at(1, 0)] = 1.0;
    r1[at(2, 0)] = 1.0;
    r0[at(4, 0)] = 0.2;
    r1[at(4, 0)] = 0.2;
    Mdp::new(
        5,
        actions,
        vec![
            transition(0, 0, 1),
            transition(0, 1, 2),
            transition(0, 2, 4),
            transition(1, 0, 3),
            transition(2, 0, 3),
            transition(4, 0, 3),
        ],
        StateId(0),
        [StateId(3)].into_iter().collect(),
        1.0,
        vec![r0, r1],
        psi,
    )
    .expect("fork fixture is valid")
}

pub(crate) fn fork_constraints(probs: [f64; 2], known_free: &[usize]) -> ConstraintSet {
    ConstraintSet::new(vec![
        [StateId(1)].into_iter().collect(),
        [StateId(2)].into_iter().collect(),
    ])
    .with_free_probs(probs.to_vec())
    .with_known_free(known_free.iter().map(|&i| ConstraintId(i)).collect())
}

pub(crate) fn fork_agent(
    psi: Vec<f64>,
    probs: [f64; 2],
    known_free: &[usize],
    cost: f64,
) -> JointUncertaintyAgent {
    let inner = ConstraintQueryAgent::new(
        fork_mdp(psi),
        DeterministicPathOracle::new(),
        fork_constraints(probs, known_free),
    )
    .expect("fork constraints are valid");
    JointUncertaintyAgent::new(inner, cost).expect("cost is valid")
}
