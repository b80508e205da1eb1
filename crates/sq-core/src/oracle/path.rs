//! Exact oracle for deterministic episodic MDPs.
//!
//! Enumerates every simple trajectory from the initial state to a terminal
//! state. A terminal state takes exactly one action and ends the episode.
//! Step `t` contributes `discount^t` visitation to its `(state, action)`
//! pair. Among trajectories that avoid the zero pairs (and visit at least one
//! goal pair when goals are given) the one with the highest discounted reward
//! wins; ties keep the first trajectory in depth-first action order, so the
//! answer is a deterministic function of the feasible set.

use super::{OracleError, OracleProblem, PolicyOracle, Solution};
use crate::mdp::MdpView;
use crate::policy::Occupancy;
use sq_common::{ActionId, StateId};

/// Depth-first trajectory enumerator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeterministicPathOracle;

impl DeterministicPathOracle {
    pub fn new() -> Self {
        Self
    }
}

struct Best {
    value: f64,
    path: Vec<(StateId, ActionId)>,
}

struct Walk<'p, 'a> {
    problem: &'p OracleProblem<'a>,
    on_path: Vec<bool>,
    path: Vec<(StateId, ActionId)>,
    goal_hits: usize,
    best: Option<Best>,
}

impl Walk<'_, '_> {
    fn visit(&mut self, state: StateId, value: f64, weight: f64) -> Result<(), OracleError> {
        let mdp = self.problem.mdp;
        let model = mdp.model();
        self.on_path[state.index()] = true;

        for action in model.actions() {
            let pair = (state, action);
            if self.problem.zero.contains(&pair) {
                continue;
            }
            let step_value = value + weight * mdp.reward(state, action);
            let is_goal = self.problem.positive.contains(&pair);

            if model.is_terminal(state) {
                let reaches_goal =
                    self.problem.positive.is_empty() || self.goal_hits > 0 || is_goal;
                let better = self.best.as_ref().map_or(true, |b| step_value > b.value);
                if reaches_goal && better {
                    let mut path = self.path.clone();
                    path.push(pair);
                    self.best = Some(Best {
                        value: step_value,
                        path,
                    });
                }
                continue;
            }

            let next = match model.successors(state, action) {
                [] => continue,
                [(next, prob)] if (*prob - 1.0).abs() <= 1e-12 => *next,
                _ => return Err(OracleError::NonDeterministic { state, action }),
            };
            if self.on_path[next.index()] {
                continue;
            }

            self.path.push(pair);
            self.goal_hits += usize::from(is_goal);
            self.visit(next, step_value, weight * model.discount())?;
            self.goal_hits -= usize::from(is_goal);
            self.path.pop();
        }

        self.on_path[state.index()] = false;
        Ok(())
    }
}

impl PolicyOracle for DeterministicPathOracle {
    fn solve(&self, problem: &OracleProblem<'_>) -> Result<Solution, OracleError> {
        let model = problem.mdp.model();
        let mut walk = Walk {
            problem,
            on_path: vec![false; model.num_states()],
            path: Vec::new(),
            goal_hits: 0,
            best: None,
        };
        walk.visit(model.initial_state(), 0.0, 1.0)?;

        let Some(best) = walk.best else {
            return Ok(Solution::Infeasible);
        };
        let discount = model.discount();
        let mut pi = Occupancy::new();
        let mut weight = 1.0;
        for (state, action) in best.path {
            pi.add(state, action, weight);
            weight *= discount;
        }
        Ok(Solution::Feasible {
            obj: best.value,
            pi,
        })
    }
}
