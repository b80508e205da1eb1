//! Policy-oracle contract.
//!
//! The oracle solves a constrained MDP optimization: maximize expected
//! reward subject to zero visitation on a set of `(state, action)` pairs and
//! positive total visitation on the goal pairs. Infeasibility is a normal
//! outcome, reported as [`Solution::Infeasible`], never as an error.
//!
//! Implementations must be monotone: for a fixed model, adding zero pairs
//! never increases the optimum and never makes an infeasible problem
//! feasible. Dominance pruning in the search relies on this.

pub mod path;

pub use path::DeterministicPathOracle;

use crate::mdp::MdpView;
use crate::policy::Occupancy;
use sq_common::{ActionId, StateId};
use sq_config::OracleBackend;
use std::collections::BTreeSet;
use thiserror::Error;

/// Set of `(state, action)` pairs.
pub type PairSet = BTreeSet<(StateId, ActionId)>;

/// Oracle failures. Infeasibility is not one of them.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OracleError {
    #[error("transition from ({state}, {action}) is not deterministic")]
    NonDeterministic { state: StateId, action: ActionId },

    #[error("the external backend needs a caller-supplied oracle")]
    ExternalBackend,

    #[error("oracle backend failed: {0}")]
    Backend(String),
}

/// One feasibility/optimization request.
#[derive(Clone, Copy)]
pub struct OracleProblem<'a> {
    pub mdp: &'a dyn MdpView,
    /// Pairs that must not be visited.
    pub zero: &'a PairSet,
    /// Pairs whose total visitation must be strictly positive (ignored when empty).
    pub positive: &'a PairSet,
}

/// Oracle answer.
#[derive(Debug, Clone, PartialEq)]
pub enum Solution {
    Feasible { obj: f64, pi: Occupancy },
    Infeasible,
}

impl Solution {
    pub fn is_feasible(&self) -> bool {
        matches!(self, Solution::Feasible { .. })
    }

    pub fn obj(&self) -> Option<f64> {
        match self {
            Solution::Feasible { obj, .. } => Some(*obj),
            Solution::Infeasible => None,
        }
    }

    pub fn policy(&self) -> Option<&Occupancy> {
        match self {
            Solution::Feasible { pi, .. } => Some(pi),
            Solution::Infeasible => None,
        }
    }
}

/// Black-box solver for constrained policy problems.
pub trait PolicyOracle {
    fn solve(&self, problem: &OracleProblem<'_>) -> Result<Solution, OracleError>;
}

impl<T: PolicyOracle + ?Sized> PolicyOracle for Box<T> {
    fn solve(&self, problem: &OracleProblem<'_>) -> Result<Solution, OracleError> {
        (**self).solve(problem)
    }
}

/// Instantiate the built-in oracle for a configured backend.
///
/// `External` has no built-in implementation; callers using it construct
/// their agents with their own [`PolicyOracle`].
pub fn oracle_for_backend(backend: OracleBackend) -> Result<Box<dyn PolicyOracle>, OracleError> {
    match backend {
        OracleBackend::Path => Ok(Box::new(DeterministicPathOracle::new())),
        OracleBackend::External => Err(OracleError::ExternalBackend),
    }
}
