//! Safe-query core library.
//!
//! This library decides what to ask a user before committing to a policy in
//! an MDP whose reward function and safety constraints are both uncertain:
//! - MDP model, hypothetical overlays and occupancy measures
//! - The policy-oracle contract and a reference oracle
//! - Constraint and joint-uncertainty agents
//! - Dominating-policy search over unknown constraints
//! - EVOI-based and sampling-based query selection, and query sessions
//!
//! The binary entry point is in `main.rs`.

pub mod agent;
pub mod exit_codes;
pub mod logging;
pub mod mdp;
pub mod oracle;
pub mod policy;
pub mod problem;
pub mod query;
pub mod search;
pub mod session;

#[cfg(test)]
mod test_utils;

pub use agent::{AgentError, ConstraintQueryAgent, ConstraintSet, JointUncertaintyAgent};
pub use mdp::{Mdp, MdpView};
pub use policy::Occupancy;
pub use problem::{Problem, ProblemError, ProblemSpec};
pub use query::{DomPiSamplingAgent, MyopicQueryAgent, QueryAgent};
pub use search::{DomPiSearch, SearchOutcome};
pub use session::{run_session, GroundTruth, SessionReport, SimulatedResponder};
