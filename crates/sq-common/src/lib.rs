//! Safe-query common types, IDs, and errors.
//!
//! This crate provides foundational types shared across the sq-* crates:
//! - Index newtypes for states, actions, constraints and reward hypotheses
//! - The query sum type exchanged between agents and responders
//! - The unified error type with stable codes

pub mod error;
pub mod id;
pub mod query;

pub use error::{Error, ErrorCategory, Result};
pub use id::{ActionId, ConstraintId, RewardIndex, SessionId, StateId};
pub use query::{Answer, Query};

/// Schema version stamped on JSON output.
pub const SCHEMA_VERSION: &str = "1.0.0";
