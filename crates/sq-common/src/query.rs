//! Queries posed to the oracle-of-truth (the user or environment) and their answers.

use crate::id::{ConstraintId, RewardIndex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single query. "Stop querying" is represented as `Option::<Query>::None`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum Query {
    /// Is this unknown constraint locked?
    Constraint(ConstraintId),
    /// Is the true reward function one of these?
    Reward(BTreeSet<RewardIndex>),
}

impl Query {
    /// Short tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Query::Constraint(_) => "constraint",
            Query::Reward(_) => "reward",
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Constraint(id) => write!(f, "constraint({})", id),
            Query::Reward(set) => {
                let items: Vec<String> = set.iter().map(|r| r.to_string()).collect();
                write!(f, "reward{{{}}}", items.join(","))
            }
        }
    }
}

/// Response to a [`Query`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    /// Constraint query: the constraint is free (its states may be visited).
    Free,
    /// Constraint query: the constraint is locked.
    Locked,
    /// Reward query: the true reward is in the queried set.
    InSet,
    /// Reward query: the true reward is outside the queried set.
    NotInSet,
}
