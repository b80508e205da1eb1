//! Core math modules.

pub mod belief;
pub mod bernoulli;
pub mod stable;
