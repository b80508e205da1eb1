//! Safe-query math utilities.

pub mod math;

pub use math::belief::{
    consistent_indices, is_normalized, mass, normalize, restrict_to, BeliefError,
    NORMALIZATION_TOL,
};
pub use math::bernoulli::{prob_all_false, prob_all_true, ProbabilityError};
pub use math::stable::*;
