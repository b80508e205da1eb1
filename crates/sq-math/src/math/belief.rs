//! Discrete belief vectors over a finite set of hypotheses.
//!
//! A belief is a plain `&[f64]` indexed by hypothesis. After every update it
//! must be non-negative and sum to one. Conditioning on "the truth lies in
//! this subset" zeroes the mass outside the subset and renormalises; if that
//! leaves no mass the update is rejected rather than patched.

use super::stable::stable_sum;
use thiserror::Error;

/// Tolerance used when checking that a belief sums to one.
pub const NORMALIZATION_TOL: f64 = 1e-9;

/// Errors from belief manipulation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BeliefError {
    #[error("belief vector is empty")]
    Empty,

    #[error("belief entry {index} is invalid: {value}")]
    InvalidEntry { index: usize, value: f64 },

    #[error("update leaves no probability mass")]
    EmptySupport,

    #[error("hypothesis index {index} out of range for belief of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
}

fn validate(weights: &[f64]) -> Result<(), BeliefError> {
    if weights.is_empty() {
        return Err(BeliefError::Empty);
    }
    for (index, &value) in weights.iter().enumerate() {
        if !value.is_finite() || value < 0.0 {
            return Err(BeliefError::InvalidEntry { index, value });
        }
    }
    Ok(())
}

/// Normalize non-negative weights into a probability vector.
pub fn normalize(weights: &[f64]) -> Result<Vec<f64>, BeliefError> {
    validate(weights)?;
    let total = stable_sum(weights.iter().copied());
    if total <= 0.0 {
        return Err(BeliefError::EmptySupport);
    }
    Ok(weights.iter().map(|w| w / total).collect())
}

/// Condition a belief on the truth lying in `keep`.
///
/// Mass outside `keep` is set to exactly zero and the rest renormalised.
pub fn restrict_to(psi: &[f64], keep: &[usize]) -> Result<Vec<f64>, BeliefError> {
    validate(psi)?;
    let mut mask = vec![false; psi.len()];
    for &index in keep {
        if index >= psi.len() {
            return Err(BeliefError::IndexOutOfRange {
                index,
                len: psi.len(),
            });
        }
        mask[index] = true;
    }
    let restricted: Vec<f64> = psi
        .iter()
        .zip(&mask)
        .map(|(&p, &kept)| if kept { p } else { 0.0 })
        .collect();
    normalize(&restricted)
}

/// Total mass on the given hypotheses. Out-of-range indices carry no mass.
pub fn mass(psi: &[f64], indices: &[usize]) -> f64 {
    stable_sum(indices.iter().filter_map(|&i| psi.get(i).copied()))
}

/// Indices with strictly positive mass.
pub fn consistent_indices(psi: &[f64]) -> Vec<usize> {
    psi.iter()
        .enumerate()
        .filter(|(_, &p)| p > 0.0)
        .map(|(i, _)| i)
        .collect()
}

/// True if every entry is a finite non-negative number and the sum is one.
pub fn is_normalized(psi: &[f64]) -> bool {
    validate(psi).is_ok() && (stable_sum(psi.iter().copied()) - 1.0).abs() <= NORMALIZATION_TOL
}
