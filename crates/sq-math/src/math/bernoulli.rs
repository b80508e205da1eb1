//! Joint probabilities of independent binary events.
//!
//! Constraint freedom is modelled as independent Bernoulli variables, so the
//! probability that a set of constraints is simultaneously free is the product
//! of the marginals. Products are accumulated in log domain so long subsets
//! of small probabilities do not underflow before the final `exp`.

use thiserror::Error;

/// Errors from probability inputs.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProbabilityError {
    #[error("probability {0} is outside [0, 1]")]
    OutOfRange(f64),
}

fn check(p: f64) -> Result<f64, ProbabilityError> {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return Err(ProbabilityError::OutOfRange(p));
    }
    Ok(p)
}

fn log_product<I: IntoIterator<Item = f64>>(probs: I) -> Result<f64, ProbabilityError> {
    let mut log_sum = 0.0;
    for p in probs {
        let p = check(p)?;
        if p == 0.0 {
            return Ok(f64::NEG_INFINITY);
        }
        log_sum += p.ln();
    }
    Ok(log_sum)
}

/// P(all events occur) = Π p_i. The empty product is one.
pub fn prob_all_true<I: IntoIterator<Item = f64>>(probs: I) -> Result<f64, ProbabilityError> {
    Ok(log_product(probs)?.exp())
}

/// P(no event occurs) = Π (1 - p_i). The empty product is one.
pub fn prob_all_false<I: IntoIterator<Item = f64>>(probs: I) -> Result<f64, ProbabilityError> {
    let complements: Result<Vec<f64>, _> = probs
        .into_iter()
        .map(|p| check(p).map(|p| 1.0 - p))
        .collect();
    Ok(log_product(complements?)?.exp())
}
