//! Configuration validation errors and semantic validation.

use crate::config::Config;
use std::time::Duration;
use thiserror::Error;

/// Validation result type.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Configuration validation errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    #[error("Version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: String, actual: String },
}

impl ValidationError {
    /// Error code for structured error reporting.
    pub fn code(&self) -> u32 {
        match self {
            ValidationError::InvalidValue { .. } => 65,
            ValidationError::VersionMismatch { .. } => 66,
        }
    }
}

/// Check an early-stop budget in seconds.
///
/// Zero is allowed and stops the search before its first evaluation.
/// Negative, NaN, infinite and unrepresentably large values are rejected.
pub fn early_stop_budget(secs: f64) -> ValidationResult<Duration> {
    if secs.is_nan() || secs < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "search.early_stop_secs".to_string(),
            message: format!("Must be a non-negative number of seconds, got {}", secs),
        });
    }
    Duration::try_from_secs_f64(secs).map_err(|_| ValidationError::InvalidValue {
        field: "search.early_stop_secs".to_string(),
        message: format!("Must be a finite number of seconds, got {}", secs),
    })
}

/// Validate a configuration semantically.
pub fn validate_config(config: &Config) -> ValidationResult<()> {
    if config.schema_version != crate::CONFIG_SCHEMA_VERSION {
        return Err(ValidationError::VersionMismatch {
            expected: crate::CONFIG_SCHEMA_VERSION.to_string(),
            actual: config.schema_version.clone(),
        });
    }

    config.search.budget()?;

    let cost = config.query.cost_of_query;
    if !cost.is_finite() || cost < 0.0 {
        return Err(ValidationError::InvalidValue {
            field: "query.cost_of_query".to_string(),
            message: format!("Must be finite and non-negative, got {}", cost),
        });
    }

    if config.query.max_rounds == 0 {
        return Err(ValidationError::InvalidValue {
            field: "query.max_rounds".to_string(),
            message: "Must be at least 1".to_string(),
        });
    }

    Ok(())
}
