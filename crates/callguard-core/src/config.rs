//! Configuration errors shared by every builder.

use thiserror::Error;

/// A builder was given a value it cannot work with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be finite, got {value}")]
    NotFinite { field: &'static str, value: f64 },
}

/// Checks `value >= min`.
pub fn at_least(field: &'static str, value: f64, min: f64) -> Result<(), ConfigError> {
    if !value.is_finite() {
        return Err(ConfigError::NotFinite { field, value });
    }
    if value < min {
        return Err(ConfigError::BelowMinimum { field, min, value });
    }
    Ok(())
}
