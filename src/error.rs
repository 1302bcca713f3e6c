//! Error types of the indicator pipeline.
//!
//! Classification misses and empty filter results are not errors; they are
//! represented as `"Other"` and empty vectors. Only configuration problems and
//! forecasts that cannot be computed at all surface here.

use serde::Serialize;
use thiserror::Error;

/// Invalid category configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Indicator {indicator:?} is listed under both {first:?} and {second:?}")]
    DuplicateIndicator {
        indicator: String,
        first: String,
        second: String,
    },

    #[error("Category {0:?} is declared more than once")]
    DuplicateCategory(String),

    #[error("Invalid category name {name:?}: {reason}")]
    InvalidCategory { name: String, reason: String },

    #[error("Malformed category table: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Failed to read category table: {0}")]
    Io(#[from] std::io::Error),
}

/// Why the primary model could not be fit. Always recovered by the linear
/// fallback; kept on the outcome for inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Error)]
pub enum FitError {
    #[error("Series too short: required {required}, got {actual}")]
    TooShort { required: usize, actual: usize },

    #[error("Objective is not finite at the starting point")]
    NonFiniteObjective,

    #[error("No convergence after {iterations} iterations")]
    NoConvergence { iterations: usize },

    #[error("Fit exceeded its time budget after {iterations} iterations")]
    Timeout { iterations: usize },

    #[error("Numerical error: {0}")]
    Numerical(String),
}

/// Forecast errors that reach the caller.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ForecastError {
    #[error("Invalid parameter: {name} - {reason}")]
    InvalidConfig { name: String, reason: String },

    #[error("Linear fallback failed: {0}")]
    FallbackFailed(String),
}

pub type Result<T> = std::result::Result<T, ForecastError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_indicator_display() {
        let error = ConfigError::DuplicateIndicator {
            indicator: "Population, female".to_string(),
            first: "Demographics".to_string(),
            second: "Mortality Rates".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Indicator \"Population, female\" is listed under both \"Demographics\" and \"Mortality Rates\""
        );
    }

    #[test]
    fn test_fit_error_display() {
        let error = FitError::TooShort {
            required: 5,
            actual: 3,
        };
        assert_eq!(error.to_string(), "Series too short: required 5, got 3");
        assert_eq!(
            FitError::Timeout { iterations: 12 }.to_string(),
            "Fit exceeded its time budget after 12 iterations"
        );
    }

    #[test]
    fn test_invalid_config_display() {
        let error = ForecastError::InvalidConfig {
            name: "horizon".to_string(),
            reason: "must be at least 1".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid parameter: horizon - must be at least 1"
        );
    }
}
