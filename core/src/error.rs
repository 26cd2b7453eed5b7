//! Error types for the particle filter and its collaborators.
//!
//! Recoverable conditions (negative kernel outputs) are handled locally by the
//! filter. Everything in [`FilterError`] is surfaced to the caller and leaves
//! the filter state untouched.

use thiserror::Error;

/// Errors that can occur while building or running a particle filter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    /// Dimension mismatch between expected and actual sizes
    #[error("Dimension mismatch for {context}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// What was being checked (e.g. "priors", "sensor output rows")
        context: String,
        /// What was expected
        expected: usize,
        /// What was received
        actual: usize,
    },

    /// The clipped weights sum to zero or to a non-finite value, so they
    /// cannot be normalized into a probability vector.
    #[error(
        "Degenerate weights: clipped weight sum is {sum}; the sensor model rejected every hypothesis"
    )]
    DegenerateWeights {
        /// The offending sum
        sum: f64,
    },

    /// A configuration value is outside its valid range
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Reading or writing a configuration file failed
    #[error("Configuration I/O error: {0}")]
    Config(String),
}

impl FilterError {
    pub(crate) fn dimension_mismatch(context: &str, expected: usize, actual: usize) -> Self {
        FilterError::DimensionMismatch {
            context: context.to_string(),
            expected,
            actual,
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, FilterError>;
