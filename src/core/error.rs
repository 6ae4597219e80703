//! Error types for the analysis engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Failures the statistics, portfolio and simulation layers can raise.
///
/// Analytical non-results (e.g. a Sharpe ratio over zero volatility) are
/// *not* errors; those surface as documented NaN sentinels. This enum covers
/// structural violations only.
#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Invalid portfolio composition: mismatched holdings/weights or weights
    /// not summing to 1.
    #[error("Invalid portfolio configuration: {message}")]
    Configuration { message: String },

    /// Too few observations to carry out a calculation.
    #[error("Insufficient data: need at least {required} observations, got {available}")]
    InsufficientData { required: usize, available: usize },

    /// Invalid simulation or window argument.
    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },

    /// Numerical failure, e.g. a covariance matrix that is not positive
    /// semi-definite.
    #[error("Numerical error: {message}")]
    Numerical { message: String },
}

impl AnalysisError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn insufficient_data(required: usize, available: usize) -> Self {
        Self::InsufficientData {
            required,
            available,
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }

    pub fn numerical(message: impl Into<String>) -> Self {
        Self::Numerical {
            message: message.into(),
        }
    }
}
