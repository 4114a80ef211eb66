//! # Forecast Math
//!
//! Numerical building blocks for the usage forecasting models.
//! This crate provides the movable-feast calendar algorithms, Fourier
//! seasonality terms, the penalized least squares solve used to fit the
//! trend/seasonality regressions, and sample quantiles for predictive
//! intervals.

use thiserror::Error;

pub mod calendar;
pub mod fourier;
pub mod linalg;
pub mod stats;

/// Errors that can occur in forecasting calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for forecasting math operations
pub type Result<T> = std::result::Result<T, MathError>;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_messages_carry_context() {
        let err = MathError::InvalidInput("year 1200 predates the Gregorian calendar".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid input: year 1200 predates the Gregorian calendar"
        );
    }
}
