//! Error types for the usage_forecast crate

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the usage_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Duplicate dates or malformed rows within one series
    #[error("Data integrity error in series '{series_key}': {message}")]
    DataIntegrity { series_key: String, message: String },

    /// Series key has no model registry entry
    #[error("Configuration error: no model configuration registered for series '{0}'")]
    Configuration(String),

    /// Predict-mode cache miss
    #[error("Model not found: no cached model for metric '{metric}', series '{series_key}'")]
    ModelNotFound { metric: String, series_key: String },

    /// Zero-width interval on the side of a non-zero forecast gap
    #[error("Degenerate interval on {date}: gap {gap} with interval width {width}")]
    DegenerateInterval { date: NaiveDate, gap: f64, width: f64 },

    /// Zero actual with a non-zero forecast gap, relative deviation undefined
    #[error("Zero actual on {date} against forecast {yhat}")]
    ZeroActual { date: NaiveDate, yhat: f64 },

    /// Series below the minimum history or forecast horizon. A deliberate skip.
    #[error("Insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Model persistence backend failure
    #[error("Cache store error: {0}")]
    CacheStore(String),

    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error related to forecasting operations
    #[error("Forecasting error: {0}")]
    ForecastingError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from numerical routines
    #[error("Math error: {0}")]
    MathError(#[from] forecast_math::MathError),

    /// Error from model (de)serialization
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from pipeline configuration
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from CSV reading or writing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

impl ForecastError {
    /// Whether this error is a deliberate skip rather than a failure
    pub fn is_skip(&self) -> bool {
        matches!(self, ForecastError::InsufficientData { .. })
    }

    /// Whether this error is an infrastructure failure that makes the whole run untrustworthy
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            ForecastError::CacheStore(_) | ForecastError::IoError(_) | ForecastError::PolarsError(_)
        )
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::ConfigError(err.to_string())
    }
}
