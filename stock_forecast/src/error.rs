//! Error types for the stock_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the stock_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Invalid input: series too short, non-finite values, zero actuals, bad parameters
    #[error("Invalid input: {0}")]
    InputError(String),

    /// The model could not be fitted (order search or optimisation failed)
    #[error("Model fitting failed: {0}")]
    ModelFittingError(String),

    /// Not enough history for the configured validation windows or folds
    #[error("Cross-validation failed: {0}")]
    CrossValidationError(String),

    /// The market data provider returned nothing usable
    #[error("No series available: {0}")]
    ExternalDataError(String),

    /// Configuration could not be read or is inconsistent
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from the numerical routines
    #[error("Math error: {0}")]
    MathError(#[from] forecast_math::MathError),

    /// JSON or CSV (de)serialization failure
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl ForecastError {
    /// Errors that still allow showing a forecast without an accuracy figure
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ForecastError::CrossValidationError(_))
    }

    /// Short category label used in logs and the CLI
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::InputError(_) => "input",
            ForecastError::ModelFittingError(_) => "model-fitting",
            ForecastError::CrossValidationError(_) => "cross-validation",
            ForecastError::ExternalDataError(_) => "external-data",
            ForecastError::ConfigError(_) => "config",
            ForecastError::IoError(_) => "io",
            ForecastError::PolarsError(_) => "polars",
            ForecastError::MathError(_) => "math",
            ForecastError::SerializationError(_) => "serialization",
        }
    }
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::SerializationError(err.to_string())
    }
}
