//! # Forecast Math
//!
//! Numerical building blocks used by the forecasting models: penalised least squares,
//! lag-polynomial algebra, a derivative-free optimizer, unit-root and seasonality
//! tests, and Fourier features.
//!
//! Nothing in this crate knows about prices or dates; it works on plain `f64` slices.

use thiserror::Error;

pub mod fourier;
pub mod linalg;
pub mod optimize;
pub mod polynomial;
pub mod stationarity;
pub mod stats;

/// Errors that can occur in numerical routines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Singular system: {0}")]
    Singular(String),

    #[error("Optimizer did not converge after {iterations} iterations")]
    NotConverged { iterations: usize },
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;

pub use linalg::{least_squares, solve_linear_system};
pub use optimize::{Minimum, NelderMead};
