//! # Stock Forecast
//!
//! Long-horizon forecasts of daily closing prices, scored by backtesting before they
//! are shown.
//!
//! ## Features
//!
//! - Daily price series loading from provider-style CSV exports (polars)
//! - A trend + seasonality decomposition model with changepoints and uncertainty
//!   intervals, backtested with rolling-origin cross-validation
//! - A seasonal ARIMA model with automatic order selection, backtested with
//!   expanding-window splits
//! - MAPE / MAE / RMSE metrics and an accuracy figure (`100 - MAPE`)
//! - An orchestrator that runs fit, backtest and scoring as one request
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stock_forecast::data::DataLoader;
//! use stock_forecast::orchestrator::{ModelChoice, Orchestrator};
//!
//! # fn main() -> stock_forecast::Result<()> {
//! let series = DataLoader::from_csv("AAPL.csv")?;
//! let orchestrator = Orchestrator::default();
//! let period = orchestrator.period(1)?;
//!
//! let outcome = orchestrator.run_for_period(&series, period, ModelChoice::Decomposition)?;
//! if let Some(accuracy) = outcome.accuracy {
//!     println!("Backtest accuracy: {}", accuracy);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod provider;
pub mod synthetic;
pub mod utils;

// Re-export commonly used types
pub use crate::config::ForecastConfig;
pub use crate::data::{DataLoader, PriceBar, PriceSeries};
pub use crate::error::{ForecastError, Result};
pub use crate::metrics::{calculate_metrics, Accuracy, MetricsReport};
pub use crate::models::arima::{cross_validate_autoregressive, AutoregressiveModel, SarimaOrder};
pub use crate::models::auto_arima::{fit_autoregressive, AutoArima};
pub use crate::models::decomposition::{
    cross_validate_decomposition, fit_decomposition, Decomposition, DecompositionModel,
};
pub use crate::models::{
    CrossValidationTable, CvRecord, ForecastModel, ForecastPoint, ForecastResult,
    TrainedForecastModel,
};
pub use crate::orchestrator::{
    ForecastOutcome, ForecastPeriod, ForecastSession, ForecastStage, ModelChoice, Orchestrator,
};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
