//! # Stock Oracle
//!
//! Workspace facade over the forecasting crates:
//!
//! - [`stock_forecast`]: price series, the decomposition and seasonal ARIMA models,
//!   backtesting, metrics and the request orchestrator
//! - [`forecast_math`]: least squares, lag polynomials, Nelder-Mead and stationarity
//!   tests used by the models
//!
//! ## Example
//!
//! ```
//! use stock_oracle_workspace::stock_forecast::metrics::{calculate_metrics, Accuracy};
//!
//! let report = calculate_metrics(&[100.0, 200.0], &[110.0, 190.0]).unwrap();
//! assert_eq!(report.mape_display(), "7.50%");
//! assert_eq!(Accuracy::from_report(&report).to_string(), "92.50%");
//! ```

pub use forecast_math;
pub use stock_forecast;

/// Forecast with the orchestrator defaults.
///
/// # Examples
///
/// ```no_run
/// use stock_oracle_workspace::{forecast, stock_forecast::ModelChoice};
/// use stock_oracle_workspace::stock_forecast::DataLoader;
///
/// let series = DataLoader::from_csv("AAPL.csv").unwrap();
/// let outcome = forecast(&series, 1, ModelChoice::Autoregressive).unwrap();
/// println!("{}", outcome.model);
/// ```
pub fn forecast(
    series: &stock_forecast::PriceSeries,
    years: u32,
    choice: stock_forecast::ModelChoice,
) -> stock_forecast::Result<stock_forecast::ForecastOutcome> {
    let orchestrator = stock_forecast::Orchestrator::default();
    let period = orchestrator.period(years)?;
    orchestrator.run_for_period(series, period, choice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forecast_rejects_out_of_range_years() {
        let series = stock_forecast::synthetic::SyntheticSeriesGenerator::new(1)
            .generate(stock_forecast::synthetic::Scenario::Trending, 30)
            .unwrap();
        let result = forecast(&series, 9, stock_forecast::ModelChoice::Decomposition);
        assert!(matches!(result, Err(stock_forecast::ForecastError::InputError(_))));
    }
}
