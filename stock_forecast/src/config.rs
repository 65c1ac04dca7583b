//! Configuration for the forecasters and the orchestrator
//!
//! Everything has a default, so an empty JSON object (or no file at all) yields the
//! standard setup: 730/180/365-day decomposition backtests, a weekly seasonal ARIMA
//! search with five expanding-window folds, and forecasts of one to four years.

use crate::error::{ForecastError, Result};
use chrono::Duration;
use forecast_math::NelderMead;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Files tried, in order, by [`ForecastConfig::load`]
pub const CONFIG_PATHS: [&str; 2] = ["stock_forecast.json", "config/stock_forecast.json"];

/// Settings of the trend + seasonality decomposition model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionConfig {
    /// Number of potential trend changepoints
    pub n_changepoints: usize,
    /// Share of the history (from the start) in which changepoints are placed
    pub changepoint_range: f64,
    /// Prior scale of changepoint slope adjustments; smaller is stiffer
    pub changepoint_prior_scale: f64,
    /// Prior scale of the seasonal Fourier coefficients
    pub seasonality_prior_scale: f64,
    /// Fourier order of the yearly component (0 disables it)
    pub yearly_order: usize,
    /// Fourier order of the weekly component (0 disables it)
    pub weekly_order: usize,
    /// Coverage of the uncertainty interval, in (0, 1)
    pub interval_width: f64,
}

impl Default for DecompositionConfig {
    fn default() -> Self {
        Self {
            n_changepoints: 25,
            changepoint_range: 0.8,
            changepoint_prior_scale: 0.05,
            seasonality_prior_scale: 10.0,
            yearly_order: 10,
            weekly_order: 3,
            interval_width: 0.8,
        }
    }
}

/// Rolling-origin windows for backtesting the decomposition model, in days
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecompositionCvConfig {
    /// Minimum training window before the first cutoff
    pub initial_days: i64,
    /// Spacing between cutoffs
    pub step_days: i64,
    /// Forecast horizon scored after each cutoff
    pub horizon_days: i64,
}

impl Default for DecompositionCvConfig {
    fn default() -> Self {
        Self {
            initial_days: 730,
            step_days: 180,
            horizon_days: 365,
        }
    }
}

impl DecompositionCvConfig {
    pub fn initial(&self) -> Duration {
        Duration::days(self.initial_days)
    }

    pub fn step(&self) -> Duration {
        Duration::days(self.step_days)
    }

    pub fn horizon(&self) -> Duration {
        Duration::days(self.horizon_days)
    }
}

/// Criterion used to rank candidate ARIMA orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InformationCriterion {
    Aic,
    Aicc,
    Bic,
}

impl InformationCriterion {
    /// Score a fit with log-likelihood `log_likelihood`, `k` estimated parameters
    /// (including the innovation variance) and `n` effective observations.
    pub fn score(&self, log_likelihood: f64, k: usize, n: usize) -> f64 {
        let k = k as f64;
        let n = n as f64;
        let aic = -2.0 * log_likelihood + 2.0 * k;
        match self {
            InformationCriterion::Aic => aic,
            InformationCriterion::Aicc => {
                if n - k - 1.0 > 0.0 {
                    aic + 2.0 * k * (k + 1.0) / (n - k - 1.0)
                } else {
                    f64::INFINITY
                }
            }
            InformationCriterion::Bic => -2.0 * log_likelihood + k * n.ln(),
        }
    }
}

impl fmt::Display for InformationCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InformationCriterion::Aic => "AIC",
            InformationCriterion::Aicc => "AICc",
            InformationCriterion::Bic => "BIC",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for InformationCriterion {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "aic" => Ok(InformationCriterion::Aic),
            "aicc" => Ok(InformationCriterion::Aicc),
            "bic" => Ok(InformationCriterion::Bic),
            other => Err(ForecastError::ConfigError(format!(
                "Unknown information criterion '{}'",
                other
            ))),
        }
    }
}

/// Order search bounds and backtest folds for the seasonal ARIMA model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoregressiveConfig {
    pub max_p: usize,
    pub max_d: usize,
    pub max_q: usize,
    pub max_seasonal_p: usize,
    pub max_seasonal_d: usize,
    pub max_seasonal_q: usize,
    /// Seasonal period in observations (7 for weekly patterning of daily data)
    pub seasonal_period: usize,
    /// Upper bound on p + q + P + Q
    pub max_order: usize,
    /// Include seasonal terms in the search
    pub seasonal: bool,
    /// Stepwise search; `false` evaluates every order within the bounds
    pub stepwise: bool,
    /// Cap on the number of candidate fits in a stepwise search
    pub max_models: usize,
    pub information_criterion: InformationCriterion,
    /// Significance level of the KPSS test choosing `d`
    pub kpss_alpha: f64,
    /// Expanding-window folds used for backtesting
    pub folds: usize,
    /// Optimizer used for conditional sum-of-squares estimation
    pub optimizer: NelderMead,
}

impl Default for AutoregressiveConfig {
    fn default() -> Self {
        Self {
            max_p: 4,
            max_d: 1,
            max_q: 3,
            max_seasonal_p: 2,
            max_seasonal_d: 1,
            max_seasonal_q: 1,
            seasonal_period: 7,
            max_order: 5,
            seasonal: true,
            stepwise: true,
            max_models: 94,
            information_criterion: InformationCriterion::Aic,
            kpss_alpha: 0.05,
            folds: 5,
            optimizer: NelderMead {
                max_iterations: 600,
                tolerance: 1e-8,
                initial_step: 0.1,
            },
        }
    }
}

/// Request handling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Largest selectable forecast period in whole years
    pub max_forecast_years: u32,
    /// Return the forecast without an accuracy figure when backtesting is impossible,
    /// instead of failing the request
    pub allow_partial_results: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_forecast_years: 4,
            allow_partial_results: false,
        }
    }
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub decomposition: DecompositionConfig,
    pub decomposition_cv: DecompositionCvConfig,
    pub autoregressive: AutoregressiveConfig,
    pub orchestrator: OrchestratorConfig,
}

impl ForecastConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: ForecastConfig = serde_json::from_str(content)
            .map_err(|e| ForecastError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Load from the first readable file in [`CONFIG_PATHS`], falling back to defaults
    pub fn load() -> Self {
        for path in CONFIG_PATHS {
            if Path::new(path).exists() {
                match Self::from_file(path) {
                    Ok(config) => {
                        log::info!("Loaded configuration from {}", path);
                        return config;
                    }
                    Err(e) => {
                        log::warn!("Failed to load configuration file {}: {}", path, e);
                    }
                }
            }
        }

        log::info!("Using default configuration");
        Self::default()
    }

    /// Check ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        let d = &self.decomposition;
        if !(d.changepoint_range > 0.0 && d.changepoint_range <= 1.0) {
            return Err(ForecastError::ConfigError(
                "decomposition.changepoint_range must be in (0, 1]".to_string(),
            ));
        }
        if d.changepoint_prior_scale <= 0.0 || d.seasonality_prior_scale <= 0.0 {
            return Err(ForecastError::ConfigError(
                "decomposition prior scales must be positive".to_string(),
            ));
        }
        if !(d.interval_width > 0.0 && d.interval_width < 1.0) {
            return Err(ForecastError::ConfigError(
                "decomposition.interval_width must be in (0, 1)".to_string(),
            ));
        }

        let cv = &self.decomposition_cv;
        if cv.initial_days < 0 || cv.step_days <= 0 || cv.horizon_days <= 0 {
            return Err(ForecastError::ConfigError(
                "decomposition_cv windows must be positive (initial may be zero)".to_string(),
            ));
        }

        let a = &self.autoregressive;
        if a.folds == 0 {
            return Err(ForecastError::ConfigError(
                "autoregressive.folds must be at least 1".to_string(),
            ));
        }
        if a.seasonal && a.seasonal_period < 2 {
            return Err(ForecastError::ConfigError(
                "autoregressive.seasonal_period must be at least 2 when seasonal is enabled"
                    .to_string(),
            ));
        }
        if a.max_models == 0 {
            return Err(ForecastError::ConfigError(
                "autoregressive.max_models must be at least 1".to_string(),
            ));
        }
        forecast_math::stationarity::KpssTest::new(a.kpss_alpha)
            .map_err(|e| ForecastError::ConfigError(e.to_string()))?;

        let o = &self.orchestrator;
        if !(1..=5).contains(&o.max_forecast_years) {
            return Err(ForecastError::ConfigError(
                "orchestrator.max_forecast_years must be between 1 and 5".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ForecastConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.decomposition_cv.initial_days, 730);
        assert_eq!(config.decomposition_cv.step_days, 180);
        assert_eq!(config.decomposition_cv.horizon_days, 365);
        assert_eq!(config.autoregressive.folds, 5);
        assert_eq!(config.autoregressive.seasonal_period, 7);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = ForecastConfig::from_json_str(
            r#"{ "autoregressive": { "folds": 3, "information_criterion": "bic" },
                 "orchestrator": { "max_forecast_years": 5 } }"#,
        )
        .unwrap();
        assert_eq!(config.autoregressive.folds, 3);
        assert_eq!(config.autoregressive.max_p, 4);
        assert_eq!(
            config.autoregressive.information_criterion,
            InformationCriterion::Bic
        );
        assert_eq!(config.orchestrator.max_forecast_years, 5);
        assert_eq!(config.decomposition, DecompositionConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(ForecastConfig::from_json_str(r#"{ "autoregressive": { "folds": 0 } }"#).is_err());
        assert!(ForecastConfig::from_json_str(
            r#"{ "orchestrator": { "max_forecast_years": 9 } }"#
        )
        .is_err());
        assert!(ForecastConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_information_criterion_penalties() {
        let aic = InformationCriterion::Aic.score(-100.0, 3, 200);
        let bic = InformationCriterion::Bic.score(-100.0, 3, 200);
        let aicc = InformationCriterion::Aicc.score(-100.0, 3, 200);
        assert_eq!(aic, 206.0);
        assert!(bic > aic);
        assert!(aicc > aic);
        assert_eq!("AICc".parse::<InformationCriterion>().unwrap(), InformationCriterion::Aicc);
    }
}
