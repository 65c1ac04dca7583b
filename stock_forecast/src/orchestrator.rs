//! Runs one forecast request end to end
//!
//! A request moves through `Idle -> Fitting -> CrossValidating -> Scoring -> Ready`.
//! Any error moves it to `Failed` instead and is returned to the caller; no partial
//! results are produced unless `allow_partial_results` is set, in which case a
//! backtest that cannot be run still yields the forecast without an accuracy figure.

use crate::config::ForecastConfig;
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::metrics::{Accuracy, MetricsReport};
use crate::models::auto_arima::AutoArima;
use crate::models::decomposition::Decomposition;
use crate::models::{ForecastModel, ForecastResult, TrainedForecastModel};
use crate::utils::DAYS_PER_YEAR;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which forecaster to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelChoice {
    /// Trend + seasonality decomposition with changepoints
    Decomposition,
    /// Seasonal ARIMA with automatic order selection
    Autoregressive,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 2] = [ModelChoice::Decomposition, ModelChoice::Autoregressive];
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelChoice::Decomposition => write!(f, "decomposition"),
            ModelChoice::Autoregressive => write!(f, "autoregressive"),
        }
    }
}

impl FromStr for ModelChoice {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "decomposition" | "prophet" => Ok(ModelChoice::Decomposition),
            "autoregressive" | "arima" => Ok(ModelChoice::Autoregressive),
            other => Err(ForecastError::InputError(format!(
                "Unknown model '{}'; expected decomposition or autoregressive",
                other
            ))),
        }
    }
}

/// Forecast length in whole years of 365 days
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPeriod {
    years: u32,
}

impl ForecastPeriod {
    /// `years` must lie in `1..=max_years`
    pub fn from_years(years: u32, max_years: u32) -> Result<Self> {
        if years == 0 || years > max_years {
            return Err(ForecastError::InputError(format!(
                "Forecast period must be between 1 and {} years, got {}",
                max_years, years
            )));
        }
        Ok(Self { years })
    }

    pub fn years(&self) -> u32 {
        self.years
    }

    /// Horizon in calendar days
    pub fn days(&self) -> usize {
        self.years as usize * DAYS_PER_YEAR
    }
}

/// Lifecycle of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastStage {
    Idle,
    Fitting,
    CrossValidating,
    Scoring,
    Ready,
    Failed,
}

impl ForecastStage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ForecastStage::Ready | ForecastStage::Failed)
    }

    /// Whether `self -> next` is a legal transition
    pub fn can_advance_to(&self, next: ForecastStage) -> bool {
        use ForecastStage::*;
        matches!(
            (self, next),
            (Idle, Fitting)
                | (Fitting, CrossValidating)
                | (Fitting, Failed)
                | (CrossValidating, Scoring)
                | (CrossValidating, Ready)
                | (CrossValidating, Failed)
                | (Scoring, Ready)
                | (Scoring, Failed)
        )
    }
}

impl fmt::Display for ForecastStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ForecastStage::Idle => "idle",
            ForecastStage::Fitting => "fitting",
            ForecastStage::CrossValidating => "cross-validating",
            ForecastStage::Scoring => "scoring",
            ForecastStage::Ready => "ready",
            ForecastStage::Failed => "failed",
        };
        write!(f, "{}", label)
    }
}

/// Receives stage notifications; status only, never results
pub trait StageObserver: Send {
    fn on_stage(&self, choice: ModelChoice, stage: ForecastStage);
}

impl<F> StageObserver for F
where
    F: Fn(ModelChoice, ForecastStage) + Send,
{
    fn on_stage(&self, choice: ModelChoice, stage: ForecastStage) {
        self(choice, stage)
    }
}

/// Logs every transition at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl StageObserver for LogObserver {
    fn on_stage(&self, choice: ModelChoice, stage: ForecastStage) {
        log::info!("{} forecast: {}", choice, stage);
    }
}

/// State of a single request
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    choice: ModelChoice,
    stage: ForecastStage,
    history: Vec<ForecastStage>,
}

impl ForecastRequest {
    pub fn new(choice: ModelChoice) -> Self {
        Self {
            choice,
            stage: ForecastStage::Idle,
            history: vec![ForecastStage::Idle],
        }
    }

    pub fn choice(&self) -> ModelChoice {
        self.choice
    }

    pub fn stage(&self) -> ForecastStage {
        self.stage
    }

    /// Every stage visited, starting with `Idle`
    pub fn history(&self) -> &[ForecastStage] {
        &self.history
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn advance(&mut self, next: ForecastStage) -> Result<()> {
        if !self.stage.can_advance_to(next) {
            return Err(ForecastError::InputError(format!(
                "Illegal forecast stage transition {} -> {}",
                self.stage, next
            )));
        }
        self.stage = next;
        self.history.push(next);
        Ok(())
    }

    /// Mark the request failed if its stage allows it.
    /// Returns whether the request moved to `Failed`.
    pub fn fail(&mut self) -> bool {
        self.advance(ForecastStage::Failed).is_ok()
    }
}

/// Result of a successful request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastOutcome {
    pub choice: ModelChoice,
    /// Description of the fitted model
    pub model: String,
    pub forecast: ForecastResult,
    /// Backtest metrics; absent only for partial results
    pub metrics: Option<MetricsReport>,
    pub accuracy: Option<Accuracy>,
    /// Why metrics are missing, for partial results
    pub warning: Option<String>,
}

/// Fits the chosen model, backtests it and scores the backtest
pub struct Orchestrator {
    config: ForecastConfig,
    observer: Option<Box<dyn StageObserver>>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("config", &self.config)
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self {
            config: ForecastConfig::default(),
            observer: None,
        }
    }
}

impl Orchestrator {
    pub fn new(config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            observer: None,
        })
    }

    /// Deliver stage notifications to `observer`
    pub fn with_observer(mut self, observer: impl StageObserver + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    /// Validate a forecast period against the configured maximum
    pub fn period(&self, years: u32) -> Result<ForecastPeriod> {
        ForecastPeriod::from_years(years, self.config.orchestrator.max_forecast_years)
    }

    /// Forecast `horizon_days` past the end of `series` with the chosen model
    pub fn run(
        &self,
        series: &PriceSeries,
        horizon_days: usize,
        choice: ModelChoice,
    ) -> Result<ForecastOutcome> {
        if horizon_days == 0 {
            return Err(ForecastError::InputError(
                "Forecast horizon must be at least one day".to_string(),
            ));
        }

        let mut request = ForecastRequest::new(choice);
        let result = self.execute(series, horizon_days, &mut request);

        if let Err(e) = &result {
            if request.fail() {
                self.notify(&request);
            }
            log::warn!("{} forecast failed ({}): {}", choice, e.kind(), e);
        }
        result
    }

    /// Like [`run`](Self::run) for a whole number of years
    pub fn run_for_period(
        &self,
        series: &PriceSeries,
        period: ForecastPeriod,
        choice: ModelChoice,
    ) -> Result<ForecastOutcome> {
        self.run(series, period.days(), choice)
    }

    fn execute(
        &self,
        series: &PriceSeries,
        horizon_days: usize,
        request: &mut ForecastRequest,
    ) -> Result<ForecastOutcome> {
        match request.choice() {
            ModelChoice::Decomposition => {
                let model = Decomposition::new(self.config.decomposition.clone())?
                    .with_cv(self.config.decomposition_cv.clone());
                self.execute_model(&model, series, horizon_days, request)
            }
            ModelChoice::Autoregressive => {
                let model = AutoArima::new(self.config.autoregressive.clone())?;
                self.execute_model(&model, &series.close_only(), horizon_days, request)
            }
        }
    }

    fn execute_model<M: ForecastModel>(
        &self,
        model: &M,
        series: &PriceSeries,
        horizon_days: usize,
        request: &mut ForecastRequest,
    ) -> Result<ForecastOutcome> {
        self.transition(request, ForecastStage::Fitting)?;
        let (trained, forecast) = model.fit(series, horizon_days)?;
        let summary = trained.summary();
        log::info!("Fitted {} on {} observations", summary, series.len());

        self.transition(request, ForecastStage::CrossValidating)?;
        let table = match model.cross_validate(series, &trained) {
            Ok(table) => table,
            Err(e) if e.is_recoverable() && self.config.orchestrator.allow_partial_results => {
                log::warn!("Returning forecast without accuracy: {}", e);
                self.transition(request, ForecastStage::Ready)?;
                return Ok(ForecastOutcome {
                    choice: request.choice(),
                    model: summary,
                    forecast,
                    metrics: None,
                    accuracy: None,
                    warning: Some(e.to_string()),
                });
            }
            Err(e) => return Err(e),
        };

        self.transition(request, ForecastStage::Scoring)?;
        let metrics = table.metrics()?;
        let accuracy = Accuracy::from_report(&metrics);
        log::info!(
            "{} backtest over {} points: MAPE {}, accuracy {}",
            model.name(),
            table.len(),
            metrics.mape_display(),
            accuracy
        );

        self.transition(request, ForecastStage::Ready)?;
        Ok(ForecastOutcome {
            choice: request.choice(),
            model: summary,
            forecast,
            metrics: Some(metrics),
            accuracy: Some(accuracy),
            warning: None,
        })
    }

    fn transition(&self, request: &mut ForecastRequest, next: ForecastStage) -> Result<()> {
        request.advance(next)?;
        self.notify(request);
        Ok(())
    }

    fn notify(&self, request: &ForecastRequest) {
        if let Some(observer) = &self.observer {
            observer.on_stage(request.choice(), request.stage());
        }
    }
}

/// Keeps the current model choice and its last successful outcome.
///
/// Switching to a different model discards the cached outcome; every `predict`
/// computes fresh results for the current choice.
#[derive(Debug)]
pub struct ForecastSession {
    orchestrator: Orchestrator,
    choice: ModelChoice,
    last: Option<ForecastOutcome>,
    running: bool,
}

impl ForecastSession {
    pub fn new(orchestrator: Orchestrator, choice: ModelChoice) -> Self {
        Self {
            orchestrator,
            choice,
            last: None,
            running: false,
        }
    }

    pub fn choice(&self) -> ModelChoice {
        self.choice
    }

    /// Change the model; a different choice drops the cached outcome
    pub fn select(&mut self, choice: ModelChoice) {
        if choice != self.choice {
            log::debug!("Model changed from {} to {}; clearing results", self.choice, choice);
            self.choice = choice;
            self.last = None;
        }
    }

    /// Whether a request is in flight
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Last successful outcome for the current choice
    pub fn last_outcome(&self) -> Option<&ForecastOutcome> {
        self.last.as_ref()
    }

    /// Run a request for the current choice and cache its outcome
    pub fn predict(&mut self, series: &PriceSeries, horizon_days: usize) -> Result<&ForecastOutcome> {
        self.running = true;
        self.last = None;
        let result = self.orchestrator.run(series, horizon_days, self.choice);
        self.running = false;

        let outcome = result?;
        Ok(self.last.insert(outcome))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_choice_parsing() {
        assert_eq!("prophet".parse::<ModelChoice>().unwrap(), ModelChoice::Decomposition);
        assert_eq!(" ARIMA ".parse::<ModelChoice>().unwrap(), ModelChoice::Autoregressive);
        assert_eq!(
            "decomposition".parse::<ModelChoice>().unwrap(),
            ModelChoice::Decomposition
        );
        assert!("lstm".parse::<ModelChoice>().is_err());
        assert_eq!(ModelChoice::Autoregressive.to_string(), "autoregressive");
    }

    #[test]
    fn test_forecast_period_bounds() {
        assert_eq!(ForecastPeriod::from_years(1, 4).unwrap().days(), 365);
        assert_eq!(ForecastPeriod::from_years(4, 4).unwrap().days(), 1460);
        assert!(ForecastPeriod::from_years(0, 4).is_err());
        assert!(ForecastPeriod::from_years(5, 4).is_err());
        assert_eq!(ForecastPeriod::from_years(5, 5).unwrap().days(), 1825);
    }

    #[test]
    fn test_stage_transitions() {
        let mut request = ForecastRequest::new(ModelChoice::Decomposition);
        assert!(request.advance(ForecastStage::Scoring).is_err());
        request.advance(ForecastStage::Fitting).unwrap();
        request.advance(ForecastStage::CrossValidating).unwrap();
        request.advance(ForecastStage::Scoring).unwrap();
        request.advance(ForecastStage::Ready).unwrap();
        assert!(request.advance(ForecastStage::Fitting).is_err());

        // Ready is terminal, so failing afterwards changes nothing
        assert!(!request.fail());
        assert_eq!(request.stage(), ForecastStage::Ready);
        assert_eq!(
            request.history(),
            &[
                ForecastStage::Idle,
                ForecastStage::Fitting,
                ForecastStage::CrossValidating,
                ForecastStage::Scoring,
                ForecastStage::Ready,
            ]
        );
    }

    #[test]
    fn test_fail_from_fitting() {
        let mut request = ForecastRequest::new(ModelChoice::Autoregressive);
        request.advance(ForecastStage::Fitting).unwrap();
        assert!(request.fail());
        assert_eq!(request.stage(), ForecastStage::Failed);
    }

    #[test]
    fn test_fail_before_fitting_is_ignored() {
        let mut request = ForecastRequest::new(ModelChoice::Decomposition);
        assert!(!request.fail());
        assert_eq!(request.stage(), ForecastStage::Idle);
        assert_eq!(request.history(), &[ForecastStage::Idle]);
    }
}
