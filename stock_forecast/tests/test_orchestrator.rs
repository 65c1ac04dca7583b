use pretty_assertions::assert_eq;
use rstest::rstest;
use std::sync::{Arc, Mutex};
use stock_forecast::config::{AutoregressiveConfig, DecompositionCvConfig, ForecastConfig};
use stock_forecast::orchestrator::{
    ForecastPeriod, ForecastRequest, ForecastSession, ForecastStage, ModelChoice, Orchestrator,
};
use stock_forecast::synthetic::{Scenario, SyntheticSeriesGenerator};
use stock_forecast::{ForecastError, PriceSeries};

fn create_series(n: usize) -> PriceSeries {
    SyntheticSeriesGenerator::new(42)
        .generate(Scenario::Seasonal, n)
        .unwrap()
}

/// Backtest windows short enough for a 400-day history
fn create_config() -> ForecastConfig {
    ForecastConfig {
        decomposition_cv: DecompositionCvConfig {
            initial_days: 180,
            step_days: 90,
            horizon_days: 60,
        },
        autoregressive: AutoregressiveConfig {
            max_models: 30,
            ..AutoregressiveConfig::default()
        },
        ..ForecastConfig::default()
    }
}

fn recording_orchestrator(config: ForecastConfig) -> (Orchestrator, Arc<Mutex<Vec<ForecastStage>>>) {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let orchestrator = Orchestrator::new(config)
        .unwrap()
        .with_observer(move |_choice: ModelChoice, stage: ForecastStage| {
            sink.lock().unwrap().push(stage);
        });
    (orchestrator, stages)
}

#[rstest]
#[case(ModelChoice::Decomposition)]
#[case(ModelChoice::Autoregressive)]
fn test_run_reports_accuracy(#[case] choice: ModelChoice) {
    let series = create_series(400);
    let (orchestrator, stages) = recording_orchestrator(create_config());

    let outcome = orchestrator.run(&series, 90, choice).unwrap();
    assert_eq!(outcome.choice, choice);
    assert_eq!(outcome.forecast.len(), 90);
    assert!(outcome.forecast.first_date().unwrap() > series.last_date());
    assert!(outcome.warning.is_none());

    let metrics = outcome.metrics.unwrap();
    let accuracy = outcome.accuracy.unwrap();
    assert!((accuracy.value() - (100.0 - metrics.mape)).abs() < 1e-12);
    assert!(metrics.rmse >= metrics.mae);

    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            ForecastStage::Fitting,
            ForecastStage::CrossValidating,
            ForecastStage::Scoring,
            ForecastStage::Ready,
        ]
    );
}

#[test]
fn test_only_decomposition_has_intervals() {
    let series = create_series(400);
    let orchestrator = Orchestrator::new(create_config()).unwrap();

    let decomposition = orchestrator.run(&series, 30, ModelChoice::Decomposition).unwrap();
    assert!(decomposition.forecast.intervals().is_some());

    let autoregressive = orchestrator.run(&series, 30, ModelChoice::Autoregressive).unwrap();
    assert!(autoregressive.forecast.intervals().is_none());
    assert!(autoregressive.model.starts_with("ARIMA("));
}

#[test]
fn test_backtest_failure_fails_request() {
    // Default windows need more than two years of history
    let series = create_series(400);
    let (orchestrator, stages) = recording_orchestrator(ForecastConfig::default());

    let result = orchestrator.run(&series, 30, ModelChoice::Decomposition);
    assert!(matches!(result, Err(ForecastError::CrossValidationError(_))));
    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            ForecastStage::Fitting,
            ForecastStage::CrossValidating,
            ForecastStage::Failed,
        ]
    );
}

#[test]
fn test_partial_results_when_allowed() {
    let series = create_series(400);
    let mut config = ForecastConfig::default();
    config.orchestrator.allow_partial_results = true;
    let (orchestrator, stages) = recording_orchestrator(config);

    let outcome = orchestrator.run(&series, 30, ModelChoice::Decomposition).unwrap();
    assert_eq!(outcome.forecast.len(), 30);
    assert!(outcome.metrics.is_none());
    assert!(outcome.accuracy.is_none());
    assert!(outcome.warning.unwrap().contains("Cross-validation failed"));
    assert_eq!(
        *stages.lock().unwrap(),
        vec![
            ForecastStage::Fitting,
            ForecastStage::CrossValidating,
            ForecastStage::Ready,
        ]
    );
}

#[test]
fn test_zero_horizon_is_rejected_before_any_stage() {
    let series = create_series(100);
    let (orchestrator, stages) = recording_orchestrator(create_config());
    let result = orchestrator.run(&series, 0, ModelChoice::Decomposition);
    assert!(matches!(result, Err(ForecastError::InputError(_))));
    assert!(stages.lock().unwrap().is_empty());
}

/// Default windows and folds, one-year horizon
#[rstest]
#[case(ModelChoice::Decomposition)]
#[case(ModelChoice::Autoregressive)]
fn test_default_orchestrator_one_year(#[case] choice: ModelChoice) {
    let series = create_series(1500);
    let orchestrator = Orchestrator::default();
    let period = orchestrator.period(1).unwrap();

    let outcome = orchestrator.run_for_period(&series, period, choice).unwrap();
    assert_eq!(outcome.forecast.len(), 365);
    assert!(outcome.forecast.first_date().unwrap() > series.last_date());
    let dates = outcome.forecast.dates();
    assert!(dates.windows(2).all(|w| w[0] < w[1]));
    assert!(outcome.accuracy.is_some());
    assert!(outcome.metrics.is_some());
}

#[rstest]
#[case(1, 365)]
#[case(4, 1460)]
fn test_forecast_period_days(#[case] years: u32, #[case] days: usize) {
    let period = Orchestrator::default().period(years).unwrap();
    assert_eq!(period.years(), years);
    assert_eq!(period.days(), days);
}

#[rstest]
#[case(0)]
#[case(5)]
fn test_forecast_period_out_of_range(#[case] years: u32) {
    assert!(matches!(
        ForecastPeriod::from_years(years, 4),
        Err(ForecastError::InputError(_))
    ));
}

#[test]
fn test_request_rejects_illegal_transitions() {
    let mut request = ForecastRequest::new(ModelChoice::Decomposition);
    assert!(request.advance(ForecastStage::Scoring).is_err());
    request.advance(ForecastStage::Fitting).unwrap();
    request.advance(ForecastStage::CrossValidating).unwrap();
    assert!(request.fail());
    assert!(!request.fail());
    assert_eq!(
        request.history(),
        &[
            ForecastStage::Idle,
            ForecastStage::Fitting,
            ForecastStage::CrossValidating,
            ForecastStage::Failed,
        ]
    );
    assert!(request.stage().is_terminal());
    assert!(request.advance(ForecastStage::Ready).is_err());
}

#[test]
fn test_session_clears_results_on_model_change() {
    let series = create_series(400);
    let orchestrator = Orchestrator::new(create_config()).unwrap();
    let mut session = ForecastSession::new(orchestrator, ModelChoice::Decomposition);

    let first = session.predict(&series, 30).unwrap().clone();
    assert_eq!(first.choice, ModelChoice::Decomposition);
    assert!(!session.is_running());
    assert_eq!(session.last_outcome(), Some(&first));

    // Selecting the same model keeps the outcome
    session.select(ModelChoice::Decomposition);
    assert!(session.last_outcome().is_some());

    session.select(ModelChoice::Autoregressive);
    assert!(session.last_outcome().is_none());
    assert_eq!(session.choice(), ModelChoice::Autoregressive);

    let second = session.predict(&series, 30).unwrap();
    assert_eq!(second.choice, ModelChoice::Autoregressive);
}

#[test]
fn test_session_failure_drops_stale_outcome() {
    let series = create_series(400);
    let orchestrator = Orchestrator::new(create_config()).unwrap();
    let mut session = ForecastSession::new(orchestrator, ModelChoice::Decomposition);

    session.predict(&series, 30).unwrap();
    assert!(session.predict(&series, 0).is_err());
    assert!(session.last_outcome().is_none());
    assert!(!session.is_running());
}
