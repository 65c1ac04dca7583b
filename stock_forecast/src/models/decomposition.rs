//! Additive trend + seasonality decomposition model
//!
//! The series is modelled as
//!
//! ```text
//! y(t) = g(t) + s_yearly(t) + s_weekly(t) + e(t)
//! ```
//!
//! where `g` is a piecewise-linear trend whose slope may change at a fixed grid of
//! changepoints and the seasonal terms are truncated Fourier series. All coefficients
//! are estimated jointly by penalised least squares: the changepoint slope adjustments
//! and seasonal coefficients carry Gaussian priors whose scales come from
//! [`DecompositionConfig`].
//!
//! Uncertainty intervals combine the in-sample residual scale with the variance of
//! trend changes that may occur after the last observation, simulated analytically as
//! a Poisson stream of changepoints with Laplace-distributed magnitudes.

use super::{
    CrossValidationTable, CvRecord, ForecastModel, ForecastPoint, ForecastResult,
    TrainedForecastModel,
};
use crate::config::{DecompositionConfig, DecompositionCvConfig};
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::utils::future_dates;
use chrono::{Datelike, Duration, NaiveDate};
use forecast_math::fourier::fourier_features;
use forecast_math::linalg::{dot, least_squares};
use statrs::distribution::{ContinuousCDF, Normal};

const MODEL_NAME: &str = "Decomposition";
const YEARLY_PERIOD: f64 = 365.25;
const WEEKLY_PERIOD: f64 = 7.0;
/// Floor on every penalty so the normal equations stay well conditioned
const MIN_PENALTY: f64 = 1e-6;
/// Refits used to settle the residual variance that scales the priors
const PRIOR_PASSES: usize = 2;

#[derive(Debug, Clone, PartialEq)]
struct Seasonality {
    name: &'static str,
    period: f64,
    order: usize,
}

/// Untrained decomposition model: fit settings plus backtest windows
#[derive(Debug, Clone, Default)]
pub struct Decomposition {
    config: DecompositionConfig,
    cv: DecompositionCvConfig,
}

impl Decomposition {
    /// Create a model with the given fit settings and the default backtest windows
    pub fn new(config: DecompositionConfig) -> Result<Self> {
        if !(config.changepoint_range > 0.0 && config.changepoint_range <= 1.0) {
            return Err(ForecastError::InputError(
                "changepoint_range must be in (0, 1]".to_string(),
            ));
        }
        if config.changepoint_prior_scale <= 0.0 || config.seasonality_prior_scale <= 0.0 {
            return Err(ForecastError::InputError(
                "Prior scales must be positive".to_string(),
            ));
        }
        if !(config.interval_width > 0.0 && config.interval_width < 1.0) {
            return Err(ForecastError::InputError(
                "interval_width must be in (0, 1)".to_string(),
            ));
        }

        Ok(Self {
            config,
            cv: DecompositionCvConfig::default(),
        })
    }

    /// Use other backtest windows
    pub fn with_cv(mut self, cv: DecompositionCvConfig) -> Self {
        self.cv = cv;
        self
    }

    pub fn config(&self) -> &DecompositionConfig {
        &self.config
    }

    pub fn cv_config(&self) -> &DecompositionCvConfig {
        &self.cv
    }
}

impl ForecastModel for Decomposition {
    type Trained = DecompositionModel;

    fn train(&self, series: &PriceSeries) -> Result<DecompositionModel> {
        DecompositionModel::fit(&self.config, series)
    }

    fn cross_validate(
        &self,
        _series: &PriceSeries,
        trained: &DecompositionModel,
    ) -> Result<CrossValidationTable> {
        cross_validate_decomposition(
            trained,
            self.cv.initial(),
            self.cv.step(),
            self.cv.horizon(),
        )
    }

    fn name(&self) -> &str {
        MODEL_NAME
    }
}

/// Fitted decomposition model
#[derive(Debug, Clone)]
pub struct DecompositionModel {
    config: DecompositionConfig,
    training: PriceSeries,
    start: NaiveDate,
    /// Days between the first and last training date; the unit of scaled time
    span_days: f64,
    y_scale: f64,
    /// Changepoint locations in scaled time
    changepoints: Vec<f64>,
    seasonalities: Vec<Seasonality>,
    /// `[offset, slope, deltas.., seasonal..]`
    coefficients: Vec<f64>,
    /// Residual standard deviation on the scaled axis
    sigma: f64,
    /// Standard normal quantile for the interval width
    z: f64,
}

impl DecompositionModel {
    /// Fit the model to `series`
    pub fn fit(config: &DecompositionConfig, series: &PriceSeries) -> Result<Self> {
        if series.len() < 2 {
            return Err(ForecastError::InputError(format!(
                "Decomposition model needs at least two distinct dates, got {}",
                series.len()
            )));
        }

        let dates = series.dates();
        let start = series.first_date();
        let span_days = (series.last_date() - start).num_days() as f64;

        let closes = series.closes();
        let max_abs = closes.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        let y_scale = if max_abs > 0.0 { max_abs } else { 1.0 };
        let y: Vec<f64> = closes.iter().map(|v| v / y_scale).collect();

        let normal = Normal::new(0.0, 1.0)
            .map_err(|e| ForecastError::ModelFittingError(e.to_string()))?;
        let z = normal.inverse_cdf(0.5 + config.interval_width / 2.0);

        let mut model = Self {
            config: config.clone(),
            training: series.clone(),
            start,
            span_days,
            y_scale,
            changepoints: Vec::new(),
            seasonalities: active_seasonalities(config, &dates, span_days),
            coefficients: Vec::new(),
            sigma: 0.0,
            z,
        };
        let t: Vec<f64> = dates.iter().map(|d| model.scaled_time(*d)).collect();
        model.changepoints = place_changepoints(&t, config);

        let design: Vec<Vec<f64>> = dates
            .iter()
            .zip(&t)
            .map(|(d, ti)| model.design_row(*d, *ti))
            .collect();

        // Residual variance of a straight line seeds the prior penalties
        let trend_only: Vec<Vec<f64>> = t.iter().map(|ti| vec![1.0, *ti]).collect();
        let line = least_squares(&trend_only, &y, &[0.0, 0.0])
            .map_err(|e| ForecastError::ModelFittingError(e.to_string()))?;
        let mut noise_variance = residual_variance(&trend_only, &line, &y);

        let mut coefficients = Vec::new();
        for _ in 0..PRIOR_PASSES {
            let penalties = model.penalties(noise_variance);
            coefficients = least_squares(&design, &y, &penalties)
                .map_err(|e| ForecastError::ModelFittingError(e.to_string()))?;
            noise_variance = residual_variance(&design, &coefficients, &y);
        }

        if coefficients.iter().any(|c| !c.is_finite()) || !noise_variance.is_finite() {
            return Err(ForecastError::ModelFittingError(
                "Decomposition fit produced non-finite coefficients".to_string(),
            ));
        }

        model.coefficients = coefficients;
        model.sigma = noise_variance.sqrt();

        log::debug!(
            "Decomposition fit on {} points: {} changepoints, seasonalities {:?}, sigma {:.4}",
            series.len(),
            model.changepoints.len(),
            model.seasonality_names(),
            model.sigma * model.y_scale
        );

        Ok(model)
    }

    /// Fit settings used for this model (and reused for every backtest refit)
    pub fn config(&self) -> &DecompositionConfig {
        &self.config
    }

    pub fn training(&self) -> &PriceSeries {
        &self.training
    }

    /// Changepoint locations as dates
    pub fn changepoint_dates(&self) -> Vec<NaiveDate> {
        self.changepoints
            .iter()
            .map(|c| self.start + Duration::days((c * self.span_days).round() as i64))
            .collect()
    }

    /// Enabled seasonal components
    pub fn seasonality_names(&self) -> Vec<&'static str> {
        self.seasonalities.iter().map(|s| s.name).collect()
    }

    /// Residual standard deviation in price units
    pub fn residual_scale(&self) -> f64 {
        self.sigma * self.y_scale
    }

    /// In-sample fit at every training date
    pub fn predict_history(&self) -> Result<ForecastResult> {
        self.predict_dates(&self.training.dates())
    }

    /// Model output at arbitrary dates (ascending)
    pub fn predict_dates(&self, dates: &[NaiveDate]) -> Result<ForecastResult> {
        let points = dates.iter().map(|d| self.predict_point(*d)).collect();
        ForecastResult::new(MODEL_NAME, points)
    }

    fn predict_point(&self, date: NaiveDate) -> ForecastPoint {
        let t = self.scaled_time(date);
        let row = self.design_row(date, t);
        let trend_columns = self.trend_columns();
        let trend = dot(&row[..trend_columns], &self.coefficients[..trend_columns]);
        let seasonal = dot(&row[trend_columns..], &self.coefficients[trend_columns..]);
        let value = trend + seasonal;

        let half_width = self.z * self.predictive_variance(t).sqrt();

        ForecastPoint {
            date,
            value: value * self.y_scale,
            lower: Some((value - half_width) * self.y_scale),
            upper: Some((value + half_width) * self.y_scale),
            trend: Some(trend * self.y_scale),
            additive_terms: Some(seasonal * self.y_scale),
        }
    }

    /// Residual variance plus the variance of trend changes between the end of history
    /// (scaled time 1) and `t`.
    ///
    /// Future changepoints arrive at the historical rate `S` per unit of scaled time
    /// with Laplace(0, b) magnitudes; a change at `u` shifts the trend at `t` by
    /// `delta * (t - u)`, giving `S * 2b^2 * h^3 / 3` for `h = t - 1`.
    fn predictive_variance(&self, t: f64) -> f64 {
        let noise = self.sigma * self.sigma;
        let h = t - 1.0;
        if h <= 0.0 || self.changepoints.is_empty() {
            return noise;
        }
        let deltas = self.deltas();
        let b = deltas.iter().map(|d| d.abs()).sum::<f64>() / deltas.len() as f64 + 1e-8;
        let rate = self.changepoints.len() as f64;
        noise + rate * 2.0 * b * b * h.powi(3) / 3.0
    }

    fn deltas(&self) -> &[f64] {
        &self.coefficients[2..self.trend_columns()]
    }

    fn trend_columns(&self) -> usize {
        2 + self.changepoints.len()
    }

    fn scaled_time(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64 / self.span_days
    }

    fn design_row(&self, date: NaiveDate, t: f64) -> Vec<f64> {
        let mut row = Vec::with_capacity(self.trend_columns() + 2 * self.seasonal_order_total());
        row.push(1.0);
        row.push(t);
        row.extend(self.changepoints.iter().map(|c| (t - c).max(0.0)));

        // Seasonal phase is tied to the calendar so refits on shorter windows line up
        let day = date.num_days_from_ce() as f64;
        for s in &self.seasonalities {
            row.extend(fourier_features(day, s.period, s.order));
        }
        row
    }

    fn seasonal_order_total(&self) -> usize {
        self.seasonalities.iter().map(|s| s.order).sum()
    }

    /// Ridge penalties equivalent to the Gaussian priors, given the noise variance.
    ///
    /// A prior `N(0, v)` on a coefficient adds `noise_variance / v` to its diagonal.
    /// Changepoint deltas use the variance of a Laplace prior, `2 * scale^2`.
    fn penalties(&self, noise_variance: f64) -> Vec<f64> {
        let delta_variance = 2.0 * self.config.changepoint_prior_scale.powi(2);
        let seasonal_variance = self.config.seasonality_prior_scale.powi(2);
        let delta_penalty = (noise_variance / delta_variance).max(MIN_PENALTY);
        let seasonal_penalty = (noise_variance / seasonal_variance).max(MIN_PENALTY);

        let mut penalties = vec![0.0, 0.0];
        penalties.extend(std::iter::repeat(delta_penalty).take(self.changepoints.len()));
        penalties.extend(std::iter::repeat(seasonal_penalty).take(2 * self.seasonal_order_total()));
        penalties
    }
}

impl TrainedForecastModel for DecompositionModel {
    fn forecast(&self, horizon_days: usize) -> Result<ForecastResult> {
        if horizon_days == 0 {
            return Err(ForecastError::InputError(
                "Forecast horizon must be at least one day".to_string(),
            ));
        }
        self.predict_dates(&future_dates(self.training.last_date(), horizon_days))
    }

    fn last_date(&self) -> NaiveDate {
        self.training.last_date()
    }

    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn summary(&self) -> String {
        let seasonalities = self.seasonality_names();
        format!(
            "{} with {} changepoints, seasonality: {}",
            MODEL_NAME,
            self.changepoints.len(),
            if seasonalities.is_empty() {
                "none".to_string()
            } else {
                seasonalities.join(", ")
            }
        )
    }
}

fn residual_variance(design: &[Vec<f64>], coefficients: &[f64], y: &[f64]) -> f64 {
    let sum: f64 = design
        .iter()
        .zip(y)
        .map(|(row, target)| (target - dot(row, coefficients)).powi(2))
        .sum();
    sum / y.len() as f64
}

/// Evenly spaced changepoints over the first `changepoint_range` of the rows
fn place_changepoints(t: &[f64], config: &DecompositionConfig) -> Vec<f64> {
    let history = (t.len() as f64 * config.changepoint_range).floor() as usize;
    let count = config.n_changepoints.min(history.saturating_sub(1));
    if count == 0 {
        return Vec::new();
    }
    let last_index = (history - 1) as f64;
    (1..=count)
        .map(|i| {
            let index = (i as f64 * last_index / count as f64).round() as usize;
            t[index]
        })
        .collect()
}

/// Yearly needs two years of history; weekly needs two weeks and sub-weekly spacing
fn active_seasonalities(
    config: &DecompositionConfig,
    dates: &[NaiveDate],
    span_days: f64,
) -> Vec<Seasonality> {
    let mut seasonalities = Vec::new();
    if config.yearly_order > 0 && span_days >= 730.0 {
        seasonalities.push(Seasonality {
            name: "yearly",
            period: YEARLY_PERIOD,
            order: config.yearly_order,
        });
    }

    let min_spacing = dates
        .windows(2)
        .map(|w| (w[1] - w[0]).num_days())
        .min()
        .unwrap_or(0);
    if config.weekly_order > 0 && span_days >= 14.0 && min_spacing < 7 {
        seasonalities.push(Seasonality {
            name: "weekly",
            period: WEEKLY_PERIOD,
            order: config.weekly_order,
        });
    }
    seasonalities
}

/// Fit the decomposition model with default settings and forecast `horizon_days`
/// calendar days past the last observation.
pub fn fit_decomposition(
    series: &PriceSeries,
    horizon_days: usize,
) -> Result<(DecompositionModel, ForecastResult)> {
    if horizon_days == 0 {
        return Err(ForecastError::InputError(
            "Forecast horizon must be at least one day".to_string(),
        ));
    }
    Decomposition::default().fit(series, horizon_days)
}

/// Backtest cutoffs for rolling-origin validation, ascending.
///
/// The latest cutoff leaves exactly `horizon` after it. Earlier cutoffs step back by
/// `step` while the previous one still has `initial` of history behind it; a cutoff
/// whose window would hold no observations moves back to the last observation before
/// it, less `horizon`. The final generated cutoff (the one that broke the loop) is
/// dropped.
pub fn generate_cutoffs(
    series: &PriceSeries,
    initial: Duration,
    step: Duration,
    horizon: Duration,
) -> Result<Vec<NaiveDate>> {
    if step <= Duration::zero() || horizon <= Duration::zero() || initial < Duration::zero() {
        return Err(ForecastError::InputError(
            "Cross-validation step and horizon must be positive and initial non-negative"
                .to_string(),
        ));
    }

    let first = series.first_date();
    let dates = series.dates();
    let mut cutoff = series.last_date() - horizon;
    if cutoff < first {
        return Err(ForecastError::CrossValidationError(
            "Less data than horizon".to_string(),
        ));
    }

    let mut cutoffs = vec![cutoff];
    while cutoffs.last().map_or(false, |c| *c >= first + initial) {
        cutoff -= step;
        let window_end = cutoff + horizon;
        let has_observations = dates.iter().any(|d| *d > cutoff && *d <= window_end);
        if !has_observations && cutoff > first {
            if let Some(closest) = dates.iter().rev().find(|d| **d <= cutoff) {
                cutoff = *closest - horizon;
            }
        }
        cutoffs.push(cutoff);
    }
    cutoffs.pop();

    if cutoffs.is_empty() {
        return Err(ForecastError::CrossValidationError(
            "Less data than horizon after initial window; make horizon or initial shorter"
                .to_string(),
        ));
    }
    cutoffs.reverse();
    Ok(cutoffs)
}

/// Rolling-origin backtest of a fitted decomposition model.
///
/// For every cutoff from [`generate_cutoffs`] the model is refitted with the same
/// settings on the training data up to the cutoff and scored on the observations in
/// `(cutoff, cutoff + horizon]`.
pub fn cross_validate_decomposition(
    model: &DecompositionModel,
    initial: Duration,
    step: Duration,
    horizon: Duration,
) -> Result<CrossValidationTable> {
    let series = model.training();
    let cutoffs = generate_cutoffs(series, initial, step, horizon)?;
    log::info!(
        "Making {} forecasts with cutoffs between {} and {}",
        cutoffs.len(),
        cutoffs[0],
        cutoffs[cutoffs.len() - 1]
    );

    let mut records = Vec::new();
    for cutoff in cutoffs {
        let history = series.until(cutoff).ok().filter(|h| h.len() >= 2).ok_or_else(|| {
            ForecastError::CrossValidationError(format!(
                "Less than two datapoints before cutoff {}; increase the initial window",
                cutoff
            ))
        })?;

        let window_end = cutoff + horizon;
        let held_out: Vec<_> = series
            .bars()
            .iter()
            .filter(|b| b.date > cutoff && b.date <= window_end)
            .collect();
        if held_out.is_empty() {
            log::warn!("No observations after cutoff {}; fold skipped", cutoff);
            continue;
        }

        let fold = DecompositionModel::fit(&model.config, &history)?;
        let dates: Vec<NaiveDate> = held_out.iter().map(|b| b.date).collect();
        let predicted = fold.predict_dates(&dates)?;

        records.extend(held_out.iter().zip(predicted.points()).map(|(bar, point)| {
            CvRecord {
                date: bar.date,
                actual: bar.close,
                predicted: point.value,
                lower: point.lower,
                upper: point.upper,
                cutoff,
            }
        }));
    }

    if records.is_empty() {
        return Err(ForecastError::CrossValidationError(
            "No held-out observations in any fold".to_string(),
        ));
    }
    Ok(CrossValidationTable::new(records))
}
