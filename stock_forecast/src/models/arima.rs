//! Seasonal ARIMA model estimated by conditional sum of squares
//!
//! An order `(p, d, q)(P, D, Q)[m]` model is
//!
//! ```text
//! phi(B) Phi(B^m) (w_t - mu) = theta(B) Theta(B^m) e_t,    w = (1 - B)^d (1 - B^m)^D y
//! ```
//!
//! Coefficients are searched in an unconstrained space and mapped through partial
//! autocorrelations, so every candidate the optimizer visits is stationary and
//! invertible.

use super::{CrossValidationTable, CvRecord, ForecastPoint, ForecastResult, TrainedForecastModel};
use crate::config::InformationCriterion;
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use crate::utils::{future_dates, time_series_splits};
use chrono::NaiveDate;
use forecast_math::optimize::NelderMead;
use forecast_math::polynomial::{
    apply_operator, constrain_stationary, differencing_operator, integrate, multiply,
};
use forecast_math::stats::{mean, variance};
use serde::{Deserialize, Serialize};
use std::fmt;

const MODEL_NAME: &str = "Autoregressive";

/// Model order `(p, d, q)(P, D, Q)[m]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    /// Seasonal period; 0 or 1 means no seasonal part
    pub period: usize,
}

impl SarimaOrder {
    /// Non-seasonal order
    pub fn new(p: usize, d: usize, q: usize) -> Self {
        Self {
            p,
            d,
            q,
            seasonal_p: 0,
            seasonal_d: 0,
            seasonal_q: 0,
            period: 0,
        }
    }

    /// Add a seasonal part
    pub fn with_seasonal(mut self, p: usize, d: usize, q: usize, period: usize) -> Self {
        self.seasonal_p = p;
        self.seasonal_d = d;
        self.seasonal_q = q;
        self.period = period;
        self
    }

    pub fn is_seasonal(&self) -> bool {
        self.period > 1
    }

    /// `p + q + P + Q`
    pub fn arma_terms(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// Total differencing `d + D`
    pub fn total_differencing(&self) -> usize {
        self.d + self.seasonal_d
    }

    fn differencing_operator(&self) -> Vec<f64> {
        let period = if self.is_seasonal() { self.period } else { 0 };
        differencing_operator(self.d, self.seasonal_d, period)
    }
}

impl fmt::Display for SarimaOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARIMA({},{},{})", self.p, self.d, self.q)?;
        if self.is_seasonal() {
            write!(
                f,
                "({},{},{})[{}]",
                self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
            )?;
        }
        Ok(())
    }
}

/// Coefficients of one parameter vector
#[derive(Debug, Clone, PartialEq)]
struct Coefficients {
    ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ar: Vec<f64>,
    seasonal_ma: Vec<f64>,
    mean: f64,
}

impl Coefficients {
    /// Map an optimizer point to coefficients. The mean (when estimated) is the last
    /// element, measured in standard deviations of the differenced series.
    fn unpack(
        order: &SarimaOrder,
        with_constant: bool,
        x: &[f64],
        center: f64,
        scale: f64,
    ) -> Self {
        let (ar, rest) = x.split_at(order.p);
        let (ma, rest) = rest.split_at(order.q);
        let (seasonal_ar, rest) = rest.split_at(order.seasonal_p);
        let (seasonal_ma, rest) = rest.split_at(order.seasonal_q);
        let mean = match rest.first() {
            Some(offset) if with_constant => center + scale * offset,
            _ => 0.0,
        };
        let ar = constrain_stationary(ar);
        let ma = negate(constrain_stationary(ma));
        let seasonal_ar = constrain_stationary(seasonal_ar);
        let seasonal_ma = negate(constrain_stationary(seasonal_ma));
        Self {
            ar,
            ma,
            seasonal_ar,
            seasonal_ma,
            mean,
        }
    }

    /// Expanded `phi(B) Phi(B^m)` as `[1, -a_1, -a_2, ...]`
    fn ar_polynomial(&self, period: usize) -> Vec<f64> {
        multiply(
            &lag_polynomial(&self.ar, 1, -1.0),
            &lag_polynomial(&self.seasonal_ar, period, -1.0),
        )
    }

    /// Expanded `theta(B) Theta(B^m)` as `[1, b_1, b_2, ...]`
    fn ma_polynomial(&self, period: usize) -> Vec<f64> {
        multiply(
            &lag_polynomial(&self.ma, 1, 1.0),
            &lag_polynomial(&self.seasonal_ma, period, 1.0),
        )
    }
}

fn negate(values: Vec<f64>) -> Vec<f64> {
    values.into_iter().map(|v| -v).collect()
}

/// `1 + sign * (c_1 B^lag + c_2 B^(2 lag) + ...)`
fn lag_polynomial(coefficients: &[f64], lag: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefficients.len() * lag + 1];
    poly[0] = 1.0;
    for (i, c) in coefficients.iter().enumerate() {
        poly[(i + 1) * lag] = sign * c;
    }
    poly
}

/// One-step-ahead residuals conditional on zero pre-sample shocks. The first
/// `ar.len() - 1` residuals have no complete history and stay zero.
fn css_residuals(w: &[f64], ar: &[f64], ma: &[f64], mean: f64) -> Vec<f64> {
    let start = ar.len() - 1;
    let mut residuals = vec![0.0; w.len()];
    for t in start..w.len() {
        let mut e: f64 = ar
            .iter()
            .enumerate()
            .map(|(j, c)| c * (w[t - j] - mean))
            .sum();
        for (j, b) in ma.iter().enumerate().skip(1) {
            if j > t {
                break;
            }
            e -= b * residuals[t - j];
        }
        residuals[t] = e;
    }
    residuals
}

/// Fitted seasonal ARIMA model
#[derive(Debug, Clone)]
pub struct AutoregressiveModel {
    order: SarimaOrder,
    with_constant: bool,
    coefficients: Coefficients,
    sigma2: f64,
    log_likelihood: f64,
    criterion: InformationCriterion,
    criterion_value: f64,
    /// Observations used by the likelihood (after differencing and AR start-up)
    effective_observations: usize,
    training: PriceSeries,
    differenced: Vec<f64>,
    residuals: Vec<f64>,
}

impl AutoregressiveModel {
    /// Estimate a model of the given order on the closes of `series`.
    ///
    /// Fails with an input error when the series is too short for the order and with a
    /// fitting error when the optimizer does not converge or the fit is not finite.
    pub fn fit(
        series: &PriceSeries,
        order: SarimaOrder,
        with_constant: bool,
        optimizer: &NelderMead,
        criterion: InformationCriterion,
    ) -> Result<Self> {
        let y = series.closes();
        let w = apply_operator(&y, &order.differencing_operator());
        let period = if order.is_seasonal() { order.period } else { 1 };
        let ar_lags = order.p + order.seasonal_p * period;
        let parameters = order.arma_terms() + usize::from(with_constant);

        if w.len() <= ar_lags + parameters + 1 {
            return Err(ForecastError::InputError(format!(
                "{} observations are too few for {}",
                y.len(),
                order
            )));
        }

        let center = mean(&w)?;
        let spread = variance(&w)?;
        let scale = if spread > 0.0 { spread.sqrt() } else { 1.0 };
        let effective = w.len() - ar_lags;

        let objective = |x: &[f64]| {
            let c = Coefficients::unpack(&order, with_constant, x, center, scale);
            let residuals =
                css_residuals(&w, &c.ar_polynomial(period), &c.ma_polynomial(period), c.mean);
            let css: f64 = residuals[ar_lags..].iter().map(|e| e * e).sum();
            css / (effective as f64 * scale * scale)
        };

        let start = vec![0.0; parameters];
        let mut minimum = optimizer.minimize(objective, &start)?;
        if !minimum.converged {
            // One restart from the best point usually finishes a stalled simplex
            minimum = optimizer.minimize(objective, &minimum.point)?;
        }
        if !minimum.converged {
            return Err(ForecastError::ModelFittingError(format!(
                "{} did not converge after {} iterations",
                order, minimum.iterations
            )));
        }

        let coefficients =
            Coefficients::unpack(&order, with_constant, &minimum.point, center, scale);
        let residuals = css_residuals(
            &w,
            &coefficients.ar_polynomial(period),
            &coefficients.ma_polynomial(period),
            coefficients.mean,
        );
        let css: f64 = residuals[ar_lags..].iter().map(|e| e * e).sum();
        let sigma2 = (css / effective as f64).max(f64::MIN_POSITIVE);
        let n = effective as f64;
        let log_likelihood = -0.5 * n * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0);
        let criterion_value = criterion.score(log_likelihood, parameters + 1, effective);

        if !log_likelihood.is_finite() || !criterion_value.is_finite() {
            return Err(ForecastError::ModelFittingError(format!(
                "{} produced a non-finite likelihood",
                order
            )));
        }

        Ok(Self {
            order,
            with_constant,
            coefficients,
            sigma2,
            log_likelihood,
            criterion,
            criterion_value,
            effective_observations: effective,
            training: series.close_only(),
            differenced: w,
            residuals,
        })
    }

    pub fn order(&self) -> SarimaOrder {
        self.order
    }

    pub fn with_constant(&self) -> bool {
        self.with_constant
    }

    pub fn ar_coefficients(&self) -> &[f64] {
        &self.coefficients.ar
    }

    pub fn ma_coefficients(&self) -> &[f64] {
        &self.coefficients.ma
    }

    pub fn seasonal_ar_coefficients(&self) -> &[f64] {
        &self.coefficients.seasonal_ar
    }

    pub fn seasonal_ma_coefficients(&self) -> &[f64] {
        &self.coefficients.seasonal_ma
    }

    /// Mean of the differenced series (zero without a constant)
    pub fn constant(&self) -> f64 {
        self.coefficients.mean
    }

    /// Innovation variance
    pub fn sigma2(&self) -> f64 {
        self.sigma2
    }

    pub fn log_likelihood(&self) -> f64 {
        self.log_likelihood
    }

    pub fn criterion(&self) -> InformationCriterion {
        self.criterion
    }

    /// Value of the information criterion the model was scored with
    pub fn criterion_value(&self) -> f64 {
        self.criterion_value
    }

    /// Estimated parameters excluding the innovation variance
    pub fn parameter_count(&self) -> usize {
        self.order.arma_terms() + usize::from(self.with_constant)
    }

    pub fn effective_observations(&self) -> usize {
        self.effective_observations
    }

    pub fn training(&self) -> &PriceSeries {
        &self.training
    }

    /// In-sample one-step residuals on the differenced scale
    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }

    fn seasonal_period(&self) -> usize {
        if self.order.is_seasonal() {
            self.order.period
        } else {
            1
        }
    }

    /// Recursive point forecasts on the original scale
    fn forecast_values(&self, steps: usize) -> Result<Vec<f64>> {
        let period = self.seasonal_period();
        let ar = self.coefficients.ar_polynomial(period);
        let ma = self.coefficients.ma_polynomial(period);
        let mean = self.coefficients.mean;

        let mut centered: Vec<f64> = self.differenced.iter().map(|v| v - mean).collect();
        let mut shocks = self.residuals.clone();
        let mut differenced = Vec::with_capacity(steps);
        for _ in 0..steps {
            let t = centered.len();
            let mut next = 0.0;
            for (j, a) in ar.iter().enumerate().skip(1) {
                if j <= t {
                    next -= a * centered[t - j];
                }
            }
            for (j, b) in ma.iter().enumerate().skip(1) {
                if j <= t {
                    next += b * shocks[t - j];
                }
            }
            centered.push(next);
            shocks.push(0.0);
            differenced.push(next + mean);
        }

        let history = self.training.closes();
        Ok(integrate(
            &history,
            &self.order.differencing_operator(),
            &differenced,
        )?)
    }
}

impl TrainedForecastModel for AutoregressiveModel {
    fn forecast(&self, horizon_days: usize) -> Result<ForecastResult> {
        if horizon_days == 0 {
            return Err(ForecastError::InputError(
                "Forecast horizon must be at least one day".to_string(),
            ));
        }
        let values = self.forecast_values(horizon_days)?;
        let points = future_dates(self.training.last_date(), horizon_days)
            .into_iter()
            .zip(values)
            .map(|(date, value)| ForecastPoint::new(date, value))
            .collect();
        ForecastResult::new(MODEL_NAME, points)
    }

    fn last_date(&self) -> NaiveDate {
        self.training.last_date()
    }

    fn name(&self) -> &str {
        MODEL_NAME
    }

    fn summary(&self) -> String {
        format!(
            "{}{}, {}={:.2}",
            self.order,
            if self.with_constant { " with constant" } else { "" },
            self.criterion,
            self.criterion_value
        )
    }
}

/// Expanding-window backtest of a fitted autoregressive model.
///
/// The rows are cut into `folds + 1` blocks and each later block is a test segment.
/// Every fold asks the already-fitted `model` for as many steps as the segment holds:
/// the forecasts start after the end of the full training data, not at the fold's
/// cutoff, and the model is not refitted per fold.
pub fn cross_validate_autoregressive(
    series: &PriceSeries,
    model: &AutoregressiveModel,
    folds: usize,
) -> Result<CrossValidationTable> {
    let splits = time_series_splits(series.len(), folds)?;
    let bars = series.bars();

    let mut records = Vec::new();
    for split in splits {
        if split.test_len() == 0 {
            return Err(ForecastError::CrossValidationError(
                "Test segment is empty".to_string(),
            ));
        }
        let forecast = model.forecast(split.test_len())?;
        let cutoff = bars[split.train_end - 1].date;
        records.extend(
            bars[split.test_start..split.test_end]
                .iter()
                .zip(forecast.points())
                .map(|(bar, point)| CvRecord {
                    date: bar.date,
                    actual: bar.close,
                    predicted: point.value,
                    lower: None,
                    upper: None,
                    cutoff,
                }),
        );
    }

    log::info!(
        "Autoregressive backtest: {} folds, {} held-out points",
        folds,
        records.len()
    );
    Ok(CrossValidationTable::new(records))
}
