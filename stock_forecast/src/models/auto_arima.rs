//! Automatic order selection for the seasonal ARIMA model
//!
//! Differencing orders come from unit-root style tests (KPSS for `d`, seasonal strength
//! for `D`). The ARMA orders are then found by a stepwise search: a handful of
//! starting models, followed by repeatedly trying the neighbours of the best model so
//! far until none of them improves the information criterion.

use super::arima::{cross_validate_autoregressive, AutoregressiveModel, SarimaOrder};
use super::{CrossValidationTable, ForecastModel, ForecastResult, TrainedForecastModel};
use crate::config::AutoregressiveConfig;
use crate::data::PriceSeries;
use crate::error::{ForecastError, Result};
use forecast_math::polynomial::{apply_operator, differencing_operator};
use forecast_math::stationarity::{ndiffs, nsdiffs};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Criterion values closer than this count as a tie
const TIE_TOLERANCE: f64 = 1e-8;
/// Fewest observations an order search is attempted on
const MIN_OBSERVATIONS: usize = 10;

/// An order together with the constant switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Candidate {
    order: SarimaOrder,
    constant: bool,
}

/// Seasonal ARIMA with automatic order selection
#[derive(Debug, Clone, Default)]
pub struct AutoArima {
    config: AutoregressiveConfig,
}

impl AutoArima {
    pub fn new(config: AutoregressiveConfig) -> Result<Self> {
        if config.folds == 0 {
            return Err(ForecastError::InputError(
                "Number of folds must be at least 1".to_string(),
            ));
        }
        if config.max_models == 0 {
            return Err(ForecastError::InputError(
                "max_models must be at least 1".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &AutoregressiveConfig {
        &self.config
    }

    /// Seasonal period in effect, or 0 for a non-seasonal search
    fn period(&self) -> usize {
        if self.config.seasonal && self.config.seasonal_period > 1 {
            self.config.seasonal_period
        } else {
            0
        }
    }

    /// Choose `(d, D)`: seasonal differences first, then regular differences of the
    /// seasonally differenced series
    pub fn select_differencing(&self, values: &[f64]) -> Result<(usize, usize)> {
        let period = self.period();
        let seasonal_d = if period > 1 && self.config.max_seasonal_d > 0 {
            nsdiffs(values, period, self.config.max_seasonal_d)?
        } else {
            0
        };

        let adjusted = apply_operator(values, &differencing_operator(0, seasonal_d, period));
        let d = if adjusted.len() >= 3 {
            ndiffs(&adjusted, self.config.kpss_alpha, self.config.max_d)?
        } else {
            0
        };
        Ok((d, seasonal_d))
    }

    /// Select and fit the best model for `series`
    pub fn search(&self, series: &PriceSeries) -> Result<AutoregressiveModel> {
        if series.len() < MIN_OBSERVATIONS {
            return Err(ForecastError::InputError(format!(
                "Order search needs at least {} observations, got {}",
                MIN_OBSERVATIONS,
                series.len()
            )));
        }

        let (d, seasonal_d) = self.select_differencing(&series.closes())?;
        let allow_constant = d + seasonal_d < 2;
        log::info!(
            "Searching ARIMA orders with d={}, D={}, period={}, constant={}",
            d,
            seasonal_d,
            self.period(),
            allow_constant
        );

        let mut search = Search {
            arima: self,
            series,
            tried: HashSet::new(),
            fitted: 0,
            best: None,
        };

        if self.config.stepwise {
            search.stepwise(d, seasonal_d, allow_constant);
        } else {
            search.exhaustive(d, seasonal_d, allow_constant);
        }

        let tried = search.tried.len();
        let best = search.best.ok_or_else(|| {
            ForecastError::ModelFittingError(format!(
                "None of the {} candidate ARIMA models could be fitted",
                tried
            ))
        })?;

        log::info!(
            "Selected {}{} ({} {:.3}) after {} fits",
            best.order(),
            if best.with_constant() { " with constant" } else { "" },
            best.criterion(),
            best.criterion_value(),
            search.fitted
        );
        Ok(best)
    }

    fn order(&self, p: usize, d: usize, q: usize, sp: usize, sd: usize, sq: usize) -> SarimaOrder {
        let period = self.period();
        if period > 1 {
            SarimaOrder::new(p, d, q).with_seasonal(sp, sd, sq, period)
        } else {
            SarimaOrder::new(p, d, q)
        }
    }

    fn within_bounds(&self, order: &SarimaOrder) -> bool {
        let c = &self.config;
        order.p <= c.max_p
            && order.q <= c.max_q
            && order.seasonal_p <= c.max_seasonal_p
            && order.seasonal_q <= c.max_seasonal_q
            && order.arma_terms() <= c.max_order
    }
}

struct Search<'a> {
    arima: &'a AutoArima,
    series: &'a PriceSeries,
    tried: HashSet<Candidate>,
    fitted: usize,
    best: Option<AutoregressiveModel>,
}

impl Search<'_> {
    fn stepwise(&mut self, d: usize, seasonal_d: usize, allow_constant: bool) {
        let arima = self.arima;
        let seasonal = arima.period() > 1;
        let clip = |value: usize, max: usize| value.min(max);
        let c = &arima.config;

        let mut starts = vec![
            arima.order(
                clip(2, c.max_p),
                d,
                clip(2, c.max_q),
                clip(1, c.max_seasonal_p),
                seasonal_d,
                clip(1, c.max_seasonal_q),
            ),
            arima.order(0, d, 0, 0, seasonal_d, 0),
            arima.order(clip(1, c.max_p), d, 0, clip(1, c.max_seasonal_p), seasonal_d, 0),
            arima.order(0, d, clip(1, c.max_q), 0, seasonal_d, clip(1, c.max_seasonal_q)),
        ];
        if !seasonal {
            for order in starts.iter_mut() {
                *order = arima.order(order.p, d, order.q, 0, 0, 0);
            }
        }
        for order in starts {
            self.consider(Candidate {
                order,
                constant: allow_constant,
            });
        }

        loop {
            let incumbent = match &self.best {
                Some(model) => Candidate {
                    order: model.order(),
                    constant: model.with_constant(),
                },
                None => return,
            };

            let mut improved = false;
            for candidate in neighbours(incumbent, seasonal, allow_constant) {
                if self.fitted >= arima.config.max_models {
                    log::debug!("Stepwise search stopped at {} fits", self.fitted);
                    return;
                }
                if self.consider(candidate) {
                    improved = true;
                    break;
                }
            }
            if !improved {
                return;
            }
        }
    }

    fn exhaustive(&mut self, d: usize, seasonal_d: usize, allow_constant: bool) {
        let arima = self.arima;
        let c = &arima.config;
        let (max_sp, max_sq) = if arima.period() > 1 {
            (c.max_seasonal_p, c.max_seasonal_q)
        } else {
            (0, 0)
        };

        for p in 0..=c.max_p {
            for q in 0..=c.max_q {
                for sp in 0..=max_sp {
                    for sq in 0..=max_sq {
                        self.consider(Candidate {
                            order: arima.order(p, d, q, sp, seasonal_d, sq),
                            constant: allow_constant,
                        });
                    }
                }
            }
        }
    }

    /// Fit `candidate` unless already tried or out of bounds. Returns whether it
    /// became the new best model.
    fn consider(&mut self, candidate: Candidate) -> bool {
        if !self.arima.within_bounds(&candidate.order) || !self.tried.insert(candidate) {
            return false;
        }

        self.fitted += 1;
        let config = &self.arima.config;
        let model = match AutoregressiveModel::fit(
            self.series,
            candidate.order,
            candidate.constant,
            &config.optimizer,
            config.information_criterion,
        ) {
            Ok(model) => model,
            Err(e) => {
                log::debug!(
                    "{} (constant={}) skipped: {}",
                    candidate.order,
                    candidate.constant,
                    e
                );
                return false;
            }
        };

        log::debug!(
            "{} (constant={}): {}={:.3}",
            candidate.order,
            candidate.constant,
            model.criterion(),
            model.criterion_value()
        );

        let better = match &self.best {
            Some(best) => compare(&model, best) == Ordering::Less,
            None => true,
        };
        if better {
            self.best = Some(model);
        }
        better
    }
}

/// Ranking key of a fitted candidate
#[derive(Debug, Clone, Copy)]
struct Rank {
    criterion: f64,
    parameters: usize,
    order: SarimaOrder,
}

impl Rank {
    fn of(model: &AutoregressiveModel) -> Self {
        Self {
            criterion: model.criterion_value(),
            parameters: model.parameter_count(),
            order: model.order(),
        }
    }

    /// Criterion first; ties go to fewer parameters, then to the smaller order
    fn compare_to(&self, other: &Self) -> Ordering {
        let diff = self.criterion - other.criterion;
        if diff.abs() > TIE_TOLERANCE {
            return diff.total_cmp(&0.0);
        }
        self.parameters
            .cmp(&other.parameters)
            .then_with(|| self.order.cmp(&other.order))
    }
}

fn compare(a: &AutoregressiveModel, b: &AutoregressiveModel) -> Ordering {
    Rank::of(a).compare_to(&Rank::of(b))
}

/// Orders one step away from `incumbent`
fn neighbours(incumbent: Candidate, seasonal: bool, allow_constant: bool) -> Vec<Candidate> {
    let o = incumbent.order;
    let step = |value: usize, delta: i32| -> Option<usize> {
        if delta < 0 {
            value.checked_sub(1)
        } else {
            Some(value + 1)
        }
    };

    let mut orders = Vec::new();
    let mut push = |p: Option<usize>, q: Option<usize>, sp: Option<usize>, sq: Option<usize>| {
        if let (Some(p), Some(q), Some(sp), Some(sq)) = (p, q, sp, sq) {
            let mut order = o;
            order.p = p;
            order.q = q;
            order.seasonal_p = sp;
            order.seasonal_q = sq;
            orders.push(order);
        }
    };

    let (p, q, sp, sq) = (o.p, o.q, o.seasonal_p, o.seasonal_q);
    if seasonal {
        for delta in [-1, 1] {
            push(Some(p), Some(q), step(sp, delta), Some(sq));
        }
        for delta in [-1, 1] {
            push(Some(p), Some(q), Some(sp), step(sq, delta));
        }
        for delta in [-1, 1] {
            push(Some(p), Some(q), step(sp, delta), step(sq, delta));
        }
        for delta in [-1, 1] {
            push(Some(p), Some(q), step(sp, delta), step(sq, -delta));
        }
    }
    for delta in [-1, 1] {
        push(step(p, delta), Some(q), Some(sp), Some(sq));
    }
    for delta in [-1, 1] {
        push(Some(p), step(q, delta), Some(sp), Some(sq));
    }
    for delta in [-1, 1] {
        push(step(p, delta), step(q, delta), Some(sp), Some(sq));
    }
    for delta in [-1, 1] {
        push(step(p, delta), step(q, -delta), Some(sp), Some(sq));
    }

    let mut candidates: Vec<Candidate> = orders
        .into_iter()
        .map(|order| Candidate {
            order,
            constant: incumbent.constant,
        })
        .collect();
    if allow_constant {
        candidates.push(Candidate {
            order: o,
            constant: !incumbent.constant,
        });
    }
    candidates
}

impl ForecastModel for AutoArima {
    type Trained = AutoregressiveModel;

    fn train(&self, series: &PriceSeries) -> Result<AutoregressiveModel> {
        self.search(&series.close_only())
    }

    fn cross_validate(
        &self,
        series: &PriceSeries,
        trained: &AutoregressiveModel,
    ) -> Result<CrossValidationTable> {
        cross_validate_autoregressive(series, trained, self.config.folds)
    }

    fn name(&self) -> &str {
        "Autoregressive"
    }
}

/// Select an ARIMA order with default settings, fit it, and forecast `horizon_days`
/// calendar days past the last observation.
pub fn fit_autoregressive(
    series: &PriceSeries,
    horizon_days: usize,
) -> Result<(AutoregressiveModel, ForecastResult)> {
    if horizon_days == 0 {
        return Err(ForecastError::InputError(
            "Forecast horizon must be at least one day".to_string(),
        ));
    }
    let model = AutoArima::default().train(series)?;
    let forecast = model.forecast(horizon_days)?;
    Ok((model, forecast))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InformationCriterion;
    use crate::synthetic::SyntheticSeriesGenerator;
    use chrono::NaiveDate;

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 1, 1).unwrap()
    }

    fn non_seasonal() -> AutoArima {
        AutoArima::new(AutoregressiveConfig {
            seasonal: false,
            ..AutoregressiveConfig::default()
        })
        .unwrap()
    }

    fn random_walk(n: usize, seed: u64) -> PriceSeries {
        let noise = SyntheticSeriesGenerator::new(seed).white_noise(n, 1.0).unwrap();
        let mut level = 100.0;
        let closes = noise
            .into_iter()
            .map(|e| {
                level += e;
                level
            })
            .collect();
        PriceSeries::daily(start(), closes).unwrap()
    }

    #[test]
    fn test_neighbours_respect_zero_floor() {
        let incumbent = Candidate {
            order: SarimaOrder::new(0, 1, 1),
            constant: true,
        };
        let found = neighbours(incumbent, false, true);
        let orders: Vec<SarimaOrder> = found.iter().map(|c| c.order).collect();
        assert!(orders.contains(&SarimaOrder::new(1, 1, 1)));
        assert!(orders.contains(&SarimaOrder::new(0, 1, 0)));
        assert!(orders.contains(&SarimaOrder::new(0, 1, 2)));
        assert!(orders.contains(&SarimaOrder::new(1, 1, 2)));
        assert!(orders.contains(&SarimaOrder::new(1, 1, 0)));
        assert!(found.iter().any(|c| c.order == incumbent.order && !c.constant));
        assert_eq!(found.len(), 6);
    }

    #[test]
    fn test_neighbours_without_constant_toggle() {
        let incumbent = Candidate {
            order: SarimaOrder::new(1, 1, 1).with_seasonal(1, 1, 0, 7),
            constant: false,
        };
        let found = neighbours(incumbent, true, false);
        assert!(found.iter().all(|c| !c.constant));
        assert!(found.iter().all(|c| c.order != incumbent.order));
        // P-1, P+1, Q+1, (P,Q)+1, (P-1,Q+1), p-1, p+1, q-1, q+1, (p,q)-1, (p,q)+1,
        // (p-1,q+1), (p+1,q-1)
        assert_eq!(found.len(), 13);
        let crossed = [
            SarimaOrder::new(1, 1, 1).with_seasonal(0, 1, 1, 7),
            SarimaOrder::new(0, 1, 2).with_seasonal(1, 1, 0, 7),
            SarimaOrder::new(2, 1, 0).with_seasonal(1, 1, 0, 7),
        ];
        for order in crossed {
            assert!(found.iter().any(|c| c.order == order), "missing {}", order);
        }
    }

    fn rank(criterion: f64, parameters: usize, order: SarimaOrder) -> Rank {
        Rank {
            criterion,
            parameters,
            order,
        }
    }

    #[test]
    fn test_rank_tie_prefers_fewer_parameters() {
        let simple = rank(100.0, 2, SarimaOrder::new(2, 1, 0));
        let complex = rank(100.0 - 1e-9, 3, SarimaOrder::new(1, 1, 2));
        assert_eq!(simple.compare_to(&complex), Ordering::Less);
        assert_eq!(complex.compare_to(&simple), Ordering::Greater);
    }

    #[test]
    fn test_rank_tie_then_prefers_smaller_order() {
        let low = rank(50.0, 2, SarimaOrder::new(1, 1, 1));
        let high = rank(50.0 + 1e-9, 2, SarimaOrder::new(2, 1, 0));
        assert_eq!(low.compare_to(&high), Ordering::Less);
        assert_eq!(low.compare_to(&low), Ordering::Equal);
    }

    #[test]
    fn test_rank_criterion_outweighs_parameters() {
        let better = rank(99.0, 5, SarimaOrder::new(2, 1, 2));
        let simpler = rank(100.0, 1, SarimaOrder::new(0, 1, 1));
        assert_eq!(better.compare_to(&simpler), Ordering::Less);
    }

    #[test]
    fn test_bounds() {
        let arima = AutoArima::default();
        assert!(arima.within_bounds(&SarimaOrder::new(2, 1, 2).with_seasonal(1, 0, 0, 7)));
        assert!(!arima.within_bounds(&SarimaOrder::new(5, 1, 0)));
        assert!(!arima.within_bounds(&SarimaOrder::new(3, 1, 3)));
        assert!(!arima.within_bounds(&SarimaOrder::new(0, 0, 0).with_seasonal(0, 0, 2, 7)));
    }

    #[test]
    fn test_random_walk_is_differenced_once() {
        let series = random_walk(300, 21);
        let (d, seasonal_d) = AutoArima::default()
            .select_differencing(&series.closes())
            .unwrap();
        assert_eq!(d, 1);
        assert_eq!(seasonal_d, 0);
    }

    #[test]
    fn test_strong_weekly_pattern_is_seasonally_differenced() {
        let pattern = [0.0, 4.0, 8.0, 3.0, -2.0, -6.0, -7.0];
        let noise = SyntheticSeriesGenerator::new(3).white_noise(280, 0.2).unwrap();
        let values: Vec<f64> = (0..280).map(|i| 50.0 + pattern[i % 7] + noise[i]).collect();
        let (_, seasonal_d) = AutoArima::default().select_differencing(&values).unwrap();
        assert_eq!(seasonal_d, 1);
    }

    #[test]
    fn test_search_on_ar_process() {
        let noise = SyntheticSeriesGenerator::new(8).white_noise(400, 1.0).unwrap();
        let mut level = 0.0;
        let closes = noise
            .into_iter()
            .map(|e| {
                level = 0.7 * level + e;
                20.0 + level
            })
            .collect();
        let series = PriceSeries::daily(start(), closes).unwrap();

        let model = non_seasonal().search(&series).unwrap();
        let d = model.order().d;
        assert!(d <= 1);
        assert!(!model.order().is_seasonal());
        assert!(model.order().p + model.order().q >= 1);
        assert_eq!(model.criterion(), InformationCriterion::Aic);

        // The selected model is at least as good as the AR(1) starting candidate
        let ar1 = AutoregressiveModel::fit(
            &series,
            SarimaOrder::new(1, d, 0),
            true,
            &AutoregressiveConfig::default().optimizer,
            InformationCriterion::Aic,
        )
        .unwrap();
        assert!(model.criterion_value() <= ar1.criterion_value() + TIE_TOLERANCE);
    }

    #[test]
    fn test_fit_autoregressive_forecasts_requested_horizon() {
        let series = random_walk(200, 5);
        let (model, forecast) = fit_autoregressive(&series, 30).unwrap();
        assert_eq!(forecast.len(), 30);
        assert_eq!(forecast.first_date(), Some(series.last_date() + chrono::Duration::days(1)));
        assert!(model.order().arma_terms() <= 5);
        assert!(forecast.values().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_too_short_series_rejected() {
        let series = PriceSeries::daily(start(), vec![1.0, 2.0, 3.0]).unwrap();
        let result = fit_autoregressive(&series, 5);
        assert!(matches!(result, Err(ForecastError::InputError(_))));
    }
}
