//! Seeded synthetic daily price series for tests and demos

use crate::data::{PriceBar, PriceSeries};
use crate::error::{ForecastError, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

/// Market shapes the generator can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Linear uptrend (+0.05% of the base price per day) with 0.5% noise
    Trending,
    /// Uptrend plus a 5% yearly and a 1% weekly cycle, 0.5% noise
    Seasonal,
    /// AR(1) around the base price, coefficient 0.7, 1% shocks
    MeanReverting,
    /// Geometric random walk with small positive drift, 1% daily volatility
    RandomWalk,
}

/// Generates synthetic price series
#[derive(Debug)]
pub struct SyntheticSeriesGenerator {
    rng: StdRng,
    base_price: f64,
    start: NaiveDate,
    trading_days_only: bool,
}

impl SyntheticSeriesGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 150.0,
            start: NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default(),
            trading_days_only: false,
        }
    }

    /// Skip Saturdays and Sundays, like exchange data
    pub fn trading_days_only(mut self, enabled: bool) -> Self {
        self.trading_days_only = enabled;
        self
    }

    /// `n` draws from `N(0, sd^2)`
    pub fn white_noise(&mut self, n: usize, sd: f64) -> Result<Vec<f64>> {
        let normal = Normal::new(0.0, sd)
            .map_err(|e| ForecastError::InputError(format!("Invalid noise scale: {}", e)))?;
        Ok((0..n).map(|_| normal.sample(&mut self.rng)).collect())
    }

    /// Generate `observations` closes for a scenario
    pub fn generate(&mut self, scenario: Scenario, observations: usize) -> Result<PriceSeries> {
        if self.base_price <= 0.0 {
            return Err(ForecastError::InputError(
                "Base price must be positive".to_string(),
            ));
        }

        let dates = self.dates(observations);
        let base = self.base_price;
        let closes = match scenario {
            Scenario::Trending => {
                let noise = self.white_noise(observations, 0.005 * base)?;
                dates
                    .iter()
                    .zip(noise)
                    .map(|(d, e)| base * (1.0 + 0.0005 * self.day_index(*d)) + e)
                    .collect::<Vec<f64>>()
            }
            Scenario::Seasonal => {
                let noise = self.white_noise(observations, 0.005 * base)?;
                dates
                    .iter()
                    .zip(noise)
                    .map(|(d, e)| {
                        let i = self.day_index(*d);
                        let day = d.num_days_from_ce() as f64;
                        base * (1.0
                            + 0.0005 * i
                            + 0.05 * (2.0 * PI * day / 365.25).sin()
                            + 0.01 * (2.0 * PI * day / 7.0).cos())
                            + e
                    })
                    .collect()
            }
            Scenario::MeanReverting => {
                let shocks = self.white_noise(observations, 0.01 * base)?;
                let mut level = base;
                shocks
                    .into_iter()
                    .map(|e| {
                        level = base + 0.7 * (level - base) + e;
                        level
                    })
                    .collect()
            }
            Scenario::RandomWalk => {
                let mut price = base;
                let mut closes = Vec::with_capacity(observations);
                for _ in 0..observations {
                    let shock: f64 = self.rng.gen_range(-1.0..1.0) * 0.0173;
                    price *= (0.0003 + shock).exp();
                    closes.push(price);
                }
                closes
            }
        };

        let bars = dates
            .into_iter()
            .zip(closes)
            .map(|(date, close)| {
                let mut bar = PriceBar::close_only(date, close);
                bar.volume = Some(self.rng.gen_range(500_000.0..1_500_000.0));
                bar
            })
            .collect();
        PriceSeries::new(bars)
    }

    fn dates(&self, observations: usize) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(observations);
        let mut date = self.start;
        while dates.len() < observations {
            let weekend = matches!(date.weekday(), Weekday::Sat | Weekday::Sun);
            if !(self.trading_days_only && weekend) {
                dates.push(date);
            }
            date += Duration::days(1);
        }
        dates
    }

    fn day_index(&self, date: NaiveDate) -> f64 {
        (date - self.start).num_days() as f64
    }
}
