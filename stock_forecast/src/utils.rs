//! Utility functions for the stock_forecast crate

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Days in one forecast year
pub const DAYS_PER_YEAR: usize = 365;

/// Parse a date as written by common market data exports.
///
/// Accepts `YYYY-MM-DD`, timestamps that start with one (`2023-01-02 00:00:00`,
/// `2023-01-02T00:00:00Z`), and `MM/DD/YYYY`.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let trimmed = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }
    if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S") {
        return Ok(datetime.date());
    }
    if let Some(prefix) = trimmed.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Ok(date);
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%m/%d/%Y") {
        return Ok(date);
    }
    Err(ForecastError::InputError(format!(
        "Unrecognised date: '{}'",
        text
    )))
}

/// `horizon` consecutive calendar days starting the day after `last_date`
pub fn future_dates(last_date: NaiveDate, horizon: usize) -> Vec<NaiveDate> {
    (1..=horizon as i64)
        .map(|offset| last_date + Duration::days(offset))
        .collect()
}

/// One expanding-window split: train on `0..train_end`, test on `test_start..test_end`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSeriesSplit {
    pub train_end: usize,
    pub test_start: usize,
    pub test_end: usize,
}

impl TimeSeriesSplit {
    pub fn test_len(&self) -> usize {
        self.test_end - self.test_start
    }
}

/// Expanding-window splits over `n_samples` rows.
///
/// The data is cut into `folds + 1` equal blocks; every block after the first is a
/// test segment, trained on everything before it. Leftover rows go to the first
/// training window.
pub fn time_series_splits(n_samples: usize, folds: usize) -> Result<Vec<TimeSeriesSplit>> {
    if folds < 1 {
        return Err(ForecastError::InputError(
            "Number of folds must be at least 1".to_string(),
        ));
    }
    let n_blocks = folds + 1;
    if n_blocks > n_samples {
        return Err(ForecastError::CrossValidationError(format!(
            "Cannot have number of folds={} greater than the number of samples={}",
            n_blocks, n_samples
        )));
    }

    let test_size = n_samples / n_blocks;
    let first_test = n_samples - folds * test_size;
    Ok((0..folds)
        .map(|i| {
            let test_start = first_test + i * test_size;
            TimeSeriesSplit {
                train_end: test_start,
                test_start,
                test_end: test_start + test_size,
            }
        })
        .collect())
}

/// Round to two decimals for display
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
