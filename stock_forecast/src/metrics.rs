//! Metrics for evaluating forecast accuracy
//!
//! [`calculate_metrics`] turns paired actual/predicted values from a cross-validation
//! run into the three figures shown next to a forecast: MAPE, MAE and RMSE.

use crate::error::{ForecastError, Result};
use crate::utils::round2;
use serde::{Deserialize, Serialize};
use std::fmt;

fn check_pairs(actual: &[f64], predicted: &[f64]) -> Result<()> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return Err(ForecastError::InputError(format!(
            "Actual ({}) and predicted ({}) values must have the same non-zero length",
            actual.len(),
            predicted.len()
        )));
    }
    if actual.iter().chain(predicted).any(|v| !v.is_finite()) {
        return Err(ForecastError::InputError(
            "Actual and predicted values must be finite".to_string(),
        ));
    }
    Ok(())
}

/// Mean absolute error
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pairs(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Mean squared error
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pairs(actual, predicted)?;
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Ok(sum / actual.len() as f64)
}

/// Root mean squared error
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    Ok(mean_squared_error(actual, predicted)?.sqrt())
}

/// Mean absolute percentage error, in percent.
///
/// Divides by the signed actual value, so a negative actual contributes a negative
/// term. Any zero actual is an input error.
pub fn mean_absolute_percentage_error(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    check_pairs(actual, predicted)?;
    if let Some(index) = actual.iter().position(|a| *a == 0.0) {
        return Err(ForecastError::InputError(format!(
            "Actual value at position {} is zero; MAPE is undefined",
            index
        )));
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs() / a)
        .sum();
    Ok(sum / actual.len() as f64 * 100.0)
}

/// MAPE, MAE and RMSE of one validation run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// Mean Absolute Percentage Error, in percent
    pub mape: f64,
    /// Mean Absolute Error
    pub mae: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
}

impl MetricsReport {
    pub fn new(mape: f64, mae: f64, rmse: f64) -> Self {
        Self { mape, mae, rmse }
    }

    /// MAPE rounded to two decimals with a percent sign, e.g. `"12.34%"`
    pub fn mape_display(&self) -> String {
        format!("{:.2}%", self.mape)
    }

    /// MAE rounded to two decimals
    pub fn mae_display(&self) -> String {
        format!("{:.2}", self.mae)
    }

    /// RMSE rounded to two decimals
    pub fn rmse_display(&self) -> String {
        format!("{:.2}", self.rmse)
    }

    /// `(label, value)` rows in display order
    pub fn rows(&self) -> [(&'static str, String); 3] {
        [
            ("MAPE (Mean Absolute Percentage Error)", self.mape_display()),
            ("MAE (Mean Absolute Error)", self.mae_display()),
            ("RMSE (Root Mean Squared Error)", self.rmse_display()),
        ]
    }
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Forecast Accuracy Metrics:")?;
        for (label, value) in self.rows() {
            writeln!(f, "  {:<40} {}", label, value)?;
        }
        Ok(())
    }
}

/// `100 - MAPE`.
///
/// Not clamped: a model whose MAPE exceeds 100% has a negative accuracy and it is
/// reported as such.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Accuracy(f64);

impl Accuracy {
    pub fn from_report(report: &MetricsReport) -> Self {
        Accuracy(100.0 - report.mape)
    }

    pub fn value(&self) -> f64 {
        self.0
    }

    /// Accuracy rounded to two decimals
    pub fn rounded(&self) -> f64 {
        round2(self.0)
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.0)
    }
}

/// Compute MAPE, MAE and RMSE for paired actual and predicted values.
///
/// Both slices must be the same non-zero length and `actual` must not contain zeros.
pub fn calculate_metrics(actual: &[f64], predicted: &[f64]) -> Result<MetricsReport> {
    let mape = mean_absolute_percentage_error(actual, predicted)?;
    let mae = mean_absolute_error(actual, predicted)?;
    let rmse = root_mean_squared_error(actual, predicted)?;
    Ok(MetricsReport { mape, mae, rmse })
}
