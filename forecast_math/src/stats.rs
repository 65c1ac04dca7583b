//! Small descriptive statistics helpers shared by the other modules

use crate::{MathError, Result};

/// Arithmetic mean of a non-empty slice
pub fn mean(values: &[f64]) -> Result<f64> {
    if values.is_empty() {
        return Err(MathError::InsufficientData(
            "Cannot take the mean of an empty slice".to_string(),
        ));
    }
    Ok(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by `n`)
pub fn variance(values: &[f64]) -> Result<f64> {
    let m = mean(values)?;
    Ok(values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64)
}

/// Returns true when every value is within `tolerance` of the first one
pub fn is_constant(values: &[f64], tolerance: f64) -> bool {
    match values.first() {
        Some(first) => values.iter().all(|v| (v - first).abs() <= tolerance),
        None => true,
    }
}

/// Centered moving average used for classical decomposition.
///
/// Even windows use the usual `2 x window` average so the result stays centered.
/// Positions without a full window are `None`.
pub fn centered_moving_average(values: &[f64], window: usize) -> Vec<Option<f64>> {
    let n = values.len();
    let mut out = vec![None; n];
    if window == 0 || n < window + 1 {
        return out;
    }

    let half = window / 2;
    if window % 2 == 1 {
        for i in half..n - half {
            let sum: f64 = values[i - half..=i + half].iter().sum();
            out[i] = Some(sum / window as f64);
        }
    } else {
        for i in half..n - half {
            let mut sum = 0.5 * values[i - half] + 0.5 * values[i + half];
            sum += values[i - half + 1..i + half].iter().sum::<f64>();
            out[i] = Some(sum / window as f64);
        }
    }
    out
}
