//! Tests used to choose differencing orders
//!
//! - KPSS level-stationarity test for the regular differencing order `d`
//! - Seasonal strength measure for the seasonal differencing order `D`

use crate::polynomial::difference;
use crate::stats::{centered_moving_average, is_constant, variance};
use crate::{MathError, Result};

/// Seasonal strength at or above which a seasonal difference is taken
pub const SEASONAL_STRENGTH_THRESHOLD: f64 = 0.64;

const CONSTANT_TOLERANCE: f64 = 1e-12;

/// KPSS test for level stationarity
#[derive(Debug, Clone, Copy)]
pub struct KpssTest {
    alpha: f64,
}

impl KpssTest {
    /// Tabulated significance levels (Kwiatkowski et al., 1992, level case)
    const CRITICAL_VALUES: [(f64, f64); 4] =
        [(0.10, 0.347), (0.05, 0.463), (0.025, 0.574), (0.01, 0.739)];

    /// Create a test at one of the tabulated levels: 0.10, 0.05, 0.025 or 0.01
    pub fn new(alpha: f64) -> Result<Self> {
        if Self::CRITICAL_VALUES
            .iter()
            .any(|(level, _)| (level - alpha).abs() < 1e-12)
        {
            Ok(Self { alpha })
        } else {
            Err(MathError::InvalidInput(format!(
                "KPSS significance level must be one of 0.10, 0.05, 0.025, 0.01 (got {})",
                alpha
            )))
        }
    }

    /// Critical value of the statistic at this test's level
    pub fn critical_value(&self) -> f64 {
        Self::CRITICAL_VALUES
            .iter()
            .find(|(level, _)| (level - self.alpha).abs() < 1e-12)
            .map(|(_, value)| *value)
            .unwrap_or(0.463)
    }

    /// The KPSS statistic with a Bartlett-weighted long-run variance.
    ///
    /// Lag truncation is `trunc(3 * sqrt(n) / 13)`.
    pub fn statistic(values: &[f64]) -> Result<f64> {
        let n = values.len();
        if n < 3 {
            return Err(MathError::InsufficientData(format!(
                "KPSS needs at least 3 observations, got {}",
                n
            )));
        }

        let mean = values.iter().sum::<f64>() / n as f64;
        let residuals: Vec<f64> = values.iter().map(|v| v - mean).collect();

        let mut partial = 0.0;
        let mut eta = 0.0;
        for r in &residuals {
            partial += r;
            eta += partial * partial;
        }
        eta /= (n * n) as f64;

        let lags = (3.0 * (n as f64).sqrt() / 13.0).trunc() as usize;
        let mut long_run = residuals.iter().map(|r| r * r).sum::<f64>();
        for lag in 1..=lags.min(n - 1) {
            let weight = 1.0 - lag as f64 / (lags as f64 + 1.0);
            let cov: f64 = (lag..n).map(|t| residuals[t] * residuals[t - lag]).sum();
            long_run += 2.0 * weight * cov;
        }
        long_run /= n as f64;

        if long_run <= 0.0 || !long_run.is_finite() {
            return Err(MathError::CalculationError(
                "KPSS long-run variance is not positive".to_string(),
            ));
        }

        Ok(eta / long_run)
    }

    /// Whether the series should be differenced (stationarity rejected)
    pub fn should_difference(&self, values: &[f64]) -> Result<bool> {
        Ok(Self::statistic(values)? > self.critical_value())
    }
}

/// Number of regular differences (at most `max_d`) needed for KPSS stationarity
pub fn ndiffs(values: &[f64], alpha: f64, max_d: usize) -> Result<usize> {
    let test = KpssTest::new(alpha)?;
    let mut current = values.to_vec();
    let mut d = 0;

    if is_constant(&current, CONSTANT_TOLERANCE) {
        return Ok(0);
    }

    while d < max_d && test.should_difference(&current)? {
        current = difference(&current, 1);
        d += 1;
        if current.len() < 3 || is_constant(&current, CONSTANT_TOLERANCE) {
            break;
        }
    }
    log::debug!("KPSS (alpha={}) chose d={} for {} observations", alpha, d, values.len());
    Ok(d)
}

/// Strength of seasonality in `[0, 1]` from a classical additive decomposition:
/// `max(0, 1 - Var(remainder) / Var(seasonal + remainder))`.
pub fn seasonal_strength(values: &[f64], period: usize) -> Result<f64> {
    if period < 2 {
        return Err(MathError::InvalidInput(
            "Seasonal period must be at least 2".to_string(),
        ));
    }
    if values.len() < 2 * period + 1 {
        return Err(MathError::InsufficientData(format!(
            "Need at least {} observations for period {}",
            2 * period + 1,
            period
        )));
    }

    let trend = centered_moving_average(values, period);
    let detrended: Vec<Option<f64>> = values
        .iter()
        .zip(&trend)
        .map(|(v, t)| t.map(|t| v - t))
        .collect();

    let mut sums = vec![0.0; period];
    let mut counts = vec![0usize; period];
    for (i, d) in detrended.iter().enumerate() {
        if let Some(d) = d {
            sums[i % period] += d;
            counts[i % period] += 1;
        }
    }
    let mut indices: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c > 0 { s / c as f64 } else { 0.0 })
        .collect();
    let index_mean = indices.iter().sum::<f64>() / period as f64;
    for s in indices.iter_mut() {
        *s -= index_mean;
    }

    let mut remainder = Vec::new();
    let mut seasonal_plus_remainder = Vec::new();
    for (i, d) in detrended.iter().enumerate() {
        if let Some(d) = d {
            remainder.push(d - indices[i % period]);
            seasonal_plus_remainder.push(*d);
        }
    }

    let total = variance(&seasonal_plus_remainder)?;
    if total <= CONSTANT_TOLERANCE {
        return Ok(0.0);
    }
    Ok((1.0 - variance(&remainder)? / total).max(0.0))
}

/// Number of seasonal differences (at most `max_seasonal_d`) suggested by the
/// seasonal strength measure. Series too short to assess return 0.
pub fn nsdiffs(values: &[f64], period: usize, max_seasonal_d: usize) -> Result<usize> {
    if period < 2 {
        return Ok(0);
    }

    let mut current = values.to_vec();
    let mut seasonal_d = 0;
    while seasonal_d < max_seasonal_d && current.len() > 2 * period {
        if is_constant(&current, CONSTANT_TOLERANCE)
            || seasonal_strength(&current, period)? < SEASONAL_STRENGTH_THRESHOLD
        {
            break;
        }
        current = difference(&current, period);
        seasonal_d += 1;
    }
    log::debug!("Seasonal strength test chose D={} for period {}", seasonal_d, period);
    Ok(seasonal_d)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lcg_noise(n: usize, seed: u64) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                ((state >> 33) as f64 / (1u64 << 31) as f64) - 0.5
            })
            .collect()
    }

    #[test]
    fn test_kpss_white_noise_is_stationary() {
        let noise = lcg_noise(500, 7);
        let test = KpssTest::new(0.01).unwrap();
        assert!(!test.should_difference(&noise).unwrap());
    }

    #[test]
    fn test_kpss_random_walk_needs_difference() {
        let mut level = 100.0;
        let walk: Vec<f64> = lcg_noise(500, 11)
            .into_iter()
            .map(|e| {
                level += e + 0.2;
                level
            })
            .collect();
        assert_eq!(ndiffs(&walk, 0.05, 1).unwrap(), 1);
        assert_eq!(ndiffs(&walk, 0.05, 0).unwrap(), 0);
    }

    #[test]
    fn test_invalid_alpha() {
        assert!(KpssTest::new(0.2).is_err());
    }

    #[test]
    fn test_seasonal_strength() {
        let noise = lcg_noise(280, 3);
        let seasonal: Vec<f64> = (0..280)
            .map(|i| 10.0 * ((i % 7) as f64 - 3.0) + 0.1 * noise[i])
            .collect();
        assert!(seasonal_strength(&seasonal, 7).unwrap() > 0.9);
        assert!(seasonal_strength(&noise, 7).unwrap() < 0.64);
        assert_eq!(nsdiffs(&seasonal, 7, 1).unwrap(), 1);
        assert_eq!(nsdiffs(&noise, 7, 1).unwrap(), 0);
    }
}
