//! Fourier features for smooth periodic components

use std::f64::consts::PI;

/// Fourier basis for a seasonality of `period` (same time unit as `t`) and `order`
/// harmonics. Returns `[sin(2 pi 1 t / P), cos(2 pi 1 t / P), ..., sin(2 pi N t / P), cos(2 pi N t / P)]`.
pub fn fourier_features(t: f64, period: f64, order: usize) -> Vec<f64> {
    let mut features = Vec::with_capacity(2 * order);
    for k in 1..=order {
        let angle = 2.0 * PI * k as f64 * t / period;
        features.push(angle.sin());
        features.push(angle.cos());
    }
    features
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fourier_features_are_periodic() {
        let a = fourier_features(3.0, 7.0, 3);
        let b = fourier_features(10.0, 7.0, 3);
        assert_eq!(a.len(), 6);
        for (x, y) in a.iter().zip(&b) {
            assert_relative_eq!(x, y, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_fourier_features_at_origin() {
        let f = fourier_features(0.0, 365.25, 2);
        assert_eq!(f, vec![0.0, 1.0, 0.0, 1.0]);
    }
}
