//! Lag-polynomial algebra
//!
//! A polynomial in the backshift operator `B` is stored as its coefficient vector,
//! index = lag. `[1.0, -1.0]` is `1 - B`, the first-difference operator.

use crate::{MathError, Result};

/// Multiply two lag polynomials
pub fn multiply(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Lag-`lag` difference: `y[t] - y[t - lag]`
pub fn difference(values: &[f64], lag: usize) -> Vec<f64> {
    if lag == 0 || values.len() <= lag {
        return Vec::new();
    }
    (lag..values.len()).map(|t| values[t] - values[t - lag]).collect()
}

/// `(1 - B)^d (1 - B^period)^seasonal_d`
pub fn differencing_operator(d: usize, seasonal_d: usize, period: usize) -> Vec<f64> {
    let mut op = vec![1.0];
    for _ in 0..d {
        op = multiply(&op, &[1.0, -1.0]);
    }
    if period > 0 {
        let mut seasonal = vec![0.0; period + 1];
        seasonal[0] = 1.0;
        seasonal[period] = -1.0;
        for _ in 0..seasonal_d {
            op = multiply(&op, &seasonal);
        }
    }
    op
}

/// Apply a lag polynomial to a series. The first `operator.len() - 1` points have
/// no complete history and are dropped.
pub fn apply_operator(values: &[f64], operator: &[f64]) -> Vec<f64> {
    let order = operator.len().saturating_sub(1);
    if operator.is_empty() || values.len() <= order {
        return Vec::new();
    }
    (order..values.len())
        .map(|t| {
            operator
                .iter()
                .enumerate()
                .map(|(i, c)| c * values[t - i])
                .sum()
        })
        .collect()
}

/// Undo a differencing operator for values that continue `history`.
///
/// `operator[0]` must be 1. Each output solves `sum(op[i] * y[t - i]) = w[t]` for `y[t]`.
pub fn integrate(history: &[f64], operator: &[f64], differenced: &[f64]) -> Result<Vec<f64>> {
    let order = operator.len().saturating_sub(1);
    if operator.first().copied() != Some(1.0) {
        return Err(MathError::InvalidInput(
            "Differencing operator must start with 1".to_string(),
        ));
    }
    if history.len() < order {
        return Err(MathError::InsufficientData(format!(
            "Need {} historical values to integrate, got {}",
            order,
            history.len()
        )));
    }

    let mut extended = history[history.len() - order..].to_vec();
    let mut out = Vec::with_capacity(differenced.len());
    for &w in differenced {
        let t = extended.len();
        let lagged: f64 = (1..=order).map(|i| operator[i] * extended[t - i]).sum();
        let y = w - lagged;
        extended.push(y);
        out.push(y);
    }
    Ok(out)
}

/// Map unconstrained reals to the coefficients of a stationary AR polynomial
/// `1 - phi_1 B - ... - phi_p B^p`.
///
/// Each input becomes a partial autocorrelation in (-1, 1) and the Durbin-Levinson
/// recursion turns those into AR coefficients, so every input vector lands inside the
/// stationary region.
pub fn constrain_stationary(unconstrained: &[f64]) -> Vec<f64> {
    let partials: Vec<f64> = unconstrained
        .iter()
        .map(|u| u / (1.0 + u * u).sqrt())
        .collect();

    let mut phi: Vec<f64> = Vec::with_capacity(partials.len());
    for (k, &r) in partials.iter().enumerate() {
        let previous = phi.clone();
        for j in 0..k {
            phi[j] = previous[j] - r * previous[k - 1 - j];
        }
        phi.push(r);
    }
    phi
}

/// Check that `1 - phi_1 B - ... - phi_p B^p` has all roots outside the unit circle,
/// using the step-down recursion.
pub fn is_stationary(phi: &[f64]) -> bool {
    let mut current = phi.to_vec();
    while let Some(&r) = current.last() {
        if !r.is_finite() || r.abs() >= 1.0 {
            return false;
        }
        let k = current.len();
        let denom = 1.0 - r * r;
        let reduced: Vec<f64> = (0..k - 1)
            .map(|j| (current[j] + r * current[k - 2 - j]) / denom)
            .collect();
        current = reduced;
    }
    true
}
