//! Derivative-free minimisation (Nelder-Mead simplex)

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Nelder-Mead simplex optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMead {
    /// Maximum number of iterations before giving up
    pub max_iterations: usize,
    /// Convergence threshold on the spread of objective values in the simplex
    pub tolerance: f64,
    /// Size of the initial simplex steps
    pub initial_step: f64,
}

impl Default for NelderMead {
    fn default() -> Self {
        Self {
            max_iterations: 1_000,
            tolerance: 1e-8,
            initial_step: 0.1,
        }
    }
}

/// Outcome of a minimisation
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Best point found
    pub point: Vec<f64>,
    /// Objective value at `point`
    pub value: f64,
    /// Iterations used
    pub iterations: usize,
    /// Whether the tolerance was met before `max_iterations`
    pub converged: bool,
}

impl NelderMead {
    /// Create an optimizer with the given iteration cap and tolerance
    pub fn new(max_iterations: usize, tolerance: f64) -> Result<Self> {
        if max_iterations == 0 {
            return Err(MathError::InvalidInput(
                "max_iterations must be greater than zero".to_string(),
            ));
        }
        if tolerance <= 0.0 || !tolerance.is_finite() {
            return Err(MathError::InvalidInput(
                "tolerance must be a positive finite number".to_string(),
            ));
        }
        Ok(Self {
            max_iterations,
            tolerance,
            ..Self::default()
        })
    }

    /// Minimise `objective` starting from `start`.
    ///
    /// Non-finite objective values are treated as `+inf`, so the simplex simply moves
    /// away from them. A zero-dimensional problem evaluates the objective once.
    pub fn minimize<F>(&self, mut objective: F, start: &[f64]) -> Result<Minimum>
    where
        F: FnMut(&[f64]) -> f64,
    {
        let mut eval = |x: &[f64]| {
            let v = objective(x);
            if v.is_finite() {
                v
            } else {
                f64::INFINITY
            }
        };

        let dim = start.len();
        if dim == 0 {
            let value = eval(start);
            return Ok(Minimum {
                point: Vec::new(),
                value,
                iterations: 0,
                converged: value.is_finite(),
            });
        }

        let (alpha, gamma, rho, sigma) = (1.0, 2.0, 0.5, 0.5);

        let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(dim + 1);
        simplex.push(start.to_vec());
        for i in 0..dim {
            let mut vertex = start.to_vec();
            vertex[i] += if vertex[i].abs() > 1e-8 {
                self.initial_step * vertex[i].abs().max(1.0)
            } else {
                self.initial_step
            };
            simplex.push(vertex);
        }
        let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();

        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.max_iterations {
            iterations += 1;

            let mut order: Vec<usize> = (0..=dim).collect();
            order.sort_by(|&a, &b| values[a].total_cmp(&values[b]));
            simplex = order.iter().map(|&i| simplex[i].clone()).collect();
            values = order.iter().map(|&i| values[i]).collect();

            let best = values[0];
            let worst = values[dim];
            if best.is_finite() && (worst - best).abs() <= self.tolerance * (1.0 + best.abs()) {
                converged = true;
                break;
            }

            let centroid: Vec<f64> = (0..dim)
                .map(|j| simplex[..dim].iter().map(|v| v[j]).sum::<f64>() / dim as f64)
                .collect();
            let towards = |coef: f64, target: &[f64]| -> Vec<f64> {
                centroid
                    .iter()
                    .zip(target)
                    .map(|(c, t)| c + coef * (t - c))
                    .collect()
            };

            let reflected = towards(-alpha, &simplex[dim]);
            let reflected_value = eval(&reflected);

            if reflected_value < values[0] {
                let expanded = towards(-gamma, &simplex[dim]);
                let expanded_value = eval(&expanded);
                if expanded_value < reflected_value {
                    simplex[dim] = expanded;
                    values[dim] = expanded_value;
                } else {
                    simplex[dim] = reflected;
                    values[dim] = reflected_value;
                }
                continue;
            }

            if reflected_value < values[dim - 1] {
                simplex[dim] = reflected;
                values[dim] = reflected_value;
                continue;
            }

            let contracted = if reflected_value < values[dim] {
                towards(rho, &reflected)
            } else {
                towards(rho, &simplex[dim])
            };
            let contracted_value = eval(&contracted);
            if contracted_value < values[dim].min(reflected_value) {
                simplex[dim] = contracted;
                values[dim] = contracted_value;
                continue;
            }

            // shrink towards the best vertex
            let best_vertex = simplex[0].clone();
            for i in 1..=dim {
                simplex[i] = best_vertex
                    .iter()
                    .zip(&simplex[i])
                    .map(|(b, v)| b + sigma * (v - b))
                    .collect();
                values[i] = eval(&simplex[i]);
            }
        }

        let (best_index, best_value) = values
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, v)| (i, *v))
            .ok_or_else(|| MathError::CalculationError("Empty simplex".to_string()))?;

        if !best_value.is_finite() {
            return Err(MathError::CalculationError(
                "Objective is not finite anywhere in the simplex".to_string(),
            ));
        }

        Ok(Minimum {
            point: simplex[best_index].clone(),
            value: best_value,
            iterations,
            converged,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_minimize_quadratic() {
        let optimizer = NelderMead::default();
        let result = optimizer
            .minimize(|x| (x[0] - 3.0).powi(2) + (x[1] + 1.0).powi(2), &[0.0, 0.0])
            .unwrap();
        assert!(result.converged);
        assert_relative_eq!(result.point[0], 3.0, epsilon = 1e-3);
        assert_relative_eq!(result.point[1], -1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_minimize_rosenbrock() {
        let optimizer = NelderMead::new(5_000, 1e-12).unwrap();
        let result = optimizer
            .minimize(
                |x| 100.0 * (x[1] - x[0] * x[0]).powi(2) + (1.0 - x[0]).powi(2),
                &[-1.2, 1.0],
            )
            .unwrap();
        assert_relative_eq!(result.point[0], 1.0, epsilon = 1e-2);
        assert_relative_eq!(result.point[1], 1.0, epsilon = 2e-2);
    }

    #[test]
    fn test_zero_dimensional() {
        let result = NelderMead::default().minimize(|_| 4.0, &[]).unwrap();
        assert_eq!(result.value, 4.0);
        assert!(result.converged);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(NelderMead::new(0, 1e-6).is_err());
        assert!(NelderMead::new(10, -1.0).is_err());
    }
}
