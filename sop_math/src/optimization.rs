//! Bounded Nelder-Mead simplex minimisation used to estimate smoothing
//! parameters.

use serde::{Deserialize, Serialize};

/// Result of a Nelder-Mead run
#[derive(Debug, Clone)]
pub struct NelderMeadResult {
    /// Best point found
    pub optimal_point: Vec<f64>,
    /// Objective value at the best point
    pub optimal_value: f64,
    /// Number of iterations performed
    pub iterations: usize,
    /// Whether the simplex converged before `max_iter`
    pub converged: bool,
}

/// Nelder-Mead coefficients and stopping rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations
    pub max_iter: usize,
    /// Convergence tolerance on the spread of objective values
    pub tolerance: f64,
    /// Reflection coefficient
    pub alpha: f64,
    /// Expansion coefficient
    pub gamma: f64,
    /// Contraction coefficient
    pub rho: f64,
    /// Shrink coefficient
    pub sigma: f64,
    /// Initial simplex step
    pub initial_step: f64,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tolerance: 1e-8,
            alpha: 1.0,
            gamma: 2.0,
            rho: 0.5,
            sigma: 0.5,
            initial_step: 0.05,
        }
    }
}

/// Minimise `objective` starting from `initial`, keeping every vertex inside
/// `bounds` (one `(min, max)` pair per dimension).
pub fn nelder_mead<F>(
    objective: F,
    initial: &[f64],
    bounds: &[(f64, f64)],
    config: &NelderMeadConfig,
) -> NelderMeadResult
where
    F: Fn(&[f64]) -> f64,
{
    let n = initial.len();
    if n == 0 {
        return NelderMeadResult {
            optimal_point: Vec::new(),
            optimal_value: f64::NAN,
            iterations: 0,
            converged: false,
        };
    }

    // Non-finite objective values are treated as the worst possible vertex
    let eval = |point: &[f64]| {
        let value = objective(point);
        if value.is_finite() {
            value
        } else {
            f64::INFINITY
        }
    };

    let mut simplex: Vec<Vec<f64>> = Vec::with_capacity(n + 1);
    simplex.push(clamp_to_bounds(initial, bounds));
    for i in 0..n {
        let mut vertex = initial.to_vec();
        let step = if initial[i].abs() > 1e-10 {
            config.initial_step * initial[i].abs()
        } else {
            config.initial_step
        };
        vertex[i] += step;
        simplex.push(clamp_to_bounds(&vertex, bounds));
    }

    let mut values: Vec<f64> = simplex.iter().map(|v| eval(v)).collect();
    let mut iterations = 0;
    let mut converged = false;

    while iterations < config.max_iter {
        iterations += 1;

        let mut order: Vec<usize> = (0..=n).collect();
        order.sort_by(|&a, &b| {
            values[a]
                .partial_cmp(&values[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let best = order[0];
        let worst = order[n];
        let second_worst = order[n - 1];

        if values[best].is_finite() && (values[worst] - values[best]).abs() < config.tolerance {
            converged = true;
            break;
        }

        let centroid = centroid(&simplex, worst);
        let spread = simplex
            .iter()
            .map(|v| distance(v, &centroid))
            .fold(0.0, f64::max);
        if spread < config.tolerance {
            converged = true;
            break;
        }

        let reflected = clamp_to_bounds(&towards(&centroid, &simplex[worst], -config.alpha), bounds);
        let reflected_value = eval(&reflected);

        if reflected_value < values[best] {
            let expanded = clamp_to_bounds(&towards(&centroid, &reflected, config.gamma), bounds);
            let expanded_value = eval(&expanded);
            if expanded_value < reflected_value {
                simplex[worst] = expanded;
                values[worst] = expanded_value;
            } else {
                simplex[worst] = reflected;
                values[worst] = reflected_value;
            }
            continue;
        }

        if reflected_value < values[second_worst] {
            simplex[worst] = reflected;
            values[worst] = reflected_value;
            continue;
        }

        let (contracted, limit) = if reflected_value < values[worst] {
            (towards(&centroid, &reflected, config.rho), reflected_value)
        } else {
            (towards(&centroid, &simplex[worst], config.rho), values[worst])
        };
        let contracted = clamp_to_bounds(&contracted, bounds);
        let contracted_value = eval(&contracted);
        if contracted_value < limit {
            simplex[worst] = contracted;
            values[worst] = contracted_value;
            continue;
        }

        // Shrink towards the best vertex
        let anchor = simplex[best].clone();
        for i in 0..=n {
            if i != best {
                let shrunk = towards(&anchor, &simplex[i], config.sigma);
                simplex[i] = clamp_to_bounds(&shrunk, bounds);
                values[i] = eval(&simplex[i]);
            }
        }
    }

    let best = values
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(i, _)| i)
        .unwrap_or(0);

    NelderMeadResult {
        optimal_point: simplex[best].clone(),
        optimal_value: values[best],
        iterations,
        converged,
    }
}

/// Centroid of every vertex except `exclude`
fn centroid(simplex: &[Vec<f64>], exclude: usize) -> Vec<f64> {
    let dims = simplex[0].len();
    let count = (simplex.len() - 1) as f64;
    let mut centre = vec![0.0; dims];

    for (i, vertex) in simplex.iter().enumerate() {
        if i != exclude {
            for (c, v) in centre.iter_mut().zip(vertex) {
                *c += v;
            }
        }
    }

    centre.iter_mut().for_each(|c| *c /= count);
    centre
}

/// `origin + coef * (point - origin)`
fn towards(origin: &[f64], point: &[f64], coef: f64) -> Vec<f64> {
    origin
        .iter()
        .zip(point)
        .map(|(o, p)| o + coef * (p - o))
        .collect()
}

fn clamp_to_bounds(point: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    point
        .iter()
        .enumerate()
        .map(|(i, &x)| match bounds.get(i) {
            Some(&(lo, hi)) => x.clamp(lo, hi),
            None => x,
        })
        .collect()
}

fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quadratic_minimum() {
        let result = nelder_mead(
            |x| (x[0] - 2.0).powi(2) + (x[1] - 3.0).powi(2),
            &[0.0, 0.0],
            &[],
            &NelderMeadConfig::default(),
        );

        assert!(result.converged);
        assert!((result.optimal_point[0] - 2.0).abs() < 0.01);
        assert!((result.optimal_point[1] - 3.0).abs() < 0.01);
    }

    #[test]
    fn test_bounds_are_respected() {
        let result = nelder_mead(
            |x| (x[0] - 5.0).powi(2),
            &[0.5],
            &[(0.0, 1.0)],
            &NelderMeadConfig::default(),
        );

        assert!(result.optimal_point[0] <= 1.0);
        assert!((result.optimal_point[0] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_non_finite_objective_is_avoided() {
        let result = nelder_mead(
            |x| if x[0] < 0.2 { f64::NAN } else { (x[0] - 0.5).powi(2) },
            &[0.3],
            &[(0.0, 1.0)],
            &NelderMeadConfig::default(),
        );

        assert!(result.optimal_value.is_finite());
        assert!((result.optimal_point[0] - 0.5).abs() < 0.01);
    }
}
