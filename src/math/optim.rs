//! Quasi-Newton minimizer for small smooth objectives.
//!
//! In this project we minimize negative log-likelihoods with a handful of
//! parameters (intercept, one coefficient per covariate, optional log-shape):
//!
//! ```text
//! minimize f(θ),  θ ∈ R^k
//! ```
//!
//! Implementation choices:
//! - BFGS with an inverse-Hessian approximation held in a dense `DMatrix`.
//! - Central-difference gradients, so each family only has to provide its
//!   likelihood, not derivatives.
//! - Armijo backtracking; a failed line search is only accepted as a
//!   minimum when the gradient is already at the finite-difference noise floor.
//! - Fully deterministic: no random restarts, fixed step schedule.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

/// Stopping rules for [`minimize_bfgs`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimOptions {
    pub max_iters: usize,
    /// Converged when `max |∂f/∂θ_i| < grad_tol`.
    pub grad_tol: f64,
    /// Any `|θ_i|` beyond this is treated as divergence.
    pub param_bound: f64,
}

impl Default for OptimOptions {
    fn default() -> Self {
        Self {
            max_iters: 500,
            grad_tol: 1e-6,
            param_bound: 1e4,
        }
    }
}

/// A located minimum.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: DVector<f64>,
    pub value: f64,
    pub iterations: usize,
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OptimError {
    #[error("objective is not finite at the starting point")]
    NonFiniteStart,
    #[error("no convergence after {iterations} iterations (|grad|={grad_norm:.3e})")]
    MaxIterations { iterations: usize, grad_norm: f64 },
    #[error("parameters diverged past {bound:e} after {iterations} iterations")]
    Diverged { iterations: usize, bound: f64 },
    #[error("line search failed away from a stationary point (|grad|={grad_norm:.3e})")]
    LineSearch { grad_norm: f64 },
}

const ARMIJO_C1: f64 = 1e-4;
const MAX_HALVINGS: usize = 60;
/// A failed line search still counts as converged below `grad_tol * NOISE_FLOOR`.
const NOISE_FLOOR: f64 = 100.0;

/// Minimize `f` starting from `x0`.
pub fn minimize_bfgs<F>(f: F, x0: DVector<f64>, opts: &OptimOptions) -> Result<Minimum, OptimError>
where
    F: Fn(&DVector<f64>) -> f64,
{
    let n = x0.len();
    let mut x = x0;
    let mut fx = f(&x);
    if !fx.is_finite() {
        return Err(OptimError::NonFiniteStart);
    }
    let mut g = numeric_gradient(&f, &x);
    let mut h_inv = DMatrix::<f64>::identity(n, n);
    let mut scaled = false;

    for iter in 0..opts.max_iters {
        let grad_norm = g.amax();
        if !grad_norm.is_finite() {
            return Err(OptimError::LineSearch { grad_norm });
        }
        if grad_norm < opts.grad_tol {
            return Ok(Minimum {
                x,
                value: fx,
                iterations: iter,
            });
        }

        let mut d = -(&h_inv * &g);
        let mut slope = d.dot(&g);
        if !(slope < 0.0) {
            // Lost positive definiteness; restart from steepest descent.
            h_inv = DMatrix::identity(n, n);
            d = -g.clone();
            slope = d.dot(&g);
        }

        let Some((x_new, f_new)) = backtrack(&f, &x, fx, &d, slope) else {
            if grad_norm < opts.grad_tol * NOISE_FLOOR {
                return Ok(Minimum {
                    x,
                    value: fx,
                    iterations: iter,
                });
            }
            return Err(OptimError::LineSearch { grad_norm });
        };

        if x_new.amax() > opts.param_bound {
            return Err(OptimError::Diverged {
                iterations: iter + 1,
                bound: opts.param_bound,
            });
        }

        let g_new = numeric_gradient(&f, &x_new);
        let s = &x_new - &x;
        let y = &g_new - &g;
        let sy = s.dot(&y);
        if sy > 1e-12 {
            if !scaled {
                // Shanno–Phua scaling of the initial inverse Hessian.
                h_inv *= sy / y.dot(&y);
                scaled = true;
            }
            let rho = 1.0 / sy;
            let eye = DMatrix::<f64>::identity(n, n);
            let left = &eye - rho * &s * y.transpose();
            let right = &eye - rho * &y * s.transpose();
            h_inv = &left * &h_inv * &right + rho * &s * s.transpose();
        }

        x = x_new;
        fx = f_new;
        g = g_new;
    }

    Err(OptimError::MaxIterations {
        iterations: opts.max_iters,
        grad_norm: g.amax(),
    })
}

fn backtrack<F>(f: &F, x: &DVector<f64>, fx: f64, d: &DVector<f64>, slope: f64) -> Option<(DVector<f64>, f64)>
where
    F: Fn(&DVector<f64>) -> f64,
{
    let mut step = 1.0;
    for _ in 0..MAX_HALVINGS {
        let candidate = x + step * d;
        let fc = f(&candidate);
        if fc.is_finite() && fc <= fx + ARMIJO_C1 * step * slope {
            return Some((candidate, fc));
        }
        step *= 0.5;
    }
    None
}

/// Central-difference gradient with a step scaled to each coordinate.
pub fn numeric_gradient<F>(f: &F, x: &DVector<f64>) -> DVector<f64>
where
    F: Fn(&DVector<f64>) -> f64,
{
    let mut g = DVector::<f64>::zeros(x.len());
    let mut probe = x.clone();
    for i in 0..x.len() {
        let h = 1e-6 * x[i].abs().max(1.0);
        let xi = x[i];
        probe[i] = xi + h;
        let f_plus = f(&probe);
        probe[i] = xi - h;
        let f_minus = f(&probe);
        probe[i] = xi;
        g[i] = (f_plus - f_minus) / (2.0 * h);
    }
    g
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimizes_shifted_quadratic() {
        let f = |x: &DVector<f64>| (x[0] - 3.0).powi(2) + 10.0 * (x[1] + 1.0).powi(2);
        let min = minimize_bfgs(f, DVector::from_row_slice(&[0.0, 0.0]), &OptimOptions::default()).unwrap();
        assert!((min.x[0] - 3.0).abs() < 1e-6);
        assert!((min.x[1] + 1.0).abs() < 1e-6);
        assert!(min.value < 1e-10);
    }

    #[test]
    fn minimizes_rosenbrock() {
        let f = |x: &DVector<f64>| (1.0 - x[0]).powi(2) + 100.0 * (x[1] - x[0] * x[0]).powi(2);
        let opts = OptimOptions {
            max_iters: 2000,
            ..OptimOptions::default()
        };
        let min = minimize_bfgs(f, DVector::from_row_slice(&[-1.2, 1.0]), &opts).unwrap();
        assert!((min.x[0] - 1.0).abs() < 1e-4, "x0={}", min.x[0]);
        assert!((min.x[1] - 1.0).abs() < 1e-4, "x1={}", min.x[1]);
    }

    #[test]
    fn rejects_non_finite_start() {
        let f = |x: &DVector<f64>| x[0].ln();
        let err = minimize_bfgs(f, DVector::from_row_slice(&[-1.0]), &OptimOptions::default()).unwrap_err();
        assert_eq!(err, OptimError::NonFiniteStart);
    }

    #[test]
    fn unbounded_objective_does_not_converge() {
        let f = |x: &DVector<f64>| -x[0];
        let err = minimize_bfgs(f, DVector::from_row_slice(&[0.0]), &OptimOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            OptimError::Diverged { .. } | OptimError::MaxIterations { .. }
        ));
    }
}
