//! Low-level fitting routine for a single distribution family.
//!
//! Given:
//! - durations `t_i` (strictly positive)
//! - event indicators `d_i`
//! - covariate rows `x_i`
//!
//! we maximize the censored-data log-likelihood
//!
//! ```text
//! ℓ(θ) = Σ d_i ln f(t_i | x_i, θ) + (1 - d_i) ln S(t_i | x_i, θ)
//! ```
//!
//! with the quasi-Newton minimizer in `math::optim`, and return the fitted
//! parameters on the raw covariate scale.

use nalgebra::DVector;

use crate::domain::{Family, FittedModel, Observation, ObservationSet};
use crate::error::AppError;
use crate::fit::selection::aic;
use crate::math::{minimize_bfgs, OptimOptions};
use crate::models::{distribution, FittedParameters, SurvivalDistribution};

/// Column centering/scaling used while optimizing.
///
/// Covariates on very different scales (e.g. monthly charges vs. dummies)
/// make the likelihood surface badly conditioned; the optimizer works on
/// standardized columns and the coefficients are mapped back afterwards.
#[derive(Debug, Clone)]
struct Standardizer {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Standardizer {
    fn from_observations(obs: &ObservationSet) -> Self {
        let p = obs.n_covariates();
        let n = obs.len() as f64;
        let mut means = vec![0.0; p];
        for r in obs.rows() {
            for (m, x) in means.iter_mut().zip(&r.covariates) {
                *m += x / n;
            }
        }
        let mut scales = vec![0.0; p];
        for r in obs.rows() {
            for j in 0..p {
                let dx = r.covariates[j] - means[j];
                scales[j] += dx * dx / n;
            }
        }
        for s in scales.iter_mut() {
            *s = s.sqrt();
            // Constant columns centre to zero; their coefficient stays at 0.
            if !(*s > 1e-12) {
                *s = 1.0;
            }
        }
        Self { means, scales }
    }

    fn apply(&self, obs: &ObservationSet) -> Result<ObservationSet, AppError> {
        let rows = obs
            .rows()
            .iter()
            .map(|r| Observation {
                customer_id: r.customer_id.clone(),
                duration: r.duration,
                event: r.event,
                covariates: r
                    .covariates
                    .iter()
                    .enumerate()
                    .map(|(j, x)| (x - self.means[j]) / self.scales[j])
                    .collect(),
            })
            .collect();
        ObservationSet::new(obs.covariate_names().to_vec(), rows)
    }

    /// Map `[b0, b1..bp, shape?]` fitted on standardized columns back to raw columns.
    fn unscale(&self, params: &[f64]) -> Vec<f64> {
        let p = self.means.len();
        let mut out = params.to_vec();
        let mut intercept = params[0];
        for j in 0..p {
            let b = params[j + 1] / self.scales[j];
            out[j + 1] = b;
            intercept -= b * self.means[j];
        }
        out[0] = intercept;
        out
    }
}

/// Maximize the censored-data likelihood of `dist` over `obs`.
pub fn maximize_likelihood<D>(dist: &D, obs: &ObservationSet, opts: &OptimOptions) -> Result<FittedParameters, AppError>
where
    D: SurvivalDistribution + ?Sized,
{
    let family = dist.family();

    if let Some(r) = obs.rows().iter().find(|r| !(r.duration > 0.0)) {
        return Err(AppError::Data(format!(
            "Customer `{}` reached fitting with non-positive duration {}.",
            r.customer_id, r.duration
        )));
    }
    if obs.n_events() == 0 {
        return Err(AppError::FitConvergence {
            family,
            reason: "no observed churn events; the likelihood has no finite maximum".to_string(),
        });
    }

    let standardizer = Standardizer::from_observations(obs);
    let scaled = standardizer.apply(obs)?;
    let n = scaled.len() as f64;

    let k = dist.param_count(obs.n_covariates());
    let mut x0 = DVector::<f64>::zeros(k);
    x0[0] = dist.initial_intercept(&scaled);

    let objective = |theta: &DVector<f64>| -dist.log_likelihood(&scaled, theta.as_slice()) / n;
    let minimum = minimize_bfgs(objective, x0, opts).map_err(|e| AppError::FitConvergence {
        family,
        reason: e.to_string(),
    })?;

    let params = standardizer.unscale(minimum.x.as_slice());
    let log_likelihood = dist.log_likelihood(obs, &params);
    if !log_likelihood.is_finite() {
        return Err(AppError::FitConvergence {
            family,
            reason: "fitted log-likelihood is not finite".to_string(),
        });
    }

    log::debug!(
        "{family}: converged in {} iterations, log-likelihood {log_likelihood:.6}",
        minimum.iterations
    );

    Ok(FittedParameters {
        params,
        log_likelihood,
        iterations: minimum.iterations,
    })
}

/// Fit one catalog family and score it.
pub fn fit_family(family: Family, obs: &ObservationSet, opts: &OptimOptions) -> Result<FittedModel, AppError> {
    let fitted = distribution(family).fit(obs, opts)?;
    let k = fitted.params.len();
    Ok(FittedModel {
        family,
        covariate_names: obs.covariate_names().to_vec(),
        aic: aic(k, fitted.log_likelihood),
        params: fitted.params,
        log_likelihood: fitted.log_likelihood,
        n_obs: obs.len(),
        n_events: obs.n_events(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, duration: f64, event: bool, covariates: Vec<f64>) -> Observation {
        Observation {
            customer_id: id.to_string(),
            duration,
            event,
            covariates,
        }
    }

    #[test]
    fn exponential_intercept_matches_closed_form() {
        // λ̂ = Σt / Σd = 15
        let obs = ObservationSet::new(vec![], vec![row("a", 5.0, true, vec![]), row("b", 10.0, false, vec![])]).unwrap();
        let fit = fit_family(Family::Exponential, &obs, &OptimOptions::default()).unwrap();
        assert!((fit.params[0] - 15.0_f64.ln()).abs() < 1e-5, "got {}", fit.params[0]);
        let expected_aic = 2.0 + 2.0 * (15.0_f64.ln() + 1.0);
        assert!((fit.aic - expected_aic).abs() < 1e-8);
    }

    #[test]
    fn exponential_dummy_covariate_matches_group_rates() {
        // group 0: T=12, D=2 -> λ=6 ; group 1: T=4, D=2 -> λ=2
        let obs = ObservationSet::new(
            vec!["plan_premium".to_string()],
            vec![
                row("a", 2.0, true, vec![0.0]),
                row("b", 4.0, true, vec![0.0]),
                row("c", 6.0, false, vec![0.0]),
                row("d", 1.0, true, vec![1.0]),
                row("e", 3.0, true, vec![1.0]),
            ],
        )
        .unwrap();
        let fit = fit_family(Family::Exponential, &obs, &OptimOptions::default()).unwrap();
        assert!((fit.params[0] - 6.0_f64.ln()).abs() < 1e-4, "b0={}", fit.params[0]);
        assert!((fit.params[1] + 3.0_f64.ln()).abs() < 1e-4, "b1={}", fit.params[1]);
    }

    #[test]
    fn constant_covariate_keeps_zero_coefficient() {
        let obs = ObservationSet::new(
            vec!["const".to_string()],
            vec![
                row("a", 2.0, true, vec![7.0]),
                row("b", 4.0, true, vec![7.0]),
                row("c", 6.0, false, vec![7.0]),
            ],
        )
        .unwrap();
        let fit = fit_family(Family::Exponential, &obs, &OptimOptions::default()).unwrap();
        assert_eq!(fit.params[1], 0.0);
        assert!((fit.params[0] - 6.0_f64.ln()).abs() < 1e-5);
    }

    #[test]
    fn all_censored_data_does_not_converge() {
        let obs = ObservationSet::new(vec![], vec![row("a", 3.0, false, vec![]), row("b", 4.0, false, vec![])]).unwrap();
        for family in Family::CATALOG {
            let err = fit_family(family, &obs, &OptimOptions::default()).unwrap_err();
            assert!(matches!(err, AppError::FitConvergence { family: f, .. } if f == family));
        }
    }

    #[test]
    fn unscale_restores_raw_linear_predictor() {
        let s = Standardizer {
            means: vec![10.0, 0.5],
            scales: vec![2.0, 0.5],
        };
        let scaled = [1.0, 0.4, -0.2, 0.3];
        let raw = s.unscale(&scaled);
        let x = [13.0, 1.0];
        let z = [(13.0 - 10.0) / 2.0, (1.0 - 0.5) / 0.5];
        let eta_scaled = scaled[0] + scaled[1] * z[0] + scaled[2] * z[1];
        let eta_raw = raw[0] + raw[1] * x[0] + raw[2] * x[1];
        assert!((eta_scaled - eta_raw).abs() < 1e-12);
        assert_eq!(raw[3], 0.3);
    }
}
