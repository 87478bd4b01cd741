//! Survival-function evaluation for the distribution catalog.
//!
//! Each family is an AFT-style regression: covariates act through a linear
//! predictor `η = β0 + Σ βj·xj` that sets the scale (or the log-location for
//! LogNormal). Shape families carry an intercept-only log-shape parameter.
//!
//! | family      | scale / location | shape      | `S(t)`                    |
//! |-------------|------------------|------------|---------------------------|
//! | Weibull     | `λ = exp(η)`     | `ρ = e^a`  | `exp(-(t/λ)^ρ)`           |
//! | Exponential | `λ = exp(η)`     | —          | `exp(-t/λ)`               |
//! | LogNormal   | `μ = η`          | `σ = e^a`  | `1 - Φ((ln t - μ)/σ)`     |
//! | LogLogistic | `α = exp(η)`     | `β = e^a`  | `1 / (1 + (t/α)^β)`       |
//!
//! Everything is evaluated on the log scale so the likelihood stays finite for
//! tiny durations and extreme covariate values.

use crate::domain::{Family, FittedModel, ObservationSet};
use crate::error::AppError;
use crate::math::{normal_log_pdf, normal_log_sf, softplus, OptimOptions};

/// Parameters located by maximum likelihood for one family.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedParameters {
    pub params: Vec<f64>,
    pub log_likelihood: f64,
    pub iterations: usize,
}

/// A parametric survival-time distribution.
///
/// Implementors only define the two log-scale primitives in terms of the
/// linear predictor; covariate handling, likelihood and fitting are shared.
pub trait SurvivalDistribution: Sync {
    fn family(&self) -> Family;

    /// `ln S(t)` given the linear predictor and log-shape.
    fn log_survival_lp(&self, t: f64, eta: f64, log_shape: f64) -> f64;

    /// `ln f(t)` given the linear predictor and log-shape.
    fn log_density_lp(&self, t: f64, eta: f64, log_shape: f64) -> f64;

    /// Starting value for the intercept of the linear predictor.
    fn initial_intercept(&self, obs: &ObservationSet) -> f64 {
        let total: f64 = obs.rows().iter().map(|r| r.duration).sum();
        let events = obs.n_events().max(1) as f64;
        (total / events).ln()
    }

    fn param_count(&self, n_covariates: usize) -> usize {
        self.family().param_count(n_covariates)
    }

    fn log_survival(&self, t: f64, covariates: &[f64], params: &[f64]) -> f64 {
        let (eta, log_shape) = split_params(params, covariates);
        self.log_survival_lp(t, eta, log_shape)
    }

    fn log_density(&self, t: f64, covariates: &[f64], params: &[f64]) -> f64 {
        let (eta, log_shape) = split_params(params, covariates);
        self.log_density_lp(t, eta, log_shape)
    }

    /// `S(t | x)`.
    fn survival(&self, t: f64, covariates: &[f64], params: &[f64]) -> f64 {
        self.log_survival(t, covariates, params).exp()
    }

    /// `H(t | x) = -ln S(t | x)`.
    fn cumulative_hazard(&self, t: f64, covariates: &[f64], params: &[f64]) -> f64 {
        -self.log_survival(t, covariates, params)
    }

    /// Censored-data log-likelihood: events contribute `ln f`, censored rows `ln S`.
    fn log_likelihood(&self, obs: &ObservationSet, params: &[f64]) -> f64 {
        obs.rows()
            .iter()
            .map(|r| {
                if r.event {
                    self.log_density(r.duration, &r.covariates, params)
                } else {
                    self.log_survival(r.duration, &r.covariates, params)
                }
            })
            .sum()
    }

    /// Maximum-likelihood fit against the full observation set.
    fn fit(&self, obs: &ObservationSet, opts: &OptimOptions) -> Result<FittedParameters, AppError> {
        crate::fit::fitter::maximize_likelihood(self, obs, opts)
    }
}

/// Evaluate `η = β0 + Σ βj·xj`.
pub fn linear_predictor(coefficients: &[f64], covariates: &[f64]) -> f64 {
    coefficients[0]
        + coefficients[1..]
            .iter()
            .zip(covariates)
            .map(|(b, x)| b * x)
            .sum::<f64>()
}

/// Split a parameter vector into `(η, log_shape)` for one covariate row.
///
/// Exponential vectors have no trailing shape entry; `log_shape` is then 0.
fn split_params(params: &[f64], covariates: &[f64]) -> (f64, f64) {
    let p = covariates.len() + 1;
    let eta = linear_predictor(&params[..p], covariates);
    let log_shape = params.get(p).copied().unwrap_or(0.0);
    (eta, log_shape)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Weibull;

#[derive(Debug, Clone, Copy, Default)]
pub struct Exponential;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNormal;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogLogistic;

impl SurvivalDistribution for Weibull {
    fn family(&self) -> Family {
        Family::Weibull
    }

    fn log_survival_lp(&self, t: f64, eta: f64, log_shape: f64) -> f64 {
        // -(t/λ)^ρ
        -(log_shape.exp() * (t.ln() - eta)).exp()
    }

    fn log_density_lp(&self, t: f64, eta: f64, log_shape: f64) -> f64 {
        let lz = log_shape.exp() * (t.ln() - eta);
        log_shape - t.ln() + lz - lz.exp()
    }
}

impl SurvivalDistribution for Exponential {
    fn family(&self) -> Family {
        Family::Exponential
    }

    fn log_survival_lp(&self, t: f64, eta: f64, _log_shape: f64) -> f64 {
        // H(t) = t / λ with λ = exp(η).
        -(t / eta.exp())
    }

    fn log_density_lp(&self, t: f64, eta: f64, log_shape: f64) -> f64 {
        // h(t) = 1/λ is constant.
        -eta + self.log_survival_lp(t, eta, log_shape)
    }
}

impl SurvivalDistribution for LogNormal {
    fn family(&self) -> Family {
        Family::LogNormal
    }

    fn initial_intercept(&self, obs: &ObservationSet) -> f64 {
        let n = obs.len() as f64;
        obs.rows().iter().map(|r| r.duration.ln()).sum::<f64>() / n
    }

    fn log_survival_lp(&self, t: f64, eta: f64, log_shape: f64) -> f64 {
        normal_log_sf((t.ln() - eta) / log_shape.exp())
    }

    fn log_density_lp(&self, t: f64, eta: f64, log_shape: f64) -> f64 {
        let z = (t.ln() - eta) / log_shape.exp();
        normal_log_pdf(z) - log_shape - t.ln()
    }
}

impl SurvivalDistribution for LogLogistic {
    fn family(&self) -> Family {
        Family::LogLogistic
    }

    fn log_survival_lp(&self, t: f64, eta: f64, log_shape: f64) -> f64 {
        -softplus(log_shape.exp() * (t.ln() - eta))
    }

    fn log_density_lp(&self, t: f64, eta: f64, log_shape: f64) -> f64 {
        let u = log_shape.exp() * (t.ln() - eta);
        log_shape - t.ln() + u - 2.0 * softplus(u)
    }
}

static WEIBULL: Weibull = Weibull;
static EXPONENTIAL: Exponential = Exponential;
static LOG_NORMAL: LogNormal = LogNormal;
static LOG_LOGISTIC: LogLogistic = LogLogistic;

/// Look up the catalog implementation of a family.
pub fn distribution(family: Family) -> &'static dyn SurvivalDistribution {
    match family {
        Family::Weibull => &WEIBULL,
        Family::Exponential => &EXPONENTIAL,
        Family::LogNormal => &LOG_NORMAL,
        Family::LogLogistic => &LOG_LOGISTIC,
    }
}

/// Evaluate `S(t | x)` under a fitted model.
///
/// `covariates` must be in the order of `model.covariate_names`.
pub fn survival(model: &FittedModel, t: f64, covariates: &[f64]) -> f64 {
    distribution(model.family).survival(t, covariates, &model.params)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Family; 4] = Family::CATALOG;

    fn params_for(family: Family, coefs: &[f64], log_shape: f64) -> Vec<f64> {
        let mut p = coefs.to_vec();
        if family.has_shape() {
            p.push(log_shape);
        }
        p
    }

    #[test]
    fn exponential_uses_log_linear_scale() {
        let beta = [0.5, 0.2, -0.1];
        let x = [2.0, 3.0];
        let lambda = (0.5_f64 + 0.2 * 2.0 - 0.1 * 3.0).exp();
        let t = 4.0;
        let d = distribution(Family::Exponential);
        assert!((d.cumulative_hazard(t, &x, &beta) - t / lambda).abs() < 1e-12);
        assert!((d.survival(t, &x, &beta) - (-t / lambda).exp()).abs() < 1e-12);
    }

    #[test]
    fn weibull_with_unit_shape_is_exponential() {
        let coefs = [1.3, -0.4];
        let x = [0.7];
        for &t in &[0.1, 1.0, 5.0, 30.0] {
            let w = distribution(Family::Weibull).log_survival(t, &x, &[1.3, -0.4, 0.0]);
            let e = distribution(Family::Exponential).log_survival(t, &x, &coefs);
            assert!((w - e).abs() < 1e-12);
        }
    }

    #[test]
    fn median_families_cross_one_half_at_scale() {
        let eta = 2.0_f64;
        let t = eta.exp();
        let ln = distribution(Family::LogNormal).survival(t, &[], &[eta, 0.3]);
        let ll = distribution(Family::LogLogistic).survival(t, &[], &[eta, 0.3]);
        assert!((ln - 0.5).abs() < 1e-12);
        assert!((ll - 0.5).abs() < 1e-12);
    }

    #[test]
    fn survival_is_a_decreasing_probability() {
        for family in ALL {
            let params = params_for(family, &[1.5, 0.3], -0.2);
            let d = distribution(family);
            let mut prev = 1.0;
            for i in 1..=40 {
                let s = d.survival(i as f64 * 0.5, &[1.0], &params);
                assert!((0.0..=1.0).contains(&s), "{family}: S={s}");
                assert!(s <= prev + 1e-15, "{family}: not decreasing");
                prev = s;
            }
        }
    }

    #[test]
    fn density_is_negative_derivative_of_survival() {
        for family in ALL {
            let params = params_for(family, &[1.2, -0.5], 0.25);
            let d = distribution(family);
            let x = [0.4];
            for &t in &[0.3, 1.0, 3.0, 8.0] {
                let h = 1e-6 * t;
                let ds = (d.survival(t + h, &x, &params) - d.survival(t - h, &x, &params)) / (2.0 * h);
                let f = d.log_density(t, &x, &params).exp();
                assert!((f + ds).abs() < 1e-4 * f.max(1e-2), "{family} t={t}: f={f} -dS={}", -ds);
            }
        }
    }

    #[test]
    fn log_likelihood_splits_events_and_censoring() {
        use crate::domain::{Observation, ObservationSet};
        let obs = ObservationSet::new(
            vec![],
            vec![
                Observation { customer_id: "a".into(), duration: 5.0, event: true, covariates: vec![] },
                Observation { customer_id: "b".into(), duration: 10.0, event: false, covariates: vec![] },
            ],
        )
        .unwrap();
        let d = distribution(Family::Exponential);
        let eta = 15.0_f64.ln();
        let ll = d.log_likelihood(&obs, &[eta]);
        // ln f(5) + ln S(10) = -ln 15 - 5/15 - 10/15
        assert!((ll - (-(15.0_f64.ln()) - 1.0)).abs() < 1e-12);
    }
}
