//! Synthetic churn dataset generation from a known survival family.
//!
//! Each customer gets two covariates:
//! - `usage_z`: a standard-normal engagement score
//! - `contract_monthly`: a 0/1 dummy (as produced by upstream one-hot encoding)
//!
//! A latent churn time is drawn by inverting the family's survival function
//! and then administratively censored at `censor_at`.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::domain::{Family, Observation, ObservationSet};
use crate::error::AppError;
use crate::models::linear_predictor;

/// Covariate names written by the generator.
pub const SAMPLE_COVARIATES: [&str; 2] = ["usage_z", "contract_monthly"];

#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub customers: usize,
    pub seed: u64,
    pub family: Family,
    /// `[intercept, usage_z, contract_monthly]` on the linear predictor.
    pub coefficients: Vec<f64>,
    /// Log of the shape parameter (ignored for Exponential).
    pub log_shape: f64,
    /// Observation window; later churn times are censored here.
    pub censor_at: f64,
}

impl Default for SampleConfig {
    fn default() -> Self {
        Self {
            customers: 500,
            seed: 42,
            family: Family::Weibull,
            coefficients: vec![3.0, 0.3, -0.5],
            log_shape: 1.5_f64.ln(),
            censor_at: 36.0,
        }
    }
}

pub fn generate_sample(config: &SampleConfig) -> Result<ObservationSet, AppError> {
    if config.customers == 0 {
        return Err(AppError::InvalidInput("Customer count must be > 0.".to_string()));
    }
    if config.coefficients.len() != SAMPLE_COVARIATES.len() + 1 {
        return Err(AppError::InvalidInput(format!(
            "Expected {} coefficients (intercept + {} covariates), got {}.",
            SAMPLE_COVARIATES.len() + 1,
            SAMPLE_COVARIATES.len(),
            config.coefficients.len()
        )));
    }
    if !(config.censor_at.is_finite() && config.censor_at > 0.0) {
        return Err(AppError::InvalidInput("Censoring horizon must be finite and > 0.".to_string()));
    }
    if !config.log_shape.is_finite() || config.coefficients.iter().any(|b| !b.is_finite()) {
        return Err(AppError::InvalidInput("Generating parameters must be finite.".to_string()));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::InvalidInput(format!("Covariate distribution error: {e}")))?;

    let shape = config.log_shape.exp();
    let mut rows = Vec::with_capacity(config.customers);

    for i in 0..config.customers {
        let usage: f64 = normal.sample(&mut rng);
        let monthly = if rng.gen_bool(0.5) { 1.0 } else { 0.0 };
        let covariates = vec![usage, monthly];
        let eta = linear_predictor(&config.coefficients, &covariates);

        // u = S(T) is uniform on (0, 1).
        let u: f64 = rng.gen_range(f64::EPSILON..1.0);
        let latent = match config.family {
            Family::Weibull => eta.exp() * (-u.ln()).powf(1.0 / shape),
            Family::Exponential => -eta.exp() * u.ln(),
            Family::LogNormal => {
                let z: f64 = normal.sample(&mut rng);
                (eta + shape * z).exp()
            }
            Family::LogLogistic => eta.exp() * ((1.0 - u) / u).powf(1.0 / shape),
        };

        let event = latent <= config.censor_at;
        rows.push(Observation {
            customer_id: format!("C{:05}", i + 1),
            duration: latent.min(config.censor_at),
            event,
            covariates,
        });
    }

    let names = SAMPLE_COVARIATES.iter().map(|s| s.to_string()).collect();
    let set = ObservationSet::new(names, rows)?;
    log::debug!(
        "Generated {} {} customers ({} churned)",
        set.len(),
        config.family,
        set.n_events()
    );
    Ok(set)
}
