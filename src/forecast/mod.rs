//! Forecast engine: per-customer churn probabilities over a fixed horizon.
//!
//! For each period `t = 1..N` and each customer row `x`:
//!
//! ```text
//! churn_rate(t, x) = round5(1 - S(t | x))
//! ```
//!
//! Records are emitted period-major: all customers for period 1, then all
//! customers for period 2, and so on.

use crate::domain::{FittedModel, ForecastRecord, ForecastTable, ObservationSet};
use crate::error::AppError;
use crate::models::survival;

/// Decimal places kept on `churn_rate`.
pub const CHURN_DECIMALS: i32 = 5;

/// Round to [`CHURN_DECIMALS`] decimal places, half to even.
pub fn round_churn(value: f64) -> f64 {
    round_to(value, CHURN_DECIMALS)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10_f64.powi(decimals);
    (value * scale).round_ties_even() / scale
}

/// Produce the `customers × horizon` churn table under `model`.
///
/// The observation set's covariates are matched to the model by name, so the
/// column order may differ from the data the model was fitted on.
pub fn forecast(model: &FittedModel, obs: &ObservationSet, horizon: u32) -> Result<ForecastTable, AppError> {
    if horizon == 0 {
        return Err(AppError::InvalidInput("Forecast horizon must be >= 1.".to_string()));
    }

    let design = aligned_covariates(model, obs)?;

    let mut records = Vec::with_capacity(obs.len() * horizon as usize);
    for period in 1..=horizon {
        let t = period as f64;
        for (row, x) in obs.rows().iter().zip(&design) {
            let s = survival(model, t, x);
            if !s.is_finite() {
                return Err(AppError::Data(format!(
                    "Survival for customer `{}` at period {period} is not finite.",
                    row.customer_id
                )));
            }
            records.push(ForecastRecord {
                customer_id: row.customer_id.clone(),
                pred_period: period,
                churn_rate: round_churn((1.0 - s).clamp(0.0, 1.0)),
            });
        }
    }

    log::info!(
        "Forecast {} customers x {horizon} periods with {} ({} records)",
        obs.len(),
        model.family,
        records.len()
    );

    Ok(ForecastTable {
        family: model.family,
        horizon,
        records,
    })
}

/// Reorder each row's covariates into the model's column order.
fn aligned_covariates(model: &FittedModel, obs: &ObservationSet) -> Result<Vec<Vec<f64>>, AppError> {
    let names = obs.covariate_names();
    let positions = model
        .covariate_names
        .iter()
        .map(|wanted| column_position(names, wanted))
        .collect::<Result<Vec<_>, _>>()?;

    if names.len() > positions.len() {
        log::debug!(
            "Ignoring {} covariate column(s) the model was not fitted on",
            names.len() - positions.len()
        );
    }

    Ok(obs
        .rows()
        .iter()
        .map(|r| positions.iter().map(|&j| r.covariates[j]).collect())
        .collect())
}

/// Exact name first; otherwise a case-insensitive match that must be unique.
fn column_position(names: &[String], wanted: &str) -> Result<usize, AppError> {
    if let Some(j) = names.iter().position(|n| n == wanted) {
        return Ok(j);
    }
    let mut folded = names.iter().enumerate().filter(|(_, n)| n.eq_ignore_ascii_case(wanted));
    match (folded.next(), folded.next()) {
        (Some((j, _)), None) => Ok(j),
        (Some(_), Some(_)) => Err(AppError::Data(format!(
            "Covariate column `{wanted}` matches several columns that differ only by case."
        ))),
        (None, _) => Err(AppError::Data(format!(
            "Covariate column `{wanted}` required by the model is missing."
        ))),
    }
}
