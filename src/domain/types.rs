//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting, forecasting and valuation
//! - exported to JSON/CSV
//! - reloaded later to forecast with a previously selected model

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Replacement for zero durations.
///
/// Every hazard form in the catalog takes `ln t`, so a zero tenure is mapped to
/// this value before fitting. A duration of `0` and a duration of `1e-4` are
/// therefore indistinguishable downstream.
pub const DURATION_EPSILON: f64 = 1e-4;

/// Which distribution(s) to fit.
///
/// `Auto` fits the whole catalog and selects by AIC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FamilySpec {
    Auto,
    Weibull,
    Exponential,
    #[value(name = "lognormal")]
    LogNormal,
    #[value(name = "loglogistic")]
    LogLogistic,
}

impl FamilySpec {
    /// Candidate families in catalog order.
    pub fn families(self) -> Vec<Family> {
        match self {
            FamilySpec::Auto => Family::CATALOG.to_vec(),
            FamilySpec::Weibull => vec![Family::Weibull],
            FamilySpec::Exponential => vec![Family::Exponential],
            FamilySpec::LogNormal => vec![Family::LogNormal],
            FamilySpec::LogLogistic => vec![Family::LogLogistic],
        }
    }
}

/// Concrete parametric survival-time family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    Weibull,
    Exponential,
    #[value(name = "lognormal")]
    LogNormal,
    #[value(name = "loglogistic")]
    LogLogistic,
}

impl Family {
    /// The candidate catalog in its fixed iteration order.
    ///
    /// AIC ties are broken by this order (first seen wins).
    pub const CATALOG: [Family; 4] = [
        Family::Weibull,
        Family::Exponential,
        Family::LogNormal,
        Family::LogLogistic,
    ];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            Family::Weibull => "Weibull",
            Family::Exponential => "Exponential",
            Family::LogNormal => "LogNormal",
            Family::LogLogistic => "LogLogistic",
        }
    }

    /// Whether the family carries an intercept-only shape parameter.
    pub fn has_shape(self) -> bool {
        !matches!(self, Family::Exponential)
    }

    /// Number of free parameters for information criteria.
    ///
    /// Every family regresses its scale on an intercept plus the covariates;
    /// shape families add one more parameter.
    pub fn param_count(self, n_covariates: usize) -> usize {
        let regression = n_covariates + 1;
        if self.has_shape() { regression + 1 } else { regression }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// One customer row of the design matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub customer_id: String,
    /// Tenure; strictly positive once inside an [`ObservationSet`].
    pub duration: f64,
    /// `true` when churn was observed, `false` when censored.
    pub event: bool,
    /// Numeric covariates in the order of [`ObservationSet::covariate_names`].
    pub covariates: Vec<f64>,
}

/// A validated, rectangular set of observations.
///
/// Construction enforces the invariants the fitting stage relies on:
/// unique customer ids, one value per covariate, finite values and
/// `duration > 0` (zero remapped to [`DURATION_EPSILON`]).
#[derive(Debug, Clone)]
pub struct ObservationSet {
    covariate_names: Vec<String>,
    rows: Vec<Observation>,
    zero_durations_remapped: usize,
}

impl ObservationSet {
    pub fn new(covariate_names: Vec<String>, mut rows: Vec<Observation>) -> Result<Self, AppError> {
        if rows.is_empty() {
            return Err(AppError::Data("Observation set is empty.".to_string()));
        }

        let mut names = HashSet::with_capacity(covariate_names.len());
        for name in &covariate_names {
            if !names.insert(name.as_str()) {
                return Err(AppError::Data(format!("Duplicate covariate column `{name}`.")));
            }
        }

        let mut ids = HashSet::with_capacity(rows.len());
        let mut zero_durations_remapped = 0;
        for row in rows.iter_mut() {
            if !ids.insert(row.customer_id.clone()) {
                return Err(AppError::Data(format!(
                    "Duplicate customer id `{}`.",
                    row.customer_id
                )));
            }
            if row.covariates.len() != covariate_names.len() {
                return Err(AppError::Data(format!(
                    "Customer `{}` has {} covariate values, expected {}.",
                    row.customer_id,
                    row.covariates.len(),
                    covariate_names.len()
                )));
            }
            if let Some(j) = row.covariates.iter().position(|v| !v.is_finite()) {
                return Err(AppError::Data(format!(
                    "Customer `{}` has a non-finite value in covariate `{}`.",
                    row.customer_id, covariate_names[j]
                )));
            }
            if !row.duration.is_finite() || row.duration < 0.0 {
                return Err(AppError::Data(format!(
                    "Customer `{}` has invalid duration {} (must be finite and >= 0).",
                    row.customer_id, row.duration
                )));
            }
            if row.duration == 0.0 {
                row.duration = DURATION_EPSILON;
                zero_durations_remapped += 1;
            }
        }

        Ok(Self {
            covariate_names,
            rows,
            zero_durations_remapped,
        })
    }

    pub fn covariate_names(&self) -> &[String] {
        &self.covariate_names
    }

    pub fn rows(&self) -> &[Observation] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn n_covariates(&self) -> usize {
        self.covariate_names.len()
    }

    pub fn n_events(&self) -> usize {
        self.rows.iter().filter(|r| r.event).count()
    }

    pub fn zero_durations_remapped(&self) -> usize {
        self.zero_durations_remapped
    }

    pub fn stats(&self) -> DatasetStats {
        let mut duration_min = f64::INFINITY;
        let mut duration_max = f64::NEG_INFINITY;
        for r in &self.rows {
            duration_min = duration_min.min(r.duration);
            duration_max = duration_max.max(r.duration);
        }
        let n_events = self.n_events();
        DatasetStats {
            n_customers: self.rows.len(),
            n_events,
            n_censored: self.rows.len() - n_events,
            n_covariates: self.covariate_names.len(),
            zero_durations_remapped: self.zero_durations_remapped,
            duration_min,
            duration_max,
        }
    }
}

/// Summary stats about the observations actually used for fitting.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetStats {
    pub n_customers: usize,
    pub n_events: usize,
    pub n_censored: usize,
    pub n_covariates: usize,
    pub zero_durations_remapped: usize,
    pub duration_min: f64,
    pub duration_max: f64,
}

/// A fitted distribution: the single model retained by selection.
///
/// `params` layout: regression coefficients `[intercept, β1..βp]` on the raw
/// covariate scale, followed by the log-shape parameter for shape families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub family: Family,
    pub covariate_names: Vec<String>,
    pub params: Vec<f64>,
    pub log_likelihood: f64,
    pub aic: f64,
    pub n_obs: usize,
    pub n_events: usize,
}

impl FittedModel {
    /// Number of free parameters (`k` in the AIC).
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Regression coefficients (intercept first).
    pub fn coefficients(&self) -> &[f64] {
        &self.params[..self.covariate_names.len() + 1]
    }

    /// Log-shape parameter, if the family has one.
    pub fn log_shape(&self) -> Option<f64> {
        if self.family.has_shape() {
            self.params.last().copied()
        } else {
            None
        }
    }
}

/// Outcome of attempting one candidate family.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateStatus {
    Converged,
    Failed(String),
}

/// Score-ledger entry for one candidate (no fitted parameters retained).
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub family: Family,
    pub param_count: usize,
    /// `None` when the fit failed.
    pub log_likelihood: Option<f64>,
    /// `+∞` when the fit failed, so the candidate can never be selected.
    pub aic: f64,
    pub status: CandidateStatus,
}

/// One customer × period churn forecast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub customer_id: String,
    pub pred_period: u32,
    /// Probability of having churned by `pred_period`, rounded to 5 decimals.
    pub churn_rate: f64,
}

/// Output of the forecast engine: `num_customers × horizon` records,
/// period-major (all customers for period 1, then period 2, ...).
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    pub family: Family,
    pub horizon: u32,
    pub records: Vec<ForecastRecord>,
}

/// Discounting parameters for the valuation engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValuationParams {
    /// Monetary margin per retained period (MM).
    pub margin: f64,
    /// Annual discount rate `r`, applied per period as `r / 12`.
    pub annual_rate: f64,
}

impl Default for ValuationParams {
    fn default() -> Self {
        Self {
            margin: 1300.0,
            annual_rate: 0.10,
        }
    }
}

/// A forecast record extended with its discounted value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValuationRecord {
    pub customer_id: String,
    pub pred_period: u32,
    pub churn_rate: f64,
    /// Discounted value up to and including `pred_period`.
    ///
    /// `None` only if the left join found no match for the key.
    #[serde(rename = "CLV")]
    pub clv: Option<f64>,
}

/// Output of the valuation engine, row-aligned with its input forecast table.
#[derive(Debug, Clone, PartialEq)]
pub struct ValuationTable {
    pub params: ValuationParams,
    pub records: Vec<ValuationRecord>,
}

/// Column names of the observation CSV.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub id: String,
    pub duration: String,
    pub event: String,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus environment and defaults).
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub data_path: PathBuf,
    pub columns: ColumnSpec,
    pub family_spec: FamilySpec,
    pub parallel: bool,
    /// Forecast horizon `N`; no default.
    pub periods: u32,
    pub valuation: ValuationParams,
    pub top_n: usize,
    pub export_results: Option<PathBuf>,
    pub export_model: Option<PathBuf>,
}

/// A saved model file (JSON).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    pub tool: String,
    pub created: DateTime<Utc>,
    pub model: FittedModel,
}
