//! Model selection across the distribution catalog using AIC.
//!
//! The tool fits each candidate family and computes:
//! - the maximized log-likelihood `ℓ̂`
//! - AIC = 2k − 2ℓ̂ with the family's own parameter count `k`
//!
//! Selection rules:
//! 1. A candidate whose optimizer fails is scored `AIC = +∞` and logged; it
//!    never aborts the run and can never be selected.
//! 2. Choose the strictly smallest AIC; exact ties go to the candidate seen
//!    first in catalog order.
//! 3. If every candidate failed, selection is exhausted.

use rayon::prelude::*;

use crate::domain::{CandidateScore, CandidateStatus, Family, FittedModel, ObservationSet};
use crate::error::AppError;
use crate::fit::fitter::fit_family;
use crate::math::OptimOptions;

/// Options for a selection run.
#[derive(Debug, Clone)]
pub struct SelectionOptions {
    /// Candidates in the order used for tie-breaking.
    pub families: Vec<Family>,
    /// Fit candidates on the rayon pool. Results are identical either way.
    pub parallel: bool,
    pub optim: OptimOptions,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            families: Family::CATALOG.to_vec(),
            parallel: true,
            optim: OptimOptions::default(),
        }
    }
}

/// Output of fitting + selection.
///
/// Only the winning candidate's parameters survive; the losers are reduced to
/// their score-ledger entries.
#[derive(Debug, Clone)]
pub struct SelectionReport {
    pub selected: FittedModel,
    /// One entry per attempted family, in candidate order.
    pub scores: Vec<CandidateScore>,
}

/// Fit every candidate family and select the best by AIC.
pub fn fit_and_select(obs: &ObservationSet, opts: &SelectionOptions) -> Result<SelectionReport, AppError> {
    if opts.families.is_empty() {
        return Err(AppError::InvalidInput("No candidate families to fit.".to_string()));
    }

    // Evaluate each family independently. `collect` keeps candidate order, so
    // the parallel and sequential paths produce the same ledger.
    let attempts: Vec<Result<(CandidateScore, Option<FittedModel>), AppError>> = if opts.parallel {
        opts.families
            .par_iter()
            .map(|&family| score_candidate(family, obs, &opts.optim))
            .collect()
    } else {
        opts.families
            .iter()
            .map(|&family| score_candidate(family, obs, &opts.optim))
            .collect()
    };

    let mut scores = Vec::with_capacity(attempts.len());
    let mut models = Vec::with_capacity(attempts.len());
    for attempt in attempts {
        let (score, model) = attempt?;
        match &score.status {
            CandidateStatus::Converged => log::info!("{} AIC: {:.6}", score.family, score.aic),
            CandidateStatus::Failed(reason) => {
                log::warn!("{} skipped: {reason}", score.family)
            }
        }
        scores.push(score);
        models.push(model);
    }

    let Some(best_idx) = select_by_aic(&scores) else {
        return Err(AppError::SelectionExhausted {
            attempted: scores.len(),
        });
    };

    let Some(selected) = models.swap_remove(best_idx) else {
        return Err(AppError::SelectionExhausted {
            attempted: scores.len(),
        });
    };
    log::info!("Best model: {} with AIC: {:.6}", selected.family, selected.aic);

    Ok(SelectionReport { selected, scores })
}

fn score_candidate(
    family: Family,
    obs: &ObservationSet,
    optim: &OptimOptions,
) -> Result<(CandidateScore, Option<FittedModel>), AppError> {
    let param_count = family.param_count(obs.n_covariates());
    match fit_family(family, obs, optim) {
        Ok(model) => Ok((
            CandidateScore {
                family,
                param_count,
                log_likelihood: Some(model.log_likelihood),
                aic: model.aic,
                status: CandidateStatus::Converged,
            },
            Some(model),
        )),
        Err(AppError::FitConvergence { reason, .. }) => Ok((
            CandidateScore {
                family,
                param_count,
                log_likelihood: None,
                aic: f64::INFINITY,
                status: CandidateStatus::Failed(reason),
            },
            None,
        )),
        Err(e) => Err(e),
    }
}

/// Akaike Information Criterion.
pub fn aic(k: usize, log_likelihood: f64) -> f64 {
    2.0 * k as f64 - 2.0 * log_likelihood
}

/// Index of the strictly smallest finite AIC; the first seen wins ties.
pub fn select_by_aic(scores: &[CandidateScore]) -> Option<usize> {
    let mut best: Option<usize> = None;
    let mut best_aic = f64::INFINITY;
    for (i, s) in scores.iter().enumerate() {
        if s.aic < best_aic {
            best_aic = s.aic;
            best = Some(i);
        }
    }
    best
}
