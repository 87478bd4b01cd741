//! Formatted terminal output.
//!
//! Formatting lives here so the fitting and valuation code stays free of
//! presentation concerns.

use crate::domain::{CandidateScore, CandidateStatus, DatasetStats, FittedModel, ValuationParams};
use crate::report::{CustomerValue, Rankings};

/// Dataset statistics + candidate ledger + chosen model.
pub fn format_run_summary(
    stats: &DatasetStats,
    model: &FittedModel,
    scores: &[CandidateScore],
    params: &ValuationParams,
    horizon: u32,
) -> String {
    let mut out = String::new();

    out.push_str("=== clv - churn survival & lifetime value ===\n");
    out.push_str(&format_dataset(stats));
    out.push_str(&format!(
        "Horizon: {horizon} periods | margin={:.2} | annual rate={:.4}\n",
        params.margin, params.annual_rate
    ));

    if !scores.is_empty() {
        out.push('\n');
        out.push_str(&format_scores(scores, model));
    }

    out.push_str("\nChosen model:\n");
    out.push_str(&format_model(model));
    out.push('\n');

    out
}

pub fn format_dataset(stats: &DatasetStats) -> String {
    let mut out = format!(
        "Customers: n={} | churned={} | censored={} | covariates={}\n",
        stats.n_customers, stats.n_events, stats.n_censored, stats.n_covariates
    );
    out.push_str(&format!(
        "Duration: [{:.4}, {:.4}]",
        stats.duration_min, stats.duration_max
    ));
    if stats.zero_durations_remapped > 0 {
        out.push_str(&format!(" | zero durations remapped={}", stats.zero_durations_remapped));
    }
    out.push('\n');
    out
}

/// AIC table in candidate order; `*` marks the chosen family.
pub fn format_scores(scores: &[CandidateScore], chosen: &FittedModel) -> String {
    let mut out = String::from("Model diagnostics:\n");
    for s in scores {
        let mark = if s.family == chosen.family { "*" } else { " " };
        match &s.status {
            CandidateStatus::Converged => {
                let ll = s.log_likelihood.unwrap_or(f64::NAN);
                out.push_str(&format!(
                    "{mark} {:<12} k={:<3} logL={:>14.4} AIC={:.4}\n",
                    s.family.display_name(),
                    s.param_count,
                    ll,
                    s.aic
                ));
            }
            CandidateStatus::Failed(reason) => {
                out.push_str(&format!("  (skipped {}) {reason}\n", s.family.display_name()));
            }
        }
    }
    out
}

pub fn format_model(model: &FittedModel) -> String {
    let mut out = format!(
        "- {} | AIC={:.4} | logL={:.4} | n={} events={}\n",
        model.family.display_name(),
        model.aic,
        model.log_likelihood,
        model.n_obs,
        model.n_events
    );
    let coefs = model.coefficients();
    out.push_str(&format!("- {:<20} {:>12.6}\n", "(intercept)", coefs[0]));
    for (name, b) in model.covariate_names.iter().zip(&coefs[1..]) {
        out.push_str(&format!("- {:<20} {b:>12.6}\n", truncate(name, 20)));
    }
    if let Some(a) = model.log_shape() {
        out.push_str(&format!("- {:<20} {a:>12.6} (shape={:.6})\n", "log(shape)", a.exp()));
    }
    out
}

/// Format the highest/lowest value tables.
pub fn format_rankings(rankings: &Rankings) -> String {
    let mut out = String::new();

    out.push_str("Highest CLV at horizon:\n");
    out.push_str(&format_table(&rankings.highest));
    out.push('\n');

    out.push_str("Lowest CLV at horizon:\n");
    out.push_str(&format_table(&rankings.lowest));

    out
}

fn format_table(rows: &[CustomerValue]) -> String {
    let mut out = String::new();
    out.push_str(&format!("{:<24} {:>7} {:>10} {:>14}\n", "customer_id", "period", "churn", "CLV"));
    out.push_str(&format!("{:-<24} {:-<7} {:-<10} {:-<14}\n", "", "", "", ""));
    for r in rows {
        out.push_str(&format!(
            "{:<24} {:>7} {:>10.5} {:>14.2}\n",
            truncate(&r.customer_id, 24),
            r.period,
            r.churn_rate,
            r.clv
        ));
    }
    out
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Family;

    fn model() -> FittedModel {
        FittedModel {
            family: Family::Exponential,
            covariate_names: vec!["monthly_charges".to_string()],
            params: vec![2.7, -0.01],
            log_likelihood: -50.0,
            aic: 104.0,
            n_obs: 40,
            n_events: 12,
        }
    }

    #[test]
    fn scores_mark_chosen_and_list_failures() {
        let scores = vec![
            CandidateScore {
                family: Family::Weibull,
                param_count: 3,
                log_likelihood: None,
                aic: f64::INFINITY,
                status: CandidateStatus::Failed("line search failed".to_string()),
            },
            CandidateScore {
                family: Family::Exponential,
                param_count: 2,
                log_likelihood: Some(-50.0),
                aic: 104.0,
                status: CandidateStatus::Converged,
            },
        ];
        let text = format_scores(&scores, &model());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "  (skipped Weibull) line search failed");
        assert!(lines[2].starts_with("* Exponential"));
        assert!(lines[2].contains("AIC=104.0000"));
    }

    #[test]
    fn model_lists_named_coefficients() {
        let text = format_model(&model());
        assert!(text.contains("monthly_charges"));
        assert!(text.contains("(intercept)"));
        assert!(!text.contains("shape"));
    }

    #[test]
    fn truncate_marks_cut_ids() {
        assert_eq!(truncate("abcdef", 4), "abc.");
        assert_eq!(truncate("abc", 4), "abc");
    }
}
