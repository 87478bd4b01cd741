//! Top-level application orchestration.
//!
//! `src/main.rs` only sets up logging; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - runs selection, forecasting and valuation
//! - prints reports
//! - writes optional exports

use clap::Parser;

use crate::cli::{Command, DataArgs, FitArgs, ForecastArgs, SelectArgs, SimulateArgs, ValuationArgs};
use crate::domain::{ColumnSpec, FamilySpec, RunConfig, ValuationParams};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `clv` binary.
pub fn run() -> Result<(), AppError> {
    // Environment overrides (`CLV_MARGIN`, `CLV_RATE`) may come from a local `.env`.
    if let Ok(path) = dotenvy::dotenv() {
        log::debug!("Loaded environment from {}", path.display());
    }
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Select(args) => handle_select(args),
        Command::Forecast(args) => handle_forecast(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = run_config_from_fit_args(&args);
    let run = pipeline::run_fit(&config)?;
    print_run(&run, &config);

    if let Some(path) = &config.export_results {
        crate::io::export::write_results_csv(path, &run.valuation)?;
    }
    if let Some(path) = &config.export_model {
        crate::io::model::write_model_json(path, &run.model)?;
    }
    Ok(())
}

fn handle_select(args: SelectArgs) -> Result<(), AppError> {
    let config = RunConfig {
        family_spec: args.selection.family,
        parallel: !args.selection.sequential,
        ..base_config(&args.data, None)
    };
    let (ingest, report) = pipeline::run_select(&config)?;
    print!("{}", crate::report::format_dataset(&ingest.stats));
    println!();
    print!("{}", crate::report::format_scores(&report.scores, &report.selected));
    println!();
    print!("{}", crate::report::format_model(&report.selected));
    Ok(())
}

fn handle_forecast(args: ForecastArgs) -> Result<(), AppError> {
    let doc = crate::io::model::read_model_json(&args.model)?;
    log::info!(
        "Using {} model written by {} at {}",
        doc.model.family,
        doc.tool,
        doc.created.to_rfc3339()
    );
    let config = RunConfig {
        top_n: args.top,
        export_results: args.export.clone(),
        ..base_config(&args.data, Some(&args.valuation))
    };
    let run = pipeline::run_forecast_with_model(&config, doc.model)?;
    print_run(&run, &config);

    if let Some(path) = &config.export_results {
        crate::io::export::write_results_csv(path, &run.valuation)?;
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    if !(args.shape.is_finite() && args.shape > 0.0) {
        return Err(AppError::InvalidInput("Shape must be finite and > 0.".to_string()));
    }
    let config = crate::data::SampleConfig {
        customers: args.customers,
        seed: args.seed,
        family: args.family,
        log_shape: args.shape.ln(),
        censor_at: args.censor_at,
        ..crate::data::SampleConfig::default()
    };
    let obs = crate::data::generate_sample(&config)?;
    crate::io::export::write_observations_csv(&args.output, &obs)?;
    print!("{}", crate::report::format_dataset(&obs.stats()));
    Ok(())
}

fn print_run(run: &pipeline::RunOutput, config: &RunConfig) {
    println!(
        "{}",
        crate::report::format_run_summary(&run.ingest.stats, &run.model, &run.scores, &config.valuation, config.periods)
    );
    let rankings = crate::report::rank_by_clv(&run.valuation, config.top_n);
    println!("{}", crate::report::format_rankings(&rankings));
}

pub fn run_config_from_fit_args(args: &FitArgs) -> RunConfig {
    RunConfig {
        family_spec: args.selection.family,
        parallel: !args.selection.sequential,
        top_n: args.top,
        export_results: args.export.clone(),
        export_model: args.export_model.clone(),
        ..base_config(&args.data, Some(&args.valuation))
    }
}

fn base_config(data: &DataArgs, valuation: Option<&ValuationArgs>) -> RunConfig {
    RunConfig {
        data_path: data.data.clone(),
        columns: ColumnSpec {
            id: data.id_col.clone(),
            duration: data.duration_col.clone(),
            event: data.event_col.clone(),
        },
        family_spec: FamilySpec::Auto,
        parallel: true,
        periods: valuation.map_or(0, |v| v.periods),
        valuation: valuation.map_or_else(ValuationParams::default, |v| ValuationParams {
            margin: v.margin,
            annual_rate: v.rate,
        }),
        top_n: 10,
        export_results: None,
        export_model: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;

    #[test]
    fn fit_args_map_onto_run_config() {
        let cli = Cli::try_parse_from([
            "clv", "fit", "in.csv", "-p", "6", "--rate", "0.05", "--margin", "1000", "--top", "3", "--id-col", "id",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        let config = run_config_from_fit_args(&args);
        assert_eq!(config.periods, 6);
        assert_eq!(config.columns.id, "id");
        assert_eq!(config.columns.duration, "tenure");
        assert_eq!(config.top_n, 3);
        assert!(config.parallel);
        assert_eq!(
            config.valuation,
            ValuationParams {
                margin: 1000.0,
                annual_rate: 0.05
            }
        );
    }
}
