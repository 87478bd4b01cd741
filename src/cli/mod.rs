//! Command-line parsing for the churn/CLV tool.
//!
//! Argument parsing and command dispatch stay separate from the modelling
//! code; `app` turns these structs into a `RunConfig`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{Family, FamilySpec};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "clv", version, about = "Customer churn survival modelling and lifetime value")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Select a survival model, forecast churn and compute CLV.
    Fit(FitArgs),
    /// Fit the candidate families and print the AIC ranking only.
    Select(SelectArgs),
    /// Forecast churn and CLV with a previously exported model.
    Forecast(ForecastArgs),
    /// Write a synthetic observation CSV drawn from a known family.
    Simulate(SimulateArgs),
}

/// Where the observation CSV lives and how its key columns are named.
#[derive(Debug, Args, Clone)]
pub struct DataArgs {
    /// Observation CSV (one row per customer).
    #[arg(value_name = "CSV")]
    pub data: PathBuf,

    /// Customer id column.
    #[arg(long, default_value = "customer_id")]
    pub id_col: String,

    /// Duration (tenure) column.
    #[arg(long, default_value = "tenure")]
    pub duration_col: String,

    /// Event (churn observed) column.
    #[arg(long, default_value = "churn")]
    pub event_col: String,
}

/// Forecast horizon and discounting.
#[derive(Debug, Args, Clone)]
pub struct ValuationArgs {
    /// Number of periods to forecast.
    #[arg(short = 'p', long)]
    pub periods: u32,

    /// Monetary margin per retained period.
    #[arg(long, env = "CLV_MARGIN", default_value_t = 1300.0)]
    pub margin: f64,

    /// Annual discount rate (applied as rate/12 per period).
    #[arg(long, env = "CLV_RATE", default_value_t = 0.10)]
    pub rate: f64,
}

/// Candidate families and execution mode.
#[derive(Debug, Args, Clone)]
pub struct SelectionArgs {
    /// Which family (or `auto` for the whole catalog).
    #[arg(long, value_enum, default_value_t = FamilySpec::Auto)]
    pub family: FamilySpec,

    /// Fit candidates one after another instead of in parallel.
    #[arg(long)]
    pub sequential: bool,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub valuation: ValuationArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,

    /// Show the top-N highest and lowest value customers.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export the result table (`customer_id,pred_period,churn_rate,CLV`) to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export the selected model to JSON.
    #[arg(long = "export-model")]
    pub export_model: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SelectArgs {
    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub selection: SelectionArgs,
}

#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    /// Model JSON produced by `clv fit --export-model`.
    #[arg(long, value_name = "JSON")]
    pub model: PathBuf,

    #[command(flatten)]
    pub data: DataArgs,

    #[command(flatten)]
    pub valuation: ValuationArgs,

    /// Show the top-N highest and lowest value customers.
    #[arg(long, default_value_t = 10)]
    pub top: usize,

    /// Export the result table to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Output CSV path.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Number of customers to generate.
    #[arg(short = 'n', long, default_value_t = 500)]
    pub customers: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Generating family.
    #[arg(long, value_enum, default_value_t = Family::Weibull)]
    pub family: Family,

    /// Shape parameter (ignored for exponential).
    #[arg(long, default_value_t = 1.5)]
    pub shape: f64,

    /// Observation window; later churn is censored.
    #[arg(long, default_value_t = 36.0)]
    pub censor_at: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_requires_periods() {
        assert!(Cli::try_parse_from(["clv", "fit", "data.csv"]).is_err());
    }

    #[test]
    fn fit_parses_flags() {
        let cli = Cli::try_parse_from([
            "clv",
            "fit",
            "data.csv",
            "--periods",
            "12",
            "--margin",
            "900",
            "--family",
            "lognormal",
            "--sequential",
            "--export-model",
            "m.json",
        ])
        .unwrap();
        let Command::Fit(args) = cli.command else {
            panic!("expected fit");
        };
        assert_eq!(args.valuation.periods, 12);
        assert_eq!(args.valuation.margin, 900.0);
        assert_eq!(args.selection.family, FamilySpec::LogNormal);
        assert!(args.selection.sequential);
        assert_eq!(args.data.id_col, "customer_id");
        assert_eq!(args.export_model, Some(PathBuf::from("m.json")));
    }

    #[test]
    fn simulate_accepts_family_names() {
        let cli = Cli::try_parse_from(["clv", "simulate", "-o", "s.csv", "--family", "loglogistic"]).unwrap();
        let Command::Simulate(args) = cli.command else {
            panic!("expected simulate");
        };
        assert_eq!(args.family, Family::LogLogistic);
        assert_eq!(args.customers, 500);
    }
}
