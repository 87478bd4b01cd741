//! The staged churn/CLV pipeline.
//!
//! `Observations -> FittedModel -> ForecastTable -> ValuationTable`
//!
//! Each stage is a pure function of the previous stage's output. `ClvPipeline`
//! holds those outputs for callers that drive the stages one at a time, and
//! refuses to run a stage before the one it depends on.

use crate::domain::{
    CandidateScore, FittedModel, ForecastTable, ObservationSet, RunConfig, ValuationParams, ValuationTable,
};
use crate::error::AppError;
use crate::fit::{fit_and_select, SelectionOptions, SelectionReport};
use crate::io::ingest::{load_observations, IngestedData};

/// Stage-by-stage driver over one observation set.
#[derive(Debug, Clone)]
pub struct ClvPipeline {
    observations: ObservationSet,
    options: SelectionOptions,
    selection: Option<SelectionReport>,
    forecast: Option<ForecastTable>,
    valuation: Option<ValuationTable>,
}

impl ClvPipeline {
    pub fn new(observations: ObservationSet) -> Self {
        Self::with_options(observations, SelectionOptions::default())
    }

    pub fn with_options(observations: ObservationSet, options: SelectionOptions) -> Self {
        Self {
            observations,
            options,
            selection: None,
            forecast: None,
            valuation: None,
        }
    }

    pub fn observations(&self) -> &ObservationSet {
        &self.observations
    }

    pub fn selection(&self) -> Option<&SelectionReport> {
        self.selection.as_ref()
    }

    pub fn forecast(&self) -> Option<&ForecastTable> {
        self.forecast.as_ref()
    }

    pub fn valuation(&self) -> Option<&ValuationTable> {
        self.valuation.as_ref()
    }

    /// Fit every candidate and retain the best one.
    ///
    /// Any forecast or valuation from an earlier selection is discarded.
    pub fn select_best_model(&mut self) -> Result<&SelectionReport, AppError> {
        self.forecast = None;
        self.valuation = None;
        self.selection = None;
        let report = fit_and_select(&self.observations, &self.options)?;
        Ok(self.selection.insert(report))
    }

    /// Forecast churn for periods `1..=horizon` with the selected model.
    pub fn fit_and_predict(&mut self, horizon: u32) -> Result<&ForecastTable, AppError> {
        let Some(report) = &self.selection else {
            return Err(AppError::Precondition {
                stage: "forecast",
                required: "model selection",
            });
        };
        let table = crate::forecast::forecast(&report.selected, &self.observations, horizon)?;
        self.valuation = None;
        Ok(self.forecast.insert(table))
    }

    /// Value the current forecast.
    pub fn calculate_clv(&mut self, params: ValuationParams) -> Result<&ValuationTable, AppError> {
        let Some(forecast) = &self.forecast else {
            return Err(AppError::Precondition {
                stage: "valuation",
                required: "forecast",
            });
        };
        let table = crate::valuation::value(forecast, params)?;
        Ok(self.valuation.insert(table))
    }
}

/// All computed outputs of a single `clv fit` / `clv forecast` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub ingest: IngestedData,
    pub model: FittedModel,
    /// Candidate ledger; empty when the model was loaded from a file.
    pub scores: Vec<CandidateScore>,
    pub forecast: ForecastTable,
    pub valuation: ValuationTable,
}

/// Selection options implied by a run configuration.
pub fn selection_options(config: &RunConfig) -> SelectionOptions {
    SelectionOptions {
        families: config.family_spec.families(),
        parallel: config.parallel,
        ..SelectionOptions::default()
    }
}

/// Ingest and select only.
pub fn run_select(config: &RunConfig) -> Result<(IngestedData, SelectionReport), AppError> {
    let ingest = load_observations(&config.data_path, &config.columns)?;
    let report = fit_and_select(&ingest.observations, &selection_options(config))?;
    Ok((ingest, report))
}

/// Ingest -> select -> forecast -> value.
pub fn run_fit(config: &RunConfig) -> Result<RunOutput, AppError> {
    let ingest = load_observations(&config.data_path, &config.columns)?;

    let mut pipeline = ClvPipeline::with_options(ingest.observations.clone(), selection_options(config));
    pipeline.select_best_model()?;
    pipeline.fit_and_predict(config.periods)?;
    pipeline.calculate_clv(config.valuation)?;

    let ClvPipeline {
        selection: Some(report),
        forecast: Some(forecast),
        valuation: Some(valuation),
        ..
    } = pipeline
    else {
        return Err(AppError::Precondition {
            stage: "report",
            required: "valuation",
        });
    };

    Ok(RunOutput {
        ingest,
        model: report.selected,
        scores: report.scores,
        forecast,
        valuation,
    })
}

/// Ingest -> forecast -> value with a previously exported model.
pub fn run_forecast_with_model(config: &RunConfig, model: FittedModel) -> Result<RunOutput, AppError> {
    let ingest = load_observations(&config.data_path, &config.columns)?;
    let forecast = crate::forecast::forecast(&model, &ingest.observations, config.periods)?;
    let valuation = crate::valuation::value(&forecast, config.valuation)?;
    Ok(RunOutput {
        ingest,
        model,
        scores: Vec::new(),
        forecast,
        valuation,
    })
}
