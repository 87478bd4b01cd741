//! Read/write model JSON files.
//!
//! A model file carries the selected family, its raw-scale parameters and the
//! covariate names they apply to, so a later `clv forecast` run can score a
//! different customer file without refitting.

use std::fs::File;
use std::path::Path;

use chrono::Utc;

use crate::domain::{FittedModel, ModelFile};
use crate::error::AppError;

/// Value of the `tool` field in files this crate writes.
pub const TOOL_NAME: &str = "clv";

/// Write a model JSON file.
pub fn write_model_json(path: &Path, model: &FittedModel) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let doc = ModelFile {
        tool: TOOL_NAME.to_string(),
        created: Utc::now(),
        model: model.clone(),
    };
    serde_json::to_writer_pretty(file, &doc)?;
    log::info!("Wrote {} model to {}", model.family, path.display());
    Ok(())
}

/// Read a model JSON file and check it is usable for forecasting.
pub fn read_model_json(path: &Path) -> Result<ModelFile, AppError> {
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;
    let doc: ModelFile = serde_json::from_reader(file)?;

    let m = &doc.model;
    let expected = m.family.param_count(m.covariate_names.len());
    if m.params.len() != expected {
        return Err(AppError::InvalidInput(format!(
            "Model file '{}' has {} parameters; a {} model over {} covariate(s) needs {expected}.",
            path.display(),
            m.params.len(),
            m.family,
            m.covariate_names.len()
        )));
    }
    if m.params.iter().any(|p| !p.is_finite()) {
        return Err(AppError::InvalidInput(format!(
            "Model file '{}' contains non-finite parameters.",
            path.display()
        )));
    }
    Ok(doc)
}
