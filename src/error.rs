use std::path::PathBuf;

use thiserror::Error;

use crate::domain::Family;

/// Every failure the library can surface to a caller.
///
/// The binary maps each variant onto a process exit code via
/// [`AppError::exit_code`].
#[derive(Error, Debug)]
pub enum AppError {
    /// A stage was invoked before the stage it depends on.
    #[error("{stage} requested before {required} has run")]
    Precondition {
        stage: &'static str,
        required: &'static str,
    },

    /// The dataset violates a structural or value invariant.
    #[error("Data error: {0}")]
    Data(String),

    /// One candidate distribution failed to reach a maximum-likelihood fit.
    ///
    /// Model selection recovers from this locally; it only escapes when a
    /// single family is fitted directly.
    #[error("{family} fit did not converge: {reason}")]
    FitConvergence { family: Family, reason: String },

    /// No candidate distribution converged, so no model can be selected.
    #[error("No candidate distribution converged ({attempted} attempted)")]
    SelectionExhausted { attempted: usize },

    /// A configuration value is out of range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AppError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::InvalidInput(_) | AppError::Io { .. } | AppError::Csv(_) | AppError::Json(_) => 2,
            AppError::Data(_) => 3,
            AppError::FitConvergence { .. } | AppError::SelectionExhausted { .. } => 4,
            AppError::Precondition { .. } => 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_group_by_kind() {
        let pre = AppError::Precondition {
            stage: "forecast",
            required: "model selection",
        };
        assert_eq!(pre.exit_code(), 5);
        assert_eq!(AppError::Data("x".into()).exit_code(), 3);
        assert_eq!(AppError::SelectionExhausted { attempted: 4 }.exit_code(), 4);
        assert_eq!(AppError::InvalidInput("x".into()).exit_code(), 2);
    }

    #[test]
    fn precondition_message_names_both_stages() {
        let err = AppError::Precondition {
            stage: "forecast",
            required: "model selection",
        };
        assert_eq!(err.to_string(), "forecast requested before model selection has run");
    }
}
