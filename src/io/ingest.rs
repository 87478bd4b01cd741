//! CSV ingest of the covariate design matrix.
//!
//! The upstream feature step hands us a rectangular CSV:
//! - an id column, a duration column and an event column (names supplied by
//!   the caller)
//! - every other column is an already-numeric covariate
//!
//! Headers are matched case-insensitively after stripping a UTF-8 BOM, so two
//! headers that differ only by case are rejected as duplicates. Bad rows
//! are collected with their line numbers and reported together; a dataset with
//! any bad row is rejected rather than silently shrunk.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{ColumnSpec, DatasetStats, Observation, ObservationSet};
use crate::error::AppError;

/// A row-level error encountered during ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct RowError {
    pub line: usize,
    pub id: Option<String>,
    pub message: String,
}

/// Ingest output: validated observations + stats.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub observations: ObservationSet,
    pub stats: DatasetStats,
    pub rows_read: usize,
}

/// Number of row errors quoted in the failure message.
const MAX_REPORTED_ROW_ERRORS: usize = 5;

/// Load an observation CSV from disk.
pub fn load_observations(path: &Path, columns: &ColumnSpec) -> Result<IngestedData, AppError> {
    let file = File::open(path).map_err(|e| AppError::io(path, e))?;
    let data = read_observations(file, columns)?;
    log::info!(
        "Loaded {} customers ({} churned, {} censored) from {}",
        data.stats.n_customers,
        data.stats.n_events,
        data.stats.n_censored,
        path.display()
    );
    if data.stats.zero_durations_remapped > 0 {
        log::warn!(
            "{} zero duration(s) replaced with {}",
            data.stats.zero_durations_remapped,
            crate::domain::DURATION_EPSILON
        );
    }
    Ok(data)
}

/// Parse observations from any CSV source.
pub fn read_observations<R: Read>(source: R, columns: &ColumnSpec) -> Result<IngestedData, AppError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
    let headers = reader.headers()?.clone();
    let header_map = build_header_map(&headers)?;

    let id_idx = require_column(&header_map, &columns.id)?;
    let duration_idx = require_column(&header_map, &columns.duration)?;
    let event_idx = require_column(&header_map, &columns.event)?;

    let covariate_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(idx, _)| ![id_idx, duration_idx, event_idx].contains(idx))
        .map(|(idx, name)| (idx, clean_header_name(name).to_string()))
        .collect();

    let mut rows = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Line 1 is the header.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    id: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let id = record.get(id_idx).filter(|s| !s.is_empty()).map(str::to_string);
        match parse_row(&record, id_idx, duration_idx, event_idx, &covariate_cols) {
            Ok(row) => rows.push(row),
            Err(message) => row_errors.push(RowError { line, id, message }),
        }
    }

    if !row_errors.is_empty() {
        let detail: Vec<String> = row_errors
            .iter()
            .take(MAX_REPORTED_ROW_ERRORS)
            .map(|e| match &e.id {
                Some(id) => format!("line {} ({id}): {}", e.line, e.message),
                None => format!("line {}: {}", e.line, e.message),
            })
            .collect();
        return Err(AppError::Data(format!(
            "{} of {rows_read} row(s) are invalid; {}",
            row_errors.len(),
            detail.join("; ")
        )));
    }

    let names = covariate_cols.into_iter().map(|(_, name)| name).collect();
    let observations = ObservationSet::new(names, rows)?;
    let stats = observations.stats();

    Ok(IngestedData {
        observations,
        stats,
        rows_read,
    })
}

/// Headers that collide after case folding would make name lookups ambiguous.
fn build_header_map(headers: &StringRecord) -> Result<HashMap<String, usize>, AppError> {
    let mut map = HashMap::with_capacity(headers.len());
    for (idx, name) in headers.iter().enumerate() {
        let key = clean_header_name(name).to_ascii_lowercase();
        if let Some(first) = map.insert(key, idx) {
            return Err(AppError::Data(format!(
                "Duplicate column `{}` (columns {} and {}; names are compared case-insensitively).",
                clean_header_name(name),
                first + 1,
                idx + 1
            )));
        }
    }
    Ok(map)
}

fn clean_header_name(name: &str) -> &str {
    // Spreadsheet exports often prefix the first header with a BOM.
    name.trim().trim_start_matches('\u{feff}')
}

fn require_column(header_map: &HashMap<String, usize>, name: &str) -> Result<usize, AppError> {
    header_map
        .get(&name.trim().to_ascii_lowercase())
        .copied()
        .ok_or_else(|| AppError::Data(format!("Missing required column: `{name}`")))
}

fn parse_row(
    record: &StringRecord,
    id_idx: usize,
    duration_idx: usize,
    event_idx: usize,
    covariate_cols: &[(usize, String)],
) -> Result<Observation, String> {
    let customer_id = get_required(record, id_idx, "id")?.to_string();
    let duration = parse_f64(get_required(record, duration_idx, "duration")?)
        .ok_or_else(|| "Invalid duration (expected a finite number).".to_string())?;
    let event = parse_event(get_required(record, event_idx, "event")?)?;

    let covariates = covariate_cols
        .iter()
        .map(|(idx, name)| {
            let raw = get_required(record, *idx, name)?;
            parse_f64(raw).ok_or_else(|| format!("Covariate `{name}` is not numeric: '{raw}'."))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Observation {
        customer_id,
        duration,
        event,
        covariates,
    })
}

fn get_required<'a>(record: &'a StringRecord, idx: usize, name: &str) -> Result<&'a str, String> {
    record
        .get(idx)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn parse_f64(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Accepts `1/0`, `true/false`, `yes/no` (any case) and numeric `1.0/0.0`.
fn parse_event(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        other => match other.parse::<f64>() {
            Ok(v) if v == 1.0 => Ok(true),
            Ok(v) if v == 0.0 => Ok(false),
            _ => Err(format!("Invalid event value '{s}' (expected 0/1).")),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DURATION_EPSILON;

    fn columns() -> ColumnSpec {
        ColumnSpec {
            id: "customer_id".to_string(),
            duration: "tenure".to_string(),
            event: "churn".to_string(),
        }
    }

    #[test]
    fn reads_covariates_in_header_order() {
        let csv = "customer_id,tenure,monthly_charges,churn,contract_two_year\n\
                   a,5,70.5,1,0\n\
                   b,10,20.0,0,1\n";
        let data = read_observations(csv.as_bytes(), &columns()).unwrap();
        let obs = &data.observations;
        assert_eq!(obs.covariate_names(), ["monthly_charges", "contract_two_year"]);
        assert_eq!(obs.rows()[0].covariates, vec![70.5, 0.0]);
        assert!(obs.rows()[0].event);
        assert!(!obs.rows()[1].event);
        assert_eq!(data.rows_read, 2);
    }

    #[test]
    fn headers_are_case_insensitive_and_bom_stripped() {
        let csv = "\u{feff}Customer_ID,TENURE,Churn\nx,3,yes\ny,0,no\n";
        let data = read_observations(csv.as_bytes(), &columns()).unwrap();
        assert_eq!(data.stats.n_customers, 2);
        assert_eq!(data.stats.n_events, 1);
        assert_eq!(data.stats.zero_durations_remapped, 1);
        assert_eq!(data.observations.rows()[1].duration, DURATION_EPSILON);
    }

    #[test]
    fn covariate_headers_differing_only_by_case_are_rejected() {
        let csv = "customer_id,tenure,churn,Score,score\na,5,1,0,10\n";
        let err = read_observations(csv.as_bytes(), &columns()).unwrap_err();
        assert!(matches!(err, AppError::Data(ref m) if m.contains("Duplicate column `score`")), "{err}");
    }

    #[test]
    fn repeated_key_column_is_rejected() {
        let csv = "customer_id,tenure,TENURE,churn\na,5,9,1\n";
        let err = read_observations(csv.as_bytes(), &columns()).unwrap_err();
        assert!(matches!(err, AppError::Data(ref m) if m.contains("columns 2 and 3")), "{err}");
    }

    #[test]
    fn missing_required_column_is_a_data_error() {
        let csv = "customer_id,tenure\na,5\n";
        let err = read_observations(csv.as_bytes(), &columns()).unwrap_err();
        assert!(matches!(err, AppError::Data(ref m) if m.contains("churn")));
    }

    #[test]
    fn bad_rows_are_reported_with_line_numbers() {
        let csv = "customer_id,tenure,churn,score\na,5,1,0.3\nb,7,maybe,0.1\nc,2,0,high\n";
        let err = read_observations(csv.as_bytes(), &columns()).unwrap_err();
        let AppError::Data(msg) = err else {
            panic!("expected data error");
        };
        assert!(msg.starts_with("2 of 3"), "{msg}");
        assert!(msg.contains("line 3 (b)"));
        assert!(msg.contains("line 4 (c)"));
    }

    #[test]
    fn event_parsing_accepts_common_spellings() {
        for s in ["1", "TRUE", "Yes", "1.0"] {
            assert_eq!(parse_event(s), Ok(true));
        }
        for s in ["0", "false", "NO", "0.0"] {
            assert_eq!(parse_event(s), Ok(false));
        }
        assert!(parse_event("2").is_err());
    }

    #[test]
    fn negative_duration_is_rejected() {
        let csv = "customer_id,tenure,churn\na,-1,1\n";
        assert!(matches!(read_observations(csv.as_bytes(), &columns()), Err(AppError::Data(_))));
    }
}
