//! CSV exports.
//!
//! - the per-customer, per-period result table (`customer_id,pred_period,churn_rate,CLV`)
//! - observation sets, so synthetic samples can be fed back through `clv fit`

use std::fs::File;
use std::path::Path;

use crate::domain::{ObservationSet, ValuationTable};
use crate::error::AppError;

/// Write the valued forecast table to a CSV file.
pub fn write_results_csv(path: &Path, table: &ValuationTable) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(file);
    for record in &table.records {
        writer.serialize(record)?;
    }
    writer.flush().map_err(|e| AppError::io(path, e))?;
    log::info!("Wrote {} result rows to {}", table.records.len(), path.display());
    Ok(())
}

/// Write an observation set as `customer_id,duration,event,<covariates...>`.
///
/// Numbers use the shortest representation that parses back to the same `f64`.
pub fn write_observations_csv(path: &Path, obs: &ObservationSet) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| AppError::io(path, e))?;
    let mut writer = csv::Writer::from_writer(file);

    let mut header = vec!["customer_id".to_string(), "duration".to_string(), "event".to_string()];
    header.extend(obs.covariate_names().iter().cloned());
    writer.write_record(&header)?;

    for r in obs.rows() {
        let mut fields = vec![
            r.customer_id.clone(),
            r.duration.to_string(),
            if r.event { "1" } else { "0" }.to_string(),
        ];
        fields.extend(r.covariates.iter().map(f64::to_string));
        writer.write_record(&fields)?;
    }
    writer.flush().map_err(|e| AppError::io(path, e))?;
    log::info!("Wrote {} observations to {}", obs.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ColumnSpec, Observation, ValuationParams, ValuationRecord};

    #[test]
    fn results_csv_has_expected_header_and_null_clv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let table = ValuationTable {
            params: ValuationParams::default(),
            records: vec![
                ValuationRecord {
                    customer_id: "a".to_string(),
                    pred_period: 1,
                    churn_rate: 0.1,
                    clv: Some(1170.0),
                },
                ValuationRecord {
                    customer_id: "b".to_string(),
                    pred_period: 1,
                    churn_rate: 0.2,
                    clv: None,
                },
            ],
        };
        write_results_csv(&path, &table).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["customer_id,pred_period,churn_rate,CLV", "a,1,0.1,1170.0", "b,1,0.2,"]);
    }

    #[test]
    fn observations_csv_lists_covariates_after_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.csv");
        let obs = ObservationSet::new(
            vec!["usage_z".to_string()],
            vec![Observation {
                customer_id: "C00001".to_string(),
                duration: 4.5,
                event: true,
                covariates: vec![-0.25],
            }],
        )
        .unwrap();
        write_observations_csv(&path, &obs).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "customer_id,duration,event,usage_z\nC00001,4.5,1,-0.25\n");
    }

    #[test]
    fn observations_survive_a_write_and_reload_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("obs.csv");
        let obs = ObservationSet::new(
            vec!["usage_z".to_string(), "spend".to_string()],
            vec![
                Observation {
                    customer_id: "a".to_string(),
                    duration: 1e-7,
                    event: false,
                    covariates: vec![0.1234567891234, -3.0e-9],
                },
                Observation {
                    customer_id: "b".to_string(),
                    duration: 2.0 / 3.0,
                    event: true,
                    covariates: vec![1.0 / 7.0, 12345.678901234],
                },
            ],
        )
        .unwrap();
        write_observations_csv(&path, &obs).unwrap();

        let columns = ColumnSpec {
            id: "customer_id".to_string(),
            duration: "duration".to_string(),
            event: "event".to_string(),
        };
        let reloaded = crate::io::ingest::load_observations(&path, &columns).unwrap();
        assert_eq!(reloaded.observations.covariate_names(), obs.covariate_names());
        assert_eq!(reloaded.observations.rows(), obs.rows());
    }
}
