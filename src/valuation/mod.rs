//! Valuation engine: discounted customer lifetime value from a churn forecast.
//!
//! Steps:
//! 1. pivot the long `(customer, period, churn_rate)` table into a wide
//!    customer × period matrix
//! 2. survival `S = 1 - churn_rate` elementwise
//! 3. for every prefix length `i`:
//!
//! ```text
//! CLV_i = MM · Σ_{k=1..i} S_k / (1 + r/12)^(k-1)
//! ```
//!
//! 4. melt back to long form and left-join onto the forecast records.
//!
//! Step 3 is evaluated as a running sum, which yields exactly the prefix-sum
//! definition: `CLV_i = CLV_{i-1} + MM·S_i/(1 + r/12)^(i-1)`.

use std::collections::HashMap;

use nalgebra::DMatrix;

use crate::domain::{ForecastRecord, ForecastTable, ValuationParams, ValuationRecord, ValuationTable};
use crate::error::AppError;

/// Wide customer × period view of a long table.
///
/// Rows and columns are sorted. Cells with no matching long record hold NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct ChurnMatrix {
    pub customers: Vec<String>,
    pub periods: Vec<u32>,
    pub values: DMatrix<f64>,
}

impl ChurnMatrix {
    /// Pivot long records into the wide form. Duplicate keys are rejected.
    pub fn from_long(records: &[ForecastRecord]) -> Result<Self, AppError> {
        let mut customers: Vec<String> = records.iter().map(|r| r.customer_id.clone()).collect();
        customers.sort();
        customers.dedup();
        let mut periods: Vec<u32> = records.iter().map(|r| r.pred_period).collect();
        periods.sort_unstable();
        periods.dedup();

        let row_of: HashMap<&str, usize> = customers.iter().enumerate().map(|(i, c)| (c.as_str(), i)).collect();
        let col_of: HashMap<u32, usize> = periods.iter().enumerate().map(|(j, &p)| (p, j)).collect();

        let mut values = DMatrix::from_element(customers.len(), periods.len(), f64::NAN);
        for r in records {
            let (i, j) = (row_of[r.customer_id.as_str()], col_of[&r.pred_period]);
            if !values[(i, j)].is_nan() {
                return Err(AppError::Data(format!(
                    "Duplicate forecast record for customer `{}` period {}.",
                    r.customer_id, r.pred_period
                )));
            }
            values[(i, j)] = r.churn_rate;
        }

        Ok(Self {
            customers,
            periods,
            values,
        })
    }

    /// Melt back to `(customer, period, value)` triples, skipping empty cells.
    pub fn to_long(&self) -> Vec<(String, u32, f64)> {
        let mut out = Vec::with_capacity(self.values.len());
        for (i, customer) in self.customers.iter().enumerate() {
            for (j, &period) in self.periods.iter().enumerate() {
                let v = self.values[(i, j)];
                if !v.is_nan() {
                    out.push((customer.clone(), period, v));
                }
            }
        }
        out
    }

    /// Elementwise `1 - value`; empty cells stay empty.
    pub fn survival(&self) -> Self {
        Self {
            customers: self.customers.clone(),
            periods: self.periods.clone(),
            values: self.values.map(|c| 1.0 - c),
        }
    }
}

fn validate(params: &ValuationParams) -> Result<(), AppError> {
    if !params.margin.is_finite() {
        return Err(AppError::InvalidInput("Margin must be a finite number.".to_string()));
    }
    if !params.annual_rate.is_finite() || params.annual_rate <= -12.0 {
        return Err(AppError::InvalidInput(
            "Annual rate must be finite and greater than -12 (so that 1 + r/12 > 0).".to_string(),
        ));
    }
    Ok(())
}

/// Discounted cumulative value for every cell of a survival matrix.
///
/// Column `k` (0-based) is discounted by `(1 + r/12)^k`. Empty cells add
/// nothing to the running sum and stay empty in the output.
pub fn cumulative_value(surv: &ChurnMatrix, params: &ValuationParams) -> DMatrix<f64> {
    let per_period = 1.0 + params.annual_rate / 12.0;
    let discounts: Vec<f64> = (0..surv.periods.len()).map(|k| per_period.powi(k as i32)).collect();

    let mut clv = DMatrix::from_element(surv.values.nrows(), surv.values.ncols(), f64::NAN);
    for i in 0..surv.values.nrows() {
        let mut running = 0.0;
        for (k, discount) in discounts.iter().enumerate() {
            let s = surv.values[(i, k)];
            if s.is_nan() {
                continue;
            }
            running += s / discount;
            clv[(i, k)] = params.margin * running;
        }
    }
    clv
}

/// Attach a CLV value to every forecast record.
pub fn value(forecast: &ForecastTable, params: ValuationParams) -> Result<ValuationTable, AppError> {
    validate(&params)?;

    let wide = ChurnMatrix::from_long(&forecast.records)?;
    let clv = cumulative_value(&wide.survival(), &params);
    let clv_wide = ChurnMatrix {
        customers: wide.customers,
        periods: wide.periods,
        values: clv,
    };

    let lookup: HashMap<(String, u32), f64> = clv_wide
        .to_long()
        .into_iter()
        .map(|(customer, period, v)| ((customer, period), v))
        .collect();

    let records: Vec<ValuationRecord> = forecast
        .records
        .iter()
        .map(|r| ValuationRecord {
            customer_id: r.customer_id.clone(),
            pred_period: r.pred_period,
            churn_rate: r.churn_rate,
            clv: lookup.get(&(r.customer_id.clone(), r.pred_period)).copied(),
        })
        .collect();

    let unmatched = records.iter().filter(|r| r.clv.is_none()).count();
    if unmatched > 0 {
        log::warn!("{unmatched} forecast record(s) have no CLV match");
    }
    log::info!(
        "Valued {} records (margin {}, annual rate {})",
        records.len(),
        params.margin,
        params.annual_rate
    );

    Ok(ValuationTable { params, records })
}
