//! Reporting utilities: customer value rankings and formatted terminal output.

pub mod format;

pub use format::*;

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::domain::ValuationTable;

/// One customer's position at the end of the horizon.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerValue {
    pub customer_id: String,
    pub period: u32,
    pub churn_rate: f64,
    pub clv: f64,
}

/// Highest/lowest value customers (top-N each side).
#[derive(Debug, Clone, PartialEq)]
pub struct Rankings {
    pub highest: Vec<CustomerValue>,
    pub lowest: Vec<CustomerValue>,
}

/// Each customer's record at their last forecast period.
pub fn final_values(table: &ValuationTable) -> Vec<CustomerValue> {
    let mut last: Vec<CustomerValue> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for r in &table.records {
        let Some(clv) = r.clv else { continue };
        let entry = CustomerValue {
            customer_id: r.customer_id.clone(),
            period: r.pred_period,
            churn_rate: r.churn_rate,
            clv,
        };
        match index.get(&r.customer_id).copied() {
            Some(i) => {
                let slot = &mut last[i];
                if r.pred_period > slot.period {
                    *slot = entry;
                }
            }
            None => {
                index.insert(r.customer_id.clone(), last.len());
                last.push(entry);
            }
        }
    }
    last
}

/// Rank customers by CLV at the final horizon. Ties keep input order.
pub fn rank_by_clv(table: &ValuationTable, top_n: usize) -> Rankings {
    let mut sorted = final_values(table);
    sorted.sort_by(|a, b| b.clv.partial_cmp(&a.clv).unwrap_or(Ordering::Equal));
    let highest = sorted.iter().take(top_n).cloned().collect();

    sorted.sort_by(|a, b| a.clv.partial_cmp(&b.clv).unwrap_or(Ordering::Equal));
    let lowest = sorted.iter().take(top_n).cloned().collect();

    Rankings { highest, lowest }
}
