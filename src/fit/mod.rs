//! Distribution fitting orchestration.
//!
//! Responsibilities:
//!
//! - maximum-likelihood fit of one family (`fitter`)
//! - fit every candidate (parallel) and select by AIC (`selection`)

pub mod fitter;
pub mod selection;

pub use fitter::*;
pub use selection::*;
