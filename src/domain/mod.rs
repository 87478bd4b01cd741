//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - the distribution catalog enums (`Family`, `FamilySpec`)
//! - validated observations (`Observation`, `ObservationSet`)
//! - stage outputs (`FittedModel`, `ForecastTable`, `ValuationTable`)

pub mod types;

pub use types::*;
