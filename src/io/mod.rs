//! Input/output helpers.
//!
//! - observation CSV ingest + validation (`ingest`)
//! - result and observation CSV exports (`export`)
//! - model JSON read/write (`model`)

pub mod export;
pub mod ingest;
pub mod model;

pub use export::*;
pub use ingest::*;
pub use model::*;
