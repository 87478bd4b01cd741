//! `clv-survival` library crate.
//!
//! The binary (`clv`) is a thin wrapper around this library so that:
//!
//! - the statistical core is testable without spawning processes
//! - the pipeline stages can be driven one at a time (`app::pipeline::ClvPipeline`)
//! - the CLI, reporting and IO stay out of the fitting code

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod forecast;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
pub mod valuation;
