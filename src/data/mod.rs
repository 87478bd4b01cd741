//! Data sources: synthetic churn samples with known generating parameters.

pub mod sample;

pub use sample::*;
