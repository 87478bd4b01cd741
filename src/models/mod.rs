//! The distribution catalog.
//!
//! Families are implemented as small unit types behind the
//! `SurvivalDistribution` trait so that fitting/selection code can stay generic.

pub mod model;

pub use model::*;
