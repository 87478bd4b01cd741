//! Mathematical utilities: special functions and the likelihood optimizer.

pub mod optim;
pub mod special;

pub use optim::*;
pub use special::*;
