//! Mathematical utilities: bounded nonlinear least squares and sample
//! statistics.

pub mod lm;
pub mod stats;

pub use lm::*;
pub use stats::*;
