//! Fitting and resampling.
//!
//! Responsibilities:
//!
//! - fit one decay model to survival frequencies (`fitter`)
//! - turn raw shot counts into confidence bounds by refitting resampled data
//!   (`bootstrap`)

pub mod bootstrap;
pub mod fitter;

pub use bootstrap::*;
pub use fitter::*;
