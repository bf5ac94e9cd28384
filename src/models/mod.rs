//! Decay model implementations.
//!
//! Models are implemented as small, pure functions so that fitting and
//! resampling code can stay generic over the model case.

pub mod model;

pub use model::*;
