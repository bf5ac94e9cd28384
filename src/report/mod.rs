//! Plain-text report tables.
//!
//! Scientific formatting lives here only; the aggregation layer hands over raw
//! `(value, uncertainty)` pairs.

pub mod format;

pub use format::*;
