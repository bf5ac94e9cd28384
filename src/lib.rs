//! `calib-curves` library crate.
//!
//! The binary (`calib`) is a thin wrapper around this library so that:
//!
//! - the estimation engine is testable without spawning processes
//! - data sources and label lookups can be swapped by other callers
//!
//! Engine: `models` → `fit` → `aggregate`. Everything else (`io`, `labels`,
//! `report`, `plot`, `cli`, `app`) is glue around it.

pub mod aggregate;
pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod labels;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
