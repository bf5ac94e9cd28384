//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - qubit groups and experiment/variant tags (`QubitGroup`, `ExperimentKind`, `Variant`)
//! - immutable input tables (`SurvivalTable`, `SpamCounts`, `Dataset`, `ExperimentData`)
//! - fit outputs (`MetricPair`, `Interval`, `MetricEstimate`)

pub mod types;

pub use types::*;
