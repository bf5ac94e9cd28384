//! Command-line parsing for the calibration error estimator.
//!
//! Argument parsing and command dispatch stay separate from the fitting code;
//! `app` turns these structs into engine options.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::ExperimentKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "calib", version, about = "Error rates from RB, crosstalk and SPAM calibration data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Device-wide error report, fitted on counts pooled across qubit groups.
    Report(ReportArgs),
    /// Per-group fits for one experiment, with a `Mean` row.
    Groups(GroupsArgs),
}

/// Dataset location and resampling options shared by every command.
#[derive(Debug, Args, Clone)]
pub struct CommonArgs {
    /// Root folder holding `<machine>/<date>/<TAG>.json` files.
    #[arg(long, env = "CALIB_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Machine name, e.g. H1-1.
    #[arg(short = 'm', long, env = "CALIB_MACHINE")]
    pub machine: String,

    /// Dataset date folder, e.g. 2024_01_31.
    #[arg(short = 'd', long, env = "CALIB_DATE")]
    pub date: String,

    /// Bootstrap resamples per fit.
    #[arg(long, default_value_t = 1000)]
    pub resamples: usize,

    /// Master seed for the bootstrap; omit for a non-reproducible run.
    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Debug, Args, Clone)]
pub struct ReportArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Experiments to include (comma separated).
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values_t = ExperimentKind::ALL
    )]
    pub tests: Vec<ExperimentKind>,

    /// Write the report to CSV (`metric,value,uncertainty`).
    #[arg(long = "export-csv", value_name = "CSV")]
    pub export_csv: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct GroupsArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Experiment to break down by qubit group.
    #[arg(long, value_enum)]
    pub test: ExperimentKind,

    /// Keep qubit-index labels instead of zone names.
    #[arg(long)]
    pub no_zones: bool,

    /// Render an ASCII survival plot per group.
    #[arg(long)]
    pub plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 72)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 18)]
    pub height: usize,

    /// Write the per-group table to CSV.
    #[arg(long = "export-csv", value_name = "CSV")]
    pub export_csv: Option<PathBuf>,

    /// Write fitted curves (metrics + sampled grid) to JSON.
    #[arg(long = "export-curve", value_name = "JSON")]
    pub export_curve: Option<PathBuf>,
}
