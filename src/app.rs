//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the real main that:
//! - loads `.env` and sets up logging
//! - parses CLI arguments
//! - runs the requested estimation
//! - prints reports/plots and writes optional exports

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, CommonArgs, GroupsArgs, ReportArgs};
use crate::error::AppResult;
use crate::fit::BootstrapOptions;
use crate::io::{
    JsonDataSource, build_curve_file, write_curve_json, write_group_fit_csv, write_group_spam_csv,
    write_report_csv,
};
use crate::labels::{GroupLabeler, IndexLabels, ZoneTable};
use crate::report::{
    ReportContext, format_combined_report, format_group_fit_report, format_group_spam_report,
};

pub mod pipeline;

use pipeline::GroupsOutput;

/// Entry point for the `calib` binary.
pub fn run() -> AppResult<()> {
    dotenvy::dotenv().ok();
    init_logging();

    let cli = Cli::parse();
    match cli.command {
        Command::Report(args) => handle_report(args),
        Command::Groups(args) => handle_groups(args),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A second init (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_report(args: ReportArgs) -> AppResult<()> {
    let source = data_source(&args.common);
    let opts = bootstrap_options(&args.common);
    let report = pipeline::run_report(&source, &args.tests, &opts)?;

    let ctx = ReportContext {
        machine: &args.common.machine,
        date: &args.common.date,
    };
    println!("{}", format_combined_report(&ctx, &report));

    if let Some(path) = &args.export_csv {
        write_report_csv(path, &report)?;
    }
    Ok(())
}

fn handle_groups(args: GroupsArgs) -> AppResult<()> {
    let source = data_source(&args.common);
    let opts = bootstrap_options(&args.common);
    let zones = if args.no_zones {
        None
    } else {
        ZoneTable::for_machine(&args.common.machine, &args.common.date)
    };
    let labeler: &dyn GroupLabeler = match &zones {
        Some(table) => table,
        None => &IndexLabels,
    };

    match pipeline::run_groups(&source, args.test, labeler, &opts)? {
        GroupsOutput::Fit { report, dataset } => {
            println!("{}", format_group_fit_report(&report));

            if args.plot {
                for ((group, fit), row) in report.fits.iter().zip(&report.rows) {
                    if let Some(table) = dataset.groups.get(group) {
                        println!("[{}]", row.label);
                        println!(
                            "{}",
                            crate::plot::render_survival_plot(
                                table,
                                dataset.shots,
                                fit.model,
                                fit.point,
                                args.width,
                                args.height,
                            )
                        );
                    }
                }
            }
            if let Some(path) = &args.export_csv {
                write_group_fit_csv(path, &report)?;
            }
            if let Some(path) = &args.export_curve {
                write_curve_json(path, &build_curve_file(&report, &dataset)?)?;
            }
        }
        GroupsOutput::Spam(report) => {
            println!("{}", format_group_spam_report(&report));
            if let Some(path) = &args.export_csv {
                write_group_spam_csv(path, &report)?;
            }
        }
    }
    Ok(())
}

fn data_source(common: &CommonArgs) -> JsonDataSource {
    JsonDataSource::new(&common.data_dir, &common.machine, &common.date)
}

fn bootstrap_options(common: &CommonArgs) -> BootstrapOptions {
    BootstrapOptions {
        resamples: common.resamples,
        seed: common.seed,
        ..BootstrapOptions::default()
    }
}
