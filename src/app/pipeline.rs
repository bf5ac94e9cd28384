//! Shared run logic behind the `calib` subcommands.
//!
//! Loading, model selection, fitting and aggregation happen here; `app` only
//! prints and writes exports.

use std::collections::BTreeMap;

use tracing::info;

use crate::aggregate::{
    DataSource, GroupFitReport, GroupSpamReport, combined_report, group_fit_report, group_spam_report,
};
use crate::domain::{Dataset, ExperimentData, ExperimentKind, MetricEstimate, SurvivalTable};
use crate::error::AppResult;
use crate::fit::BootstrapOptions;
use crate::labels::GroupLabeler;

/// Outputs of `calib groups`.
#[derive(Debug, Clone)]
pub enum GroupsOutput {
    Fit {
        report: GroupFitReport,
        /// The per-group tables the fits were run on.
        dataset: Dataset<SurvivalTable>,
    },
    Spam(GroupSpamReport),
}

pub fn run_report(
    source: &dyn DataSource,
    kinds: &[ExperimentKind],
    opts: &BootstrapOptions,
) -> AppResult<BTreeMap<String, MetricEstimate>> {
    info!(kinds = kinds.len(), resamples = opts.resamples, "running combined report");
    combined_report(source, kinds, opts)
}

pub fn run_groups(
    source: &dyn DataSource,
    kind: ExperimentKind,
    labeler: &dyn GroupLabeler,
    opts: &BootstrapOptions,
) -> AppResult<GroupsOutput> {
    info!(kind = %kind, resamples = opts.resamples, "running per-group report");
    match source.load(kind)? {
        ExperimentData::Rb(data) => {
            let report = group_fit_report(&data.standard, kind, labeler, opts)?;
            Ok(GroupsOutput::Fit {
                report,
                dataset: data.standard,
            })
        }
        ExperimentData::Decay(dataset) => {
            let report = group_fit_report(&dataset, kind, labeler, opts)?;
            Ok(GroupsOutput::Fit { report, dataset })
        }
        ExperimentData::Spam(dataset) => Ok(GroupsOutput::Spam(group_spam_report(&dataset, labeler)?)),
    }
}
