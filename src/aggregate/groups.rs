//! Per-group reports with a trailing `Mean` row.

use tracing::debug;

use crate::aggregate::combined::{FitEstimate, SpamSummary, estimate, spam_errors};
use crate::domain::{Dataset, ExperimentKind, MetricEstimate, QubitGroup, SpamCounts, SurvivalTable, Variant};
use crate::error::{AppError, AppResult};
use crate::fit::BootstrapOptions;
use crate::labels::{GroupLabeler, relabel};
use crate::math::{mean, mean_uncertainty};
use crate::models::DecayModel;

pub const MEAN_LABEL: &str = "Mean";

/// One group's fitted numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFitRow {
    pub label: String,
    /// `1 − F`.
    pub infidelity: MetricEstimate,
    /// `1 − intercept` for RB, the fitted intercept for crosstalk.
    pub intercept: MetricEstimate,
}

#[derive(Debug, Clone)]
pub struct GroupFitReport {
    pub kind: ExperimentKind,
    pub rows: Vec<GroupFitRow>,
    pub mean: GroupFitRow,
    /// Fits in row order, for plotting and curve export.
    pub fits: Vec<(QubitGroup, FitEstimate)>,
}

/// Fit and bootstrap every group separately.
pub fn group_fit_report(
    dataset: &Dataset<SurvivalTable>,
    kind: ExperimentKind,
    labeler: &dyn GroupLabeler,
    opts: &BootstrapOptions,
) -> AppResult<GroupFitReport> {
    let qubits = dataset.qubit_count()?;
    let model = DecayModel::for_experiment(kind, Variant::Standard, qubits)?;
    let labels = relabel(labeler, dataset.groups.keys());

    let mut rows = Vec::with_capacity(dataset.groups.len());
    let mut fits = Vec::with_capacity(dataset.groups.len());
    for ((group, table), label) in dataset.groups.iter().zip(labels) {
        debug!(group = %group, kind = %kind, "fitting group");
        let fit = estimate(table, dataset.shots, model, opts)?;
        let intercept = fit.intercept();
        let intercept = if kind.is_rb() {
            MetricEstimate::new(1.0 - intercept.value, intercept.uncertainty)
        } else {
            intercept
        };
        rows.push(GroupFitRow {
            label,
            infidelity: fit.error(),
            intercept,
        });
        fits.push((group.clone(), fit));
    }

    let infidelities: Vec<MetricEstimate> = rows.iter().map(|r| r.infidelity).collect();
    let intercepts: Vec<MetricEstimate> = rows.iter().map(|r| r.intercept).collect();
    let mean = GroupFitRow {
        label: MEAN_LABEL.to_string(),
        infidelity: mean_estimate(&infidelities)?,
        intercept: mean_estimate(&intercepts)?,
    };
    Ok(GroupFitReport { kind, rows, mean, fits })
}

/// One group's SPAM numbers.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpamRow {
    pub label: String,
    pub errors: SpamSummary,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpamReport {
    pub rows: Vec<GroupSpamRow>,
    pub mean: GroupSpamRow,
}

pub fn group_spam_report(
    dataset: &Dataset<SpamCounts>,
    labeler: &dyn GroupLabeler,
) -> AppResult<GroupSpamReport> {
    let labels = relabel(labeler, dataset.groups.keys());
    let shots = u64::from(dataset.shots);
    let rows = dataset
        .groups
        .values()
        .zip(labels)
        .map(|(counts, label)| {
            Ok(GroupSpamRow {
                label,
                errors: spam_errors(u64::from(counts.zero), u64::from(counts.one), shots)?,
            })
        })
        .collect::<AppResult<Vec<_>>>()?;

    let pick = |f: fn(&SpamSummary) -> MetricEstimate| -> AppResult<MetricEstimate> {
        let values: Vec<MetricEstimate> = rows.iter().map(|r| f(&r.errors)).collect();
        mean_estimate(&values)
    };
    let mean = GroupSpamRow {
        label: MEAN_LABEL.to_string(),
        errors: SpamSummary {
            average: pick(|s| s.average)?,
            zero: pick(|s| s.zero)?,
            one: pick(|s| s.one)?,
        },
    };
    Ok(GroupSpamReport { rows, mean })
}

/// Arithmetic mean of values, `sqrt(Σu²)/n` for the uncertainty.
pub fn mean_estimate(estimates: &[MetricEstimate]) -> AppResult<MetricEstimate> {
    let values: Vec<f64> = estimates.iter().map(|e| e.value).collect();
    let uncertainties: Vec<f64> = estimates.iter().map(|e| e.uncertainty).collect();
    match (mean(&values), mean_uncertainty(&uncertainties)) {
        (Some(value), Some(uncertainty)) => Ok(MetricEstimate::new(value, uncertainty)),
        _ => Err(AppError::invalid("Cannot average an empty set of groups.")),
    }
}
