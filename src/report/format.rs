//! Formatted terminal output.
//!
//! Formatting code stays in one place so the estimation code never deals with
//! presentation, and output changes are localized (golden tests below).

use std::collections::BTreeMap;

use crate::aggregate::{GroupFitReport, GroupSpamReport};
use crate::domain::{ExperimentKind, MetricEstimate};

/// Report heading: machine and dataset date.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub machine: &'a str,
    pub date: &'a str,
}

/// Device-wide metrics in display order.
pub fn format_combined_report(ctx: &ReportContext<'_>, report: &BTreeMap<String, MetricEstimate>) -> String {
    let mut out = String::new();
    out.push_str("=== calib - device error report ===\n");
    out.push_str(&format!("Machine: {} | Date: {}\n\n", ctx.machine, ctx.date));

    out.push_str(&format!("{:<36} {:>10} {:>10}\n", "metric", "value", "+/-"));
    out.push_str(&format!("{:-<36} {:-<10} {:-<10}\n", "", "", ""));
    for (name, estimate) in ordered(report) {
        out.push_str(&format!(
            "{:<36} {:>10} {:>10}\n",
            name,
            fmt_sci(estimate.value),
            fmt_sci(estimate.uncertainty)
        ));
    }
    out
}

/// Canonical metric order; names outside it follow alphabetically.
fn ordered(report: &BTreeMap<String, MetricEstimate>) -> Vec<(&str, MetricEstimate)> {
    let mut canonical: Vec<&str> = Vec::new();
    for kind in ExperimentKind::ALL {
        canonical.push(kind.display_name());
        if let Some(name) = kind.leakage_display_name() {
            canonical.push(name);
        }
    }
    canonical.extend(["SPAM error |0>", "SPAM error |1>"]);

    let mut out: Vec<(&str, MetricEstimate)> = canonical
        .iter()
        .filter_map(|&name| report.get_key_value(name).map(|(k, v)| (k.as_str(), *v)))
        .collect();
    out.extend(
        report
            .iter()
            .filter(|(k, _)| !canonical.contains(&k.as_str()))
            .map(|(k, v)| (k.as_str(), *v)),
    );
    out
}

/// Per-group fit table with the `Mean` row last.
pub fn format_group_fit_report(report: &GroupFitReport) -> String {
    let intercept_header = if report.kind.is_rb() { "1 - intercept" } else { "intercept" };

    let mut out = String::new();
    out.push_str(&format!("{} by qubit group\n", report.kind.display_name()));
    out.push_str(&format!(
        "{:<16} {:>10} {:>10} {:>13} {:>10}\n",
        "group", "infidelity", "+/-", intercept_header, "+/-"
    ));
    out.push_str(&format!("{:-<16} {:-<10} {:-<10} {:-<13} {:-<10}\n", "", "", "", "", ""));
    for row in report.rows.iter().chain(std::iter::once(&report.mean)) {
        out.push_str(&format!(
            "{:<16} {:>10} {:>10} {:>13} {:>10}\n",
            truncate(&row.label, 16),
            fmt_sci(row.infidelity.value),
            fmt_sci(row.infidelity.uncertainty),
            fmt_sci(row.intercept.value),
            fmt_sci(row.intercept.uncertainty)
        ));
    }
    out
}

/// Per-group SPAM table with the `Mean` row last.
pub fn format_group_spam_report(report: &GroupSpamReport) -> String {
    let mut out = String::new();
    out.push_str("SPAM error by qubit group\n");
    out.push_str(&format!(
        "{:<16} {:>10} {:>10} {:>10} {:>10}\n",
        "group", "|0>", "|1>", "average", "+/-"
    ));
    out.push_str(&format!("{:-<16} {:-<10} {:-<10} {:-<10} {:-<10}\n", "", "", "", "", ""));
    for row in report.rows.iter().chain(std::iter::once(&report.mean)) {
        let e = &row.errors;
        out.push_str(&format!(
            "{:<16} {:>10} {:>10} {:>10} {:>10}\n",
            truncate(&row.label, 16),
            fmt_sci(e.zero.value),
            fmt_sci(e.one.value),
            fmt_sci(e.average.value),
            fmt_sci(e.average.uncertainty)
        ));
    }
    out
}

/// Scientific notation with three decimals and a signed two-digit exponent,
/// e.g. `1.250E-03`.
pub fn fmt_sci(v: f64) -> String {
    if !v.is_finite() {
        return format!("{v}");
    }
    let s = format!("{v:.3E}");
    match s.split_once('E') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}E{sign}{:02}", exp.abs())
        }
        None => s,
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}
