//! CSV exports of report tables.
//!
//! Plain numbers with full precision, meant for spreadsheets or downstream
//! scripts. Formatting for humans lives in `report`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use crate::aggregate::{GroupFitReport, GroupSpamReport};
use crate::domain::MetricEstimate;
use crate::error::{AppError, AppResult};

/// Write the combined report as `metric,value,uncertainty`.
pub fn write_report_csv(path: &Path, report: &BTreeMap<String, MetricEstimate>) -> AppResult<()> {
    let writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::Io(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    write_report(writer, report)
}

fn write_report<W: Write>(mut writer: csv::Writer<W>, report: &BTreeMap<String, MetricEstimate>) -> AppResult<()> {
    writer.write_record(["metric", "value", "uncertainty"]).map_err(csv_error)?;
    for (name, estimate) in report {
        writer
            .write_record([
                name.clone(),
                estimate.value.to_string(),
                estimate.uncertainty.to_string(),
            ])
            .map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a per-group fit table, `Mean` row last.
pub fn write_group_fit_csv(path: &Path, report: &GroupFitReport) -> AppResult<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::Io(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    writer
        .write_record([
            "group",
            "infidelity",
            "infidelity_uncertainty",
            "intercept",
            "intercept_uncertainty",
        ])
        .map_err(csv_error)?;
    for row in report.rows.iter().chain(std::iter::once(&report.mean)) {
        writer
            .write_record([
                row.label.clone(),
                row.infidelity.value.to_string(),
                row.infidelity.uncertainty.to_string(),
                row.intercept.value.to_string(),
                row.intercept.uncertainty.to_string(),
            ])
            .map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write a per-group SPAM table, `Mean` row last.
pub fn write_group_spam_csv(path: &Path, report: &GroupSpamReport) -> AppResult<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::Io(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    writer
        .write_record(["group", "error_0", "error_1", "average", "uncertainty"])
        .map_err(csv_error)?;
    for row in report.rows.iter().chain(std::iter::once(&report.mean)) {
        let e = &row.errors;
        writer
            .write_record([
                row.label.clone(),
                e.zero.value.to_string(),
                e.one.value.to_string(),
                e.average.value.to_string(),
                e.average.uncertainty.to_string(),
            ])
            .map_err(csv_error)?;
    }
    writer.flush()?;
    Ok(())
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::Io(format!("Failed to write export CSV: {e}"))
}
