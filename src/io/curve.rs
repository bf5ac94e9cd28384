//! Fitted-curve JSON export.
//!
//! One entry per qubit group with:
//! - the fitted metric pair and the raw parameters it maps back to
//! - the observed survival frequencies
//! - a sampled grid of the fitted survival curve for quick plotting

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::aggregate::GroupFitReport;
use crate::domain::{Dataset, MetricPair, RawParams, SurvivalTable};
use crate::error::{AppError, AppResult};
use crate::models::{DecayModel, metric_to_raw, survival_probability};

pub const GRID_POINTS: usize = 101;

#[derive(Debug, Clone, Serialize)]
pub struct CurveGrid {
    pub length: Vec<f64>,
    pub survival: Vec<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupCurve {
    pub group: String,
    pub label: String,
    pub metric: MetricPair,
    pub raw: RawParams,
    pub lengths: Vec<u32>,
    pub observed: Vec<f64>,
    pub grid: CurveGrid,
}

#[derive(Debug, Clone, Serialize)]
pub struct CurveFile {
    pub tool: String,
    pub experiment: String,
    pub model: String,
    pub shots: u32,
    pub groups: Vec<GroupCurve>,
}

/// Build the curve document for a per-group fit report.
pub fn build_curve_file(report: &GroupFitReport, dataset: &Dataset<SurvivalTable>) -> AppResult<CurveFile> {
    let shots = dataset.shots;
    let mut groups = Vec::with_capacity(report.fits.len());
    let mut model_name = String::new();
    for ((group, fit), row) in report.fits.iter().zip(&report.rows) {
        let table = dataset
            .groups
            .get(group)
            .ok_or_else(|| AppError::invalid(format!("No survival data for group '{group}'.")))?;
        let lengths = table.lengths();
        let max_len = lengths.last().copied().unwrap_or(1);
        model_name = fit.model.display_name();
        groups.push(GroupCurve {
            group: group.to_string(),
            label: row.label.clone(),
            metric: fit.point,
            raw: metric_to_raw(fit.model, fit.point),
            observed: table.survival_freqs(shots),
            grid: build_grid(fit.model, fit.point, f64::from(max_len), GRID_POINTS),
            lengths,
        });
    }
    Ok(CurveFile {
        tool: "calib".to_string(),
        experiment: report.kind.tag().to_string(),
        model: model_name,
        shots,
        groups,
    })
}

pub fn write_curve_json(path: &Path, curve: &CurveFile) -> AppResult<()> {
    let file = File::create(path)
        .map_err(|e| AppError::Io(format!("Failed to create curve JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(file, curve)
        .map_err(|e| AppError::Io(format!("Failed to write curve JSON: {e}")))?;
    Ok(())
}

/// Fitted survival on `n` evenly spaced lengths from 0 to `max_len`.
pub fn build_grid(model: DecayModel, metric: MetricPair, max_len: f64, n: usize) -> CurveGrid {
    let n = n.max(2);
    let max_len = if max_len.is_finite() && max_len > 0.0 { max_len } else { 1.0 };
    let raw = metric_to_raw(model, metric);

    let mut length = Vec::with_capacity(n);
    let mut survival = Vec::with_capacity(n);
    for i in 0..n {
        let m = max_len * i as f64 / (n as f64 - 1.0);
        length.push(m);
        survival.push(survival_probability(model, m, raw));
    }
    CurveGrid { length, survival }
}
