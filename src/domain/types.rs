//! Shared domain types.
//!
//! Datasets are built once (by `io::ingest` or by tests) and never mutated.
//! Constructors validate the structural contract so that the fitting code can
//! assume well-formed tables.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

/// A set of qubit indices addressed together, e.g. `"0, 1"`.
///
/// Indices are kept sorted and deduplicated so that `"1, 0"` and `"0, 1"` name
/// the same group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QubitGroup(Vec<u32>);

impl QubitGroup {
    pub fn new(mut qubits: Vec<u32>) -> AppResult<Self> {
        if qubits.is_empty() {
            return Err(AppError::invalid("Qubit group must contain at least one qubit."));
        }
        qubits.sort_unstable();
        qubits.dedup();
        Ok(Self(qubits))
    }

    pub fn qubits(&self) -> &[u32] {
        &self.0
    }

    pub fn qubit_count(&self) -> u32 {
        self.0.len() as u32
    }
}

impl FromStr for QubitGroup {
    type Err = AppError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        let qubits = label
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<u32>()
                    .map_err(|_| AppError::invalid(format!("Invalid qubit group label '{label}'.")))
            })
            .collect::<AppResult<Vec<u32>>>()?;
        Self::new(qubits)
    }
}

impl fmt::Display for QubitGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|q| q.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Calibration experiment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum)]
pub enum ExperimentKind {
    #[value(name = "SQ_RB")]
    SqRb,
    #[value(name = "TQ_RB")]
    TqRb,
    #[value(name = "Memory_RB")]
    MemoryRb,
    #[value(name = "Measurement_crosstalk")]
    MeasurementCrosstalk,
    #[value(name = "Reset_crosstalk")]
    ResetCrosstalk,
    #[value(name = "SPAM")]
    Spam,
}

impl ExperimentKind {
    pub const ALL: [ExperimentKind; 6] = [
        ExperimentKind::SqRb,
        ExperimentKind::TqRb,
        ExperimentKind::MemoryRb,
        ExperimentKind::MeasurementCrosstalk,
        ExperimentKind::ResetCrosstalk,
        ExperimentKind::Spam,
    ];

    /// Tag used in dataset file names.
    pub fn tag(self) -> &'static str {
        match self {
            ExperimentKind::SqRb => "SQ_RB",
            ExperimentKind::TqRb => "TQ_RB",
            ExperimentKind::MemoryRb => "Memory_RB",
            ExperimentKind::MeasurementCrosstalk => "Measurement_crosstalk",
            ExperimentKind::ResetCrosstalk => "Reset_crosstalk",
            ExperimentKind::Spam => "SPAM",
        }
    }

    /// Name of the device-wide error this experiment reports.
    pub fn display_name(self) -> &'static str {
        match self {
            ExperimentKind::SqRb => "Single-qubit gate error",
            ExperimentKind::TqRb => "Two-qubit gate error",
            ExperimentKind::MemoryRb => "Memory error",
            ExperimentKind::MeasurementCrosstalk => "Measurement crosstalk error",
            ExperimentKind::ResetCrosstalk => "Reset crosstalk error",
            ExperimentKind::Spam => "SPAM error",
        }
    }

    /// Name of the leakage-derived companion metric, for RB kinds only.
    pub fn leakage_display_name(self) -> Option<&'static str> {
        match self {
            ExperimentKind::SqRb => Some("Single-qubit spontaneous emission"),
            ExperimentKind::TqRb => Some("Two-qubit spontaneous emission"),
            ExperimentKind::MemoryRb => Some("Memory spontaneous emission"),
            _ => None,
        }
    }

    pub fn is_rb(self) -> bool {
        matches!(
            self,
            ExperimentKind::SqRb | ExperimentKind::TqRb | ExperimentKind::MemoryRb
        )
    }

    pub fn is_crosstalk(self) -> bool {
        matches!(
            self,
            ExperimentKind::MeasurementCrosstalk | ExperimentKind::ResetCrosstalk
        )
    }
}

impl FromStr for ExperimentKind {
    type Err = AppError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        ExperimentKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag.trim())
            .ok_or_else(|| AppError::invalid(format!("Unknown experiment tag '{tag}'.")))
    }
}

impl fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Which slice of the shots a survival table was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Standard,
    /// Shots where a qubit left the computational subspace were discarded.
    LeakagePostselect,
}

impl FromStr for Variant {
    type Err = AppError;

    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        match tag.trim() {
            "" | "standard" => Ok(Variant::Standard),
            "leakage_postselect" => Ok(Variant::LeakagePostselect),
            other => Err(AppError::invalid(format!("Unknown analysis variant '{other}'."))),
        }
    }
}

/// Success counts per sequence length and repetition.
#[derive(Debug, Clone, PartialEq)]
pub struct SurvivalTable {
    rows: BTreeMap<u32, Vec<u32>>,
}

impl SurvivalTable {
    /// Build a table, checking counts against `shots` and the repetition shape.
    pub fn new(rows: BTreeMap<u32, Vec<u32>>, shots: u32) -> AppResult<Self> {
        if shots == 0 {
            return Err(AppError::invalid("Shot count must be > 0."));
        }
        if rows.is_empty() {
            return Err(AppError::invalid("Survival table has no sequence lengths."));
        }
        let mut reps: Option<usize> = None;
        for (&length, counts) in &rows {
            if length == 0 {
                return Err(AppError::invalid("Sequence lengths must be >= 1."));
            }
            if counts.is_empty() {
                return Err(AppError::invalid(format!(
                    "Sequence length {length} has no repetitions."
                )));
            }
            if let Some(&bad) = counts.iter().find(|&&c| c > shots) {
                return Err(AppError::invalid(format!(
                    "Count {bad} at length {length} exceeds {shots} shots."
                )));
            }
            match reps {
                None => reps = Some(counts.len()),
                Some(n) if n != counts.len() => {
                    return Err(AppError::invalid(format!(
                        "Sequence length {length} has {} repetitions, expected {n}.",
                        counts.len()
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(Self { rows })
    }

    /// Table with a single repetition per length (crosstalk experiments).
    pub fn from_single(counts: BTreeMap<u32, u32>, shots: u32) -> AppResult<Self> {
        let rows = counts.into_iter().map(|(m, c)| (m, vec![c])).collect();
        Self::new(rows, shots)
    }

    pub fn rows(&self) -> &BTreeMap<u32, Vec<u32>> {
        &self.rows
    }

    pub fn lengths(&self) -> Vec<u32> {
        self.rows.keys().copied().collect()
    }

    pub fn repetitions(&self) -> usize {
        self.rows.values().next().map_or(0, Vec::len)
    }

    /// Mean survival frequency per length, in length order.
    pub fn survival_freqs(&self, shots: u32) -> Vec<f64> {
        self.rows
            .values()
            .map(|counts| {
                let total: u64 = counts.iter().map(|&c| u64::from(c)).sum();
                total as f64 / counts.len() as f64 / f64::from(shots)
            })
            .collect()
    }
}

/// SPAM readout successes for one group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpamCounts {
    /// Successes when preparing `|0>`.
    pub zero: u32,
    /// Successes when preparing `|1>`.
    pub one: u32,
}

/// Per-group data from one experiment with a shared shot count.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset<T> {
    pub shots: u32,
    pub groups: BTreeMap<QubitGroup, T>,
}

impl<T> Dataset<T> {
    pub fn new(shots: u32, groups: BTreeMap<QubitGroup, T>) -> AppResult<Self> {
        if shots == 0 {
            return Err(AppError::invalid("Shot count must be > 0."));
        }
        if groups.is_empty() {
            return Err(AppError::invalid("Dataset contains no qubit groups."));
        }
        Ok(Self { shots, groups })
    }

    /// Qubit count shared by every group.
    pub fn qubit_count(&self) -> AppResult<u32> {
        let mut counts = self.groups.keys().map(QubitGroup::qubit_count);
        let first = counts.next().unwrap_or(0);
        if counts.any(|n| n != first) {
            return Err(AppError::invalid(
                "Qubit groups in one dataset must address the same number of qubits.",
            ));
        }
        Ok(first)
    }
}

impl Dataset<SurvivalTable> {
    /// Check that all groups share the same set of sequence lengths.
    pub fn check_shared_lengths(&self) -> AppResult<Vec<u32>> {
        let mut iter = self.groups.iter();
        let Some((_, first)) = iter.next() else {
            return Err(AppError::invalid("Dataset contains no qubit groups."));
        };
        let lengths = first.lengths();
        for (group, table) in iter {
            if table.lengths() != lengths {
                return Err(AppError::invalid(format!(
                    "Group '{group}' has a different set of sequence lengths."
                )));
            }
        }
        Ok(lengths)
    }
}

/// RB data with its optional leakage-post-selected companion.
#[derive(Debug, Clone, PartialEq)]
pub struct RbData {
    pub standard: Dataset<SurvivalTable>,
    pub leakage: Option<Dataset<SurvivalTable>>,
}

/// One loaded experiment, shaped by its kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ExperimentData {
    Rb(RbData),
    Decay(Dataset<SurvivalTable>),
    Spam(Dataset<SpamCounts>),
}

/// Fit result in physical units: `(intercept, average fidelity)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPair {
    pub intercept: f64,
    pub fidelity: f64,
}

impl MetricPair {
    pub fn new(intercept: f64, fidelity: f64) -> Self {
        Self { intercept, fidelity }
    }
}

/// Raw least-squares coefficients `(offset, rate)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawParams {
    pub offset: f64,
    pub rate: f64,
}

impl RawParams {
    pub fn new(offset: f64, rate: f64) -> Self {
        Self { offset, rate }
    }
}

/// Asymmetric bootstrap bounds for one metric.
///
/// `lower <= point <= upper` is typical but not guaranteed: the reflected
/// percentile construction can place the point estimate outside the bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
}

impl Interval {
    /// Symmetric half-width used for reporting.
    pub fn half_width(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }

    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// A reported `(value, uncertainty)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricEstimate {
    pub value: f64,
    pub uncertainty: f64,
}

impl MetricEstimate {
    pub fn new(value: f64, uncertainty: f64) -> Self {
        Self { value, uncertainty }
    }
}
