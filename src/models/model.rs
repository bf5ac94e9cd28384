//! Decay model families and their parameter transforms.
//!
//! The fitter relies on three primitive operations per model:
//! - predict the survival probability at a sequence length
//! - the gradient of that prediction with respect to the raw parameters
//! - convert raw parameters to reported metrics (and back)
//!
//! These are implemented here for each model case.

use crate::domain::{ExperimentKind, MetricPair, RawParams, Variant};
use crate::error::{AppError, AppResult};

/// Two-qubit RB rates are corrected by the inverse power `1 / 1.5`.
pub const TWO_QUBIT_RB_EXPONENT: f64 = 1.5;

/// Fraction of spontaneous-emission events that leak out of the qubit
/// subspace; converts a leakage rate into an emission error rate.
pub const LEAKAGE_FRACTION: f64 = 0.543;

/// Survival-probability model selected from the experiment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayModel {
    /// `A * r^m + 1/2^n`.
    Rb { qubits: u32 },
    /// `A * r^m`; leaked shots were discarded so the curve decays to zero.
    RbLeakage { qubits: u32 },
    /// Bright-state population under neighbouring measurements.
    MeasurementCrosstalk,
    /// Bright-state population under neighbouring resets.
    ResetCrosstalk,
}

impl DecayModel {
    /// Pick the model for an experiment.
    ///
    /// Combinations that have no decay model (SPAM, leakage variant on
    /// crosstalk data, zero qubits) are rejected rather than defaulted.
    pub fn for_experiment(kind: ExperimentKind, variant: Variant, qubits: u32) -> AppResult<Self> {
        if qubits == 0 {
            return Err(AppError::invalid("Qubit count must be >= 1."));
        }
        match (kind, variant) {
            (ExperimentKind::SqRb | ExperimentKind::TqRb | ExperimentKind::MemoryRb, Variant::Standard) => {
                Ok(DecayModel::Rb { qubits })
            }
            (
                ExperimentKind::SqRb | ExperimentKind::TqRb | ExperimentKind::MemoryRb,
                Variant::LeakagePostselect,
            ) => Ok(DecayModel::RbLeakage { qubits }),
            (ExperimentKind::MeasurementCrosstalk, Variant::Standard) => Ok(DecayModel::MeasurementCrosstalk),
            (ExperimentKind::ResetCrosstalk, Variant::Standard) => Ok(DecayModel::ResetCrosstalk),
            (ExperimentKind::Spam, _) => Err(AppError::invalid("SPAM experiments have no decay model.")),
            (kind, Variant::LeakagePostselect) => Err(AppError::invalid(format!(
                "Leakage post-selection is not defined for {kind}."
            ))),
        }
    }

    /// Human-readable label for logs and error messages.
    pub fn display_name(self) -> String {
        match self {
            DecayModel::Rb { qubits } => format!("RB ({qubits}q)"),
            DecayModel::RbLeakage { qubits } => format!("RB leakage post-selected ({qubits}q)"),
            DecayModel::MeasurementCrosstalk => "measurement crosstalk".to_string(),
            DecayModel::ResetCrosstalk => "reset crosstalk".to_string(),
        }
    }

    /// Hilbert-space dimension `2^n` for the RB families.
    pub fn dimension(self) -> Option<f64> {
        match self {
            DecayModel::Rb { qubits } | DecayModel::RbLeakage { qubits } => Some(dimension(qubits)),
            DecayModel::MeasurementCrosstalk | DecayModel::ResetCrosstalk => None,
        }
    }

    pub fn initial_guess(self) -> RawParams {
        match self {
            DecayModel::Rb { qubits } => RawParams::new(1.0 - 1.0 / dimension(qubits), 0.99),
            DecayModel::RbLeakage { .. } => RawParams::new(1.0, 0.99),
            DecayModel::MeasurementCrosstalk | DecayModel::ResetCrosstalk => RawParams::new(1.0, 0.001),
        }
    }

    /// Box constraints `[(lo, hi); 2]` for `(offset, rate)`.
    pub fn bounds(self) -> [(f64, f64); 2] {
        [(0.0, 1.0), (0.0, 1.0)]
    }
}

fn dimension(qubits: u32) -> f64 {
    2f64.powi(qubits as i32)
}

fn rb_exponent(qubits: u32) -> f64 {
    if qubits == 2 { TWO_QUBIT_RB_EXPONENT } else { 1.0 }
}

/// Depolarizing rate after the qubit-count-dependent power correction.
pub fn rb_corrected_rate(qubits: u32, rate: f64) -> f64 {
    rate.powf(1.0 / rb_exponent(qubits))
}

/// Long-length asymptote of the RB families (`None` for crosstalk models,
/// whose limit depends on the fitted offset).
pub fn asymptote(model: DecayModel) -> Option<f64> {
    match model {
        DecayModel::Rb { qubits } => Some(1.0 / dimension(qubits)),
        DecayModel::RbLeakage { .. } => Some(0.0),
        DecayModel::MeasurementCrosstalk | DecayModel::ResetCrosstalk => None,
    }
}

/// Predicted survival probability at sequence length `m`.
pub fn survival_probability(model: DecayModel, m: f64, raw: RawParams) -> f64 {
    let RawParams { offset, rate } = raw;
    match model {
        DecayModel::Rb { qubits } => offset * rate.powf(m) + 1.0 / dimension(qubits),
        DecayModel::RbLeakage { .. } => offset * rate.powf(m),
        DecayModel::MeasurementCrosstalk => {
            let e = (-3.0 * rate * m).exp();
            (2.0 - offset + e * (4.0 * offset - 2.0)) / 3.0
        }
        DecayModel::ResetCrosstalk => {
            let e = (-2.0 * rate * m).exp();
            0.5 + (offset - 0.5) * e
        }
    }
}

/// Partial derivatives of `survival_probability` with respect to
/// `(offset, rate)`.
pub fn gradient(model: DecayModel, m: f64, raw: RawParams) -> [f64; 2] {
    let RawParams { offset, rate } = raw;
    match model {
        DecayModel::Rb { .. } | DecayModel::RbLeakage { .. } => {
            [rate.powf(m), offset * m * rate.powf(m - 1.0)]
        }
        DecayModel::MeasurementCrosstalk => {
            let e = (-3.0 * rate * m).exp();
            [(4.0 * e - 1.0) / 3.0, -m * (4.0 * offset - 2.0) * e]
        }
        DecayModel::ResetCrosstalk => {
            let e = (-2.0 * rate * m).exp();
            [e, -2.0 * m * (offset - 0.5) * e]
        }
    }
}

/// Convert raw least-squares coefficients into `(intercept, fidelity)`.
pub fn raw_to_metric(model: DecayModel, raw: RawParams) -> MetricPair {
    let RawParams { offset, rate } = raw;
    match model {
        DecayModel::Rb { qubits } => {
            let d = dimension(qubits);
            MetricPair::new(
                offset + 1.0 / d,
                ((d - 1.0) * rb_corrected_rate(qubits, rate) + 1.0) / d,
            )
        }
        DecayModel::RbLeakage { .. } => MetricPair::new(offset, 1.0 - (1.0 - rate) / LEAKAGE_FRACTION),
        DecayModel::MeasurementCrosstalk => MetricPair::new(offset, 1.0 - 5.0 * rate / 6.0),
        DecayModel::ResetCrosstalk => MetricPair::new(offset, 1.0 - 2.0 * rate / 3.0),
    }
}

/// Inverse of [`raw_to_metric`]; used to draw fitted curves over raw data.
pub fn metric_to_raw(model: DecayModel, metric: MetricPair) -> RawParams {
    let MetricPair { intercept, fidelity } = metric;
    match model {
        DecayModel::Rb { qubits } => {
            let d = dimension(qubits);
            RawParams::new(
                intercept - 1.0 / d,
                ((d * fidelity - 1.0) / (d - 1.0)).powf(rb_exponent(qubits)),
            )
        }
        DecayModel::RbLeakage { .. } => {
            RawParams::new(intercept, 1.0 - LEAKAGE_FRACTION * (1.0 - fidelity))
        }
        DecayModel::MeasurementCrosstalk => RawParams::new(intercept, 6.0 * (1.0 - fidelity) / 5.0),
        DecayModel::ResetCrosstalk => RawParams::new(intercept, 3.0 * (1.0 - fidelity) / 2.0),
    }
}
