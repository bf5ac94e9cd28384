//! Point estimator: bounded nonlinear least squares for a single decay model.
//!
//! Given:
//! - sequence lengths `m_i`
//! - observed survival frequencies `y_i`
//! - a decay model
//!
//! we minimize `Σ (y_i - f(m_i; offset, rate))^2` with both raw parameters
//! boxed by the model's bounds, starting from the model's initial guess, and
//! convert the optimum into reported metrics.

use nalgebra::{DMatrix, DVector};
use tracing::trace;

use crate::domain::{MetricPair, RawParams};
use crate::error::{AppError, AppResult};
use crate::math::{LeastSquaresProblem, LmOptions, minimize};
use crate::models::{DecayModel, gradient, raw_to_metric, survival_probability};

/// Best fit for a single model.
#[derive(Debug, Clone)]
pub struct DecayFit {
    pub model: DecayModel,
    pub raw: RawParams,
    pub metric: MetricPair,
    pub sse: f64,
    pub rmse: f64,
    pub iterations: usize,
}

struct DecayProblem<'a> {
    model: DecayModel,
    lengths: &'a [f64],
    freqs: &'a [f64],
}

impl LeastSquaresProblem for DecayProblem<'_> {
    fn residuals(&self, x: &[f64]) -> DVector<f64> {
        let raw = RawParams::new(x[0], x[1]);
        DVector::from_iterator(
            self.lengths.len(),
            self.lengths
                .iter()
                .zip(self.freqs.iter())
                .map(|(&m, &y)| survival_probability(self.model, m, raw) - y),
        )
    }

    fn jacobian(&self, x: &[f64]) -> DMatrix<f64> {
        let raw = RawParams::new(x[0], x[1]);
        let mut jac = DMatrix::<f64>::zeros(self.lengths.len(), 2);
        for (i, &m) in self.lengths.iter().enumerate() {
            let g = gradient(self.model, m, raw);
            jac[(i, 0)] = g[0];
            jac[(i, 1)] = g[1];
        }
        jac
    }
}

/// Fit `freqs` against `model` and return the converted metric pair.
pub fn fit_decay(model: DecayModel, lengths: &[u32], freqs: &[f64]) -> AppResult<MetricPair> {
    fit_raw(model, lengths, freqs, &LmOptions::default()).map(|fit| fit.metric)
}

/// Fit `freqs` against `model`, keeping raw parameters and diagnostics.
pub fn fit_raw(
    model: DecayModel,
    lengths: &[u32],
    freqs: &[f64],
    opts: &LmOptions,
) -> AppResult<DecayFit> {
    validate_inputs(lengths, freqs)?;

    let mut distinct = lengths.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < 2 {
        return Err(AppError::fit_failed(
            model.display_name(),
            "at least two distinct sequence lengths are required",
        ));
    }
    if freqs.iter().all(|&y| y == freqs[0]) {
        return Err(AppError::fit_failed(
            model.display_name(),
            "survival frequencies are identical at every length",
        ));
    }

    let m: Vec<f64> = lengths.iter().map(|&l| f64::from(l)).collect();
    let problem = DecayProblem {
        model,
        lengths: &m,
        freqs,
    };
    let guess = model.initial_guess();
    let solution = minimize(&problem, &[guess.offset, guess.rate], &model.bounds(), opts)
        .map_err(|e| AppError::fit_failed(model.display_name(), e.to_string()))?;

    let raw = RawParams::new(solution.x[0], solution.x[1]);
    if !(raw.offset.is_finite() && raw.rate.is_finite() && solution.sse.is_finite()) {
        return Err(AppError::fit_failed(model.display_name(), "non-finite optimum"));
    }
    trace!(
        model = %model.display_name(),
        offset = raw.offset,
        rate = raw.rate,
        sse = solution.sse,
        iterations = solution.iterations,
        "decay fit converged"
    );

    Ok(DecayFit {
        model,
        raw,
        metric: raw_to_metric(model, raw),
        sse: solution.sse,
        rmse: (solution.sse / m.len() as f64).sqrt(),
        iterations: solution.iterations,
    })
}

fn validate_inputs(lengths: &[u32], freqs: &[f64]) -> AppResult<()> {
    if lengths.is_empty() {
        return Err(AppError::invalid("No data points to fit."));
    }
    if lengths.len() != freqs.len() {
        return Err(AppError::invalid(format!(
            "Got {} sequence lengths but {} survival frequencies.",
            lengths.len(),
            freqs.len()
        )));
    }
    if lengths.contains(&0) {
        return Err(AppError::invalid("Sequence lengths must be >= 1."));
    }
    if let Some(bad) = freqs.iter().find(|y| !(y.is_finite() && (0.0..=1.0).contains(*y))) {
        return Err(AppError::invalid(format!(
            "Survival frequency {bad} is outside [0, 1]."
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn synthetic(model: DecayModel, raw: RawParams, lengths: &[u32]) -> Vec<f64> {
        lengths
            .iter()
            .map(|&m| survival_probability(model, f64::from(m), raw))
            .collect()
    }

    #[test]
    fn recovers_parameters_from_exact_data() {
        let cases = [
            (DecayModel::Rb { qubits: 1 }, RawParams::new(0.45, 0.97), vec![1, 2, 4, 8, 16, 32, 64]),
            (DecayModel::Rb { qubits: 2 }, RawParams::new(0.70, 0.95), vec![1, 2, 4, 8, 16, 32, 64]),
            (DecayModel::RbLeakage { qubits: 1 }, RawParams::new(0.98, 0.995), vec![1, 10, 50, 100, 200]),
            (DecayModel::MeasurementCrosstalk, RawParams::new(0.97, 0.01), vec![1, 5, 10, 20, 50, 100]),
            (DecayModel::ResetCrosstalk, RawParams::new(0.96, 0.02), vec![1, 5, 10, 20, 50, 100]),
        ];
        for (model, truth, lengths) in cases {
            let freqs = synthetic(model, truth, &lengths);
            let fit = fit_raw(model, &lengths, &freqs, &LmOptions::default()).unwrap();
            assert!((fit.raw.offset - truth.offset).abs() < 1e-6, "{model:?}: {:?}", fit.raw);
            assert!((fit.raw.rate - truth.rate).abs() < 1e-6, "{model:?}: {:?}", fit.raw);
            assert!(fit.sse < 1e-12);
        }
    }

    #[test]
    fn fit_decay_returns_converted_metrics() {
        let model = DecayModel::Rb { qubits: 1 };
        let lengths = [1, 5, 10, 20];
        let freqs: Vec<f64> = lengths.iter().map(|&m| 0.5 + 0.5 * 0.85f64.powi(m as i32)).collect();
        let metric = fit_decay(model, &lengths, &freqs).unwrap();
        let infidelity = 1.0 - metric.fidelity;
        assert!(infidelity > 0.0 && infidelity < 0.5);
        assert!((infidelity - 0.075).abs() < 1e-6);
        assert!((metric.intercept - 1.0).abs() < 1e-6);
    }

    #[test]
    fn single_repetition_lengths_are_fine_but_one_length_is_not() {
        let model = DecayModel::Rb { qubits: 1 };
        let err = fit_decay(model, &[5, 5, 5], &[0.9, 0.8, 0.85]).unwrap_err();
        assert!(err.is_fit_failure());
    }

    #[test]
    fn identical_frequencies_fail_to_fit() {
        let model = DecayModel::MeasurementCrosstalk;
        let err = fit_decay(model, &[1, 10, 100], &[0.9, 0.9, 0.9]).unwrap_err();
        assert!(err.is_fit_failure());
    }

    #[test]
    fn malformed_inputs_are_invalid_not_fit_failures() {
        let model = DecayModel::Rb { qubits: 1 };
        let err = fit_decay(model, &[1, 2], &[0.9]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        let err = fit_decay(model, &[1, 2], &[0.9, 1.2]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
        let err = fit_decay(model, &[0, 2], &[0.9, 0.8]).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn fitted_rate_stays_in_bounds() {
        // Survival increasing with length pushes the rate to its upper bound.
        let model = DecayModel::Rb { qubits: 1 };
        let fit = fit_raw(model, &[1, 5, 10], &[0.80, 0.85, 0.90], &LmOptions::default()).unwrap();
        assert!((0.0..=1.0).contains(&fit.raw.rate));
        assert!((0.0..=1.0).contains(&fit.raw.offset));
    }

    #[test]
    fn offset_on_its_bound_converges_quickly() {
        // Survival never drops below 0.92: the best offset is pinned at 1.
        let lengths = [1, 100, 500, 1000, 2000];
        let cases = [
            (DecayModel::MeasurementCrosstalk, [1.0, 1.0, 0.97, 1.0, 0.92], 1.7262e-5),
            (DecayModel::ResetCrosstalk, [1.0, 0.994, 0.946, 0.916, 0.828], 1.0250e-4),
        ];
        for (model, freqs, rate) in cases {
            let fit = fit_raw(model, &lengths, &freqs, &LmOptions::default()).unwrap();
            assert_eq!(fit.raw.offset, 1.0, "{model:?}");
            assert!((fit.raw.rate - rate).abs() < 1e-3 * rate, "{model:?}: {:?}", fit.raw);
            assert!(fit.iterations <= 20, "{model:?}: {} iterations", fit.iterations);
        }
    }
}
