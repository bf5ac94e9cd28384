//! Device-wide estimates from pooled counts.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::aggregate::pool::{pool_spam, pool_tables};
use crate::domain::{
    Dataset, ExperimentData, ExperimentKind, MetricEstimate, MetricPair, RbData, SpamCounts,
    SurvivalTable, Variant,
};
use crate::error::{AppError, AppResult};
use crate::fit::{BootstrapBounds, BootstrapOptions, bootstrap, fit_raw};
use crate::models::DecayModel;

/// Mixed into the seed of the leakage bootstrap so it does not replay the
/// standard fit's draws.
const LEAKAGE_SEED_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Supplies experiment data by kind.
pub trait DataSource {
    fn load(&self, kind: ExperimentKind) -> AppResult<ExperimentData>;
}

/// Point fit plus bootstrap bounds for one survival table.
#[derive(Debug, Clone)]
pub struct FitEstimate {
    pub model: DecayModel,
    pub point: MetricPair,
    pub bounds: BootstrapBounds,
}

impl FitEstimate {
    pub fn intercept(&self) -> MetricEstimate {
        MetricEstimate::new(self.point.intercept, self.bounds.intercept.half_width())
    }

    pub fn fidelity(&self) -> MetricEstimate {
        MetricEstimate::new(self.point.fidelity, self.bounds.fidelity.half_width())
    }

    /// Infidelity `1 − F` with the fidelity's uncertainty.
    pub fn error(&self) -> MetricEstimate {
        MetricEstimate::new(1.0 - self.point.fidelity, self.bounds.fidelity.half_width())
    }
}

/// Fit `table` once and bootstrap it.
pub fn estimate(
    table: &SurvivalTable,
    shots: u32,
    model: DecayModel,
    opts: &BootstrapOptions,
) -> AppResult<FitEstimate> {
    let lengths = table.lengths();
    let point = fit_raw(model, &lengths, &table.survival_freqs(shots), &opts.lm)?.metric;
    let bounds = bootstrap(table, shots, model, opts)?;
    Ok(FitEstimate { model, point, bounds })
}

/// Combined RB numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RbSummary {
    /// Reported gate error, leakage-corrected when leakage data exists.
    pub gate_error: MetricEstimate,
    /// `1 − F` of the standard fit alone.
    pub depolarizing: MetricEstimate,
    /// `1 − F` of the leakage-post-selected fit.
    pub spontaneous_emission: Option<MetricEstimate>,
}

/// Gate error `e + e_se / d`, uncertainty `sqrt(u1² + u2² / d²)`.
pub fn leakage_corrected(base: MetricEstimate, emission: MetricEstimate, dimension: f64) -> MetricEstimate {
    MetricEstimate::new(
        base.value + emission.value / dimension,
        (base.uncertainty.powi(2) + emission.uncertainty.powi(2) / dimension.powi(2)).sqrt(),
    )
}

/// Pooled RB fit with the optional leakage correction.
///
/// Missing leakage data is skipped. A leakage fit that fails is an error.
pub fn combined_rb(
    data: &RbData,
    kind: ExperimentKind,
    opts: &BootstrapOptions,
) -> AppResult<RbSummary> {
    let qubits = data.standard.qubit_count()?;
    let model = DecayModel::for_experiment(kind, Variant::Standard, qubits)?;
    let pooled = pool_tables(&data.standard)?;
    let depolarizing = estimate(&pooled, data.standard.shots, model, opts)?.error();

    let Some(leakage) = &data.leakage else {
        info!(kind = %kind, "no leakage-post-selected data; reporting uncorrected gate error");
        return Ok(RbSummary {
            gate_error: depolarizing,
            depolarizing,
            spontaneous_emission: None,
        });
    };

    if leakage.qubit_count()? != qubits {
        return Err(AppError::invalid(format!(
            "Leakage data for {kind} addresses a different number of qubits."
        )));
    }
    let leak_model = DecayModel::for_experiment(kind, Variant::LeakagePostselect, qubits)?;
    let leak_opts = BootstrapOptions {
        seed: opts.seed.map(|s| s ^ LEAKAGE_SEED_SALT),
        ..opts.clone()
    };
    let emission = estimate(&pool_tables(leakage)?, leakage.shots, leak_model, &leak_opts)?.error();
    let dimension = leak_model.dimension().unwrap_or(1.0);

    debug!(
        kind = %kind,
        depolarizing = depolarizing.value,
        emission = emission.value,
        "applying leakage correction"
    );

    Ok(RbSummary {
        gate_error: leakage_corrected(depolarizing, emission, dimension),
        depolarizing,
        spontaneous_emission: Some(emission),
    })
}

/// Pooled crosstalk fit; error `1 − F`.
pub fn combined_decay(
    dataset: &Dataset<SurvivalTable>,
    kind: ExperimentKind,
    opts: &BootstrapOptions,
) -> AppResult<MetricEstimate> {
    let qubits = dataset.qubit_count()?;
    let model = DecayModel::for_experiment(kind, Variant::Standard, qubits)?;
    let pooled = pool_tables(dataset)?;
    Ok(estimate(&pooled, dataset.shots, model, opts)?.error())
}

/// Combined SPAM numbers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpamSummary {
    pub average: MetricEstimate,
    pub zero: MetricEstimate,
    pub one: MetricEstimate,
}

/// SPAM errors from successes out of `trials` per prepared state.
pub fn spam_errors(zero: u64, one: u64, trials: u64) -> AppResult<SpamSummary> {
    if trials == 0 {
        return Err(AppError::invalid("SPAM data has no shots."));
    }
    if zero > trials || one > trials {
        return Err(AppError::invalid(format!(
            "SPAM successes ({zero}, {one}) exceed {trials} shots."
        )));
    }
    let n = trials as f64;
    let p0 = zero as f64 / n;
    let p1 = one as f64 / n;
    let v0 = p0 * (1.0 - p0);
    let v1 = p1 * (1.0 - p1);
    Ok(SpamSummary {
        average: MetricEstimate::new(((1.0 - p0) + (1.0 - p1)) / 2.0, (v0 + v1).sqrt() / 2.0 / n.sqrt()),
        zero: MetricEstimate::new(1.0 - p0, (v0 / n).sqrt()),
        one: MetricEstimate::new(1.0 - p1, (v1 / n).sqrt()),
    })
}

/// SPAM errors from counts pooled over every group.
///
/// Every group is checked against the shot count first; pooled totals can
/// hide a single group that over-counts.
pub fn combined_spam(dataset: &Dataset<SpamCounts>) -> AppResult<SpamSummary> {
    if let Some((group, counts)) = dataset
        .groups
        .iter()
        .find(|(_, c)| c.zero > dataset.shots || c.one > dataset.shots)
    {
        return Err(AppError::invalid(format!(
            "SPAM counts ({}, {}) for group '{group}' exceed {} shots.",
            counts.zero, counts.one, dataset.shots
        )));
    }
    let pooled = pool_spam(dataset);
    spam_errors(pooled.zero, pooled.one, pooled.trials)
}

/// Run every requested kind and collect the named device-wide metrics.
pub fn combined_report(
    source: &dyn DataSource,
    kinds: &[ExperimentKind],
    opts: &BootstrapOptions,
) -> AppResult<BTreeMap<String, MetricEstimate>> {
    let mut report = BTreeMap::new();
    for &kind in kinds {
        info!(kind = %kind, "estimating combined metrics");
        match (kind, source.load(kind)?) {
            (ExperimentKind::SqRb | ExperimentKind::TqRb | ExperimentKind::MemoryRb, ExperimentData::Rb(data)) => {
                let summary = combined_rb(&data, kind, opts)?;
                report.insert(kind.display_name().to_string(), summary.gate_error);
                if let (Some(emission), Some(name)) = (summary.spontaneous_emission, kind.leakage_display_name()) {
                    report.insert(name.to_string(), emission);
                }
            }
            (
                ExperimentKind::MeasurementCrosstalk | ExperimentKind::ResetCrosstalk,
                ExperimentData::Decay(dataset),
            ) => {
                report.insert(kind.display_name().to_string(), combined_decay(&dataset, kind, opts)?);
            }
            (ExperimentKind::Spam, ExperimentData::Spam(dataset)) => {
                let summary = combined_spam(&dataset)?;
                report.insert(kind.display_name().to_string(), summary.average);
                report.insert("SPAM error |0>".to_string(), summary.zero);
                report.insert("SPAM error |1>".to_string(), summary.one);
            }
            (kind, _) => {
                warn!(kind = %kind, "data source returned the wrong data shape");
                return Err(AppError::invalid(format!("Data for {kind} has an unexpected shape.")));
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{QubitGroup, RawParams};
    use crate::models::{metric_to_raw, survival_probability};

    fn group(label: &str) -> QubitGroup {
        label.parse().unwrap()
    }

    /// Exact counts for a model curve, `reps` identical repetitions per length.
    fn synthetic(model: DecayModel, metric: MetricPair, shots: u32, reps: usize) -> SurvivalTable {
        let raw: RawParams = metric_to_raw(model, metric);
        let rows = [1u32, 4, 8, 16, 32, 64]
            .into_iter()
            .map(|m| {
                let p = survival_probability(model, f64::from(m), raw);
                (m, vec![(p * f64::from(shots)).round() as u32; reps])
            })
            .collect();
        SurvivalTable::new(rows, shots).unwrap()
    }

    #[test]
    fn leakage_correction_combines_in_quadrature() {
        let base = MetricEstimate::new(1e-3, 3e-4);
        let emission = MetricEstimate::new(4e-4, 8e-4);
        let corrected = leakage_corrected(base, emission, 4.0);
        assert!((corrected.value - 1.1e-3).abs() < 1e-15);
        let expected = (3e-4f64.powi(2) + (8e-4f64 / 4.0).powi(2)).sqrt();
        assert!((corrected.uncertainty - expected).abs() < 1e-15);
    }

    #[test]
    fn spam_hand_computed_example() {
        // Two groups of 100 shots: |0> 99 + 97 = 196 successes, |1> 95 + 93 = 188.
        let ds = Dataset::new(
            100,
            BTreeMap::from([
                (group("0"), SpamCounts { zero: 99, one: 95 }),
                (group("1"), SpamCounts { zero: 97, one: 93 }),
            ]),
        )
        .unwrap();
        let summary = combined_spam(&ds).unwrap();
        assert!((summary.zero.value - 0.02).abs() < 1e-12);
        assert!((summary.one.value - 0.06).abs() < 1e-12);
        assert!((summary.average.value - 0.04).abs() < 1e-12);

        let expected = (0.98f64 * 0.02 + 0.94 * 0.06).sqrt() / 2.0 / 200f64.sqrt();
        assert!((summary.average.uncertainty - expected).abs() < 1e-15);
        assert!((summary.zero.uncertainty - (0.98f64 * 0.02 / 200.0).sqrt()).abs() < 1e-15);
    }

    #[test]
    fn spam_without_trials_is_invalid() {
        assert!(spam_errors(0, 0, 0).is_err());
    }

    #[test]
    fn spam_counts_above_shots_are_rejected() {
        for (zero, one) in [(150, 0), (0, 101)] {
            let err = spam_errors(zero, one, 100).unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)), "{zero}, {one}");
        }
        assert!(spam_errors(100, 100, 100).is_ok());

        // Pooled totals fit in 200 trials, but group "0" alone over-counts.
        let ds = Dataset::new(
            100,
            BTreeMap::from([
                (group("0"), SpamCounts { zero: 150, one: 90 }),
                (group("1"), SpamCounts { zero: 0, one: 90 }),
            ]),
        )
        .unwrap();
        let err = combined_spam(&ds).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn combined_rb_without_leakage_reports_plain_error() {
        let model = DecayModel::Rb { qubits: 1 };
        let table = synthetic(model, MetricPair::new(0.99, 0.995), 1000, 3);
        let data = RbData {
            standard: Dataset::new(1000, BTreeMap::from([(group("0"), table.clone()), (group("1"), table)])).unwrap(),
            leakage: None,
        };
        let summary = combined_rb(&data, ExperimentKind::SqRb, &BootstrapOptions::seeded(20, 5)).unwrap();
        assert_eq!(summary.gate_error, summary.depolarizing);
        assert!(summary.spontaneous_emission.is_none());
        assert!((summary.gate_error.value - 0.005).abs() < 5e-4, "{:?}", summary.gate_error);
    }

    #[test]
    fn combined_rb_adds_scaled_emission() {
        let std_model = DecayModel::Rb { qubits: 2 };
        let leak_model = DecayModel::RbLeakage { qubits: 2 };
        let standard = synthetic(std_model, MetricPair::new(0.98, 0.99), 1000, 2);
        let leakage = synthetic(leak_model, MetricPair::new(0.99, 0.998), 1000, 2);
        let data = RbData {
            standard: Dataset::new(1000, BTreeMap::from([(group("0, 1"), standard)])).unwrap(),
            leakage: Some(Dataset::new(1000, BTreeMap::from([(group("0, 1"), leakage)])).unwrap()),
        };
        let summary = combined_rb(&data, ExperimentKind::TqRb, &BootstrapOptions::seeded(20, 9)).unwrap();
        let emission = summary.spontaneous_emission.unwrap();
        let expected = leakage_corrected(summary.depolarizing, emission, 4.0);
        assert_eq!(summary.gate_error, expected);
        assert!(summary.gate_error.value > summary.depolarizing.value);
    }

    #[test]
    fn combined_rb_propagates_leakage_fit_failure() {
        let model = DecayModel::Rb { qubits: 1 };
        let standard = synthetic(model, MetricPair::new(0.99, 0.995), 1000, 2);
        let flat = SurvivalTable::new(BTreeMap::from([(1, vec![500, 500]), (8, vec![500, 500])]), 1000).unwrap();
        let data = RbData {
            standard: Dataset::new(1000, BTreeMap::from([(group("0"), standard)])).unwrap(),
            leakage: Some(Dataset::new(1000, BTreeMap::from([(group("0"), flat)])).unwrap()),
        };
        let err = combined_rb(&data, ExperimentKind::SqRb, &BootstrapOptions::seeded(5, 1)).unwrap_err();
        assert!(err.is_fit_failure());
    }

    /// Two single-repetition groups with shot noise, pooled to two
    /// repetitions per length. Early lengths sit at full survival, so many
    /// resampled fits end with the offset on its upper bound.
    fn noisy_crosstalk(shots: u32, counts: [[u32; 5]; 2]) -> Dataset<SurvivalTable> {
        let lengths = [1u32, 100, 500, 1000, 2000];
        let groups = counts
            .iter()
            .zip(["3", "5"])
            .map(|(row, label)| {
                let rows = lengths.iter().zip(row).map(|(&m, &c)| (m, vec![c])).collect();
                (group(label), SurvivalTable::new(rows, shots).unwrap())
            })
            .collect();
        Dataset::new(shots, groups).unwrap()
    }

    #[test]
    fn combined_decay_handles_noisy_measurement_crosstalk() {
        let ds = noisy_crosstalk(100, [[100, 100, 96, 93, 88], [100, 99, 97, 94, 89]]);
        let error = combined_decay(&ds, ExperimentKind::MeasurementCrosstalk, &BootstrapOptions::seeded(1000, 3))
            .unwrap();
        assert!(error.value > 1e-5 && error.value < 1e-4, "{error:?}");
        assert!(error.uncertainty > 0.0 && error.uncertainty < 5e-5, "{error:?}");
    }

    #[test]
    fn combined_decay_handles_noisy_reset_crosstalk() {
        let ds = noisy_crosstalk(500, [[500, 497, 473, 458, 414], [499, 496, 475, 455, 418]]);
        let error =
            combined_decay(&ds, ExperimentKind::ResetCrosstalk, &BootstrapOptions::seeded(1000, 3)).unwrap();
        assert!(error.value > 3e-5 && error.value < 1.5e-4, "{error:?}");
        assert!(error.uncertainty > 0.0 && error.uncertainty < 5e-5, "{error:?}");
    }

    struct FixedSource(BTreeMap<ExperimentKind, ExperimentData>);

    impl DataSource for FixedSource {
        fn load(&self, kind: ExperimentKind) -> AppResult<ExperimentData> {
            self.0
                .get(&kind)
                .cloned()
                .ok_or_else(|| AppError::MissingData(kind.tag().to_string()))
        }
    }

    #[test]
    fn combined_report_uses_display_names() {
        let model = DecayModel::MeasurementCrosstalk;
        let table = synthetic(model, MetricPair::new(0.99, 0.999), 1000, 1);
        let spam = Dataset::new(100, BTreeMap::from([(group("0"), SpamCounts { zero: 99, one: 98 })])).unwrap();
        let source = FixedSource(BTreeMap::from([
            (
                ExperimentKind::MeasurementCrosstalk,
                ExperimentData::Decay(Dataset::new(1000, BTreeMap::from([(group("3"), table)])).unwrap()),
            ),
            (ExperimentKind::Spam, ExperimentData::Spam(spam)),
        ]));

        let report = combined_report(
            &source,
            &[ExperimentKind::MeasurementCrosstalk, ExperimentKind::Spam],
            &BootstrapOptions::seeded(10, 2),
        )
        .unwrap();
        let keys: Vec<&str> = report.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["Measurement crosstalk error", "SPAM error", "SPAM error |0>", "SPAM error |1>"]
        );
        assert!((report["SPAM error"].value - 0.015).abs() < 1e-12);

        let err = combined_report(&source, &[ExperimentKind::SqRb], &BootstrapOptions::seeded(10, 2)).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn combined_report_rejects_mismatched_shape() {
        let spam = Dataset::new(100, BTreeMap::from([(group("0"), SpamCounts { zero: 99, one: 98 })])).unwrap();
        let source = FixedSource(BTreeMap::from([(ExperimentKind::SqRb, ExperimentData::Spam(spam))]));
        let err = combined_report(&source, &[ExperimentKind::SqRb], &BootstrapOptions::seeded(1, 1)).unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }
}
