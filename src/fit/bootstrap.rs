//! Semi-parametric bootstrap for decay fits.
//!
//! Each resample:
//! 1. draws, per sequence length, as many repetitions (with replacement) as
//!    were observed;
//! 2. redraws every picked count as `Binomial(shots, count / shots)` to add
//!    shot noise;
//! 3. averages to one survival frequency per length and refits.
//!
//! The resampled metrics are reduced to reflected percentile bounds
//! `2·mean − quantile(p)` / `2·mean − quantile(1 − p)` with `p` the one-sigma
//! normal quantile. With few resamples or noisy data these bounds can exclude
//! the point estimate; that is a property of the construction and is kept.
//!
//! Resamples are independent. Every resample gets its own `StdRng` seeded
//! from a master generator, and results are collected in resample order, so a
//! fixed seed gives identical output whether or not rayon runs them in
//! parallel.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_distr::{Binomial, Distribution};
use rayon::prelude::*;
use tracing::debug;

use crate::domain::{Interval, MetricPair, SurvivalTable};
use crate::error::{AppError, AppResult};
use crate::fit::fitter::fit_raw;
use crate::math::{LmOptions, ONE_SIGMA_QUANTILE, mean, quantile};
use crate::models::DecayModel;

/// Key prefix for intercept bounds in [`BootstrapBounds::to_map`]; the
/// intercept is read as a SPAM-like level for every model.
pub const INTERCEPT_KEY: &str = "SPAM";
pub const FIDELITY_KEY: &str = "Avg. fidelity";

/// Resampling configuration.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    pub resamples: usize,
    /// Master seed. `None` draws one from the thread RNG, making the run
    /// non-reproducible.
    pub seed: Option<u64>,
    pub lm: LmOptions,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            resamples: 1000,
            seed: None,
            lm: LmOptions::default(),
        }
    }
}

impl BootstrapOptions {
    pub fn seeded(resamples: usize, seed: u64) -> Self {
        Self {
            resamples,
            seed: Some(seed),
            ..Self::default()
        }
    }
}

/// Bounds for both metrics of a decay fit.
#[derive(Debug, Clone)]
pub struct BootstrapBounds {
    pub model: DecayModel,
    pub intercept: Interval,
    pub fidelity: Interval,
    /// Resampled metric pairs, in resample order.
    pub samples: Vec<MetricPair>,
}

impl BootstrapBounds {
    /// Fixed-key view: `"SPAM lower"`, `"SPAM upper"`, `"Avg. fidelity lower"`
    /// and `"Avg. fidelity upper"`, whatever the model.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        BTreeMap::from([
            (format!("{INTERCEPT_KEY} lower"), self.intercept.lower),
            (format!("{INTERCEPT_KEY} upper"), self.intercept.upper),
            (format!("{FIDELITY_KEY} lower"), self.fidelity.lower),
            (format!("{FIDELITY_KEY} upper"), self.fidelity.upper),
        ])
    }
}

/// Run the bootstrap for one survival table.
pub fn bootstrap(
    table: &SurvivalTable,
    shots: u32,
    model: DecayModel,
    opts: &BootstrapOptions,
) -> AppResult<BootstrapBounds> {
    if opts.resamples == 0 {
        return Err(AppError::invalid("Bootstrap needs at least one resample."));
    }
    if shots == 0 {
        return Err(AppError::invalid("Shot count must be > 0."));
    }

    let master_seed = opts.seed.unwrap_or_else(|| rand::thread_rng().next_u64());
    let mut master = StdRng::seed_from_u64(master_seed);
    let seeds: Vec<u64> = (0..opts.resamples).map(|_| master.next_u64()).collect();
    let lengths = table.lengths();

    debug!(
        model = %model.display_name(),
        resamples = opts.resamples,
        seed = master_seed,
        "starting bootstrap"
    );

    // Any failed resample fails the whole run; skipping would bias the bounds.
    let samples: Vec<MetricPair> = seeds
        .par_iter()
        .map(|&seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let freqs = resample_freqs(table, shots, &mut rng)?;
            fit_raw(model, &lengths, &freqs, &opts.lm).map(|fit| fit.metric)
        })
        .collect::<AppResult<Vec<_>>>()?;

    let intercepts: Vec<f64> = samples.iter().map(|s| s.intercept).collect();
    let fidelities: Vec<f64> = samples.iter().map(|s| s.fidelity).collect();
    let intercept = reflected_interval(&intercepts)
        .ok_or_else(|| AppError::invalid("Bootstrap produced no samples."))?;
    let fidelity = reflected_interval(&fidelities)
        .ok_or_else(|| AppError::invalid("Bootstrap produced no samples."))?;

    debug!(
        model = %model.display_name(),
        fidelity_lower = fidelity.lower,
        fidelity_upper = fidelity.upper,
        "bootstrap finished"
    );

    Ok(BootstrapBounds {
        model,
        intercept,
        fidelity,
        samples,
    })
}

/// One resampled survival frequency per sequence length, in length order.
pub fn resample_freqs<R: Rng>(
    table: &SurvivalTable,
    shots: u32,
    rng: &mut R,
) -> AppResult<Vec<f64>> {
    let n = f64::from(shots);
    let mut out = Vec::with_capacity(table.rows().len());
    for counts in table.rows().values() {
        let reps = counts.len();
        let mut total: u64 = 0;
        for _ in 0..reps {
            let picked = counts[rng.gen_range(0..reps)];
            let binomial = Binomial::new(u64::from(shots), f64::from(picked) / n)
                .map_err(|e| AppError::invalid(format!("Invalid binomial parameters: {e}")))?;
            total += binomial.sample(rng);
        }
        out.push(total as f64 / reps as f64 / n);
    }
    Ok(out)
}

/// `(2·mean − q(p), 2·mean − q(1 − p))` for the one-sigma quantile `p`.
pub fn reflected_interval(samples: &[f64]) -> Option<Interval> {
    let mean = mean(samples)?;
    Some(Interval {
        lower: 2.0 * mean - quantile(samples, ONE_SIGMA_QUANTILE)?,
        upper: 2.0 * mean - quantile(samples, 1.0 - ONE_SIGMA_QUANTILE)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::fitter::fit_decay;

    fn rb_table() -> SurvivalTable {
        SurvivalTable::new(
            BTreeMap::from([
                (1, vec![100, 100, 100, 100, 100]),
                (5, vec![83, 81, 85, 82, 84]),
                (10, vec![70, 68, 71, 69, 67]),
                (20, vec![57, 55, 58, 56, 59]),
            ]),
            100,
        )
        .unwrap()
    }

    #[test]
    fn single_resample_collapses_to_that_fit() {
        let table = rb_table();
        let model = DecayModel::Rb { qubits: 1 };
        let bounds = bootstrap(&table, 100, model, &BootstrapOptions::seeded(1, 7)).unwrap();

        assert_eq!(bounds.intercept.lower, bounds.intercept.upper);
        assert_eq!(bounds.fidelity.lower, bounds.fidelity.upper);

        // Rebuild the one resample by hand.
        let mut master = StdRng::seed_from_u64(7);
        let mut rng = StdRng::seed_from_u64(master.next_u64());
        let freqs = resample_freqs(&table, 100, &mut rng).unwrap();
        let metric = fit_decay(model, &table.lengths(), &freqs).unwrap();
        assert_eq!(bounds.fidelity.lower, metric.fidelity);
        assert_eq!(bounds.intercept.upper, metric.intercept);
    }

    #[test]
    fn seeded_runs_are_reproducible() {
        let table = rb_table();
        let model = DecayModel::Rb { qubits: 1 };
        let opts = BootstrapOptions::seeded(50, 1234);
        let a = bootstrap(&table, 100, model, &opts).unwrap();
        let b = bootstrap(&table, 100, model, &opts).unwrap();
        assert_eq!(a.intercept, b.intercept);
        assert_eq!(a.fidelity, b.fidelity);
        assert_eq!(a.samples, b.samples);
    }

    #[test]
    fn end_to_end_single_group() {
        let table = rb_table();
        let model = DecayModel::Rb { qubits: 1 };
        let point = fit_decay(model, &table.lengths(), &table.survival_freqs(100)).unwrap();
        let infidelity = 1.0 - point.fidelity;
        assert!(infidelity > 0.0 && infidelity < 0.5, "infidelity {infidelity}");

        let bounds = bootstrap(&table, 100, model, &BootstrapOptions::seeded(1000, 2024)).unwrap();
        assert_eq!(bounds.samples.len(), 1000);
        let plausible = bounds
            .samples
            .iter()
            .filter(|s| (0.0..0.5).contains(&(1.0 - s.fidelity)))
            .count();
        assert!(plausible >= 950, "only {plausible} plausible resamples");
        assert!(bounds.fidelity.contains(point.fidelity), "{:?} vs {}", bounds.fidelity, point.fidelity);
        assert!(bounds.fidelity.half_width() > 0.0);
    }

    /// One noisy repetition per length; full survival at the short lengths.
    fn crosstalk_table(shots: u32, counts: [u32; 5]) -> SurvivalTable {
        let rows = [1, 100, 500, 1000, 2000].into_iter().zip(counts).map(|(m, c)| (m, vec![c])).collect();
        SurvivalTable::new(rows, shots).unwrap()
    }

    #[test]
    fn crosstalk_bootstrap_survives_offsets_on_the_bound() {
        let cases = [
            (DecayModel::MeasurementCrosstalk, 100, [100, 100, 96, 93, 88]),
            (DecayModel::ResetCrosstalk, 500, [500, 497, 473, 458, 414]),
        ];
        for (model, shots, counts) in cases {
            let table = crosstalk_table(shots, counts);
            let bounds = bootstrap(&table, shots, model, &BootstrapOptions::seeded(1000, 3))
                .unwrap_or_else(|e| panic!("{model:?}: {e}"));
            assert_eq!(bounds.samples.len(), 1000);
            let on_bound = bounds.samples.iter().filter(|s| s.intercept == 1.0).count();
            assert!(on_bound > 100, "{model:?}: only {on_bound} resamples on the offset bound");
            assert!(bounds.fidelity.half_width() > 0.0, "{model:?}");
            assert!(bounds.samples.iter().all(|s| s.fidelity > 0.999 && s.fidelity <= 1.0), "{model:?}");
        }
    }

    #[test]
    fn failed_resample_aborts_bootstrap() {
        // Every shot survives at every length: resampled curves are flat.
        let table = SurvivalTable::new(
            BTreeMap::from([(1, vec![50, 50]), (5, vec![50, 50]), (10, vec![50, 50])]),
            50,
        )
        .unwrap();
        let err = bootstrap(&table, 50, DecayModel::Rb { qubits: 1 }, &BootstrapOptions::seeded(10, 1))
            .unwrap_err();
        assert!(err.is_fit_failure());
    }

    #[test]
    fn zero_resamples_is_invalid() {
        let err = bootstrap(&rb_table(), 100, DecayModel::Rb { qubits: 1 }, &BootstrapOptions::seeded(0, 1))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn resampling_keeps_frequencies_in_range() {
        let table = rb_table();
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..20 {
            let freqs = resample_freqs(&table, 100, &mut rng).unwrap();
            assert_eq!(freqs.len(), 4);
            // Length 1 only ever saw full survival.
            assert_eq!(freqs[0], 1.0);
            assert!(freqs.iter().all(|f| (0.0..=1.0).contains(f)));
        }
    }

    #[test]
    fn bound_map_uses_fixed_keys() {
        let keys = ["SPAM lower", "SPAM upper", "Avg. fidelity lower", "Avg. fidelity upper"];
        let rb = bootstrap(&rb_table(), 100, DecayModel::Rb { qubits: 1 }, &BootstrapOptions::seeded(5, 3))
            .unwrap();
        let crosstalk = crosstalk_table(100, [100, 100, 96, 93, 88]);
        let decay = bootstrap(&crosstalk, 100, DecayModel::MeasurementCrosstalk, &BootstrapOptions::seeded(5, 3))
            .unwrap();
        for bounds in [rb, decay] {
            let map = bounds.to_map();
            assert_eq!(map.len(), 4);
            for key in keys {
                assert!(map.contains_key(key), "{:?} missing {key}", bounds.model);
            }
        }
    }
}
