//! Sample statistics for bootstrap reduction.

/// `1/2 + erf(1/√2)/2`: the standard normal CDF at one sigma.
pub const ONE_SIGMA_QUANTILE: f64 = 0.841_344_746_068_542_9;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Quantile with linear interpolation between order statistics
/// (`h = (n - 1) q`).
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() || !(0.0..=1.0).contains(&q) {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let h = (sorted.len() - 1) as f64 * q;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

/// Standard error of the mean, `s / √n` with the `n − 1` sample deviation.
/// Needs at least two values.
pub fn standard_error(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / (n - 1.0);
    Some((var / n).sqrt())
}

/// Root-sum-square of uncertainties divided by their count: the uncertainty
/// of a mean of independent estimates.
pub fn mean_uncertainty(uncertainties: &[f64]) -> Option<f64> {
    if uncertainties.is_empty() {
        return None;
    }
    let rss = uncertainties.iter().map(|u| u * u).sum::<f64>().sqrt();
    Some(rss / uncertainties.len() as f64)
}
