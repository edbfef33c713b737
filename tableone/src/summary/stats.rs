//! Descriptive statistics for continuous fields.
//!
//! - Mean: Kahan compensated summation.
//! - Variance: Welford's online algorithm, sample (n - 1) denominator.
//! - Quantiles: linear interpolation between order statistics (R type 7).

use serde::Serialize;

/// Continuous summary of one field within one stratum.
///
/// Statistics that are undefined for the sample size are `None`
/// (everything for n = 0, the SD for n = 1).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinuousSummary {
    pub n: usize,
    pub mean: Option<f64>,
    pub sd: Option<f64>,
    pub median: Option<f64>,
    pub q1: Option<f64>,
    pub q3: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl ContinuousSummary {
    /// Summarize non-missing values. Non-finite values are ignored.
    pub fn compute(values: &[f64]) -> Self {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        Self {
            n: sorted.len(),
            mean: mean(&sorted),
            sd: std_dev(&sorted),
            median: quantile_sorted(&sorted, 0.5),
            q1: quantile_sorted(&sorted, 0.25),
            q3: quantile_sorted(&sorted, 0.75),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
        }
    }
}

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(kahan_sum(data) / data.len() as f64)
}

/// Sample standard deviation, `None` when fewer than two values.
pub fn std_dev(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let mut acc = Welford::default();
    for &x in data {
        acc.update(x);
    }
    Some((acc.m2 / (acc.count - 1) as f64).sqrt())
}

/// Quantile of already sorted data using R type 7 interpolation.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() || !(0.0..=1.0).contains(&p) {
        return None;
    }
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    Some(sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo]))
}

fn kahan_sum(data: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut c = 0.0;
    for &x in data {
        let y = x - c;
        let t = sum + y;
        c = (t - sum) - y;
        sum = t;
    }
    sum
}

#[derive(Default)]
struct Welford {
    count: usize,
    mean: f64,
    m2: f64,
}

impl Welford {
    fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_sd() {
        let v = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert!((mean(&v).unwrap() - 5.0).abs() < 1e-12);
        assert!((std_dev(&v).unwrap() - 2.138089935299395).abs() < 1e-10);
    }

    #[test]
    fn test_quantiles_type7() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&v, 0.5), Some(2.5));
        assert_eq!(quantile_sorted(&v, 0.25), Some(1.75));
        assert_eq!(quantile_sorted(&v, 0.75), Some(3.25));
    }

    #[test]
    fn test_small_samples() {
        let empty = ContinuousSummary::compute(&[]);
        assert_eq!(empty.n, 0);
        assert_eq!(empty.mean, None);
        assert_eq!(empty.median, None);

        let single = ContinuousSummary::compute(&[42.0]);
        assert_eq!(single.mean, Some(42.0));
        assert_eq!(single.sd, None);
        assert_eq!(single.q1, Some(42.0));
    }

    #[test]
    fn test_compute_ignores_order() {
        let a = ContinuousSummary::compute(&[50.0, 31.0, 32.0, 21.0, 33.0]);
        let b = ContinuousSummary::compute(&[21.0, 31.0, 32.0, 33.0, 50.0]);
        assert_eq!(a, b);
        assert_eq!(a.min, Some(21.0));
        assert_eq!(a.max, Some(50.0));
        assert_eq!(a.median, Some(32.0));
    }
}
