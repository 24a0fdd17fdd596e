//! Running mean / variance / extremes over a stream of samples.
//!
//! Welford's update keeps the variance numerically stable for long streams
//! (background levels of 10⁴ ADU with noise of a few ADU), and two
//! accumulators can be merged (Chan et al.) so per-ring or per-chunk
//! statistics combine without revisiting samples.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulator {
    count: u64,
    mean: f64,
    m2: f64,
    peak: f64,
    min: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Accumulator {
    pub const fn new() -> Self {
        Self {
            count: 0,
            mean: 0.0,
            m2: 0.0,
            peak: f64::NEG_INFINITY,
            min: f64::INFINITY,
        }
    }

    /// Adds one sample. NaN samples are ignored.
    #[inline]
    pub fn push(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.peak = self.peak.max(value);
        self.min = self.min.min(value);
    }

    /// Combines the samples of `other` into `self`.
    pub fn merge(&mut self, other: &Accumulator) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        self.mean += delta * other.count as f64 / count as f64;
        self.m2 += other.m2 + delta * delta * (self.count as f64 * other.count as f64) / count as f64;
        self.count = count;
        self.peak = self.peak.max(other.peak);
        self.min = self.min.min(other.min);
    }

    #[inline]
    pub fn count(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean of the samples, NaN when empty.
    pub fn mean(&self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.mean }
    }

    /// Population variance, NaN when empty.
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.m2 / self.count as f64
        }
    }

    /// Sample (Bessel-corrected) variance, NaN with fewer than two samples.
    pub fn sample_variance(&self) -> f64 {
        if self.count < 2 {
            f64::NAN
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Largest sample, NaN when empty.
    pub fn peak(&self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.peak }
    }

    /// Smallest sample, NaN when empty.
    pub fn min(&self) -> f64 {
        if self.count == 0 { f64::NAN } else { self.min }
    }
}

impl Extend<f64> for Accumulator {
    fn extend<I: IntoIterator<Item = f64>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl FromIterator<f64> for Accumulator {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut acc = Accumulator::new();
        acc.extend(iter);
        acc
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_accumulator_reports_nan() {
        let acc = Accumulator::new();
        assert!(acc.is_empty());
        assert!(acc.mean().is_nan());
        assert!(acc.variance().is_nan());
        assert!(acc.peak().is_nan());
        assert!(acc.min().is_nan());
    }

    #[test]
    fn mean_variance_and_extremes() {
        let acc: Accumulator = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter().collect();
        assert_eq!(acc.count(), 8);
        assert!((acc.mean() - 5.0).abs() < 1e-12);
        assert!((acc.variance() - 4.0).abs() < 1e-12);
        assert!((acc.std_dev() - 2.0).abs() < 1e-12);
        assert!((acc.sample_variance() - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(acc.peak(), 9.0);
        assert_eq!(acc.min(), 2.0);
    }

    #[test]
    fn nan_samples_are_skipped() {
        let acc: Accumulator = [1.0, f64::NAN, 3.0].into_iter().collect();
        assert_eq!(acc.count(), 2);
        assert!((acc.mean() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn large_offset_keeps_precision() {
        let acc: Accumulator = (0..1000)
            .map(|i| 1.0e9 + if i % 2 == 0 { 1.0 } else { -1.0 })
            .collect();
        assert!((acc.variance() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn merge_matches_single_pass() {
        let values: Vec<f64> = (0..37).map(|i| (i as f64 * 0.7).sin() * 10.0 + 3.0).collect();
        let whole: Accumulator = values.iter().copied().collect();

        let mut left: Accumulator = values[..11].iter().copied().collect();
        let right: Accumulator = values[11..].iter().copied().collect();
        left.merge(&right);

        assert_eq!(left.count(), whole.count());
        assert!((left.mean() - whole.mean()).abs() < 1e-9);
        assert!((left.variance() - whole.variance()).abs() < 1e-9);
        assert_eq!(left.peak(), whole.peak());
        assert_eq!(left.min(), whole.min());
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let mut acc: Accumulator = [1.0, 2.0].into_iter().collect();
        let before = acc;
        acc.merge(&Accumulator::new());
        assert_eq!(acc, before);

        let mut empty = Accumulator::new();
        empty.merge(&before);
        assert_eq!(empty, before);
    }
}
