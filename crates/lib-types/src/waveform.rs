//! Per-channel sample buffers and their summary statistics.
//!
//! A [`Signal`] holds the real-valued samples of one readout channel at a
//! uniform (unspecified) sample period. Sample `i` is the `i`-th digitized
//! value; no time axis is carried because every consumer in this workspace
//! works in sample-index units.

use std::collections::BTreeMap;

/// Identifier of a readout channel.
pub type ChannelId = i32;

/// Real samples of one channel.
pub type Signal = Vec<f64>;

/// Signals keyed by channel, iterated in ascending channel order.
pub type ChannelSignals = BTreeMap<ChannelId, Signal>;

/// Summary statistics over a run of samples.
///
/// Implemented for `[f64]` so that it applies to any `Signal` or slice of one.
pub trait SampleStats {
    /// Arithmetic mean, 0 for an empty run.
    fn mean(&self) -> f64;

    /// Root mean square value, 0 for an empty run.
    fn rms(&self) -> f64;

    /// Percentile in `[0, 1]` using the nearest-rank rule on a sorted copy.
    ///
    /// Returns 0 for an empty run.
    fn percentile(&self, fraction: f64) -> f64;

    /// Median (the 0.5 percentile).
    fn median(&self) -> f64 {
        self.percentile(0.5)
    }

    /// Outlier-tolerant RMS estimate: half the 16%–84% spread.
    ///
    /// For Gaussian noise this matches the standard deviation while staying
    /// insensitive to a few large signal excursions.
    fn robust_rms(&self) -> f64 {
        (self.percentile(0.841_344_746) - self.percentile(0.158_655_254)) / 2.0
    }

    /// Peak-to-peak amplitude, 0 for an empty run.
    fn peak_to_peak(&self) -> f64;
}

impl SampleStats for [f64] {
    fn mean(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.len() as f64
    }

    fn rms(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.iter().map(|v| v * v).sum();
        (sum_sq / self.len() as f64).sqrt()
    }

    fn percentile(&self, fraction: f64) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let mut sorted = self.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let fraction = fraction.clamp(0.0, 1.0);
        let rank = (fraction * (sorted.len() - 1) as f64).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }

    fn peak_to_peak(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let (min, max) = self
            .iter()
            .fold((f64::MAX, f64::MIN), |(min, max), &v| (min.min(v), max.max(v)));
        max - min
    }
}

/// Subtract a constant baseline from every sample.
pub fn subtract_baseline(signal: &mut [f64], baseline: f64) {
    for sample in signal.iter_mut() {
        *sample -= baseline;
    }
}

/// Scale every sample by a factor.
pub fn scale(signal: &mut [f64], factor: f64) {
    for sample in signal.iter_mut() {
        *sample *= factor;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_stats() {
        let samples = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        assert!((samples.mean() - 3.0).abs() < 1e-12);
        assert!((samples.median() - 3.0).abs() < 1e-12);
        assert!((samples.peak_to_peak() - 4.0).abs() < 1e-12);
        assert!((samples.rms() - 11.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_empty_stats() {
        let samples: Vec<f64> = Vec::new();
        assert_eq!(samples.mean(), 0.0);
        assert_eq!(samples.median(), 0.0);
        assert_eq!(samples.robust_rms(), 0.0);
    }

    #[test]
    fn test_robust_rms_ignores_outliers() {
        // Alternating +/-1 with one large spike.
        let mut samples: Vec<f64> = (0..200).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        samples[50] = 1000.0;

        assert!((samples.robust_rms() - 1.0).abs() < 1e-12);
        assert!(samples.rms() > 50.0);
    }

    #[test]
    fn test_baseline_and_scale() {
        let mut samples = vec![10.0, 12.0, 14.0];
        subtract_baseline(&mut samples, 12.0);
        assert_eq!(samples, vec![-2.0, 0.0, 2.0]);

        scale(&mut samples, 0.5);
        assert_eq!(samples, vec![-1.0, 0.0, 1.0]);
    }
}
