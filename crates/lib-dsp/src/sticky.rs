//! Sticky-sample mitigation.
//!
//! A sticky range is a run of samples where the digitizer repeated a fixed
//! code instead of tracking its input. Ranges are detected upstream and only
//! read here. Four independent strategies repair or re-time a signal:
//!
//! - [`linear_interp_sticky`]: straight-line bridge across ranges that look
//!   like a stuck level (time domain).
//! - [`fft_interp_sticky`]: rebuild flagged samples from the opposite-parity
//!   samples, resynthesized half a sample away (spectral).
//! - [`fft_shift_sticky`]: bridge ranges, then delay the whole signal by a
//!   fractional number of samples (spectral).
//! - [`fft_scaling`]: change the number of samples by padding or truncating
//!   the spectrum around Nyquist (spectral).
//!
//! Every strategy validates its ranges before touching the signal, so a
//! rejected call leaves the signal unchanged. Each returns whether it altered
//! anything.

use crate::error::{DspError, DspResult};
use crate::spectral::{fractional_delay, SpectralEngine};
use lib_types::StickyRange;
use num_complex::Complex64;

/// Shortest signal the even/odd spectral interpolation works on.
const MIN_FFT_INTERP_LEN: usize = 4;

/// Check that ranges are non-empty, inside `[0, len)`, ascending and disjoint.
pub fn validate_ranges(ranges: &[StickyRange], len: usize) -> DspResult<()> {
    let mut previous: Option<StickyRange> = None;
    for &range in ranges {
        if range.is_empty() || range.end > len {
            return Err(DspError::InvalidRange { range, len });
        }
        if let Some(previous) = previous {
            if range.start < previous.end {
                return Err(DspError::OverlappingRange { range, previous });
            }
        }
        previous = Some(range);
    }
    Ok(())
}

/// True if every sample in `range` lies within `sig_like_val ± sig_like_rms`.
///
/// A range outside the signal is never signal-like.
pub fn is_signal_like(
    signal: &[f64],
    range: StickyRange,
    sig_like_val: f64,
    sig_like_rms: f64,
) -> bool {
    signal
        .get(range.start..range.end)
        .map_or(false, |samples| {
            !samples.is_empty()
                && samples
                    .iter()
                    .all(|s| (s - sig_like_val).abs() <= sig_like_rms)
        })
}

/// Replace the samples of a range by a straight line between its neighbors.
///
/// A range at the start of the signal takes the value of the sample after
/// it; one at the end takes the value of the sample before it. Returns false
/// when the range has no neighbor at all.
fn bridge(signal: &mut [f64], range: StickyRange) -> bool {
    let before = range.start.checked_sub(1);
    let after = (range.end < signal.len()).then_some(range.end);

    match (before, after) {
        (Some(lo_idx), Some(hi_idx)) => {
            let lo = signal[lo_idx];
            let hi = signal[hi_idx];
            let span = (hi_idx - lo_idx) as f64;
            for i in range.indices() {
                signal[i] = lo + (hi - lo) * (i - lo_idx) as f64 / span;
            }
        }
        (None, Some(hi_idx)) => {
            let hi = signal[hi_idx];
            signal[range.start..range.end].fill(hi);
        }
        (Some(lo_idx), None) => {
            let lo = signal[lo_idx];
            signal[range.start..range.end].fill(lo);
        }
        (None, None) => return false,
    }
    true
}

/// Linearly interpolate across sticky ranges that sit at a stuck level.
///
/// Only ranges passing [`is_signal_like`] are bridged; the others are left
/// untouched.
pub fn linear_interp_sticky(
    signal: &mut [f64],
    ranges: &[StickyRange],
    sig_like_val: f64,
    sig_like_rms: f64,
) -> DspResult<bool> {
    validate_ranges(ranges, signal.len())?;

    let mut altered = false;
    for &range in ranges {
        if !is_signal_like(signal, range, sig_like_val, sig_like_rms) {
            tracing::debug!(
                "Sticky range {} not at level {} ± {}, left as is",
                range,
                sig_like_val,
                sig_like_rms
            );
            continue;
        }
        altered |= bridge(signal, range);
    }
    Ok(altered)
}

/// Resynthesize `seq` at positions shifted by `delay` samples.
fn resynthesize(engine: &SpectralEngine, seq: &[f64], delay: f64) -> DspResult<Vec<f64>> {
    let mut spectrum = engine.forward_r2c(seq)?;
    fractional_delay(&mut spectrum, delay);
    engine.inverse_c2r(&spectrum)
}

/// Rebuild flagged samples from the samples of the opposite parity.
///
/// The signal is split into its even and odd samples. Each half is
/// resynthesized half a sample away, which lands it on the positions of the
/// other half; flagged even samples take the odd-half estimate and flagged
/// odd samples the even-half estimate. Samples outside the ranges are not
/// modified.
pub fn fft_interp_sticky(
    engine: &SpectralEngine,
    signal: &mut [f64],
    ranges: &[StickyRange],
) -> DspResult<bool> {
    validate_ranges(ranges, signal.len())?;
    if ranges.is_empty() {
        return Ok(false);
    }
    if signal.len() < MIN_FFT_INTERP_LEN {
        tracing::debug!(
            "Signal of {} samples too short for spectral interpolation",
            signal.len()
        );
        return Ok(false);
    }

    let even: Vec<f64> = signal.iter().step_by(2).copied().collect();
    let odd: Vec<f64> = signal.iter().skip(1).step_by(2).copied().collect();

    // even(k + 1/2) sits on sample 2k+1, odd(k - 1/2) on sample 2k.
    let even_at_odd = resynthesize(engine, &even, -0.5)?;
    let odd_at_even = resynthesize(engine, &odd, 0.5)?;

    for &range in ranges {
        for i in range.indices() {
            let estimate = if i % 2 == 0 {
                odd_at_even.get(i / 2)
            } else {
                even_at_odd.get(i / 2)
            };
            // The last sample of an odd-length signal has no odd-half estimate.
            signal[i] = match estimate {
                Some(&value) => value,
                None => signal[i - 1],
            };
        }
    }
    Ok(true)
}

/// Bridge sticky ranges, then delay the whole signal by `toffset` samples.
///
/// Ranges are bridged without level classification so that stuck codes do
/// not ring through the phase ramp. A positive `toffset` moves features to
/// later samples; the shift is periodic over the signal length.
pub fn fft_shift_sticky(
    engine: &SpectralEngine,
    signal: &mut [f64],
    toffset: f64,
    ranges: &[StickyRange],
) -> DspResult<bool> {
    validate_ranges(ranges, signal.len())?;
    if !toffset.is_finite() {
        return Err(DspError::InvalidConfig(format!(
            "time offset must be finite, got {}",
            toffset
        )));
    }

    let mut altered = false;
    for &range in ranges {
        altered |= bridge(signal, range);
    }

    if toffset != 0.0 && !signal.is_empty() {
        let shifted = resynthesize(engine, signal, toffset)?;
        signal.copy_from_slice(&shifted);
        altered = true;
    }
    Ok(altered)
}

/// Resample a signal to `nsamples` by resizing its spectrum around Nyquist.
///
/// Upsampling zero-pads the spectrum between its positive and negative
/// halves; downsampling drops the bins above the new Nyquist. Amplitudes are
/// preserved. Returns false when the length already matches.
pub fn fft_scaling(
    engine: &SpectralEngine,
    signal: &mut Vec<f64>,
    nsamples: usize,
) -> DspResult<bool> {
    if nsamples == 0 {
        return Err(DspError::InvalidConfig(
            "Rescaled signal would have zero samples".into(),
        ));
    }
    let len = signal.len();
    if len == 0 {
        return Err(DspError::InsufficientData { needed: 1, got: 0 });
    }
    if len == nsamples {
        return Ok(false);
    }

    let spectrum = engine.forward_r2c(signal)?;
    let resized = resize_spectrum(&spectrum, nsamples);
    let mut rescaled = engine.inverse_c2r(&resized)?;

    let gain = nsamples as f64 / len as f64;
    for v in rescaled.iter_mut() {
        *v *= gain;
    }

    tracing::trace!("Rescaled signal from {} to {} samples", len, nsamples);
    *signal = rescaled;
    Ok(true)
}

/// Copy the bins below the smaller Nyquist into a spectrum of length `m`.
fn resize_spectrum(spectrum: &[Complex64], m: usize) -> Vec<Complex64> {
    let n = spectrum.len();
    let k = n.min(m);
    let mut out = vec![Complex64::default(); m];

    out[0] = spectrum[0];
    for b in 1..=(k - 1) / 2 {
        out[b] = spectrum[b];
        out[m - b] = spectrum[n - b];
    }

    if k % 2 == 0 {
        let h = k / 2;
        if n < m {
            // Split the old Nyquist bin over both signs.
            let half = spectrum[h] * 0.5;
            out[h] = half;
            out[m - h] = half;
        } else {
            // Fold both signs onto the new Nyquist bin.
            out[h] = Complex64::new((spectrum[h] + spectrum[n - h]).re, 0.0);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn engine() -> SpectralEngine {
        SpectralEngine::default()
    }

    fn tone(n: usize, cycles: &[f64]) -> Vec<f64> {
        (0..n)
            .map(|i| {
                cycles
                    .iter()
                    .map(|c| (2.0 * PI * c * i as f64 / n as f64).sin())
                    .sum()
            })
            .collect()
    }

    fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
        a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).fold(0.0, f64::max)
    }

    #[test]
    fn test_validate_ranges() {
        assert!(validate_ranges(&[StickyRange::new(1, 3), StickyRange::new(3, 5)], 5).is_ok());

        assert!(matches!(
            validate_ranges(&[StickyRange::new(4, 6)], 5),
            Err(DspError::InvalidRange { len: 5, .. })
        ));
        assert!(matches!(
            validate_ranges(&[StickyRange::new(2, 2)], 5),
            Err(DspError::InvalidRange { .. })
        ));
        assert!(matches!(
            validate_ranges(&[StickyRange::new(1, 4), StickyRange::new(3, 5)], 5),
            Err(DspError::OverlappingRange { .. })
        ));
    }

    #[test]
    fn test_linear_interp_flattens_stuck_level() {
        let mut signal = vec![0.0, 0.0, 0.0, 10.0, 10.0, 10.0, 10.0, 0.0, 0.0, 0.0];
        let ranges = [StickyRange::new(3, 7)];

        let altered = linear_interp_sticky(&mut signal, &ranges, 10.0, 1.0).unwrap();

        assert!(altered);
        assert_eq!(signal, vec![0.0; 10]);
    }

    #[test]
    fn test_linear_interp_leaves_other_levels() {
        let original = vec![0.0, 0.0, 0.0, 10.0, 10.0, 10.0, 10.0, 0.0, 0.0, 0.0];
        let mut signal = original.clone();

        let altered =
            linear_interp_sticky(&mut signal, &[StickyRange::new(3, 7)], 15.0, 2.0).unwrap();

        assert!(!altered);
        assert_eq!(signal, original);
    }

    #[test]
    fn test_linear_interp_is_monotonic_ramp() {
        let mut signal = vec![0.0, 0.0, 1.0, 10.5, 10.5, 10.5, 10.5, 11.0, 0.0, 0.0];
        linear_interp_sticky(&mut signal, &[StickyRange::new(3, 7)], 10.5, 1.0).unwrap();

        for i in 2..7 {
            assert!(signal[i + 1] > signal[i], "not increasing at {}: {:?}", i, signal);
        }
        assert!((signal[3] - 3.0).abs() < 1e-12);
        assert!((signal[6] - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_interp_edges() {
        let mut signal = vec![5.0, 5.0, 2.0, 3.0, 4.0, 5.0, 5.0];
        let ranges = [StickyRange::new(0, 2), StickyRange::new(5, 7)];

        assert!(linear_interp_sticky(&mut signal, &ranges, 5.0, 0.5).unwrap());
        assert_eq!(signal, vec![2.0, 2.0, 2.0, 3.0, 4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_linear_interp_whole_signal_untouched() {
        let mut signal = vec![7.0; 4];
        let altered = linear_interp_sticky(&mut signal, &[StickyRange::full(4)], 7.0, 0.1).unwrap();
        assert!(!altered);
        assert_eq!(signal, vec![7.0; 4]);
    }

    #[test]
    fn test_rejected_ranges_leave_signal_unchanged() {
        let original = vec![1.0, 2.0, 3.0];
        let mut signal = original.clone();
        let ranges = [StickyRange::new(1, 2), StickyRange::new(2, 9)];
        let result = linear_interp_sticky(&mut signal, &ranges, 2.0, 5.0);

        assert!(result.is_err());
        assert_eq!(signal, original);
    }

    #[test]
    fn test_fft_interp_restores_isolated_samples() {
        let clean = tone(64, &[3.0, 5.0]);
        let mut signal = clean.clone();
        signal[20] = 40.0;
        signal[40] = -40.0;

        let ranges = [StickyRange::new(20, 21), StickyRange::new(40, 41)];
        assert!(fft_interp_sticky(&engine(), &mut signal, &ranges).unwrap());

        assert!(max_abs_diff(&signal, &clean) < 1e-9);
    }

    #[test]
    fn test_fft_interp_restores_odd_sample() {
        let clean = tone(64, &[2.0]);
        let mut signal = clean.clone();
        signal[33] = 12.0;

        fft_interp_sticky(&engine(), &mut signal, &[StickyRange::new(33, 34)]).unwrap();
        assert!(max_abs_diff(&signal, &clean) < 1e-9);
    }

    #[test]
    fn test_fft_interp_only_touches_ranges() {
        let original: Vec<f64> = (0..21).map(|i| (i as f64 * 0.8).sin() * 4.0).collect();
        let mut signal = original.clone();

        let ranges = [StickyRange::new(8, 11), StickyRange::new(20, 21)];
        fft_interp_sticky(&engine(), &mut signal, &ranges).unwrap();

        for i in (0..8).chain(11..20) {
            assert_eq!(signal[i], original[i]);
        }
        assert!(signal.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_fft_shift_integer_offset() {
        let mut signal = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0];
        assert!(fft_shift_sticky(&engine(), &mut signal, 1.0, &[]).unwrap());

        let expected = [8.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert!(max_abs_diff(&signal, &expected) < 1e-10);
    }

    #[test]
    fn test_fft_shift_halves_compose() {
        let engine = engine();
        let clean = tone(32, &[1.0, 4.0]);

        let mut twice = clean.clone();
        fft_shift_sticky(&engine, &mut twice, 0.5, &[]).unwrap();
        fft_shift_sticky(&engine, &mut twice, 0.5, &[]).unwrap();

        let mut once = clean;
        fft_shift_sticky(&engine, &mut once, 1.0, &[]).unwrap();

        assert!(max_abs_diff(&twice, &once) < 1e-9);
    }

    #[test]
    fn test_fft_shift_bridges_without_offset() {
        let mut signal = vec![0.0, 1.0, 9.0, 9.0, 4.0, 5.0];
        let altered =
            fft_shift_sticky(&engine(), &mut signal, 0.0, &[StickyRange::new(2, 4)]).unwrap();

        assert!(altered);
        assert_eq!(signal, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_fft_shift_rejects_nan_offset() {
        let mut signal = vec![1.0; 4];
        assert!(matches!(
            fft_shift_sticky(&engine(), &mut signal, f64::NAN, &[]),
            Err(DspError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_fft_scaling_preserves_tone() {
        let mut signal = tone(64, &[4.0]);
        assert!(fft_scaling(&engine(), &mut signal, 128).unwrap());

        assert_eq!(signal.len(), 128);
        assert!(max_abs_diff(&signal, &tone(128, &[4.0])) < 1e-9);
    }

    #[test]
    fn test_fft_scaling_roundtrip_band_limited() {
        let engine = engine();
        let original = tone(64, &[1.0, 3.0, 5.0]);

        let mut signal = original.clone();
        fft_scaling(&engine, &mut signal, 100).unwrap();
        assert_eq!(signal.len(), 100);
        fft_scaling(&engine, &mut signal, 64).unwrap();

        assert_eq!(signal.len(), 64);
        let err = max_abs_diff(&signal, &original);
        assert!(err < 1e-6, "round-trip error {}", err);
    }

    #[test]
    fn test_fft_scaling_roundtrip_odd_lengths() {
        let engine = engine();
        let original = tone(45, &[2.0, 6.0]);

        let mut signal = original.clone();
        fft_scaling(&engine, &mut signal, 77).unwrap();
        fft_scaling(&engine, &mut signal, 45).unwrap();

        assert!(max_abs_diff(&signal, &original) < 1e-6);
    }

    #[test]
    fn test_fft_scaling_same_length_is_noop() {
        let mut signal = vec![1.0, 2.0, 3.0];
        assert!(!fft_scaling(&engine(), &mut signal, 3).unwrap());
        assert_eq!(signal, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_fft_scaling_zero_target() {
        let mut signal = vec![1.0, 2.0];
        assert!(matches!(
            fft_scaling(&engine(), &mut signal, 0),
            Err(DspError::InvalidConfig(_))
        ));
    }
}
