//! Alias-free linear convolution and response replacement.
//!
//! Both operations work on a single zero-padded transform whose length is
//! chosen so that the circular product equals the linear one: no sample of
//! the result wraps around. Callers should NOT pre-pad inputs and are free to
//! truncate the result afterwards.
//!
//! # Response replacement
//!
//! [`replace`] swaps one instrument response for another:
//!
//! ```text
//! out = ifft( fft(meas) * fft(res2) / fft(res1) ).re
//! ```
//!
//! Bins where `fft(res1)` is close to zero are handled by a
//! [`Regularization`] policy instead of producing NaN or infinities.

use crate::error::{DspError, DspResult};
use crate::spectral::{zero_pad, SpectralEngine};
use num_complex::Complex64;

/// Policy for near-zero bins of the divisor spectrum in [`replace`].
///
/// The floor is relative: a bin is "near zero" when its magnitude is below
/// `epsilon` times the largest magnitude in the divisor spectrum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Regularization {
    /// Raise near-zero bins to the floor magnitude, keeping their phase.
    Floor { epsilon: f64 },

    /// Fail with [`DspError::NumericalSingularity`] on the first near-zero bin.
    Strict { epsilon: f64 },
}

impl Regularization {
    /// Relative floor used when none is given.
    pub const DEFAULT_EPSILON: f64 = 1e-6;

    fn epsilon(&self) -> f64 {
        match *self {
            Regularization::Floor { epsilon } | Regularization::Strict { epsilon } => epsilon,
        }
    }
}

impl Default for Regularization {
    fn default() -> Self {
        Regularization::Floor {
            epsilon: Self::DEFAULT_EPSILON,
        }
    }
}

/// Direct convolution (for comparison/validation).
///
/// This is O(n*m) and should only be used for short signals.
pub fn direct_convolve(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    if signal.is_empty() || kernel.is_empty() {
        return Vec::new();
    }
    let output_len = signal.len() + kernel.len() - 1;
    let mut output = vec![0.0; output_len];

    for (i, &s) in signal.iter().enumerate() {
        for (j, &k) in kernel.iter().enumerate() {
            output[i + j] += s * k;
        }
    }

    output
}

/// Alias-free linear convolution of `a` and `b`.
///
/// The result has `a.len() + b.len() - 1` samples.
pub fn convolve(engine: &SpectralEngine, a: &[f64], b: &[f64]) -> DspResult<Vec<f64>> {
    let got = a.len().min(b.len());
    if got == 0 {
        return Err(DspError::InsufficientData { needed: 1, got });
    }
    let output_len = a.len() + b.len() - 1;

    let mut spec_a = engine.forward_r2c(&zero_pad(a, output_len))?;
    let spec_b = engine.forward_r2c(&zero_pad(b, output_len))?;

    // Multiply
    for (x, y) in spec_a.iter_mut().zip(spec_b.iter()) {
        *x *= *y;
    }

    engine.inverse_c2r(&spec_a)
}

/// Length that keeps [`replace`] free of periodic aliasing.
///
/// This is the sum of the two longest input lengths less one.
pub fn replace_len(meas: usize, res1: usize, res2: usize) -> usize {
    let mut lens = [meas, res1, res2];
    lens.sort_unstable_by(|a, b| b.cmp(a));
    (lens[0] + lens[1]).saturating_sub(1)
}

/// Replace response `res1` in `meas` with response `res2`.
///
/// All three inputs are zero-padded to [`replace_len`] samples. The returned
/// vector has that length; truncation is up to the caller.
pub fn replace(
    engine: &SpectralEngine,
    meas: &[f64],
    res1: &[f64],
    res2: &[f64],
    regularization: Regularization,
) -> DspResult<Vec<f64>> {
    let got = meas.len().min(res1.len()).min(res2.len());
    if got == 0 {
        return Err(DspError::InsufficientData { needed: 1, got });
    }
    let size = replace_len(meas.len(), res1.len(), res2.len());

    let mut spec = engine.forward_r2c(&zero_pad(meas, size))?;
    let mut divisor = engine.forward_r2c(&zero_pad(res1, size))?;
    let spec2 = engine.forward_r2c(&zero_pad(res2, size))?;

    regularize(&mut divisor, regularization)?;

    for ((m, r1), r2) in spec.iter_mut().zip(divisor.iter()).zip(spec2.iter()) {
        *m = *m * *r2 / *r1;
    }

    engine.inverse_c2r(&spec)
}

/// Apply the regularization policy to a divisor spectrum in place.
fn regularize(divisor: &mut [Complex64], regularization: Regularization) -> DspResult<()> {
    let max_mag = divisor.iter().map(|c| c.norm()).fold(0.0, f64::max);
    if max_mag == 0.0 || !max_mag.is_finite() {
        return Err(DspError::NumericalSingularity {
            bin: 0,
            magnitude: max_mag,
        });
    }

    let floor = regularization.epsilon() * max_mag;
    let mut floored = 0usize;

    for (bin, value) in divisor.iter_mut().enumerate() {
        let magnitude = value.norm();
        if magnitude >= floor {
            continue;
        }
        match regularization {
            Regularization::Strict { .. } => {
                return Err(DspError::NumericalSingularity { bin, magnitude });
            }
            Regularization::Floor { .. } => {
                let phase = if magnitude > 0.0 { value.arg() } else { 0.0 };
                *value = Complex64::from_polar(floor, phase);
                floored += 1;
            }
        }
    }

    if floored > 0 {
        tracing::debug!(
            "Response replacement: floored {} of {} divisor bins at |H| = {:.3e}",
            floored,
            divisor.len(),
            floor
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> SpectralEngine {
        SpectralEngine::default()
    }

    fn assert_close(a: &[f64], b: &[f64], tol: f64) {
        assert_eq!(a.len(), b.len());
        for (i, (x, y)) in a.iter().zip(b.iter()).enumerate() {
            assert!((x - y).abs() < tol, "Mismatch at index {}: {} vs {}", i, x, y);
        }
    }

    #[test]
    fn test_direct_convolve_shift() {
        // Convolving with [0, 1] should shift by one sample
        let signal = vec![1.0, 2.0, 3.0, 4.0];
        let kernel = vec![0.0, 1.0];

        let result = direct_convolve(&signal, &kernel);
        assert_eq!(result, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_convolve_matches_direct() {
        let signal = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        let kernel = vec![1.0, 0.5, 0.25];

        let direct = direct_convolve(&signal, &kernel);
        let spectral = convolve(&engine(), &signal, &kernel).unwrap();
        assert_close(&direct, &spectral, 1e-10);
    }

    #[test]
    fn test_convolve_length_and_commutativity() {
        let engine = engine();
        let a: Vec<f64> = (0..13).map(|i| (i as f64 * 0.4).sin()).collect();
        let b: Vec<f64> = (0..6).map(|i| (-(i as f64) * 0.5).exp()).collect();

        let ab = convolve(&engine, &a, &b).unwrap();
        let ba = convolve(&engine, &b, &a).unwrap();

        assert_eq!(ab.len(), a.len() + b.len() - 1);
        assert_close(&ab, &ba, 1e-10);
    }

    #[test]
    fn test_convolve_has_no_wraparound() {
        // A late impulse convolved with a long tail must not fold back to the start.
        let mut a = vec![0.0; 8];
        a[7] = 1.0;
        let b = vec![1.0; 5];

        let out = convolve(&engine(), &a, &b).unwrap();
        assert_close(&out[..7], &[0.0; 7], 1e-10);
        assert_close(&out[7..], &[1.0; 5], 1e-10);
    }

    #[test]
    fn test_convolve_empty_input() {
        let result = convolve(&engine(), &[], &[1.0]);
        assert!(matches!(result, Err(DspError::InsufficientData { needed: 1, got: 0 })));
    }

    #[test]
    fn test_replace_len() {
        assert_eq!(replace_len(10, 2, 3), 12);
        assert_eq!(replace_len(4, 9, 1), 12);
    }

    #[test]
    fn test_replace_same_response_is_identity() {
        let meas: Vec<f64> = (0..10).map(|i| (i as f64 * 0.9).cos() * 3.0).collect();
        let res = vec![1.0, 0.5];

        let out = replace(&engine(), &meas, &res, &res, Regularization::default()).unwrap();

        assert_eq!(out.len(), 11);
        assert_close(&out[..10], &meas, 1e-9);
        assert!(out[10].abs() < 1e-9);
    }

    #[test]
    fn test_replace_delta_is_convolution() {
        let engine = engine();
        let meas: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let res2 = vec![0.2, 0.5, 0.3];

        let replaced = replace(&engine, &meas, &[1.0], &res2, Regularization::default()).unwrap();
        let convolved = convolve(&engine, &meas, &res2).unwrap();
        assert_close(&replaced, &convolved, 1e-9);
    }

    #[test]
    fn test_replace_strict_rejects_zero_bin() {
        // [1, 1] has a zero at the Nyquist bin of an even-length transform.
        let meas = vec![1.0; 9];
        let res1 = vec![1.0, 1.0];

        let result = replace(
            &engine(),
            &meas,
            &res1,
            &[1.0],
            Regularization::Strict { epsilon: 1e-6 },
        );
        assert!(matches!(result, Err(DspError::NumericalSingularity { bin: 5, .. })));
    }

    #[test]
    fn test_replace_floor_stays_finite() {
        let meas = vec![1.0; 9];
        let res1 = vec![1.0, 1.0];

        let out = replace(&engine(), &meas, &res1, &[1.0], Regularization::default()).unwrap();
        assert_eq!(out.len(), 10);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_replace_all_zero_divisor() {
        let result = replace(
            &engine(),
            &[1.0, 2.0],
            &[0.0, 0.0],
            &[1.0],
            Regularization::default(),
        );
        assert!(matches!(result, Err(DspError::NumericalSingularity { .. })));
    }
}
