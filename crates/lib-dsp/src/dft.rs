//! Discrete Fourier transform capability.
//!
//! The [`Dft`] trait is the narrow seam through which every spectral operation
//! in this crate reaches a transform backend. Implementations perform
//! fixed-length complex transforms of caller-chosen length `N` over buffers
//! owned by the caller; they never pad, and never retain buffers.
//!
//! # Normalization
//!
//! The forward transform is unscaled and the inverse includes the `1/N`
//! factor, so `inv1d(fwd1d(x)) == x`.

use crate::error::{DspError, DspResult};
use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::sync::{Arc, Mutex, PoisonError};

/// Fixed-length complex DFT provider.
///
/// Implementations must be safe to call concurrently from several threads.
pub trait Dft: Send + Sync {
    /// Forward transform of `input` into `output` (same length).
    fn fwd1d(&self, input: &[Complex64], output: &mut [Complex64]) -> DspResult<()>;

    /// Inverse transform of `input` into `output` (same length), scaled by `1/N`.
    fn inv1d(&self, input: &[Complex64], output: &mut [Complex64]) -> DspResult<()>;
}

fn check_lengths(input: &[Complex64], output: &[Complex64]) -> DspResult<()> {
    if input.len() != output.len() {
        return Err(DspError::LengthMismatch {
            expected: input.len(),
            actual: output.len(),
        });
    }
    Ok(())
}

/// [`Dft`] backed by rustfft, with cached plans for every length seen.
pub struct RustFftDft {
    planner: Mutex<FftPlanner<f64>>,
}

impl RustFftDft {
    /// Create a new transform provider.
    pub fn new() -> Self {
        Self {
            planner: Mutex::new(FftPlanner::new()),
        }
    }

    /// Create a shareable handle.
    pub fn shared() -> Arc<dyn Dft> {
        Arc::new(Self::new())
    }

    fn plan(&self, len: usize, inverse: bool) -> Arc<dyn Fft<f64>> {
        // The planner only caches plans, so a poisoned lock still holds valid state.
        let mut planner = self.planner.lock().unwrap_or_else(PoisonError::into_inner);
        if inverse {
            planner.plan_fft_inverse(len)
        } else {
            planner.plan_fft_forward(len)
        }
    }
}

impl Default for RustFftDft {
    fn default() -> Self {
        Self::new()
    }
}

impl Dft for RustFftDft {
    fn fwd1d(&self, input: &[Complex64], output: &mut [Complex64]) -> DspResult<()> {
        check_lengths(input, output)?;
        if input.is_empty() {
            return Ok(());
        }

        output.copy_from_slice(input);
        self.plan(input.len(), false).process(output);
        Ok(())
    }

    fn inv1d(&self, input: &[Complex64], output: &mut [Complex64]) -> DspResult<()> {
        check_lengths(input, output)?;
        if input.is_empty() {
            return Ok(());
        }

        output.copy_from_slice(input);
        self.plan(input.len(), true).process(output);

        // Normalize
        let scale = 1.0 / input.len() as f64;
        for x in output.iter_mut() {
            *x *= scale;
        }
        Ok(())
    }
}

/// Direct O(N²) transform used to check that the backend seam is swappable.
#[cfg(test)]
pub(crate) mod naive {
    use super::*;
    use std::f64::consts::PI;

    pub(crate) struct NaiveDft;

    fn transform(input: &[Complex64], output: &mut [Complex64], sign: f64) {
        let n = input.len();
        for (k, out) in output.iter_mut().enumerate() {
            *out = input
                .iter()
                .enumerate()
                .map(|(j, x)| {
                    let angle = sign * 2.0 * PI * (j * k) as f64 / n as f64;
                    x * Complex64::from_polar(1.0, angle)
                })
                .sum();
        }
    }

    impl Dft for NaiveDft {
        fn fwd1d(&self, input: &[Complex64], output: &mut [Complex64]) -> DspResult<()> {
            check_lengths(input, output)?;
            transform(input, output, -1.0);
            Ok(())
        }

        fn inv1d(&self, input: &[Complex64], output: &mut [Complex64]) -> DspResult<()> {
            check_lengths(input, output)?;
            transform(input, output, 1.0);
            let scale = 1.0 / input.len().max(1) as f64;
            for x in output.iter_mut() {
                *x *= scale;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::naive::NaiveDft;
    use super::*;

    fn sample(n: usize) -> Vec<Complex64> {
        (0..n)
            .map(|i| Complex64::new((i as f64 * 0.7).sin(), (i as f64 * 0.3).cos()))
            .collect()
    }

    #[test]
    fn test_matches_naive_for_odd_length() {
        let dft = RustFftDft::new();
        let input = sample(15);

        let mut fast = vec![Complex64::default(); 15];
        let mut slow = vec![Complex64::default(); 15];
        dft.fwd1d(&input, &mut fast).unwrap();
        NaiveDft.fwd1d(&input, &mut slow).unwrap();

        for (a, b) in fast.iter().zip(slow.iter()) {
            assert!((a - b).norm() < 1e-9);
        }
    }

    #[test]
    fn test_inverse_is_normalized() {
        let dft = RustFftDft::new();

        // The spectrum of a unit impulse is all ones; its inverse must be the impulse again.
        let ones = vec![Complex64::new(1.0, 0.0); 8];
        let mut out = vec![Complex64::default(); 8];
        dft.inv1d(&ones, &mut out).unwrap();

        assert!((out[0].re - 1.0).abs() < 1e-12);
        for x in &out[1..] {
            assert!(x.norm() < 1e-12);
        }
    }

    #[test]
    fn test_length_mismatch() {
        let dft = RustFftDft::new();
        let input = sample(8);
        let mut out = vec![Complex64::default(); 4];

        let result = dft.fwd1d(&input, &mut out);
        assert!(matches!(
            result,
            Err(DspError::LengthMismatch { expected: 8, actual: 4 })
        ));
    }
}
