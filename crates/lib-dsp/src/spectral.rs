//! Spectral engine: one- and two-dimensional transforms over a [`Dft`] handle.
//!
//! This module provides a high-level wrapper around an injected transform
//! backend with:
//! - Length-preserving forward/inverse transforms of sequences
//! - Real-to-complex and complex-to-real adapters
//! - Whole-array and single-axis transforms of 2D arrays
//! - Fractional-sample delay by a linear phase ramp
//!
//! # Axis convention
//!
//! Axes are logical, as in `array[[row, col]]`: axis 0 runs along the row
//! index (every column is transformed on its own), axis 1 runs along the
//! column index (every row is transformed on its own). Memory layout of the
//! array has no influence on the result.

use crate::dft::{Dft, RustFftDft};
use crate::error::{DspError, DspResult};
use ndarray::{Array1, Array2, ArrayViewMut1, Axis};
use num_complex::Complex64;
use std::f64::consts::PI;
use std::sync::Arc;

/// Imaginary residual (relative to the largest real sample) reported when
/// discarding the imaginary part of an inverse transform.
const IMAG_RESIDUAL_TOLERANCE: f64 = 1e-9;

/// Spectral engine over a shared transform backend.
#[derive(Clone)]
pub struct SpectralEngine {
    dft: Arc<dyn Dft>,
}

impl SpectralEngine {
    /// Create an engine over the given backend.
    pub fn new(dft: Arc<dyn Dft>) -> Self {
        Self { dft }
    }

    /// The backend handle.
    pub fn dft(&self) -> &Arc<dyn Dft> {
        &self.dft
    }

    /// Forward transform of a complex sequence.
    pub fn forward(&self, seq: &[Complex64]) -> DspResult<Vec<Complex64>> {
        let mut out = vec![Complex64::default(); seq.len()];
        self.dft.fwd1d(seq, &mut out)?;
        Ok(out)
    }

    /// Inverse transform of a spectrum (includes the `1/N` factor).
    pub fn inverse(&self, spec: &[Complex64]) -> DspResult<Vec<Complex64>> {
        let mut out = vec![Complex64::default(); spec.len()];
        self.dft.inv1d(spec, &mut out)?;
        Ok(out)
    }

    /// Forward transform of real samples.
    pub fn forward_r2c(&self, samples: &[f64]) -> DspResult<Vec<Complex64>> {
        self.forward(&to_complex(samples))
    }

    /// Inverse transform keeping only the real part.
    pub fn inverse_c2r(&self, spec: &[Complex64]) -> DspResult<Vec<f64>> {
        let seq = self.inverse(spec)?;
        log_imag_residual(&seq);
        Ok(seq.iter().map(|c| c.re).collect())
    }

    /// Transform both dimensions of a 2D array.
    pub fn forward_2d(&self, arr: &Array2<Complex64>) -> DspResult<Array2<Complex64>> {
        let rows = self.forward_axis(arr, 1)?;
        self.forward_axis(&rows, 0)
    }

    /// Inverse transform of both dimensions of a 2D array.
    pub fn inverse_2d(&self, arr: &Array2<Complex64>) -> DspResult<Array2<Complex64>> {
        let rows = self.inverse_axis(arr, 1)?;
        self.inverse_axis(&rows, 0)
    }

    /// Transform both dimensions of a real 2D array.
    pub fn forward_2d_r2c(&self, arr: &Array2<f64>) -> DspResult<Array2<Complex64>> {
        self.forward_2d(&arr.mapv(|re| Complex64::new(re, 0.0)))
    }

    /// Inverse transform of both dimensions, keeping only the real part.
    pub fn inverse_2d_c2r(&self, arr: &Array2<Complex64>) -> DspResult<Array2<f64>> {
        let out = self.inverse_2d(arr)?;
        log_imag_residual(out.as_slice_memory_order().unwrap_or(&[]));
        Ok(out.mapv(|c| c.re))
    }

    /// Transform every lane of a 2D array along one logical axis.
    pub fn forward_axis(
        &self,
        arr: &Array2<Complex64>,
        axis: usize,
    ) -> DspResult<Array2<Complex64>> {
        self.transform_axis(arr, axis, false)
    }

    /// Inverse transform every lane of a 2D array along one logical axis.
    pub fn inverse_axis(
        &self,
        arr: &Array2<Complex64>,
        axis: usize,
    ) -> DspResult<Array2<Complex64>> {
        self.transform_axis(arr, axis, true)
    }

    fn transform_axis(
        &self,
        arr: &Array2<Complex64>,
        axis: usize,
        inverse: bool,
    ) -> DspResult<Array2<Complex64>> {
        if axis > 1 {
            return Err(DspError::InvalidAxis(axis));
        }

        let mut out = arr.clone();
        for lane in out.lanes_mut(Axis(axis)) {
            self.transform_lane(lane, inverse)?;
        }
        Ok(out)
    }

    fn transform_lane(&self, mut lane: ArrayViewMut1<Complex64>, inverse: bool) -> DspResult<()> {
        // Lanes of non-contiguous axes are strided, so go through a packed copy.
        let input: Array1<Complex64> = lane.to_owned();
        let input = input.as_slice().unwrap_or(&[]);
        let mut output = vec![Complex64::default(); input.len()];

        if inverse {
            self.dft.inv1d(input, &mut output)?;
        } else {
            self.dft.fwd1d(input, &mut output)?;
        }

        for (dst, src) in lane.iter_mut().zip(output) {
            *dst = src;
        }
        Ok(())
    }
}

impl Default for SpectralEngine {
    fn default() -> Self {
        Self::new(RustFftDft::shared())
    }
}

/// Lift real samples to complex with zero imaginary part.
pub fn to_complex(samples: &[f64]) -> Vec<Complex64> {
    samples.iter().map(|&re| Complex64::new(re, 0.0)).collect()
}

/// Signed frequency of bin `k` in cycles per sample for an `n`-point transform.
///
/// Bins above `n/2` map to negative frequencies. For even `n` the Nyquist
/// bin is reported as `+0.5`.
#[inline]
pub fn bin_frequency(k: usize, n: usize) -> f64 {
    if k <= n / 2 {
        k as f64 / n as f64
    } else {
        k as f64 / n as f64 - 1.0
    }
}

/// Delay a spectrum by `delay` samples with a linear phase ramp.
///
/// A positive delay moves signal features to later sample indices
/// (`y[n] = x[n - delay]`, periodic). The Nyquist bin of an even-length
/// spectrum has no sign information, so it is scaled by `cos(π·delay)`
/// which keeps the delayed sequence of a real signal real.
pub fn fractional_delay(spectrum: &mut [Complex64], delay: f64) {
    let n = spectrum.len();
    for (k, bin) in spectrum.iter_mut().enumerate() {
        if n % 2 == 0 && k == n / 2 {
            *bin *= (PI * delay).cos();
        } else {
            let phase = -2.0 * PI * bin_frequency(k, n) * delay;
            *bin *= Complex64::from_polar(1.0, phase);
        }
    }
}

/// Zero-pad real samples to a specific length.
pub fn zero_pad(samples: &[f64], new_len: usize) -> Vec<f64> {
    let mut result = samples.to_vec();
    if new_len > samples.len() {
        result.resize(new_len, 0.0);
    }
    result
}

fn log_imag_residual(seq: &[Complex64]) {
    let max_re = seq.iter().map(|c| c.re.abs()).fold(0.0, f64::max);
    let max_im = seq.iter().map(|c| c.im.abs()).fold(0.0, f64::max);
    if max_im > IMAG_RESIDUAL_TOLERANCE * max_re.max(1.0) {
        tracing::trace!(
            "Discarding imaginary residual {:.3e} (max real {:.3e})",
            max_im,
            max_re
        );
    }
}
