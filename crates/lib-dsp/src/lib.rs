//! # lib-dsp
//!
//! Spectral processing core for detector-channel waveforms.
//!
//! This crate provides the mathematical core for channel filtering:
//!
//! - **DFT capability**: the pluggable transform backend seam, with a rustfft implementation
//! - **Spectral engine**: 1D and 2D (whole-array or single-axis) transforms, real/complex adapters
//! - **Convolution**: alias-free linear convolution and response replacement
//! - **Sticky mitigation**: linear and spectral repair of stuck-code sample runs,
//!   fractional-sample re-timing and spectral length rescaling

pub mod error;
pub mod dft;
pub mod spectral;
pub mod convolution;
pub mod sticky;

pub use error::{DspError, DspResult};
pub use dft::{Dft, RustFftDft};
pub use spectral::SpectralEngine;
pub use convolution::{convolve, replace, Regularization};
pub use sticky::{fft_interp_sticky, fft_scaling, fft_shift_sticky, linear_interp_sticky};
