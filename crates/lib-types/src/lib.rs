//! # lib-types
//!
//! Core type definitions shared by the channel filtering workspace:
//! - Per-channel signals and sample statistics
//! - Half-open sample ranges (sticky ranges, mask ranges)
//! - Channel mask maps recording what processing altered

pub mod waveform;
pub mod range;
pub mod mask;

pub use waveform::*;
pub use range::*;
pub use mask::*;

/// Re-export num_complex for convenience
pub use num_complex::Complex64;
