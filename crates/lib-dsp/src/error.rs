//! Error types for DSP operations.

use lib_types::SampleRange;
use thiserror::Error;

/// Errors that can occur during DSP operations.
#[derive(Debug, Error)]
pub enum DspError {
    /// Input length mismatch.
    #[error("Input length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Insufficient data for operation.
    #[error("Insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Transform axis outside a two-dimensional array.
    #[error("Invalid axis {0} for a 2D array (expected 0 or 1)")]
    InvalidAxis(usize),

    /// Sample range empty or outside the signal.
    #[error("Invalid sample range {range} for signal of length {len}")]
    InvalidRange { range: SampleRange, len: usize },

    /// Sample range overlapping or preceding the previous one.
    #[error("Sample range {range} overlaps or precedes previous range {previous}")]
    OverlappingRange {
        range: SampleRange,
        previous: SampleRange,
    },

    /// Division by a (near) zero spectral bin.
    #[error("Numerical singularity at bin {bin}: |H| = {magnitude:e}")]
    NumericalSingularity { bin: usize, magnitude: f64 },

    /// Invalid parameter value.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for DSP operations.
pub type DspResult<T> = Result<T, DspError>;
