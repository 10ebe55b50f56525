//! Half-open sample-index ranges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open interval `[start, end)` over sample indices.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SampleRange {
    /// First index inside the range.
    pub start: usize,

    /// One past the last index inside the range.
    pub end: usize,
}

/// A contiguous run of samples flagged as stuck at a digitizer code.
///
/// Sticky ranges are produced upstream by a detector and are only read here.
pub type StickyRange = SampleRange;

impl SampleRange {
    /// Create a range `[start, end)`.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Range covering a whole signal of `len` samples.
    pub const fn full(len: usize) -> Self {
        Self { start: 0, end: len }
    }

    /// Number of samples in the range.
    #[inline]
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// True if the range holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// True if `index` falls inside the range.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        index >= self.start && index < self.end
    }

    /// True if the two ranges share at least one sample.
    pub fn overlaps(&self, other: &SampleRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Iterate the sample indices inside the range.
    pub fn indices(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl From<std::ops::Range<usize>> for SampleRange {
    fn from(r: std::ops::Range<usize>) -> Self {
        Self::new(r.start, r.end)
    }
}

impl fmt::Display for SampleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}
