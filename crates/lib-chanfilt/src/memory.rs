//! In-memory component implementations.
//!
//! Table-backed stand-ins for the anode, noise database and sticky range
//! detector, for hosts that load their metadata up front and for tests.
//! All of them deserialize from the job files read by the CLI.

use crate::components::{AnodePlane, ChannelNoiseDb, ResponseCorrection, StickyRangeSource};
use lib_dsp::spectral::bin_frequency;
use lib_types::{ChannelId, StickyRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Anode with a fixed channel list.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct StaticAnode {
    /// Anode identifier.
    #[serde(default)]
    pub ident: i32,

    /// Channels read out by the anode.
    pub channels: Vec<ChannelId>,
}

impl StaticAnode {
    /// Create an anode over the given channels.
    pub fn new(ident: i32, channels: Vec<ChannelId>) -> Self {
        Self { ident, channels }
    }
}

impl AnodePlane for StaticAnode {
    fn ident(&self) -> i32 {
        self.ident
    }

    fn channels(&self) -> Vec<ChannelId> {
        self.channels.clone()
    }
}

/// Per-channel overrides in a [`TableNoiseDb`].
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelNoiseEntry {
    pub baseline_rms: Option<f64>,
    pub min_rms_cut: Option<f64>,
    pub max_rms_cut: Option<f64>,
    pub bad: bool,
    pub extra_sticky: Vec<i16>,
    pub resample_from: Option<usize>,
    pub relative_gain: Option<f64>,
    pub response: Option<ResponseCorrection>,

    /// Noise filter gains sampled uniformly from DC to Nyquist.
    pub noise_filter: Option<Vec<f64>>,
}

/// Noise database backed by a channel table with global defaults.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNoiseDb {
    /// Default lowest acceptable RMS.
    pub min_rms_cut: f64,

    /// Default highest acceptable RMS.
    pub max_rms_cut: f64,

    /// Per-channel entries.
    pub channels: BTreeMap<ChannelId, ChannelNoiseEntry>,
}

impl Default for TableNoiseDb {
    fn default() -> Self {
        Self {
            min_rms_cut: 0.0,
            max_rms_cut: f64::MAX,
            channels: BTreeMap::new(),
        }
    }
}

impl TableNoiseDb {
    /// Insert or replace the entry of one channel.
    pub fn with_channel(mut self, ch: ChannelId, entry: ChannelNoiseEntry) -> Self {
        self.channels.insert(ch, entry);
        self
    }

    fn entry(&self, ch: ChannelId) -> Option<&ChannelNoiseEntry> {
        self.channels.get(&ch)
    }
}

/// Linearly interpolate gains sampled over `[0, 0.5]` cycles/sample.
fn sample_gain(gains: &[f64], frequency: f64) -> f64 {
    match gains.len() {
        0 => 1.0,
        1 => gains[0],
        len => {
            let pos = (frequency.abs() / 0.5).min(1.0) * (len - 1) as f64;
            let lower = pos.floor() as usize;
            let upper = (lower + 1).min(len - 1);
            let frac = pos - lower as f64;
            gains[lower] * (1.0 - frac) + gains[upper] * frac
        }
    }
}

impl ChannelNoiseDb for TableNoiseDb {
    fn baseline_rms(&self, ch: ChannelId) -> Option<f64> {
        self.entry(ch).and_then(|e| e.baseline_rms)
    }

    fn min_rms_cut(&self, ch: ChannelId) -> f64 {
        self.entry(ch)
            .and_then(|e| e.min_rms_cut)
            .unwrap_or(self.min_rms_cut)
    }

    fn max_rms_cut(&self, ch: ChannelId) -> f64 {
        self.entry(ch)
            .and_then(|e| e.max_rms_cut)
            .unwrap_or(self.max_rms_cut)
    }

    fn is_bad(&self, ch: ChannelId) -> bool {
        self.entry(ch).map_or(false, |e| e.bad)
    }

    fn extra_sticky_codes(&self, ch: ChannelId) -> Vec<i16> {
        self.entry(ch).map(|e| e.extra_sticky.clone()).unwrap_or_default()
    }

    fn resample_from(&self, ch: ChannelId) -> Option<usize> {
        self.entry(ch).and_then(|e| e.resample_from)
    }

    fn relative_gain(&self, ch: ChannelId) -> Option<f64> {
        self.entry(ch).and_then(|e| e.relative_gain)
    }

    fn response_correction(&self, ch: ChannelId) -> Option<ResponseCorrection> {
        self.entry(ch).and_then(|e| e.response.clone())
    }

    fn noise_filter(&self, ch: ChannelId, nbins: usize) -> Option<Vec<f64>> {
        let gains = self.entry(ch)?.noise_filter.as_ref()?;
        Some(
            (0..nbins)
                .map(|k| sample_gain(gains, bin_frequency(k, nbins)))
                .collect(),
        )
    }
}

/// Sticky ranges detected ahead of time, keyed by channel.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StaticStickyRanges {
    ranges: BTreeMap<ChannelId, Vec<StickyRange>>,
}

impl StaticStickyRanges {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the ranges of one channel.
    pub fn with_ranges(mut self, ch: ChannelId, ranges: Vec<StickyRange>) -> Self {
        self.ranges.insert(ch, ranges);
        self
    }
}

impl StickyRangeSource for StaticStickyRanges {
    fn sticky_ranges(
        &self,
        ch: ChannelId,
        _signal: &[f64],
        _extra_codes: &[i16],
    ) -> Vec<StickyRange> {
        self.ranges.get(&ch).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_db_defaults_and_overrides() {
        let db = TableNoiseDb::default().with_channel(
            5,
            ChannelNoiseEntry {
                max_rms_cut: Some(10.0),
                bad: true,
                ..Default::default()
            },
        );

        assert_eq!(db.max_rms_cut(5), 10.0);
        assert_eq!(db.max_rms_cut(6), f64::MAX);
        assert!(db.is_bad(5));
        assert!(!db.is_bad(6));
        assert!(db.noise_filter(6, 8).is_none());
    }

    #[test]
    fn test_noise_filter_is_symmetric() {
        let db = TableNoiseDb::default().with_channel(
            1,
            ChannelNoiseEntry {
                noise_filter: Some(vec![0.0, 1.0]),
                ..Default::default()
            },
        );

        let gains = db.noise_filter(1, 8).unwrap();
        assert_eq!(gains.len(), 8);
        assert_eq!(gains[0], 0.0);
        assert!((gains[4] - 1.0).abs() < 1e-12);
        for k in 1..4 {
            assert!((gains[k] - gains[8 - k]).abs() < 1e-12);
        }
    }

    #[test]
    fn test_noise_db_from_json() {
        let db: TableNoiseDb = serde_json::from_value(serde_json::json!({
            "min_rms_cut": 1.0,
            "channels": {
                "12": { "relative_gain": 1.1, "extra_sticky": [63, 64] }
            }
        }))
        .unwrap();

        assert_eq!(db.min_rms_cut(12), 1.0);
        assert_eq!(db.relative_gain(12), Some(1.1));
        assert_eq!(db.extra_sticky_codes(12), vec![63, 64]);
    }

    #[test]
    fn test_static_sticky_ranges() {
        let source = StaticStickyRanges::new().with_ranges(3, vec![StickyRange::new(1, 4)]);
        assert_eq!(source.sticky_ranges(3, &[], &[]), vec![StickyRange::new(1, 4)]);
        assert!(source.sticky_ranges(4, &[], &[]).is_empty());
    }
}
