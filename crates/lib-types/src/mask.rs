//! Channel mask maps: what a processing stage altered, per channel.
//!
//! A mask map is keyed first by a label (for example `"sticky"` or
//! `"noisy"`) and then by channel. Each channel carries the list of sample
//! ranges the label applies to. Maps only grow: merging appends ranges and
//! never removes or shrinks a range that was already recorded.

use crate::range::SampleRange;
use crate::waveform::ChannelId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Ranges per channel for one label.
pub type ChannelRanges = BTreeMap<ChannelId, Vec<SampleRange>>;

/// Label → channel → altered sample ranges.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelMaskMap {
    labels: BTreeMap<String, ChannelRanges>,
}

impl ChannelMaskMap {
    /// Create an empty mask map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `range` under `label` for channel `ch`.
    pub fn add(&mut self, label: &str, ch: ChannelId, range: SampleRange) {
        self.labels
            .entry(label.to_string())
            .or_default()
            .entry(ch)
            .or_default()
            .push(range);
    }

    /// Append every entry of `other` to this map.
    pub fn merge(&mut self, other: ChannelMaskMap) {
        for (label, channels) in other.labels {
            let dst = self.labels.entry(label).or_default();
            for (ch, mut ranges) in channels {
                dst.entry(ch).or_default().append(&mut ranges);
            }
        }
    }

    /// Ranges recorded under `label` for channel `ch`.
    pub fn get(&self, label: &str, ch: ChannelId) -> &[SampleRange] {
        self.labels
            .get(label)
            .and_then(|channels| channels.get(&ch))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All channels recorded under `label`.
    pub fn channels(&self, label: &str) -> Vec<ChannelId> {
        self.labels
            .get(label)
            .map(|channels| channels.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Labels present in the map.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.labels.keys().map(String::as_str)
    }

    /// Iterate `(label, channel, ranges)` triples.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ChannelId, &[SampleRange])> {
        self.labels.iter().flat_map(|(label, channels)| {
            channels
                .iter()
                .map(move |(ch, ranges)| (label.as_str(), *ch, ranges.as_slice()))
        })
    }

    /// Total number of recorded ranges.
    pub fn range_count(&self) -> usize {
        self.labels
            .values()
            .flat_map(|channels| channels.values())
            .map(Vec::len)
            .sum()
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.range_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_get() {
        let mut map = ChannelMaskMap::new();
        map.add("sticky", 7, SampleRange::new(3, 7));
        map.add("sticky", 7, SampleRange::new(10, 12));
        map.add("noisy", 8, SampleRange::full(100));

        assert_eq!(map.get("sticky", 7).len(), 2);
        assert!(map.get("sticky", 8).is_empty());
        assert_eq!(map.channels("noisy"), vec![8]);
        assert_eq!(map.range_count(), 3);
    }

    #[test]
    fn test_merge_appends() {
        let mut a = ChannelMaskMap::new();
        a.add("sticky", 1, SampleRange::new(0, 2));

        let mut b = ChannelMaskMap::new();
        b.add("sticky", 1, SampleRange::new(5, 6));
        b.add("partial", 1, SampleRange::full(10));

        a.merge(b);
        assert_eq!(
            a.get("sticky", 1),
            &[SampleRange::new(0, 2), SampleRange::new(5, 6)]
        );
        assert_eq!(a.get("partial", 1), &[SampleRange::full(10)]);
    }

    #[test]
    fn test_serializes_as_nested_maps() {
        let mut map = ChannelMaskMap::new();
        map.add("sticky", 3, SampleRange::new(1, 2));

        let json = serde_json::to_value(&map).unwrap();
        assert_eq!(json["sticky"]["3"][0]["start"], 1);
        assert_eq!(json["sticky"]["3"][0]["end"], 2);
    }
}
