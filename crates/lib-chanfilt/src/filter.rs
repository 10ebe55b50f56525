//! The channel filter contract and its batch report.

use crate::components::Components;
use crate::error::{FilterError, FilterResult};
use lib_types::{ChannelId, ChannelMaskMap, ChannelSignals, Signal};
use rayon::prelude::*;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;

/// A per-channel correction stage.
///
/// Implementors only need `apply_one`; batches are fanned out over rayon by
/// the default `apply_many`.
pub trait ChannelFilter: Send + Sync {
    /// Stage type name as used in configuration.
    fn name(&self) -> &'static str;

    /// Correct one channel's signal in place and report masked ranges.
    fn apply_one(&self, ch: ChannelId, signal: &mut Signal) -> FilterResult<ChannelMaskMap>;

    /// Correct every channel of a batch.
    ///
    /// Each channel is processed on a copy that is written back only when
    /// the stage succeeds, so a failed channel keeps its input signal.
    fn apply_many(&self, signals: &mut ChannelSignals) -> BatchReport {
        let outcomes: Vec<(ChannelId, FilterResult<ChannelMaskMap>)> = signals
            .par_iter_mut()
            .map(|(&ch, signal)| {
                let mut work = signal.clone();
                let result = self.apply_one(ch, &mut work);
                if result.is_ok() {
                    *signal = work;
                }
                (ch, result)
            })
            .collect();

        let mut report = BatchReport::default();
        for (ch, result) in outcomes {
            match result {
                Ok(masks) => {
                    report.masks.merge(masks);
                    report.processed += 1;
                }
                Err(e) => {
                    tracing::warn!("{}: channel {} failed: {}", self.name(), ch, e);
                    report.failures.insert(ch, e);
                }
            }
        }
        report
    }

    /// Resolve components and build per-channel tables from a configuration.
    fn configure(&mut self, cfg: &serde_json::Value, components: &Components) -> FilterResult<()>;

    /// Default configuration of this stage.
    fn default_configuration(&self) -> serde_json::Value;
}

/// Outcome of running one or more stages over a batch of channels.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Masks of every successfully processed channel.
    pub masks: ChannelMaskMap,

    /// Channels that failed, with the first error each one hit.
    pub failures: BTreeMap<ChannelId, FilterError>,

    /// Number of successful (channel, stage) applications.
    pub processed: usize,
}

impl BatchReport {
    /// True if no channel failed.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    /// Fold another report into this one. Earlier failures win.
    pub fn absorb(&mut self, other: BatchReport) {
        self.masks.merge(other.masks);
        self.processed += other.processed;
        for (ch, e) in other.failures {
            self.failures.entry(ch).or_insert(e);
        }
    }
}

/// Parse a stage configuration; `null` selects the defaults.
pub(crate) fn parse_config<T>(stage: &'static str, cfg: &serde_json::Value) -> FilterResult<T>
where
    T: DeserializeOwned + Default,
{
    if cfg.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(cfg.clone())
        .map_err(|source| FilterError::InvalidConfig { stage, source })
}

/// Serialize a stage configuration for `default_configuration`.
pub(crate) fn to_config_value<T: Serialize>(cfg: &T) -> serde_json::Value {
    serde_json::to_value(cfg).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lib_dsp::DspError;
    use lib_types::SampleRange;

    /// Doubles every sample; refuses odd channels.
    struct Doubler;

    impl ChannelFilter for Doubler {
        fn name(&self) -> &'static str {
            "Doubler"
        }

        fn apply_one(&self, ch: ChannelId, signal: &mut Signal) -> FilterResult<ChannelMaskMap> {
            signal.iter_mut().for_each(|v| *v *= 2.0);
            if ch % 2 == 1 {
                return Err(DspError::InsufficientData { needed: 2, got: 1 }.into());
            }
            let mut masks = ChannelMaskMap::new();
            masks.add("doubled", ch, SampleRange::full(signal.len()));
            Ok(masks)
        }

        fn configure(
            &mut self,
            _cfg: &serde_json::Value,
            _components: &Components,
        ) -> FilterResult<()> {
            Ok(())
        }

        fn default_configuration(&self) -> serde_json::Value {
            serde_json::Value::Null
        }
    }

    #[test]
    fn test_apply_many_isolates_failures() {
        let mut signals: ChannelSignals = (0..4).map(|ch| (ch, vec![1.0, 2.0])).collect();

        let report = Doubler.apply_many(&mut signals);

        assert_eq!(report.processed, 2);
        assert_eq!(report.failures.len(), 2);
        assert!(report.failures.contains_key(&1));
        assert_eq!(report.masks.channels("doubled"), vec![0, 2]);
        // Failed channels keep their input
        assert_eq!(signals[&0], vec![2.0, 4.0]);
        assert_eq!(signals[&1], vec![1.0, 2.0]);
    }

    #[test]
    fn test_absorb_keeps_first_failure() {
        let mut a = BatchReport::default();
        a.failures.insert(3, FilterError::NotConfigured("first"));
        let mut b = BatchReport::default();
        b.failures.insert(3, FilterError::NotConfigured("second"));
        b.processed = 4;

        a.absorb(b);
        assert_eq!(a.processed, 4);
        assert!(a.failures[&3].to_string().starts_with("first"));
        assert!(!a.is_clean());
    }

    #[test]
    fn test_parse_config_null_is_default() {
        #[derive(serde::Deserialize, Default, PartialEq, Debug)]
        struct Cfg {
            x: i32,
        }
        let cfg: Cfg = parse_config("Test", &serde_json::Value::Null).unwrap();
        assert_eq!(cfg, Cfg::default());

        let err = parse_config::<Cfg>("Test", &serde_json::json!({ "x": "nope" })).unwrap_err();
        assert!(matches!(err, FilterError::InvalidConfig { stage: "Test", .. }));
    }
}
