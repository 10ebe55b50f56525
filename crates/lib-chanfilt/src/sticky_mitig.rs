//! Sticky-code mitigation stage.

use crate::components::{
    ChannelNoiseDb, Components, StickyRangeSource, DEFAULT_ANODE, DEFAULT_DFT, DEFAULT_NOISEDB,
    DEFAULT_STICKY_SOURCE,
};
use crate::error::{FilterError, FilterResult};
use crate::filter::{parse_config, to_config_value, ChannelFilter};
use lib_dsp::sticky::{is_signal_like, validate_ranges};
use lib_dsp::{fft_interp_sticky, fft_shift_sticky, linear_interp_sticky, SpectralEngine};
use lib_types::{ChannelId, ChannelMaskMap, Signal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Mask label of repaired sticky ranges.
pub const STICKY_LABEL: &str = "sticky";

const NAME: &str = "StickyCodeMitig";

/// Codes known to stick on one channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExtraSticky {
    pub channel: ChannelId,
    pub bits: Vec<i16>,
}

/// Time offset, in samples, applied to a group of channels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeOffset {
    pub channels: Vec<ChannelId>,
    pub toffset: f64,
}

/// Configuration of [`StickyCodeMitig`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StickyCodeMitigConfig {
    #[serde(alias = "anode")]
    pub anode_tn: String,
    pub noisedb: String,
    pub dft: String,
    pub sticky_source: String,

    /// Level a stuck range must sit at to be bridged linearly.
    pub stky_sig_like_val: f64,

    /// Tolerance around `stky_sig_like_val`.
    pub stky_sig_like_rms: f64,

    /// Take the tolerance from the noise database's baseline RMS where the
    /// channel has one.
    pub use_noisedb_rms: bool,

    /// Longest range, in samples, that is repaired.
    pub stky_max_len: usize,

    pub extra_stky: Vec<ExtraSticky>,
    pub time_offsets: Vec<TimeOffset>,
}

impl Default for StickyCodeMitigConfig {
    fn default() -> Self {
        Self {
            anode_tn: DEFAULT_ANODE.to_string(),
            noisedb: DEFAULT_NOISEDB.to_string(),
            dft: DEFAULT_DFT.to_string(),
            sticky_source: DEFAULT_STICKY_SOURCE.to_string(),
            stky_sig_like_val: 15.0,
            stky_sig_like_rms: 2.0,
            use_noisedb_rms: false,
            stky_max_len: 5,
            extra_stky: Vec::new(),
            time_offsets: Vec::new(),
        }
    }
}

/// Components and tables resolved by `configure`.
struct Resolved {
    noisedb: Arc<dyn ChannelNoiseDb>,
    source: Arc<dyn StickyRangeSource>,
    engine: SpectralEngine,
    extra_codes: HashMap<ChannelId, Vec<i16>>,
    time_offsets: HashMap<ChannelId, f64>,
}

/// Repairs runs of stuck digitizer codes.
///
/// Short ranges that sit at the configured level are bridged linearly; the
/// others are rebuilt from their opposite-parity neighbors in the frequency
/// domain. Channels with a time offset are then re-timed; the shift does not
/// touch the ranges again.
#[derive(Default)]
pub struct StickyCodeMitig {
    cfg: StickyCodeMitigConfig,
    resolved: Option<Resolved>,
}

impl StickyCodeMitig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Active configuration.
    pub fn config(&self) -> &StickyCodeMitigConfig {
        &self.cfg
    }

    /// Extra sticky codes of a channel, after configuration.
    pub fn extra_codes(&self, ch: ChannelId) -> &[i16] {
        self.resolved
            .as_ref()
            .and_then(|r| r.extra_codes.get(&ch))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Time offset of a channel, after configuration.
    pub fn time_offset(&self, ch: ChannelId) -> Option<f64> {
        self.resolved
            .as_ref()
            .and_then(|r| r.time_offsets.get(&ch).copied())
    }
}

impl ChannelFilter for StickyCodeMitig {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply_one(&self, ch: ChannelId, signal: &mut Signal) -> FilterResult<ChannelMaskMap> {
        let r = self.resolved.as_ref().ok_or(FilterError::NotConfigured(NAME))?;

        let extra = r.extra_codes.get(&ch).map(Vec::as_slice).unwrap_or(&[]);
        let ranges = r.source.sticky_ranges(ch, signal, extra);
        validate_ranges(&ranges, signal.len())?;

        let level = self.cfg.stky_sig_like_val;
        let tolerance = self
            .cfg
            .use_noisedb_rms
            .then(|| r.noisedb.baseline_rms(ch))
            .flatten()
            .unwrap_or(self.cfg.stky_sig_like_rms);

        let mut masks = ChannelMaskMap::new();
        for &range in &ranges {
            if range.len() > self.cfg.stky_max_len {
                tracing::warn!(
                    "Channel {}: sticky range {} longer than {} samples, not repaired",
                    ch,
                    range,
                    self.cfg.stky_max_len
                );
                continue;
            }

            let repaired = if is_signal_like(signal, range, level, tolerance) {
                linear_interp_sticky(signal, &[range], level, tolerance)?
            } else {
                fft_interp_sticky(&r.engine, signal, &[range])?
            };
            if repaired {
                masks.add(STICKY_LABEL, ch, range);
            }
        }

        if let Some(&toffset) = r.time_offsets.get(&ch) {
            tracing::debug!("Channel {}: shifting by {} samples", ch, toffset);
            fft_shift_sticky(&r.engine, signal, toffset, &[])?;
        }

        Ok(masks)
    }

    fn configure(&mut self, cfg: &serde_json::Value, components: &Components) -> FilterResult<()> {
        let cfg: StickyCodeMitigConfig = parse_config(NAME, cfg)?;
        if cfg.stky_sig_like_rms < 0.0 {
            return Err(FilterError::invalid_parameter(
                NAME,
                "stky_sig_like_rms",
                format!("must not be negative, got {}", cfg.stky_sig_like_rms),
            ));
        }

        let anode = components.anode(&cfg.anode_tn)?;
        let noisedb = components.noise_db(&cfg.noisedb)?;
        let dft = components.dft(&cfg.dft)?;
        let source = components.sticky_source(&cfg.sticky_source)?;

        let mut extra_codes: HashMap<ChannelId, Vec<i16>> = HashMap::new();
        for entry in &cfg.extra_stky {
            extra_codes
                .entry(entry.channel)
                .or_default()
                .extend_from_slice(&entry.bits);
        }
        for ch in anode.channels() {
            let codes = noisedb.extra_sticky_codes(ch);
            if !codes.is_empty() {
                extra_codes.entry(ch).or_default().extend(codes);
            }
        }
        for codes in extra_codes.values_mut() {
            codes.sort_unstable();
            codes.dedup();
        }

        let mut time_offsets = HashMap::new();
        for group in &cfg.time_offsets {
            if !group.toffset.is_finite() {
                return Err(FilterError::invalid_parameter(
                    NAME,
                    "time_offsets",
                    format!("offset must be finite, got {}", group.toffset),
                ));
            }
            for &ch in &group.channels {
                time_offsets.insert(ch, group.toffset);
            }
        }

        tracing::info!(
            "{} on anode {}: {} channels with extra sticky codes, {} with time offsets",
            NAME,
            anode.ident(),
            extra_codes.len(),
            time_offsets.len()
        );

        self.resolved = Some(Resolved {
            noisedb,
            source,
            engine: SpectralEngine::new(dft),
            extra_codes,
            time_offsets,
        });
        self.cfg = cfg;
        Ok(())
    }

    fn default_configuration(&self) -> serde_json::Value {
        to_config_value(&StickyCodeMitigConfig::default())
    }
}
