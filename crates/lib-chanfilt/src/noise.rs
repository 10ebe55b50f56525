//! Single-channel noise filtering stage.

use crate::components::{
    ChannelNoiseDb, Components, DEFAULT_ANODE, DEFAULT_DFT, DEFAULT_NOISEDB,
};
use crate::error::{FilterError, FilterResult};
use crate::filter::{parse_config, to_config_value, ChannelFilter};
use lib_dsp::{fft_scaling, replace, DspError, Regularization, SpectralEngine};
use lib_types::{
    subtract_baseline, ChannelId, ChannelMaskMap, Complex64, SampleRange, SampleStats, Signal,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Mask label of channels known to be unusable.
pub const BAD_LABEL: &str = "bad";
/// Mask label of channels whose spectrum looks like a partial readout.
pub const PARTIAL_LABEL: &str = "partial";
/// Mask label of channels whose noise level is out of bounds.
pub const NOISY_LABEL: &str = "noisy";

const NAME: &str = "OneChannelNoise";

/// Diagnostic for partially read out channels.
///
/// Such channels carry a large low-frequency excess: the magnitudes of the
/// first `nfreqs` bins above DC fall off monotonically and the first one is
/// more than `maxpower` times the last one.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialCheck {
    pub nfreqs: usize,
    pub maxpower: f64,
}

impl Default for PartialCheck {
    fn default() -> Self {
        Self {
            nfreqs: 4,
            maxpower: 3.0,
        }
    }
}

impl PartialCheck {
    /// True if `spectrum` looks like a partial readout.
    pub fn check(&self, spectrum: &[Complex64]) -> bool {
        if self.nfreqs < 2 || spectrum.len() <= self.nfreqs {
            return false;
        }
        let amps: Vec<f64> = spectrum[1..=self.nfreqs].iter().map(|c| c.norm()).collect();

        let falling = amps.windows(2).all(|w| w[0] > w[1]);
        let (first, last) = (amps[0], amps[amps.len() - 1]);
        falling && first > self.maxpower * last
    }
}

/// Channels that were digitized with a different number of samples.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resample {
    pub channels: Vec<ChannelId>,
    pub sample_from: usize,
}

/// Configuration of [`OneChannelNoise`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneChannelNoiseConfig {
    #[serde(alias = "anode")]
    pub anode_tn: String,
    pub noisedb: String,
    pub dft: String,
    pub partial: PartialCheck,
    pub resmp: Vec<Resample>,
}

impl Default for OneChannelNoiseConfig {
    fn default() -> Self {
        Self {
            anode_tn: DEFAULT_ANODE.to_string(),
            noisedb: DEFAULT_NOISEDB.to_string(),
            dft: DEFAULT_DFT.to_string(),
            partial: PartialCheck::default(),
            resmp: Vec::new(),
        }
    }
}

struct Resolved {
    noisedb: Arc<dyn ChannelNoiseDb>,
    engine: SpectralEngine,
    resmp: HashMap<ChannelId, usize>,
}

/// Per-channel noise filter.
///
/// Undoes readout resampling, swaps misconfigured responses, applies the
/// channel's noise filter and removes the baseline. Bad, partial and noisy
/// channels are reported in the mask map.
#[derive(Default)]
pub struct OneChannelNoise {
    cfg: OneChannelNoiseConfig,
    resolved: Option<Resolved>,
}

impl OneChannelNoise {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &OneChannelNoiseConfig {
        &self.cfg
    }

    /// Run the partial readout diagnostic on a channel spectrum.
    pub fn check_partial(&self, spectrum: &[Complex64]) -> bool {
        self.cfg.partial.check(spectrum)
    }

    /// Original sample count of a resampled channel, after configuration.
    pub fn resample_from(&self, ch: ChannelId) -> Option<usize> {
        self.resolved.as_ref().and_then(|r| r.resmp.get(&ch).copied())
    }
}

impl ChannelFilter for OneChannelNoise {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply_one(&self, ch: ChannelId, signal: &mut Signal) -> FilterResult<ChannelMaskMap> {
        let r = self.resolved.as_ref().ok_or(FilterError::NotConfigured(NAME))?;
        let mut masks = ChannelMaskMap::new();
        let nsamples = signal.len();
        let whole = SampleRange::full(nsamples);

        if r.noisedb.is_bad(ch) {
            tracing::debug!("Channel {} is bad, skipped", ch);
            masks.add(BAD_LABEL, ch, whole);
            return Ok(masks);
        }
        if nsamples == 0 {
            return Err(DspError::InsufficientData { needed: 1, got: 0 }.into());
        }

        if let Some(&smpin) = r.resmp.get(&ch) {
            tracing::debug!("Channel {}: resampling {} -> {} samples", ch, smpin, nsamples);
            signal.resize(smpin, 0.0);
            fft_scaling(&r.engine, signal, nsamples)?;
        }

        let spectrum = r.engine.forward_r2c(signal)?;
        if self.check_partial(&spectrum) {
            tracing::debug!("Channel {} looks like a partial readout", ch);
            masks.add(PARTIAL_LABEL, ch, whole);
        }

        let mut spectrum = match r.noisedb.response_correction(ch) {
            Some(correction) => {
                let mut corrected = replace(
                    &r.engine,
                    signal,
                    &correction.from,
                    &correction.to,
                    Regularization::default(),
                )?;
                corrected.truncate(nsamples);
                r.engine.forward_r2c(&corrected)?
            }
            None => spectrum,
        };

        if let Some(gains) = r.noisedb.noise_filter(ch, spectrum.len()) {
            if gains.len() != spectrum.len() {
                return Err(DspError::LengthMismatch {
                    expected: spectrum.len(),
                    actual: gains.len(),
                }
                .into());
            }
            for (bin, gain) in spectrum.iter_mut().zip(gains.iter()) {
                *bin *= *gain;
            }
        }
        spectrum[0] = Complex64::new(0.0, 0.0);
        *signal = r.engine.inverse_c2r(&spectrum)?;

        let baseline = signal.median();
        subtract_baseline(signal, baseline);

        let rms = signal.robust_rms();
        let (min_cut, max_cut) = (r.noisedb.min_rms_cut(ch), r.noisedb.max_rms_cut(ch));
        if rms < min_cut || rms > max_cut {
            tracing::debug!(
                "Channel {}: RMS {:.3} outside [{}, {}]",
                ch,
                rms,
                min_cut,
                max_cut
            );
            masks.add(NOISY_LABEL, ch, whole);
        }

        Ok(masks)
    }

    fn configure(&mut self, cfg: &serde_json::Value, components: &Components) -> FilterResult<()> {
        let cfg: OneChannelNoiseConfig = parse_config(NAME, cfg)?;
        if cfg.partial.nfreqs < 2 {
            return Err(FilterError::invalid_parameter(
                NAME,
                "partial.nfreqs",
                format!("need at least 2 frequencies, got {}", cfg.partial.nfreqs),
            ));
        }

        let anode = components.anode(&cfg.anode_tn)?;
        let noisedb = components.noise_db(&cfg.noisedb)?;
        let dft = components.dft(&cfg.dft)?;

        let mut resmp = HashMap::new();
        for ch in anode.channels() {
            if let Some(smpin) = noisedb.resample_from(ch) {
                resmp.insert(ch, smpin);
            }
        }
        for group in &cfg.resmp {
            for &ch in &group.channels {
                resmp.insert(ch, group.sample_from);
            }
        }
        if let Some((ch, _)) = resmp.iter().find(|(_, smpin)| **smpin == 0) {
            return Err(FilterError::invalid_parameter(
                NAME,
                "resmp",
                format!("channel {} resampled from zero samples", ch),
            ));
        }

        tracing::info!(
            "{} on anode {}: {} resampled channels",
            NAME,
            anode.ident(),
            resmp.len()
        );

        self.resolved = Some(Resolved {
            noisedb,
            engine: SpectralEngine::new(dft),
            resmp,
        });
        self.cfg = cfg;
        Ok(())
    }

    fn default_configuration(&self) -> serde_json::Value {
        to_config_value(&OneChannelNoiseConfig::default())
    }
}
