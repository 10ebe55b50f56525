//! Relative gain correction stage.

use crate::components::{Components, DEFAULT_ANODE, DEFAULT_NOISEDB};
use crate::error::{FilterError, FilterResult};
use crate::filter::{parse_config, to_config_value, ChannelFilter};
use lib_types::{scale, ChannelId, ChannelMaskMap, Signal};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const NAME: &str = "RelGainCalib";

/// Configuration of [`RelGainCalib`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelGainCalibConfig {
    #[serde(alias = "anode")]
    pub anode_tn: String,
    pub noisedb: String,

    /// Gain of channels without a calibration value.
    pub gain_def: f64,
    pub gain_min_cut: f64,
    pub gain_max_cut: f64,

    /// Gains indexed by channel id; overrides the noise database.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rel_gain: Option<Vec<f64>>,
}

impl Default for RelGainCalibConfig {
    fn default() -> Self {
        Self {
            anode_tn: DEFAULT_ANODE.to_string(),
            noisedb: DEFAULT_NOISEDB.to_string(),
            gain_def: 1.0,
            gain_min_cut: 0.8,
            gain_max_cut: 1.25,
            rel_gain: None,
        }
    }
}

/// Multiplies each channel by its relative gain.
#[derive(Default)]
pub struct RelGainCalib {
    cfg: RelGainCalibConfig,
    gains: Option<HashMap<ChannelId, f64>>,
}

impl RelGainCalib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> &RelGainCalibConfig {
        &self.cfg
    }

    /// Gain applied to `ch`, or `None` before configuration.
    pub fn gain(&self, ch: ChannelId) -> Option<f64> {
        let gains = self.gains.as_ref()?;
        let gain = gains.get(&ch).copied().unwrap_or(self.cfg.gain_def);
        Some(gain.clamp(self.cfg.gain_min_cut, self.cfg.gain_max_cut))
    }
}

impl ChannelFilter for RelGainCalib {
    fn name(&self) -> &'static str {
        NAME
    }

    fn apply_one(&self, ch: ChannelId, signal: &mut Signal) -> FilterResult<ChannelMaskMap> {
        let gain = self.gain(ch).ok_or(FilterError::NotConfigured(NAME))?;
        scale(signal, gain);
        Ok(ChannelMaskMap::new())
    }

    fn configure(&mut self, cfg: &serde_json::Value, components: &Components) -> FilterResult<()> {
        let cfg: RelGainCalibConfig = parse_config(NAME, cfg)?;
        if !(cfg.gain_min_cut <= cfg.gain_max_cut) {
            return Err(FilterError::invalid_parameter(
                NAME,
                "gain_min_cut",
                format!(
                    "{} is above gain_max_cut {}",
                    cfg.gain_min_cut, cfg.gain_max_cut
                ),
            ));
        }

        let anode = components.anode(&cfg.anode_tn)?;
        let noisedb = components.noise_db(&cfg.noisedb)?;

        let mut gains = HashMap::new();
        for ch in anode.channels() {
            let listed = cfg
                .rel_gain
                .as_ref()
                .and_then(|list| usize::try_from(ch).ok().and_then(|i| list.get(i).copied()));
            if let Some(gain) = listed.or_else(|| noisedb.relative_gain(ch)) {
                gains.insert(ch, gain);
            }
        }

        tracing::info!(
            "{} on anode {}: {} calibrated channels",
            NAME,
            anode.ident(),
            gains.len()
        );

        self.gains = Some(gains);
        self.cfg = cfg;
        Ok(())
    }

    fn default_configuration(&self) -> serde_json::Value {
        to_config_value(&RelGainCalibConfig::default())
    }
}
