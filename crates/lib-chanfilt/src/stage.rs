//! Closed set of filter stages, selectable by type name.

use crate::components::Components;
use crate::error::{FilterError, FilterResult};
use crate::filter::{BatchReport, ChannelFilter};
use crate::gain::RelGainCalib;
use crate::noise::OneChannelNoise;
use crate::sticky_mitig::StickyCodeMitig;
use lib_types::{ChannelId, ChannelMaskMap, ChannelSignals, Signal};

/// Type names accepted by [`FilterStage::from_type`].
pub const STAGE_TYPES: [&str; 3] = ["StickyCodeMitig", "OneChannelNoise", "RelGainCalib"];

/// One stage of a filter pipeline.
pub enum FilterStage {
    StickyCodeMitig(StickyCodeMitig),
    OneChannelNoise(OneChannelNoise),
    RelGainCalib(RelGainCalib),
}

impl FilterStage {
    /// Create an unconfigured stage from its type name.
    pub fn from_type(kind: &str) -> FilterResult<Self> {
        match kind {
            "StickyCodeMitig" => Ok(Self::StickyCodeMitig(StickyCodeMitig::new())),
            "OneChannelNoise" => Ok(Self::OneChannelNoise(OneChannelNoise::new())),
            "RelGainCalib" => Ok(Self::RelGainCalib(RelGainCalib::new())),
            other => Err(FilterError::UnknownStage(other.to_string())),
        }
    }

    fn inner(&self) -> &dyn ChannelFilter {
        match self {
            Self::StickyCodeMitig(f) => f,
            Self::OneChannelNoise(f) => f,
            Self::RelGainCalib(f) => f,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ChannelFilter {
        match self {
            Self::StickyCodeMitig(f) => f,
            Self::OneChannelNoise(f) => f,
            Self::RelGainCalib(f) => f,
        }
    }
}

impl ChannelFilter for FilterStage {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn apply_one(&self, ch: ChannelId, signal: &mut Signal) -> FilterResult<ChannelMaskMap> {
        self.inner().apply_one(ch, signal)
    }

    fn apply_many(&self, signals: &mut ChannelSignals) -> BatchReport {
        self.inner().apply_many(signals)
    }

    fn configure(&mut self, cfg: &serde_json::Value, components: &Components) -> FilterResult<()> {
        self.inner_mut().configure(cfg, components)
    }

    fn default_configuration(&self) -> serde_json::Value {
        self.inner().default_configuration()
    }
}

impl From<StickyCodeMitig> for FilterStage {
    fn from(f: StickyCodeMitig) -> Self {
        Self::StickyCodeMitig(f)
    }
}

impl From<OneChannelNoise> for FilterStage {
    fn from(f: OneChannelNoise) -> Self {
        Self::OneChannelNoise(f)
    }
}

impl From<RelGainCalib> for FilterStage {
    fn from(f: RelGainCalib) -> Self {
        Self::RelGainCalib(f)
    }
}
