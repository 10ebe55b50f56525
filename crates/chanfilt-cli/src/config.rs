//! Job file loading and validation.

use anyhow::{Context, Result};
use lib_chanfilt::components::{DEFAULT_ANODE, DEFAULT_NOISEDB, DEFAULT_STICKY_SOURCE};
use lib_chanfilt::{
    ChannelNoiseEntry, Components, StageSpec, StaticAnode, StaticStickyRanges, TableNoiseDb,
    STAGE_TYPES,
};
use lib_types::{ChannelId, ChannelSignals, StickyRange};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Top-level job description.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobConfig {
    /// Job name, used in the summary.
    #[serde(default)]
    pub name: String,

    /// Identifier of the anode the channels belong to.
    #[serde(default)]
    pub anode: i32,

    /// Noise database defaults.
    #[serde(default)]
    pub noise: NoiseDefaults,

    /// Filter stages, applied in order.
    pub stages: Vec<StageSpec>,

    /// Channel data and metadata.
    pub channels: Vec<ChannelJob>,
}

/// Noise database values used by channels without their own.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseDefaults {
    pub min_rms_cut: f64,
    pub max_rms_cut: f64,
}

impl Default for NoiseDefaults {
    fn default() -> Self {
        let db = TableNoiseDb::default();
        Self {
            min_rms_cut: db.min_rms_cut,
            max_rms_cut: db.max_rms_cut,
        }
    }
}

/// One channel of a job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChannelJob {
    pub id: ChannelId,

    /// Raw samples.
    pub samples: Vec<f64>,

    /// Sticky ranges detected upstream.
    #[serde(default)]
    pub sticky: Vec<StickyRange>,

    /// Noise database entry of the channel.
    #[serde(default)]
    pub noise: ChannelNoiseEntry,
}

/// Load a job from a TOML or JSON (by extension) file.
pub fn load_job(path: &Path) -> Result<JobConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job file: {:?}", path))?;

    let is_json = path.extension().map_or(false, |e| e == "json");
    parse_job(&content, is_json)
}

/// Parse and validate job file content.
pub fn parse_job(content: &str, is_json: bool) -> Result<JobConfig> {
    let job: JobConfig = if is_json {
        serde_json::from_str(content).context("Failed to parse job as JSON")?
    } else {
        toml::from_str(content).context("Failed to parse job as TOML")?
    };

    validate_job(&job)?;
    Ok(job)
}

fn validate_job(job: &JobConfig) -> Result<()> {
    if job.stages.is_empty() {
        anyhow::bail!("Job has no filter stages");
    }
    for stage in &job.stages {
        if !STAGE_TYPES.contains(&stage.kind.as_str()) {
            anyhow::bail!(
                "Unknown stage type '{}'. Must be one of: {}",
                stage.kind,
                STAGE_TYPES.join(", ")
            );
        }
    }

    if job.noise.min_rms_cut > job.noise.max_rms_cut {
        anyhow::bail!(
            "min_rms_cut {} is above max_rms_cut {}",
            job.noise.min_rms_cut,
            job.noise.max_rms_cut
        );
    }

    let mut seen = BTreeSet::new();
    for channel in &job.channels {
        if !seen.insert(channel.id) {
            anyhow::bail!("Channel {} listed more than once", channel.id);
        }
        if channel.samples.is_empty() {
            anyhow::bail!("Channel {} has no samples", channel.id);
        }
    }

    Ok(())
}

impl JobConfig {
    /// Register the job's anode, noise table and sticky ranges under the
    /// default component names.
    pub fn components(&self) -> Components {
        let ids = self.channels.iter().map(|c| c.id).collect();
        let mut db = TableNoiseDb {
            min_rms_cut: self.noise.min_rms_cut,
            max_rms_cut: self.noise.max_rms_cut,
            ..Default::default()
        };
        let mut sticky = StaticStickyRanges::new();
        for channel in &self.channels {
            db = db.with_channel(channel.id, channel.noise.clone());
            sticky = sticky.with_ranges(channel.id, channel.sticky.clone());
        }

        Components::new()
            .with_anode(DEFAULT_ANODE, Arc::new(StaticAnode::new(self.anode, ids)))
            .with_noise_db(DEFAULT_NOISEDB, Arc::new(db))
            .with_sticky_source(DEFAULT_STICKY_SOURCE, Arc::new(sticky))
    }

    /// Raw samples of every channel.
    pub fn signals(&self) -> ChannelSignals {
        self.channels
            .iter()
            .map(|c| (c.id, c.samples.clone()))
            .collect()
    }
}
