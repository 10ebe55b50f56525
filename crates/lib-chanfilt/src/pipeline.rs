//! Ordered chains of filter stages.

use crate::components::Components;
use crate::error::FilterResult;
use crate::filter::{BatchReport, ChannelFilter};
use crate::stage::FilterStage;
use lib_types::ChannelSignals;
use serde::{Deserialize, Serialize};

/// Type name and configuration of one pipeline stage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageSpec {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default)]
    pub config: serde_json::Value,
}

/// Runs stages in order over a batch of channels.
///
/// A channel that fails in one stage is left out of every later stage and
/// keeps the signal it had when it failed.
#[derive(Default)]
pub struct FilterPipeline {
    stages: Vec<FilterStage>,
}

impl FilterPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and configure every stage of `specs`.
    pub fn from_specs(specs: &[StageSpec], components: &Components) -> FilterResult<Self> {
        let mut pipeline = Self::new();
        for spec in specs {
            let mut stage = FilterStage::from_type(&spec.kind)?;
            stage.configure(&spec.config, components)?;
            pipeline.push(stage);
        }
        Ok(pipeline)
    }

    /// Append a configured stage.
    pub fn push(&mut self, stage: impl Into<FilterStage>) {
        self.stages.push(stage.into());
    }

    pub fn stages(&self) -> &[FilterStage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Apply every stage to `signals` and accumulate their masks.
    pub fn run(&self, signals: &mut ChannelSignals) -> BatchReport {
        let mut report = BatchReport::default();
        let mut held = ChannelSignals::new();

        for stage in &self.stages {
            for ch in report.failures.keys() {
                if let Some(signal) = signals.remove(ch) {
                    held.insert(*ch, signal);
                }
            }

            let stage_report = stage.apply_many(signals);
            tracing::info!(
                "{}: {} channels processed, {} failed, {} masked ranges",
                stage.name(),
                stage_report.processed,
                stage_report.failures.len(),
                stage_report.masks.range_count()
            );
            report.absorb(stage_report);
        }

        signals.append(&mut held);
        report
    }
}
