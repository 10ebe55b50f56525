//! Per-channel correction filters for detector readout.
//!
//! Three stages share the [`ChannelFilter`] contract:
//! - [`StickyCodeMitig`]: repair runs of stuck digitizer codes
//! - [`OneChannelNoise`]: resampling fix-up, response swap, noise filter, baseline
//! - [`RelGainCalib`]: relative gain correction
//!
//! Stages resolve their collaborators (anode, noise database, transform
//! backend, sticky range source) by name from a [`Components`] registry when
//! configured, and are chained by a [`FilterPipeline`].

pub mod error;
pub mod components;
pub mod memory;
pub mod filter;
pub mod sticky_mitig;
pub mod noise;
pub mod gain;
pub mod stage;
pub mod pipeline;

pub use error::{FilterError, FilterResult};
pub use components::{AnodePlane, ChannelNoiseDb, Components, ResponseCorrection, StickyRangeSource};
pub use memory::{ChannelNoiseEntry, StaticAnode, StaticStickyRanges, TableNoiseDb};
pub use filter::{BatchReport, ChannelFilter};
pub use sticky_mitig::{StickyCodeMitig, StickyCodeMitigConfig};
pub use noise::{OneChannelNoise, OneChannelNoiseConfig, PartialCheck};
pub use gain::{RelGainCalib, RelGainCalibConfig};
pub use stage::{FilterStage, STAGE_TYPES};
pub use pipeline::{FilterPipeline, StageSpec};
