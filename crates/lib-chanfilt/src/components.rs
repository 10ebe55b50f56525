//! External collaborators of the filters and the registry that names them.
//!
//! Filters never construct their collaborators. Configuration names a
//! component (`anode_tn`, `noisedb`, `dft`, `sticky_source`) and `configure`
//! resolves that name in a [`Components`] registry supplied by the host.

use crate::error::{FilterError, FilterResult};
use lib_dsp::{Dft, RustFftDft};
use lib_types::{ChannelId, StickyRange};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Default registry name of the anode plane.
pub const DEFAULT_ANODE: &str = "AnodePlane";
/// Default registry name of the channel noise database.
pub const DEFAULT_NOISEDB: &str = "OmniChannelNoiseDB";
/// Default registry name of the transform backend.
pub const DEFAULT_DFT: &str = "RustFftDft";
/// Default registry name of the sticky range source.
pub const DEFAULT_STICKY_SOURCE: &str = "StickyRanges";

/// Channel-to-geometry mapping, used here only to enumerate channels.
pub trait AnodePlane: Send + Sync {
    /// Anode identifier.
    fn ident(&self) -> i32;

    /// Channels read out by this anode.
    fn channels(&self) -> Vec<ChannelId>;
}

/// Replace response `from` by response `to` in a channel's signal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseCorrection {
    /// Response the channel was actually digitized with.
    pub from: Vec<f64>,

    /// Response the channel should have.
    pub to: Vec<f64>,
}

/// Read-only per-channel noise and calibration metadata.
pub trait ChannelNoiseDb: Send + Sync {
    /// Expected baseline noise RMS of the channel, if known.
    fn baseline_rms(&self, ch: ChannelId) -> Option<f64>;

    /// Lowest acceptable RMS after noise filtering.
    fn min_rms_cut(&self, ch: ChannelId) -> f64;

    /// Highest acceptable RMS after noise filtering.
    fn max_rms_cut(&self, ch: ChannelId) -> f64;

    /// True for channels known to be unusable.
    fn is_bad(&self, ch: ChannelId) -> bool;

    /// Digitizer codes known to stick on this channel.
    fn extra_sticky_codes(&self, ch: ChannelId) -> Vec<i16>;

    /// Number of samples the channel was originally digitized with, when it
    /// differs from the readout length.
    fn resample_from(&self, ch: ChannelId) -> Option<usize>;

    /// Relative gain calibration factor.
    fn relative_gain(&self, ch: ChannelId) -> Option<f64>;

    /// Response replacement for misconfigured channels.
    fn response_correction(&self, ch: ChannelId) -> Option<ResponseCorrection>;

    /// Real per-bin gains of the channel's noise filter for an `nbins`-point spectrum.
    fn noise_filter(&self, ch: ChannelId, nbins: usize) -> Option<Vec<f64>>;
}

/// Supplier of externally detected sticky ranges.
pub trait StickyRangeSource: Send + Sync {
    /// Sticky ranges of `signal` on channel `ch`.
    ///
    /// `extra_codes` lists the codes known to stick on this channel in
    /// addition to whatever the source detects on its own.
    fn sticky_ranges(&self, ch: ChannelId, signal: &[f64], extra_codes: &[i16]) -> Vec<StickyRange>;
}

/// Named handles for every collaborator a filter may ask for.
#[derive(Clone)]
pub struct Components {
    anodes: HashMap<String, Arc<dyn AnodePlane>>,
    noise_dbs: HashMap<String, Arc<dyn ChannelNoiseDb>>,
    dfts: HashMap<String, Arc<dyn Dft>>,
    sticky_sources: HashMap<String, Arc<dyn StickyRangeSource>>,
}

impl Components {
    /// Create a registry holding the default rustfft backend.
    pub fn new() -> Self {
        let mut dfts: HashMap<String, Arc<dyn Dft>> = HashMap::new();
        dfts.insert(DEFAULT_DFT.to_string(), RustFftDft::shared());
        Self {
            anodes: HashMap::new(),
            noise_dbs: HashMap::new(),
            dfts,
            sticky_sources: HashMap::new(),
        }
    }

    /// Register an anode plane.
    pub fn with_anode(mut self, name: impl Into<String>, anode: Arc<dyn AnodePlane>) -> Self {
        self.anodes.insert(name.into(), anode);
        self
    }

    /// Register a noise database.
    pub fn with_noise_db(mut self, name: impl Into<String>, db: Arc<dyn ChannelNoiseDb>) -> Self {
        self.noise_dbs.insert(name.into(), db);
        self
    }

    /// Register a transform backend.
    pub fn with_dft(mut self, name: impl Into<String>, dft: Arc<dyn Dft>) -> Self {
        self.dfts.insert(name.into(), dft);
        self
    }

    /// Register a sticky range source.
    pub fn with_sticky_source(
        mut self,
        name: impl Into<String>,
        source: Arc<dyn StickyRangeSource>,
    ) -> Self {
        self.sticky_sources.insert(name.into(), source);
        self
    }

    /// Resolve an anode plane by name.
    pub fn anode(&self, name: &str) -> FilterResult<Arc<dyn AnodePlane>> {
        self.anodes
            .get(name)
            .cloned()
            .ok_or_else(|| FilterError::unknown_component("anode", name))
    }

    /// Resolve a noise database by name.
    pub fn noise_db(&self, name: &str) -> FilterResult<Arc<dyn ChannelNoiseDb>> {
        self.noise_dbs
            .get(name)
            .cloned()
            .ok_or_else(|| FilterError::unknown_component("noise database", name))
    }

    /// Resolve a transform backend by name.
    pub fn dft(&self, name: &str) -> FilterResult<Arc<dyn Dft>> {
        self.dfts
            .get(name)
            .cloned()
            .ok_or_else(|| FilterError::unknown_component("dft", name))
    }

    /// Resolve a sticky range source by name.
    pub fn sticky_source(&self, name: &str) -> FilterResult<Arc<dyn StickyRangeSource>> {
        self.sticky_sources
            .get(name)
            .cloned()
            .ok_or_else(|| FilterError::unknown_component("sticky range source", name))
    }
}

impl Default for Components {
    fn default() -> Self {
        Self::new()
    }
}
