//! Error types for channel filters.

use lib_dsp::DspError;
use thiserror::Error;

/// Errors that can occur while configuring or applying a channel filter.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A named component (anode, noise database, ...) is not registered.
    #[error("Unknown {kind} component '{name}'")]
    UnknownComponent { kind: &'static str, name: String },

    /// The configuration object does not match the stage's schema.
    #[error("Invalid configuration for {stage}: {source}")]
    InvalidConfig {
        stage: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A configuration value is out of its accepted range.
    #[error("Invalid parameter '{name}' for {stage}: {reason}")]
    InvalidParameter {
        stage: &'static str,
        name: &'static str,
        reason: String,
    },

    /// Filter applied before `configure()` resolved its components.
    #[error("{0} applied before configure()")]
    NotConfigured(&'static str),

    /// Stage type name not known to the pipeline.
    #[error("Unknown filter stage type '{0}'")]
    UnknownStage(String),

    /// Numerical or range failure in the DSP core.
    #[error(transparent)]
    Dsp(#[from] DspError),
}

impl FilterError {
    /// Create an unknown component error.
    pub fn unknown_component(kind: &'static str, name: impl Into<String>) -> Self {
        Self::UnknownComponent {
            kind,
            name: name.into(),
        }
    }

    /// Create an invalid parameter error.
    pub fn invalid_parameter(
        stage: &'static str,
        name: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidParameter {
            stage,
            name,
            reason: reason.into(),
        }
    }

    /// Check if this is a configuration error (fatal to building the filter).
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownComponent { .. }
                | Self::InvalidConfig { .. }
                | Self::InvalidParameter { .. }
                | Self::NotConfigured(_)
                | Self::UnknownStage(_)
        )
    }
}

/// Result type for filter operations.
pub type FilterResult<T> = Result<T, FilterError>;
