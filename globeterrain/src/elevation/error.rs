//! Elevation model error types.

use thiserror::Error;

use crate::cache::CacheError;
use crate::coord::CoordError;
use crate::level::LevelError;
use crate::provider::ProviderError;

/// Errors in an elevation dataset's configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A required key is absent or empty.
    #[error("Missing required configuration key '{key}' in [{section}]")]
    Missing { section: String, key: &'static str },

    /// A key has a value that cannot be used.
    #[error("Invalid value '{value}' for '{key}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    /// The configuration source could not be read.
    #[error("Failed to load configuration: {0}")]
    Load(String),
}

impl ConfigError {
    pub(crate) fn invalid(key: &str, value: impl ToString, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced by the elevation model.
#[derive(Debug, Error)]
pub enum ElevationError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Coord(#[from] CoordError),

    #[error(transparent)]
    Level(#[from] LevelError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// A caller passed arguments that cannot be honoured.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A one-shot composite request failed.
    #[error("Composition failed: {0}")]
    Composition(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
