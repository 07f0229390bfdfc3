//! Application error types.

use thiserror::Error;

use crate::elevation::{ConfigError, ElevationError};
use crate::provider::ProviderError;

/// Errors that can occur while assembling an engine.
#[derive(Debug, Error)]
pub enum AppError {
    /// The configuration file could not be read or parsed.
    #[error("Failed to read configuration {path}: {reason}")]
    ConfigFile { path: String, reason: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No dataset with the requested name is configured.
    #[error("Unknown dataset '{name}' (configured: {available})")]
    UnknownDataset { name: String, available: String },

    /// The configuration describes no datasets.
    #[error("No elevation datasets configured")]
    NoDatasets,

    /// Failed to create the HTTP client.
    #[error("Failed to create HTTP client: {0}")]
    HttpClient(#[from] ProviderError),

    /// Failed to create the Tokio runtime.
    #[error("Failed to create Tokio runtime: {0}")]
    RuntimeCreation(String),

    /// Failed to build an elevation model.
    #[error("Failed to create elevation model: {0}")]
    Model(#[from] ElevationError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_error_display() {
        let err = AppError::UnknownDataset {
            name: "etopo".to_string(),
            available: "srtm, gebco".to_string(),
        };
        assert!(err.to_string().contains("etopo"));
        assert!(err.to_string().contains("srtm, gebco"));
    }

    #[test]
    fn test_app_error_from_config_error() {
        let err: AppError = ConfigError::Load("bad".to_string()).into();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("Configuration error"));
    }
}
