//! CLI error type.

use globeterrain::app::AppError;
use globeterrain::coord::CoordError;
use globeterrain::elevation::ElevationError;
use globeterrain::logging::LoggingError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    App(#[from] AppError),

    #[error(transparent)]
    Elevation(#[from] ElevationError),

    #[error(transparent)]
    Coord(#[from] CoordError),

    /// Invalid arguments or configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to set up logging: {0}")]
    Logging(#[from] LoggingError),
}
