//! Elevation model
//!
//! [`ElevationModel`] answers point, batch and extremes queries for one
//! dataset described by an [`ElevationModelConfig`]. Tiles come from the
//! two-tier cache and are fetched in the background when missing; an
//! optional [`ExtremesTable`] and [`GeoidOffset`] refine the answers.

mod config;
mod error;
mod extremes;
mod geoid;
mod model;
mod sampling;

pub use config::{parse_bool, ElevationModelConfig, COMPOSE_CONNECT_TIMEOUT, COMPOSE_READ_TIMEOUT};
pub use error::{ConfigError, ElevationError};
pub use extremes::ExtremesTable;
pub use geoid::{Egm96Grid, GeoidOffset, EGM96_COLS, EGM96_ROWS};
pub use model::{ElevationModel, MissingDataPolicy, ModelServices, TileState};
pub use sampling::sample_tile;
