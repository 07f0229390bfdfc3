//! Level hierarchy
//!
//! Describes the multi-resolution tile pyramid of an elevation dataset. Each
//! level halves the tile extent of the previous one while keeping the same
//! sample dimensions, so resolution doubles per level.

mod set;
mod types;

pub use set::LevelSet;
pub use types::{Level, LevelError, LevelSetConfig, SectorLevelLimit, TileKey, MAX_LEVELS};
