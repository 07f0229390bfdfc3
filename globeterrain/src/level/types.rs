//! Level hierarchy value types.

use std::fmt;

use thiserror::Error;

use crate::coord::{CoordError, Sector};

/// Maximum number of levels a level set may define.
pub const MAX_LEVELS: usize = 32;

/// Errors raised by level geometry.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LevelError {
    #[error("Invalid level configuration: {0}")]
    InvalidConfig(String),

    #[error("Level {level} does not exist (level set has {count} levels)")]
    NoSuchLevel { level: usize, count: usize },

    #[error("Invalid target resolution: {0}")]
    InvalidResolution(f64),

    #[error(transparent)]
    Coord(#[from] CoordError),
}

/// Identity of one tile: level index, row (south to north) and column (west to east).
///
/// A tile's sector is derived from the key and the level set, so keys can be
/// compared, hashed and persisted without any geometry attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub level: u8,
    pub row: u32,
    pub col: u32,
}

impl TileKey {
    pub fn new(level: u8, row: u32, col: u32) -> Self {
        Self { level, row, col }
    }

    /// The tile one level coarser that covers this tile.
    pub fn parent(&self) -> Option<TileKey> {
        if self.level == 0 {
            return None;
        }
        Some(TileKey {
            level: self.level - 1,
            row: self.row / 2,
            col: self.col / 2,
        })
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}/{}/{}", self.level, self.row, self.col)
    }
}

/// Restricts the finest level available inside a sector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectorLevelLimit {
    pub sector: Sector,
    pub max_level: usize,
}

/// One resolution tier of the tile pyramid.
#[derive(Debug, Clone, PartialEq)]
pub struct Level {
    index: usize,
    tile_delta_lat: f64,
    tile_delta_lon: f64,
    tile_width: u32,
    tile_height: u32,
    empty: bool,
    cache_path: String,
    format_suffix: String,
}

impl Level {
    pub(crate) fn new(
        index: usize,
        tile_delta: (f64, f64),
        tile_size: (u32, u32),
        empty: bool,
        cache_name: &str,
        format_suffix: &str,
    ) -> Self {
        Self {
            index,
            tile_delta_lat: tile_delta.0,
            tile_delta_lon: tile_delta.1,
            tile_width: tile_size.0,
            tile_height: tile_size.1,
            empty,
            cache_path: format!("{}/{}", cache_name, index),
            format_suffix: format_suffix.to_string(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn tile_delta_lat(&self) -> f64 {
        self.tile_delta_lat
    }

    pub fn tile_delta_lon(&self) -> f64 {
        self.tile_delta_lon
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Degrees per sample along the latitude axis.
    pub fn resolution(&self) -> f64 {
        self.tile_delta_lat / self.tile_height as f64
    }

    /// True if the level has no backing data (e.g. open ocean at this scale).
    pub fn is_empty(&self) -> bool {
        self.empty
    }

    /// Cache-relative directory of this level's tiles.
    pub fn cache_path(&self) -> &str {
        &self.cache_path
    }

    pub fn format_suffix(&self) -> &str {
        &self.format_suffix
    }
}

/// Geometry of a level set.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelSetConfig {
    /// Area with data.
    pub coverage: Sector,
    /// South-west corner of tile (0, 0) at every level.
    pub origin: (f64, f64),
    /// Tile size at level 0 in degrees, (lat, lon).
    pub level_zero_delta: (f64, f64),
    pub tile_width: u32,
    pub tile_height: u32,
    pub num_levels: usize,
    /// Levels `0..num_empty_levels` carry no data.
    pub num_empty_levels: usize,
    /// Additional individually flagged empty levels.
    pub empty_levels: Vec<usize>,
    pub sector_level_limits: Vec<SectorLevelLimit>,
    pub cache_name: String,
    pub format_suffix: String,
}

impl Default for LevelSetConfig {
    fn default() -> Self {
        Self {
            coverage: Sector::FULL_SPHERE,
            origin: (-90.0, -180.0),
            level_zero_delta: (20.0, 20.0),
            tile_width: 150,
            tile_height: 150,
            num_levels: 12,
            num_empty_levels: 0,
            empty_levels: Vec::new(),
            sector_level_limits: Vec::new(),
            cache_name: "Earth/Elevation".to_string(),
            format_suffix: ".bil".to_string(),
        }
    }
}

impl LevelSetConfig {
    pub fn with_level_zero_delta(mut self, lat: f64, lon: f64) -> Self {
        self.level_zero_delta = (lat, lon);
        self
    }

    pub fn with_tile_size(mut self, width: u32, height: u32) -> Self {
        self.tile_width = width;
        self.tile_height = height;
        self
    }

    pub fn with_num_levels(mut self, num_levels: usize) -> Self {
        self.num_levels = num_levels;
        self
    }

    pub fn with_num_empty_levels(mut self, num_empty_levels: usize) -> Self {
        self.num_empty_levels = num_empty_levels;
        self
    }

    pub fn with_empty_level(mut self, level: usize) -> Self {
        self.empty_levels.push(level);
        self
    }

    pub fn with_coverage(mut self, coverage: Sector) -> Self {
        self.coverage = coverage;
        self
    }

    pub fn with_sector_level_limit(mut self, sector: Sector, max_level: usize) -> Self {
        self.sector_level_limits
            .push(SectorLevelLimit { sector, max_level });
        self
    }

    pub fn with_cache_name(mut self, cache_name: impl Into<String>) -> Self {
        self.cache_name = cache_name.into();
        self
    }

    pub fn with_format_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.format_suffix = suffix.into();
        self
    }
}
