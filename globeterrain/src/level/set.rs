//! Multi-resolution level set: level selection and tile geometry.

use crate::coord::{validate_location, Sector, MAX_LAT, MAX_LON};

use super::types::{Level, LevelError, LevelSetConfig, SectorLevelLimit, TileKey, MAX_LEVELS};

/// Quad-tree-like set of resolution levels.
///
/// Level `n` tiles span `level_zero_delta / 2ⁿ` degrees. All geometry here is
/// a pure function of the configuration; nothing depends on cache state.
#[derive(Debug, Clone)]
pub struct LevelSet {
    coverage: Sector,
    origin_lat: f64,
    origin_lon: f64,
    levels: Vec<Level>,
    sector_level_limits: Vec<SectorLevelLimit>,
    last_populated: usize,
}

impl LevelSet {
    /// Builds the level set, validating its geometry.
    pub fn new(config: &LevelSetConfig) -> Result<Self, LevelError> {
        let (delta_lat, delta_lon) = config.level_zero_delta;
        if !(delta_lat > 0.0 && delta_lon > 0.0 && delta_lat.is_finite() && delta_lon.is_finite())
        {
            return Err(LevelError::InvalidConfig(format!(
                "level zero tile delta must be positive, got ({}, {})",
                delta_lat, delta_lon
            )));
        }
        if config.tile_width < 2 || config.tile_height < 2 {
            return Err(LevelError::InvalidConfig(format!(
                "tiles need at least 2x2 samples, got {}x{}",
                config.tile_width, config.tile_height
            )));
        }
        if config.num_levels == 0 || config.num_levels > MAX_LEVELS {
            return Err(LevelError::InvalidConfig(format!(
                "number of levels must be within 1..={}, got {}",
                MAX_LEVELS, config.num_levels
            )));
        }
        let (origin_lat, origin_lon) = config.origin;
        validate_location(origin_lat, origin_lon)?;

        let levels: Vec<Level> = (0..config.num_levels)
            .map(|index| {
                let scale = (1u64 << index) as f64;
                let empty =
                    index < config.num_empty_levels || config.empty_levels.contains(&index);
                Level::new(
                    index,
                    (delta_lat / scale, delta_lon / scale),
                    (config.tile_width, config.tile_height),
                    empty,
                    &config.cache_name,
                    &config.format_suffix,
                )
            })
            .collect();

        let last_populated = levels
            .iter()
            .rposition(|level| !level.is_empty())
            .ok_or_else(|| LevelError::InvalidConfig("every level is flagged empty".to_string()))?;

        Ok(Self {
            coverage: config.coverage,
            origin_lat,
            origin_lon,
            levels,
            sector_level_limits: config.sector_level_limits.clone(),
            last_populated,
        })
    }

    pub fn coverage(&self) -> &Sector {
        &self.coverage
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn level(&self, index: usize) -> Result<&Level, LevelError> {
        self.levels.get(index).ok_or(LevelError::NoSuchLevel {
            level: index,
            count: self.levels.len(),
        })
    }

    /// Index of the finest level with data anywhere in the set.
    pub fn last_populated_level(&self) -> usize {
        self.last_populated
    }

    /// Index of the finest populated level available within `sector`.
    pub fn last_level_for(&self, sector: &Sector) -> usize {
        let limit = self
            .sector_level_limits
            .iter()
            .find(|limit| limit.sector.intersects(sector))
            .map(|limit| limit.max_level)
            .unwrap_or(self.last_populated);
        self.populated_at_or_below(limit.min(self.last_populated))
    }

    /// Index of the finest populated level available at a location.
    pub fn last_level_at(&self, lat: f64, lon: f64) -> usize {
        let limit = self
            .sector_level_limits
            .iter()
            .find(|limit| limit.sector.contains(lat, lon))
            .map(|limit| limit.max_level)
            .unwrap_or(self.last_populated);
        self.populated_at_or_below(limit.min(self.last_populated))
    }

    /// Chooses the level that serves `target_resolution` (degrees per sample).
    ///
    /// Returns the smallest level index whose resolution is at or below the
    /// target, clamped to the finest level available in the sector. Empty
    /// levels are skipped toward finer levels; if nothing finer is populated
    /// the nearest coarser populated level is used instead.
    pub fn select_level(&self, sector: &Sector, target_resolution: f64) -> Result<usize, LevelError> {
        if target_resolution.is_nan() || target_resolution <= 0.0 {
            return Err(LevelError::InvalidResolution(target_resolution));
        }
        let last = self.last_level_for(sector);

        let wanted = self
            .levels
            .iter()
            .position(|level| level.resolution() <= target_resolution)
            .unwrap_or(last)
            .min(last);

        if let Some(index) = (wanted..=last).find(|&i| !self.levels[i].is_empty()) {
            return Ok(index);
        }
        Ok(self.populated_at_or_below(wanted))
    }

    /// The tile of `level` containing a location.
    pub fn tile_for_location(&self, level: usize, lat: f64, lon: f64) -> Result<TileKey, LevelError> {
        validate_location(lat, lon)?;
        let level_ref = self.level(level)?;

        let row = self.index_for(lat, self.origin_lat, level_ref.tile_delta_lat(), self.row_count(level_ref));
        let col = self.index_for(lon, self.origin_lon, level_ref.tile_delta_lon(), self.col_count(level_ref));

        Ok(TileKey::new(level as u8, row, col))
    }

    /// The sector covered by a tile; the inverse of [`Self::tile_for_location`].
    pub fn sector_for_tile(&self, key: &TileKey) -> Result<Sector, LevelError> {
        let level = self.level(key.level as usize)?;
        let min_lat = self.origin_lat + key.row as f64 * level.tile_delta_lat();
        let min_lon = self.origin_lon + key.col as f64 * level.tile_delta_lon();
        if min_lat >= MAX_LAT || min_lon >= MAX_LON {
            return Err(LevelError::InvalidConfig(format!(
                "tile {} lies outside the globe",
                key
            )));
        }
        Ok(Sector::from_bounds_unchecked(
            min_lat,
            (min_lat + level.tile_delta_lat()).min(MAX_LAT),
            min_lon,
            (min_lon + level.tile_delta_lon()).min(MAX_LON),
        ))
    }

    /// All tiles of `level` overlapping `sector` within the coverage area.
    pub fn tiles_in_sector(&self, level: usize, sector: &Sector) -> Result<Vec<TileKey>, LevelError> {
        self.level(level)?;
        let Some(area) = self.coverage.intersection(sector) else {
            return Ok(Vec::new());
        };
        let first = self.tile_for_location(level, area.min_lat(), area.min_lon())?;
        let last = self.tile_for_location(level, area.max_lat(), area.max_lon())?;

        let mut keys =
            Vec::with_capacity(((last.row - first.row + 1) * (last.col - first.col + 1)) as usize);
        for row in first.row..=last.row {
            for col in first.col..=last.col {
                keys.push(TileKey::new(level as u8, row, col));
            }
        }
        Ok(keys)
    }

    /// Number of tile rows at a level.
    pub fn row_count(&self, level: &Level) -> u32 {
        ((MAX_LAT - self.origin_lat) / level.tile_delta_lat()).ceil().max(1.0) as u32
    }

    /// Number of tile columns at a level.
    pub fn col_count(&self, level: &Level) -> u32 {
        ((MAX_LON - self.origin_lon) / level.tile_delta_lon()).ceil().max(1.0) as u32
    }

    fn index_for(&self, value: f64, origin: f64, delta: f64, count: u32) -> u32 {
        let index = ((value - origin) / delta).floor();
        // The northern and eastern edges belong to the last tile.
        index.clamp(0.0, (count - 1) as f64) as u32
    }

    fn populated_at_or_below(&self, index: usize) -> usize {
        (0..=index)
            .rev()
            .find(|&i| !self.levels[i].is_empty())
            .unwrap_or(self.last_populated)
    }
}
