//! The elevation model: answers elevation queries for one dataset.
//!
//! Queries never block on the network. A query that misses the caches
//! starts a fetch for the finest tile it needs and answers from the best
//! coarser tile already available, or with the missing-data replacement.
//!
//! # Example
//!
//! ```ignore
//! use globeterrain::elevation::{ElevationModel, ElevationModelConfig, ModelServices};
//!
//! let model = ElevationModel::new(config, services)?;
//! let meters = model.get_elevation(46.55, 7.98)?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::cache::{
    CacheStats, DiskTileCache, MemoryTileCache, RasterFormat, TileCache, TileData, TileStore,
};
use crate::coord::{validate_location, Sector};
use crate::level::{LevelSet, TileKey};
use crate::provider::{HttpClient, ProviderFactory};
use crate::retrieve::{AbsentTileList, FetchHandle, FetchOutcome, RetrievalService, TileRetriever};

use super::config::{ElevationModelConfig, COMPOSE_READ_TIMEOUT};
use super::error::ElevationError;
use super::extremes::ExtremesTable;
use super::geoid::{Egm96Grid, GeoidOffset};
use super::sampling::sample_tile;

/// External collaborators an [`ElevationModel`] is built on.
#[derive(Clone)]
pub struct ModelServices {
    /// Backing store of the disk cache.
    pub store: Arc<dyn TileStore>,
    /// Executes asynchronous tile fetches.
    pub retrieval: Arc<dyn RetrievalService>,
    /// Client for blocking composite requests.
    pub compose_client: Arc<dyn HttpClient>,
    /// Capacity of the memory cache.
    pub memory_cache_bytes: u64,
}

/// Lifecycle state of one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    Unrequested,
    Requested,
    Resident,
    Absent,
}

/// How missing samples are recognised and reported.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MissingDataPolicy {
    pub signal: Option<f64>,
    pub replacement: f64,
}

/// Elevation data for one dataset.
pub struct ElevationModel {
    config: ElevationModelConfig,
    levels: Arc<LevelSet>,
    cache: Arc<TileCache>,
    retriever: TileRetriever,
    format: RasterFormat,
    extremes: Option<ExtremesTable>,
    geoid: Option<Arc<dyn GeoidOffset>>,
    compose_client: Arc<dyn HttpClient>,
}

impl ElevationModel {
    /// Build a model from a validated configuration.
    ///
    /// Extremes and geoid files that cannot be loaded are logged and skipped.
    pub fn new(config: ElevationModelConfig, services: ModelServices) -> Result<Self, ElevationError> {
        config.validate()?;

        let levels = Arc::new(LevelSet::new(&config.level_set_config())?);
        let format = config.raster_format()?;

        let disk = DiskTileCache::new(
            services.store,
            config.cache_name.clone(),
            config.format_suffix.clone(),
            format,
        )
        .with_expiry_time(config.expiry_time);
        let memory = MemoryTileCache::new(services.memory_cache_bytes);
        let cache = Arc::new(TileCache::new(
            memory,
            disk,
            Arc::clone(&levels),
            config.missing_data_signal,
        ));

        let url_builder = ProviderFactory::create(&config.url_builder_config())?;
        let absent = Arc::new(AbsentTileList::new(
            config.max_absent_attempts,
            config.min_absent_check_interval,
        ));
        let retriever = TileRetriever::new(
            url_builder,
            services.retrieval,
            Arc::clone(&cache),
            absent,
            config.retriever_config(),
        );

        let extremes = config.extremes_file.as_ref().and_then(|path| {
            match ExtremesTable::load(path, &levels, config.extremes_level, config.byte_order) {
                Ok(table) => Some(table),
                Err(e) => {
                    warn!(dataset = %config.dataset_name, path = %path.display(), error = %e, "Extremes table not loaded");
                    None
                }
            }
        });

        let geoid = config.geoid_file.as_ref().and_then(|path| match Egm96Grid::load(path) {
            Ok(grid) => Some(Arc::new(grid) as Arc<dyn GeoidOffset>),
            Err(e) => {
                warn!(dataset = %config.dataset_name, path = %path.display(), error = %e, "Geoid grid not loaded");
                None
            }
        });

        info!(
            dataset = %config.dataset_name,
            provider = %config.provider,
            levels = levels.num_levels(),
            cache = %config.cache_name,
            extremes = extremes.is_some(),
            geoid = geoid.is_some(),
            "Elevation model created"
        );

        Ok(Self {
            config,
            levels,
            cache,
            retriever,
            format,
            extremes,
            geoid,
            compose_client: services.compose_client,
        })
    }

    /// Replace the geoid correction.
    pub fn with_geoid(mut self, geoid: Arc<dyn GeoidOffset>) -> Self {
        self.geoid = Some(geoid);
        self
    }

    /// Replace the extremes table.
    pub fn with_extremes(mut self, table: ExtremesTable) -> Self {
        self.extremes = Some(table);
        self
    }

    pub fn config(&self) -> &ElevationModelConfig {
        &self.config
    }

    pub fn level_set(&self) -> &Arc<LevelSet> {
        &self.levels
    }

    pub fn cache(&self) -> &Arc<TileCache> {
        &self.cache
    }

    pub fn retriever(&self) -> &TileRetriever {
        &self.retriever
    }

    pub fn extremes_table(&self) -> Option<&ExtremesTable> {
        self.extremes.as_ref()
    }

    pub fn missing_data_policy(&self) -> MissingDataPolicy {
        MissingDataPolicy {
            signal: self.config.missing_data_signal,
            replacement: self.config.missing_data_replacement,
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// True if the dataset covers the location.
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        self.levels.coverage().contains(lat, lon)
    }

    /// Elevation in meters at a location.
    ///
    /// Fails only for invalid coordinates. Locations outside the coverage or
    /// without data yield the missing-data replacement.
    pub fn get_elevation(&self, lat: f64, lon: f64) -> Result<f64, ElevationError> {
        validate_location(lat, lon)?;
        if !self.contains(lat, lon) {
            return Ok(self.config.missing_data_replacement);
        }

        let finest = self.levels.last_level_at(lat, lon);
        let mut requested = false;
        for level in (0..=finest).rev() {
            if self.levels.level(level)?.is_empty() {
                continue;
            }
            let key = self.levels.tile_for_location(level, lat, lon)?;
            if let Some(tile) = self.lookup_tile(&key) {
                return Ok(self.sample_value(&tile, lat, lon));
            }
            if !requested {
                if let Some(tile) = self.request_tile(key, &mut requested) {
                    return Ok(self.sample_value(&tile, lat, lon));
                }
            }
        }

        debug!(lat, lon, "No elevation data resident");
        Ok(self.config.missing_data_replacement)
    }

    /// Elevations of `points` at each target resolution.
    ///
    /// `out` holds one block of `points.len()` values per target, in target
    /// order. Returns per target the resolution actually achieved: that of
    /// the coarsest level used, or `f64::MAX` if any covered point had no
    /// data at all.
    pub fn get_elevations(
        &self,
        sector: &Sector,
        points: &[(f64, f64)],
        target_resolutions: &[f64],
        out: &mut [f64],
    ) -> Result<Vec<f64>, ElevationError> {
        let expected = points.len() * target_resolutions.len();
        if out.len() != expected {
            return Err(ElevationError::InvalidArgument(format!(
                "output buffer holds {} values, expected {} ({} points x {} resolutions)",
                out.len(),
                expected,
                points.len(),
                target_resolutions.len()
            )));
        }
        for &(lat, lon) in points {
            validate_location(lat, lon)?;
        }

        let mut tiles: HashMap<TileKey, Option<Arc<TileData>>> = HashMap::new();
        let mut achieved = Vec::with_capacity(target_resolutions.len());

        for (index, &target) in target_resolutions.iter().enumerate() {
            let block = &mut out[index * points.len()..(index + 1) * points.len()];
            let target_level = self.levels.select_level(sector, target)?;
            let mut coarsest = target_level;
            let mut missing = false;

            for (slot, &(lat, lon)) in block.iter_mut().zip(points) {
                if !self.contains(lat, lon) {
                    *slot = self.config.missing_data_replacement;
                    continue;
                }
                match self.best_tile(target_level, lat, lon, &mut tiles)? {
                    Some((level, tile)) => {
                        coarsest = coarsest.min(level);
                        *slot = self.sample_value(&tile, lat, lon);
                    }
                    None => {
                        missing = true;
                        *slot = self.config.missing_data_replacement;
                    }
                }
            }

            achieved.push(if missing {
                f64::MAX
            } else {
                self.levels.level(coarsest)?.resolution()
            });
        }

        debug!(
            points = points.len(),
            targets = target_resolutions.len(),
            tiles = tiles.len(),
            "Batch elevation query"
        );
        Ok(achieved)
    }

    /// Fill `buffer` with elevations of `points` from one blocking composite
    /// request covering `sector`.
    ///
    /// The composite is `tile_width` samples wide with a height matching the
    /// sector's aspect ratio. Blocks the calling thread; never call it from
    /// an async worker or a latency-sensitive thread.
    pub fn compose_elevations(
        &self,
        sector: &Sector,
        points: &[(f64, f64)],
        tile_width: u32,
        buffer: &mut [f64],
    ) -> Result<(), ElevationError> {
        if buffer.len() != points.len() {
            return Err(ElevationError::InvalidArgument(format!(
                "buffer holds {} values for {} points",
                buffer.len(),
                points.len()
            )));
        }
        if tile_width < 2 {
            return Err(ElevationError::InvalidArgument(format!(
                "composite width {} is below 2",
                tile_width
            )));
        }
        if sector.delta_lon() <= 0.0 || sector.delta_lat() <= 0.0 {
            return Err(ElevationError::InvalidArgument(format!(
                "composite sector {} has no area",
                sector
            )));
        }
        for &(lat, lon) in points {
            validate_location(lat, lon)?;
        }

        let tile_height = ((tile_width as f64 * sector.delta_lat() / sector.delta_lon()).round() as u32).max(2);
        let url = self
            .retriever
            .url_builder()
            .composite_url(sector, tile_width, tile_height, &self.config.data_format)
            .map_err(|e| ElevationError::Composition(e.to_string()))?;

        info!(dataset = %self.config.dataset_name, url = %url, width = tile_width, height = tile_height, "Requesting composite");

        let payload = self
            .compose_client
            .get(&url, COMPOSE_READ_TIMEOUT)
            .map_err(|e| ElevationError::Composition(format!("{}: {}", url, e)))?;
        let samples = self
            .format
            .decode(&payload, tile_width, tile_height)
            .map_err(|e| ElevationError::Composition(format!("{}: {}", url, e)))?;
        let tile = TileData::new(
            TileKey::new(0, 0, 0),
            *sector,
            tile_width,
            tile_height,
            samples,
            self.config.missing_data_signal,
        )
        .map_err(|e| ElevationError::Composition(e.to_string()))?;

        for (slot, &(lat, lon)) in buffer.iter_mut().zip(points) {
            *slot = self.sample_value(&tile, lat, lon);
        }
        Ok(())
    }

    /// Minimum and maximum elevation in a sector.
    ///
    /// Uses the extremes table when every table tile over the sector was
    /// built. Otherwise merges whatever the table has with the tiles already
    /// in memory, and falls back to the dataset's configured range when
    /// neither has data. Never touches disk or network.
    pub fn get_extreme_elevations(&self, sector: &Sector) -> Result<(f64, f64), ElevationError> {
        let table = self.extremes.as_ref();
        if let Some(extremes) = table.and_then(|t| t.lookup(&self.levels, sector)) {
            return Ok(extremes);
        }

        let partial = table.and_then(|t| t.partial_lookup(&self.levels, sector));
        let resident = self
            .cache
            .memory()
            .resident_tiles()
            .into_iter()
            .filter(|tile| tile.sector().intersects(sector))
            .filter_map(|tile| tile.extremes());

        let merged = partial
            .into_iter()
            .chain(resident)
            .reduce(|(a_min, a_max), (b_min, b_max)| (a_min.min(b_min), a_max.max(b_max)));

        Ok(merged.unwrap_or((self.config.elevation_min, self.config.elevation_max)))
    }

    /// Minimum and maximum elevation around a location.
    pub fn get_extreme_elevations_at(&self, lat: f64, lon: f64) -> Result<(f64, f64), ElevationError> {
        let sector = Sector::new(lat, lat, lon, lon)?;
        self.get_extreme_elevations(&sector)
    }

    /// Resolution in degrees of the finest populated level over `sector`,
    /// or `f64::MAX` if the dataset does not cover it.
    pub fn get_best_resolution(&self, sector: &Sector) -> Result<f64, ElevationError> {
        if !self.levels.coverage().intersects(sector) {
            return Ok(f64::MAX);
        }
        let level = self.levels.last_level_for(sector);
        Ok(self.levels.level(level)?.resolution())
    }

    pub fn tile_state(&self, key: &TileKey) -> TileState {
        if self.cache.is_resident(key) {
            TileState::Resident
        } else if self.retriever.is_requested(key) {
            TileState::Requested
        } else if self.retriever.absent().is_absent(key) {
            TileState::Absent
        } else {
            TileState::Unrequested
        }
    }

    /// The in-flight fetch for the finest tile at a location, if any.
    pub fn pending_fetch(&self, lat: f64, lon: f64) -> Option<FetchHandle> {
        if !self.contains(lat, lon) {
            return None;
        }
        let level = self.levels.last_level_at(lat, lon);
        let key = self.levels.tile_for_location(level, lat, lon).ok()?;
        self.retriever.pending(&key)
    }

    /// Compute an extremes table from the disk cache at the configured
    /// extremes level.
    pub fn build_extremes(&self) -> Result<ExtremesTable, ElevationError> {
        ExtremesTable::build_from_disk(
            &self.levels,
            self.cache.disk(),
            self.config.extremes_level,
            self.config.missing_data_signal,
            self.config.byte_order,
        )
    }

    fn lookup_tile(&self, key: &TileKey) -> Option<Arc<TileData>> {
        match self.cache.get(key) {
            Ok(Some(tile)) => Some(tile),
            Ok(None) => {
                debug!(level = key.level, row = key.row, col = key.col, "Tile cache miss");
                None
            }
            Err(e) => {
                warn!(level = key.level, row = key.row, col = key.col, error = %e, "Tile cache read failed");
                None
            }
        }
    }

    /// Request a tile; returns it if the fetch completed synchronously.
    fn request_tile(&self, key: TileKey, requested: &mut bool) -> Option<Arc<TileData>> {
        let handle = self.retriever.request(key)?;
        *requested = true;
        match handle.outcome() {
            Some(FetchOutcome::Resident) => self.cache.get_resident(&key),
            _ => None,
        }
    }

    /// Finest tile at or below `max_level` holding the location.
    fn best_tile(
        &self,
        max_level: usize,
        lat: f64,
        lon: f64,
        seen: &mut HashMap<TileKey, Option<Arc<TileData>>>,
    ) -> Result<Option<(usize, Arc<TileData>)>, ElevationError> {
        let finest = max_level.min(self.levels.last_level_at(lat, lon));
        let mut requested = false;
        for level in (0..=finest).rev() {
            if self.levels.level(level)?.is_empty() {
                continue;
            }
            let key = self.levels.tile_for_location(level, lat, lon)?;
            let tile = match seen.get(&key) {
                Some(tile) => {
                    // Already looked up, and requested if it was missing.
                    requested |= tile.is_none();
                    tile.clone()
                }
                None => {
                    let mut tile = self.lookup_tile(&key);
                    if tile.is_none() && !requested {
                        tile = self.request_tile(key, &mut requested);
                    }
                    seen.insert(key, tile.clone());
                    tile
                }
            };
            if let Some(tile) = tile {
                return Ok(Some((level, tile)));
            }
        }
        Ok(None)
    }

    fn sample_value(&self, tile: &TileData, lat: f64, lon: f64) -> f64 {
        match sample_tile(
            tile,
            lat,
            lon,
            self.config.use_bilinear,
            self.config.missing_data_signal,
        ) {
            Some(value) => value + self.geoid.as_ref().map_or(0.0, |g| g.offset(lat, lon)),
            None => self.config.missing_data_replacement,
        }
    }
}
