//! Two-tier tile cache: memory over disk.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::level::{LevelSet, TileKey};

use super::disk::DiskTileCache;
use super::memory::MemoryTileCache;
use super::types::{CacheError, CacheStats, TileData};

/// Memory cache backed by a disk cache for one dataset.
///
/// Disk hits are decoded once and promoted into memory. Memory eviction never
/// touches the disk copy.
pub struct TileCache {
    memory: MemoryTileCache,
    disk: DiskTileCache,
    levels: Arc<LevelSet>,
    signal: Option<f64>,
}

impl TileCache {
    pub fn new(
        memory: MemoryTileCache,
        disk: DiskTileCache,
        levels: Arc<LevelSet>,
        signal: Option<f64>,
    ) -> Self {
        Self {
            memory,
            disk,
            levels,
            signal,
        }
    }

    pub fn memory(&self) -> &MemoryTileCache {
        &self.memory
    }

    pub fn disk(&self) -> &DiskTileCache {
        &self.disk
    }

    pub fn levels(&self) -> &Arc<LevelSet> {
        &self.levels
    }

    /// Memory-only lookup.
    pub fn get_resident(&self, key: &TileKey) -> Option<Arc<TileData>> {
        self.memory.get(key)
    }

    pub fn is_resident(&self, key: &TileKey) -> bool {
        self.memory.contains(key)
    }

    /// Memory, then disk. Disk hits are promoted into memory.
    ///
    /// A tile that fails to decode from disk is removed there and reported as
    /// a miss so it can be fetched again.
    pub fn get(&self, key: &TileKey) -> Result<Option<Arc<TileData>>, CacheError> {
        if let Some(tile) = self.memory.get(key) {
            return Ok(Some(tile));
        }

        let level = self.levels.level(key.level as usize)?;
        let samples = match self.disk.load(key, level.tile_width(), level.tile_height()) {
            Ok(Some(samples)) => samples,
            Ok(None) => return Ok(None),
            Err(CacheError::Io(e)) => return Err(CacheError::Io(e)),
            Err(_) => return Ok(None),
        };

        let tile = Arc::new(self.build_tile(key, samples)?);
        debug!(level = key.level, row = key.row, col = key.col, "Promoted tile from disk");
        self.memory.insert(Arc::clone(&tile));
        Ok(Some(tile))
    }

    /// Decode a fetched payload, persist it, and make it resident.
    ///
    /// A failed disk write is logged; the decoded tile is still cached in
    /// memory.
    pub fn insert_payload(&self, key: &TileKey, payload: &[u8]) -> Result<Arc<TileData>, CacheError> {
        let level = self.levels.level(key.level as usize)?;
        let samples = self
            .disk
            .format()
            .decode(payload, level.tile_width(), level.tile_height())?;
        let tile = Arc::new(self.build_tile(key, samples)?);

        if let Err(e) = self.disk.store_bytes(key, payload) {
            warn!(
                level = key.level,
                row = key.row,
                col = key.col,
                error = %e,
                "Failed to write tile to disk cache"
            );
        }
        self.memory.insert(Arc::clone(&tile));
        Ok(tile)
    }

    /// Cache already-decoded samples in both tiers.
    pub fn insert_samples(&self, key: &TileKey, samples: Vec<f32>) -> Result<Arc<TileData>, CacheError> {
        self.disk.store_samples(key, &samples)?;
        let tile = Arc::new(self.build_tile(key, samples)?);
        self.memory.insert(Arc::clone(&tile));
        Ok(tile)
    }

    /// Drop a tile from both tiers.
    pub fn invalidate(&self, key: &TileKey) -> Result<bool, CacheError> {
        self.memory.remove(key);
        self.disk.invalidate(key)
    }

    pub fn stats(&self) -> CacheStats {
        let memory = self.memory.stats();
        let disk = self.disk.stats();
        CacheStats {
            disk_hits: disk.disk_hits,
            disk_misses: disk.disk_misses,
            disk_writes: disk.disk_writes,
            disk_expired: disk.disk_expired,
            ..memory
        }
    }

    pub(crate) fn build_tile(&self, key: &TileKey, samples: Vec<f32>) -> Result<TileData, CacheError> {
        let level = self.levels.level(key.level as usize)?;
        let sector = self.levels.sector_for_tile(key)?;
        TileData::new(
            *key,
            sector,
            level.tile_width(),
            level.tile_height(),
            samples,
            self.signal,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{FileTileStore, RasterFormat};
    use crate::level::LevelSetConfig;
    use tempfile::TempDir;

    fn tile_cache(dir: &TempDir) -> TileCache {
        let levels = Arc::new(
            LevelSet::new(
                &LevelSetConfig::default()
                    .with_tile_size(2, 2)
                    .with_num_levels(4),
            )
            .unwrap(),
        );
        let disk = DiskTileCache::new(
            Arc::new(FileTileStore::new(dir.path())),
            "Earth/Test",
            ".bil",
            RasterFormat::default(),
        );
        TileCache::new(MemoryTileCache::new(1_000_000), disk, levels, Some(-32768.0))
    }

    #[test]
    fn test_payload_lands_in_both_tiers() {
        let dir = TempDir::new().unwrap();
        let cache = tile_cache(&dir);
        let key = TileKey::new(1, 2, 3);
        let payload = RasterFormat::default().encode(&[1.0, 2.0, 3.0, -32768.0]);

        let tile = cache.insert_payload(&key, &payload).unwrap();
        assert_eq!(tile.extremes(), Some((1.0, 3.0)));
        assert!(cache.is_resident(&key));
        assert!(cache.disk().contains(&key));
    }

    #[test]
    fn test_disk_hit_is_promoted() {
        let dir = TempDir::new().unwrap();
        let cache = tile_cache(&dir);
        let key = TileKey::new(0, 1, 1);
        cache.disk().store_samples(&key, &[4.0; 4]).unwrap();

        assert!(!cache.is_resident(&key));
        let tile = cache.get(&key).unwrap().unwrap();
        assert_eq!(tile.samples(), &[4.0; 4]);
        assert!(cache.is_resident(&key));
        assert_eq!(cache.stats().disk_hits, 1);
    }

    #[test]
    fn test_corrupt_disk_tile_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = tile_cache(&dir);
        let key = TileKey::new(0, 0, 0);
        cache.disk().store_bytes(&key, &[0u8; 3]).unwrap();
        assert!(cache.get(&key).unwrap().is_none());
    }

    #[test]
    fn test_undecodable_payload_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = tile_cache(&dir);
        let key = TileKey::new(0, 0, 0);
        assert!(cache.insert_payload(&key, &[1, 2, 3]).is_err());
        assert!(!cache.is_resident(&key));
        assert!(!cache.disk().contains(&key));
    }

    #[test]
    fn test_invalidate_both_tiers() {
        let dir = TempDir::new().unwrap();
        let cache = tile_cache(&dir);
        let key = TileKey::new(2, 0, 0);
        cache.insert_samples(&key, vec![0.0; 4]).unwrap();
        assert!(cache.invalidate(&key).unwrap());
        assert!(!cache.is_resident(&key));
        assert!(cache.get(&key).unwrap().is_none());
    }
}
