//! In-memory tile cache with byte-bounded LRU eviction using moka.
//!
//! Values are complete `Arc<TileData>` instances, so a reader either sees a
//! whole tile or nothing. Writes replace whole values. Reads never block on
//! writers: moka's sync cache uses lock-free structures for lookups.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use moka::notification::RemovalCause;
use moka::sync::Cache;

use crate::level::TileKey;

use super::types::{CacheStats, TileData};

/// Default memory budget for decoded tiles: 256 MB.
pub const DEFAULT_MEMORY_CACHE_BYTES: u64 = 256 * 1024 * 1024;

/// Memory tier of the tile cache.
pub struct MemoryTileCache {
    cache: Cache<TileKey, Arc<TileData>>,
    max_size_bytes: u64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: Arc<AtomicU64>,
}

impl MemoryTileCache {
    /// Create a memory cache bounded to `max_size_bytes` of decoded samples.
    pub fn new(max_size_bytes: u64) -> Self {
        let evictions = Arc::new(AtomicU64::new(0));
        let eviction_counter = Arc::clone(&evictions);

        let cache = Cache::builder()
            // Weight each entry by its decoded size
            .weigher(|_key: &TileKey, tile: &Arc<TileData>| -> u32 {
                tile.size_bytes().min(u32::MAX as usize) as u32
            })
            .max_capacity(max_size_bytes)
            .eviction_listener(move |_key, _tile, cause| {
                if cause == RemovalCause::Size {
                    eviction_counter.fetch_add(1, Ordering::Relaxed);
                }
            })
            .build();

        Self {
            cache,
            max_size_bytes,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions,
        }
    }

    /// Look up a tile, counting the hit or miss.
    pub fn get(&self, key: &TileKey) -> Option<Arc<TileData>> {
        match self.cache.get(key) {
            Some(tile) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(tile)
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Look up a tile without touching the statistics.
    pub fn peek(&self, key: &TileKey) -> Option<Arc<TileData>> {
        self.cache.get(key)
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.cache.contains_key(key)
    }

    /// Insert or replace a tile.
    pub fn insert(&self, tile: Arc<TileData>) {
        self.cache.insert(tile.key(), tile);
    }

    pub fn remove(&self, key: &TileKey) {
        self.cache.invalidate(key);
    }

    /// Snapshot of every resident tile, in no particular order.
    pub fn resident_tiles(&self) -> Vec<Arc<TileData>> {
        self.cache.iter().map(|(_, tile)| tile).collect()
    }

    /// Apply pending evictions and bookkeeping.
    pub fn run_pending_tasks(&self) {
        self.cache.run_pending_tasks();
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }

    pub fn size_bytes(&self) -> u64 {
        self.cache.weighted_size()
    }

    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    pub fn clear(&self) {
        self.cache.invalidate_all();
        self.cache.run_pending_tasks();
    }

    /// Memory-tier counters; disk fields are left at zero.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.hits.load(Ordering::Relaxed),
            memory_misses: self.misses.load(Ordering::Relaxed),
            memory_evictions: self.evictions.load(Ordering::Relaxed),
            memory_entry_count: self.entry_count(),
            memory_size_bytes: self.size_bytes(),
            ..CacheStats::default()
        }
    }
}

impl Default for MemoryTileCache {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_CACHE_BYTES)
    }
}
