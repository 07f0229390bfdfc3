//! Persistent tile store beneath the memory cache.
//!
//! Tiles live at deterministic cache-relative paths:
//!
//! ```text
//! <cache_name>/<level>/<row>/<row>_<col><suffix>
//! ```
//!
//! Writes go to a temporary sibling first and are renamed into place, so a
//! concurrent reader never observes a partially written tile.

use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::level::TileKey;

use super::codec::RasterFormat;
use super::types::{CacheError, CacheStats};

/// Bytes and modification time of a stored file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTile {
    pub data: Vec<u8>,
    pub modified: SystemTime,
}

/// A store that maps cache-relative paths to bytes.
pub trait TileStore: Send + Sync {
    /// Read a stored file, `Ok(None)` if it does not exist.
    fn read(&self, relative: &Path) -> io::Result<Option<StoredTile>>;

    /// Write a file atomically, creating parent directories as needed.
    fn write(&self, relative: &Path, data: &[u8]) -> io::Result<()>;

    /// Remove a file. Returns true if it existed.
    fn remove(&self, relative: &Path) -> io::Result<bool>;

    /// Returns true if a file exists at the path.
    fn exists(&self, relative: &Path) -> bool;

    /// Absolute location of a relative path, if the store is file-backed.
    fn locate(&self, relative: &Path) -> Option<PathBuf>;
}

/// Filesystem-backed tile store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileTileStore {
    root: PathBuf,
}

impl FileTileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl TileStore for FileTileStore {
    fn read(&self, relative: &Path) -> io::Result<Option<StoredTile>> {
        let path = self.root.join(relative);
        let modified = match fs::metadata(&path) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        match fs::read(&path) {
            Ok(data) => Ok(Some(StoredTile { data, modified })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn write(&self, relative: &Path, data: &[u8]) -> io::Result<()> {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // Unique per writer so concurrent writes of one tile do not collide.
        let temp_path = path.with_extension(format!(
            "tmp{}",
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        let result = fs::File::create(&temp_path).and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        });
        if let Err(e) = result {
            let _ = fs::remove_file(&temp_path);
            return Err(e);
        }

        fs::rename(&temp_path, &path).inspect_err(|_| {
            let _ = fs::remove_file(&temp_path);
        })
    }

    fn remove(&self, relative: &Path) -> io::Result<bool> {
        match fs::remove_file(self.root.join(relative)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn exists(&self, relative: &Path) -> bool {
        self.root.join(relative).is_file()
    }

    fn locate(&self, relative: &Path) -> Option<PathBuf> {
        Some(self.root.join(relative))
    }
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Disk tier of the tile cache for one dataset.
pub struct DiskTileCache {
    store: Arc<dyn TileStore>,
    cache_name: String,
    suffix: String,
    format: RasterFormat,
    /// Unix seconds; files modified before this instant are stale. 0 disables.
    expiry_time: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    writes: AtomicU64,
    expired: AtomicU64,
}

impl DiskTileCache {
    pub fn new(
        store: Arc<dyn TileStore>,
        cache_name: impl Into<String>,
        suffix: impl Into<String>,
        format: RasterFormat,
    ) -> Self {
        Self {
            store,
            cache_name: cache_name.into(),
            suffix: suffix.into(),
            format,
            expiry_time: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            expired: AtomicU64::new(0),
        }
    }

    /// Treat every file written before `unix_secs` as stale.
    pub fn with_expiry_time(self, unix_secs: u64) -> Self {
        self.set_expiry_time(unix_secs);
        self
    }

    pub fn set_expiry_time(&self, unix_secs: u64) {
        self.expiry_time.store(unix_secs, Ordering::Relaxed);
    }

    pub fn expiry_time(&self) -> u64 {
        self.expiry_time.load(Ordering::Relaxed)
    }

    pub fn format(&self) -> RasterFormat {
        self.format
    }

    pub fn store(&self) -> &Arc<dyn TileStore> {
        &self.store
    }

    /// Cache-relative path of a tile.
    pub fn tile_path(&self, key: &TileKey) -> PathBuf {
        PathBuf::from(format!(
            "{}/{}/{}/{}_{}{}",
            self.cache_name, key.level, key.row, key.row, key.col, self.suffix
        ))
    }

    /// Read and decode a tile. Stale and corrupt files are removed and
    /// reported as a miss or an error respectively.
    pub fn load(&self, key: &TileKey, width: u32, height: u32) -> Result<Option<Vec<f32>>, CacheError> {
        let path = self.tile_path(key);
        let Some(stored) = self.store.read(&path)? else {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        if self.is_expired(stored.modified) {
            debug!(level = key.level, row = key.row, col = key.col, "Cached tile expired");
            self.expired.fetch_add(1, Ordering::Relaxed);
            self.misses.fetch_add(1, Ordering::Relaxed);
            self.store.remove(&path)?;
            return Ok(None);
        }

        match self.format.decode(&stored.data, width, height) {
            Ok(samples) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(samples))
            }
            Err(e) => {
                warn!(
                    level = key.level,
                    row = key.row,
                    col = key.col,
                    error = %e,
                    "Removing unreadable cached tile"
                );
                self.store.remove(&path)?;
                Err(e)
            }
        }
    }

    /// Persist a tile payload exactly as received.
    pub fn store_bytes(&self, key: &TileKey, payload: &[u8]) -> Result<(), CacheError> {
        self.store.write(&self.tile_path(key), payload)?;
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Encode and persist decoded samples.
    pub fn store_samples(&self, key: &TileKey, samples: &[f32]) -> Result<(), CacheError> {
        self.store_bytes(key, &self.format.encode(samples))
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.store.exists(&self.tile_path(key))
    }

    /// Remove a tile. Returns true if it was present.
    pub fn invalidate(&self, key: &TileKey) -> Result<bool, CacheError> {
        Ok(self.store.remove(&self.tile_path(key))?)
    }

    /// Disk-tier counters; memory fields are left at zero.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            disk_hits: self.hits.load(Ordering::Relaxed),
            disk_misses: self.misses.load(Ordering::Relaxed),
            disk_writes: self.writes.load(Ordering::Relaxed),
            disk_expired: self.expired.load(Ordering::Relaxed),
            ..CacheStats::default()
        }
    }

    fn is_expired(&self, modified: SystemTime) -> bool {
        let expiry = self.expiry_time();
        if expiry == 0 {
            return false;
        }
        let modified_secs = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        modified_secs < expiry
    }
}
