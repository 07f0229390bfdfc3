//! Tile cache
//!
//! Decoded elevation tiles are held in two tiers:
//!
//! - [`MemoryTileCache`]: byte-bounded LRU of `Arc<TileData>` (moka)
//! - [`DiskTileCache`]: raw payloads on a [`TileStore`] at deterministic
//!   cache-relative paths, with atomic writes and an expiry time
//!
//! [`TileCache`] layers the two and promotes disk hits into memory.
//! [`RasterFormat`] decodes the headerless int16/float32 rasters both tiers
//! and the network exchange.

mod codec;
mod disk;
mod memory;
mod tiers;
mod types;

pub use codec::{ByteOrder, RasterFormat, SampleType};
pub use disk::{DiskTileCache, FileTileStore, StoredTile, TileStore};
pub use memory::{MemoryTileCache, DEFAULT_MEMORY_CACHE_BYTES};
pub use tiers::TileCache;
pub use types::{is_signal, CacheError, CacheStats, TileData};
