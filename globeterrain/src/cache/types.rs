//! Shared types for the tile cache tiers.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::coord::Sector;
use crate::level::{LevelError, TileKey};

/// Errors that can occur while reading, decoding or storing tiles.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error from the tile store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The payload length does not match the tile dimensions.
    #[error("Tile payload has {actual} bytes, expected {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    /// The payload could not be decoded.
    #[error("Failed to decode tile: {0}")]
    Decode(String),

    /// The raster format descriptor is not recognized.
    #[error("Unsupported raster format: {0}")]
    UnsupportedFormat(String),

    /// The tile key does not belong to the level set.
    #[error(transparent)]
    Level(#[from] LevelError),
}

/// Decoded elevation samples of one tile.
///
/// Samples are stored row-major with row 0 at the northern edge. The first
/// and last rows and columns lie on the sector boundary, so neighbouring
/// tiles share their edge samples. Instances are immutable once built and
/// shared between cache tiers as `Arc<TileData>`.
#[derive(Debug, Clone, PartialEq)]
pub struct TileData {
    key: TileKey,
    sector: Sector,
    width: u32,
    height: u32,
    resolution: f64,
    samples: Vec<f32>,
    extremes: Option<(f64, f64)>,
}

impl TileData {
    /// Wraps decoded samples, computing min/max over everything but `signal`.
    pub fn new(
        key: TileKey,
        sector: Sector,
        width: u32,
        height: u32,
        samples: Vec<f32>,
        signal: Option<f64>,
    ) -> Result<Self, CacheError> {
        let expected = width as usize * height as usize;
        if samples.len() != expected {
            return Err(CacheError::SizeMismatch {
                expected,
                actual: samples.len(),
            });
        }

        let extremes = samples
            .iter()
            .map(|&s| s as f64)
            .filter(|&s| !is_signal(s, signal) && s.is_finite())
            .fold(None, |acc: Option<(f64, f64)>, s| match acc {
                None => Some((s, s)),
                Some((min, max)) => Some((min.min(s), max.max(s))),
            });

        Ok(Self {
            key,
            sector,
            width,
            height,
            resolution: sector.delta_lat() / height as f64,
            samples,
            extremes,
        })
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn sector(&self) -> &Sector {
        &self.sector
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Degrees per sample along the latitude axis.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Raw sample at (row, col), row 0 north. Indices are clamped to the grid.
    pub fn sample(&self, row: u32, col: u32) -> f64 {
        let row = row.min(self.height - 1) as usize;
        let col = col.min(self.width - 1) as usize;
        self.samples[row * self.width as usize + col] as f64
    }

    /// Minimum and maximum over non-signal samples, or `None` if every
    /// sample is the missing-data signal.
    pub fn extremes(&self) -> Option<(f64, f64)> {
        self.extremes
    }

    /// Approximate heap footprint, used to weigh memory cache entries.
    pub fn size_bytes(&self) -> usize {
        self.samples.len() * std::mem::size_of::<f32>() + std::mem::size_of::<Self>()
    }
}

/// Returns true if `value` equals the missing-data signal.
pub fn is_signal(value: f64, signal: Option<f64>) -> bool {
    match signal {
        Some(signal) => value == signal,
        None => false,
    }
}

/// Point-in-time counters across the cache tiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_evictions: u64,
    pub memory_entry_count: u64,
    pub memory_size_bytes: u64,
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub disk_writes: u64,
    pub disk_expired: u64,
}

impl CacheStats {
    /// Fraction of memory lookups that hit, in [0, 1].
    pub fn memory_hit_rate(&self) -> f64 {
        let total = self.memory_hits + self.memory_misses;
        if total == 0 {
            0.0
        } else {
            self.memory_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "memory: {} tiles, {} bytes, {:.1}% hits; disk: {} hits, {} misses, {} writes",
            self.memory_entry_count,
            self.memory_size_bytes,
            self.memory_hit_rate() * 100.0,
            self.disk_hits,
            self.disk_misses,
            self.disk_writes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sector() -> Sector {
        Sector::new(0.0, 1.0, 0.0, 1.0).unwrap()
    }

    #[test]
    fn test_extremes_skip_signal() {
        let tile = TileData::new(
            TileKey::new(0, 0, 0),
            sector(),
            2,
            2,
            vec![-32768.0, 10.0, 250.0, -5.0],
            Some(-32768.0),
        )
        .unwrap();
        assert_eq!(tile.extremes(), Some((-5.0, 250.0)));
    }

    #[test]
    fn test_all_signal_has_no_extremes() {
        let tile = TileData::new(
            TileKey::new(0, 0, 0),
            sector(),
            2,
            2,
            vec![-9999.0; 4],
            Some(-9999.0),
        )
        .unwrap();
        assert_eq!(tile.extremes(), None);
    }

    #[test]
    fn test_size_mismatch() {
        let result = TileData::new(TileKey::new(0, 0, 0), sector(), 3, 3, vec![0.0; 4], None);
        assert!(matches!(
            result,
            Err(CacheError::SizeMismatch {
                expected: 9,
                actual: 4
            })
        ));
    }

    #[test]
    fn test_sample_is_row_major_from_north() {
        let tile = TileData::new(
            TileKey::new(0, 0, 0),
            sector(),
            3,
            2,
            vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            None,
        )
        .unwrap();
        assert_eq!(tile.sample(0, 2), 3.0);
        assert_eq!(tile.sample(1, 0), 4.0);
        assert_eq!(tile.sample(9, 9), 6.0);
        assert!((tile.resolution() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            memory_hits: 3,
            memory_misses: 1,
            ..Default::default()
        };
        assert!((stats.memory_hit_rate() - 0.75).abs() < 1e-12);
        assert_eq!(CacheStats::default().memory_hit_rate(), 0.0);
    }
}
