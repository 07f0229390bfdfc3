//! Precomputed per-tile elevation extremes.
//!
//! The table stores one `(min, max)` pair of int16 meters for every tile of a
//! reference level, row-major starting at the southern-most row, in the
//! configured byte order. Tiles that were not in the cache when the table
//! was built store `(i16::MAX, i16::MIN)`; tiles whose samples are all the
//! missing-data signal store `(0, -1)`. Once loaded the table answers
//! queries without touching disk or network.

use std::fs;
use std::io::Write;
use std::path::Path;

use bytes::{Buf, BufMut};
use rayon::prelude::*;
use tracing::info;

use crate::cache::{ByteOrder, DiskTileCache, TileData};
use crate::coord::Sector;
use crate::level::{LevelSet, TileKey};

use super::error::ElevationError;

/// The tile was not available when the table was built.
const NOT_BUILT: (i16, i16) = (i16::MAX, i16::MIN);

/// The tile was built but holds only missing-data samples.
const ALL_SIGNAL: (i16, i16) = (0, -1);

/// Per-tile min/max at one level.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtremesTable {
    level: usize,
    rows: u32,
    cols: u32,
    byte_order: ByteOrder,
    entries: Vec<(i16, i16)>,
}

impl ExtremesTable {
    /// Parse a table for `level` of `levels`.
    pub fn from_bytes(
        data: &[u8],
        levels: &LevelSet,
        level: usize,
        byte_order: ByteOrder,
    ) -> Result<Self, ElevationError> {
        let (rows, cols) = dimensions(levels, level)?;
        let count = rows as usize * cols as usize;
        if data.len() != count * 4 {
            return Err(ElevationError::InvalidArgument(format!(
                "extremes table has {} bytes, expected {} for {}x{} tiles",
                data.len(),
                count * 4,
                rows,
                cols
            )));
        }

        let mut buf = data;
        let entries = (0..count)
            .map(|_| match byte_order {
                ByteOrder::LittleEndian => (buf.get_i16_le(), buf.get_i16_le()),
                ByteOrder::BigEndian => (buf.get_i16(), buf.get_i16()),
            })
            .collect();

        Ok(Self {
            level,
            rows,
            cols,
            byte_order,
            entries,
        })
    }

    /// Load a table from a file.
    pub fn load(
        path: &Path,
        levels: &LevelSet,
        level: usize,
        byte_order: ByteOrder,
    ) -> Result<Self, ElevationError> {
        let data = fs::read(path)?;
        let table = Self::from_bytes(&data, levels, level, byte_order)?;
        info!(path = %path.display(), level, tiles = table.entries.len(), "Loaded extremes table");
        Ok(table)
    }

    /// Compute a table from the tiles of `level` present in the disk cache.
    ///
    /// Tiles not on disk are recorded as not built, so lookups over them
    /// report no coverage.
    pub fn build_from_disk(
        levels: &LevelSet,
        disk: &DiskTileCache,
        level: usize,
        signal: Option<f64>,
        byte_order: ByteOrder,
    ) -> Result<Self, ElevationError> {
        let (rows, cols) = dimensions(levels, level)?;
        let level_ref = levels.level(level)?;
        let (width, height) = (level_ref.tile_width(), level_ref.tile_height());

        let entries: Vec<(i16, i16)> = (0..rows * cols)
            .into_par_iter()
            .map(|index| {
                let key = TileKey::new(level as u8, index / cols, index % cols);
                let samples = match disk.load(&key, width, height) {
                    Ok(Some(samples)) => samples,
                    _ => return NOT_BUILT,
                };
                let Ok(sector) = levels.sector_for_tile(&key) else {
                    return NOT_BUILT;
                };
                match TileData::new(key, sector, width, height, samples, signal) {
                    Ok(tile) => tile
                        .extremes()
                        .map(|(min, max)| (to_i16(min.floor()), to_i16(max.ceil())))
                        .unwrap_or(ALL_SIGNAL),
                    Err(_) => NOT_BUILT,
                }
            })
            .collect();

        let built = entries.iter().filter(|e| **e != NOT_BUILT).count();
        info!(level, tiles = entries.len(), built, "Built extremes table");

        Ok(Self {
            level,
            rows,
            cols,
            byte_order,
            entries,
        })
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, row: u32, col: u32) -> Option<(i16, i16)> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(self.entries[(row * self.cols + col) as usize])
    }

    /// Extremes of one tile, `None` if it has no data or was not built.
    pub fn get(&self, row: u32, col: u32) -> Option<(f64, f64)> {
        let (min, max) = self.entry(row, col)?;
        (min <= max).then_some((min as f64, max as f64))
    }

    /// True if the tile was available when the table was built.
    pub fn is_built(&self, row: u32, col: u32) -> bool {
        self.entry(row, col).is_some_and(|e| e != NOT_BUILT)
    }

    /// Combined extremes over `sector`, only if every tile intersecting it
    /// was built and at least one holds data.
    pub fn lookup(&self, levels: &LevelSet, sector: &Sector) -> Option<(f64, f64)> {
        match self.scan(levels, sector) {
            (extremes, true) => extremes,
            (_, false) => None,
        }
    }

    /// Combined extremes of the built tiles intersecting `sector`, ignoring
    /// tiles that were not built.
    pub fn partial_lookup(&self, levels: &LevelSet, sector: &Sector) -> Option<(f64, f64)> {
        self.scan(levels, sector).0
    }

    fn scan(&self, levels: &LevelSet, sector: &Sector) -> (Option<(f64, f64)>, bool) {
        let Ok(keys) = levels.tiles_in_sector(self.level, sector) else {
            return (None, false);
        };
        let complete = !keys.is_empty() && keys.iter().all(|key| self.is_built(key.row, key.col));
        let extremes = keys
            .iter()
            .filter_map(|key| self.get(key.row, key.col))
            .reduce(|(a_min, a_max), (b_min, b_max)| (a_min.min(b_min), a_max.max(b_max)));
        (extremes, complete)
    }

    /// Serialize in the table's byte order.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * 4);
        for &(min, max) in &self.entries {
            match self.byte_order {
                ByteOrder::LittleEndian => {
                    out.put_i16_le(min);
                    out.put_i16_le(max);
                }
                ByteOrder::BigEndian => {
                    out.put_i16(min);
                    out.put_i16(max);
                }
            }
        }
        out
    }

    /// Write the table atomically.
    pub fn save(&self, path: &Path) -> Result<(), ElevationError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(&self.encode())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }
}

fn dimensions(levels: &LevelSet, level: usize) -> Result<(u32, u32), ElevationError> {
    let level_ref = levels.level(level)?;
    Ok((levels.row_count(level_ref), levels.col_count(level_ref)))
}

fn to_i16(value: f64) -> i16 {
    value.clamp(i16::MIN as f64, i16::MAX as f64) as i16
}
