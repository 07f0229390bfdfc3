//! Geoid correction.
//!
//! Elevation sources often report heights above the geoid while the globe
//! works relative to the ellipsoid. A [`GeoidOffset`] supplies the
//! geoid-ellipsoid separation that is added to every non-missing sample.

use std::path::Path;

use bytes::Buf;

use super::error::ElevationError;

/// Geoid-ellipsoid separation in meters at a location.
pub trait GeoidOffset: Send + Sync {
    fn offset(&self, lat: f64, lon: f64) -> f64;
}

/// Rows of the 15-arc-minute grid, 90°N to 90°S inclusive.
pub const EGM96_ROWS: usize = 721;

/// Columns of the 15-arc-minute grid, 0°E eastward, wrapping at 360°.
pub const EGM96_COLS: usize = 1440;

const EGM96_SPACING: f64 = 0.25;

/// EGM96 separation grid: big-endian int16 centimeters, row 0 at 90°N,
/// column 0 at 0°E.
#[derive(Debug, Clone)]
pub struct Egm96Grid {
    values: Vec<i16>,
}

impl Egm96Grid {
    /// Load the grid from a file.
    pub fn load(path: &Path) -> Result<Self, ElevationError> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data)
    }

    /// Parse the grid from raw bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ElevationError> {
        let expected = EGM96_ROWS * EGM96_COLS * 2;
        if data.len() != expected {
            return Err(ElevationError::InvalidArgument(format!(
                "geoid grid has {} bytes, expected {}",
                data.len(),
                expected
            )));
        }
        let mut buf = data;
        let values = (0..EGM96_ROWS * EGM96_COLS).map(|_| buf.get_i16()).collect();
        Ok(Self { values })
    }

    fn at(&self, row: usize, col: usize) -> f64 {
        let row = row.min(EGM96_ROWS - 1);
        let col = col % EGM96_COLS;
        self.values[row * EGM96_COLS + col] as f64 / 100.0
    }
}

impl GeoidOffset for Egm96Grid {
    fn offset(&self, lat: f64, lon: f64) -> f64 {
        let lon = lon.rem_euclid(360.0);
        let y = ((90.0 - lat) / EGM96_SPACING).clamp(0.0, (EGM96_ROWS - 1) as f64);
        let x = lon / EGM96_SPACING;

        let row0 = y.floor() as usize;
        let col0 = x.floor() as usize;
        let fy = y - row0 as f64;
        let fx = x - col0 as f64;

        let nw = self.at(row0, col0);
        let ne = self.at(row0, col0 + 1);
        let sw = self.at(row0 + 1, col0);
        let se = self.at(row0 + 1, col0 + 1);

        let north = nw + (ne - nw) * fx;
        let south = sw + (se - sw) * fx;
        north + (south - north) * fy
    }
}
