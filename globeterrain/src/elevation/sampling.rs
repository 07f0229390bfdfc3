//! Sampling elevations out of a tile grid.

use crate::cache::{is_signal, TileData};

/// Sample a tile at a location inside its sector.
///
/// Grid samples sit on the sector edges: column 0 on the western edge, row 0
/// on the northern edge. Returns `None` if any contributing sample is the
/// missing-data signal.
pub fn sample_tile(tile: &TileData, lat: f64, lon: f64, bilinear: bool, signal: Option<f64>) -> Option<f64> {
    let sector = tile.sector();
    let max_col = (tile.width() - 1) as f64;
    let max_row = (tile.height() - 1) as f64;

    let x = fraction(lon - sector.min_lon(), sector.delta_lon()) * max_col;
    let y = fraction(sector.max_lat() - lat, sector.delta_lat()) * max_row;

    if !bilinear {
        let value = tile.sample(y.round() as u32, x.round() as u32);
        return (!is_signal(value, signal)).then_some(value);
    }

    let col0 = x.floor();
    let row0 = y.floor();
    let fx = x - col0;
    let fy = y - row0;
    let (col0, row0) = (col0 as u32, row0 as u32);
    let (col1, row1) = (col0 + 1, row0 + 1);

    let nw = tile.sample(row0, col0);
    let ne = tile.sample(row0, col1);
    let sw = tile.sample(row1, col0);
    let se = tile.sample(row1, col1);
    if [nw, ne, sw, se].iter().any(|&v| is_signal(v, signal)) {
        return None;
    }

    let north = nw + (ne - nw) * fx;
    let south = sw + (se - sw) * fx;
    Some(north + (south - north) * fy)
}

fn fraction(offset: f64, extent: f64) -> f64 {
    if extent <= 0.0 {
        return 0.0;
    }
    (offset / extent).clamp(0.0, 1.0)
}
