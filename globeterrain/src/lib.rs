//! globeterrain - terrain data engine for virtual globes
//!
//! This library converts between geodetic and Cartesian coordinates on a
//! reference ellipsoid, organises elevation rasters into a multi-resolution
//! tile pyramid, caches and retrieves those tiles from WMS, WCS, tiled and
//! local sources, and answers elevation queries over them.
//!
//! - [`coord`]: ellipsoid geometry and ray intersection
//! - [`level`]: the tile pyramid
//! - [`cache`], [`provider`], [`retrieve`]: tile storage and retrieval
//! - [`elevation`]: the elevation model
//! - [`app`]: configuration loading and engine assembly

pub mod app;
pub mod cache;
pub mod coord;
pub mod elevation;
pub mod level;
pub mod logging;
pub mod provider;
pub mod retrieve;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
