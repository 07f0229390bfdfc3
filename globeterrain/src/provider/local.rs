//! Local raster source.
//!
//! Tiles are read from a directory tree laid out like the disk cache:
//! `file://<root>/<level>/<row>/<row>_<col><suffix>`.

use std::path::PathBuf;

use super::types::{ProviderError, TileRequest, UrlBuilder};

/// URL builder for pre-tiled rasters on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalUrlBuilder {
    root: PathBuf,
    suffix: String,
}

impl LocalUrlBuilder {
    pub fn new(root: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            suffix: suffix.into(),
        }
    }
}

impl UrlBuilder for LocalUrlBuilder {
    fn name(&self) -> &str {
        "local"
    }

    fn tile_url(&self, request: &TileRequest, _format: &str) -> Result<String, ProviderError> {
        let key = request.key;
        let path = self
            .root
            .join(key.level.to_string())
            .join(key.row.to_string())
            .join(format!("{}_{}{}", key.row, key.col, self.suffix));
        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::Sector;
    use crate::level::TileKey;

    #[test]
    fn test_tile_url() {
        let builder = LocalUrlBuilder::new("/data/srtm", ".bil");
        let request = TileRequest::new(TileKey::new(3, 40, 81), Sector::FULL_SPHERE, 150, 150);
        assert_eq!(
            builder.tile_url(&request, "application/bil16").unwrap(),
            "file:///data/srtm/3/40/40_81.bil"
        );
    }

    #[test]
    fn test_composite_unsupported() {
        let builder = LocalUrlBuilder::new("/data/srtm", ".bil");
        assert!(matches!(
            builder.composite_url(&Sector::FULL_SPHERE, 4, 4, ""),
            Err(ProviderError::CompositeUnsupported(_))
        ));
    }
}
