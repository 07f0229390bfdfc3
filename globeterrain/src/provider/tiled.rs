//! Tiled image service URL builder.
//!
//! # URL Pattern
//!
//! `<service>?T=<dataset>&L=<level>&X=<col>&Y=<row>[&F=<format>]`
//!
//! - `L`: level index, 0 = coarsest
//! - `X`: column, west to east from the level set origin
//! - `Y`: row, south to north from the level set origin
//! - `F`: optional data format; omitted when empty

use super::types::{query_base, ProviderError, TileRequest, UrlBuilder};

/// URL builder for pre-tiled elevation services keyed by level, row and column.
#[derive(Debug, Clone)]
pub struct TiledUrlBuilder {
    service_url: String,
    dataset_name: String,
}

impl TiledUrlBuilder {
    pub fn new(service_url: impl Into<String>, dataset_name: impl Into<String>) -> Self {
        Self {
            service_url: service_url.into(),
            dataset_name: dataset_name.into(),
        }
    }
}

impl UrlBuilder for TiledUrlBuilder {
    fn name(&self) -> &str {
        "tiled"
    }

    fn tile_url(&self, request: &TileRequest, format: &str) -> Result<String, ProviderError> {
        let key = request.key;
        let mut url = format!(
            "{}T={}&L={}&X={}&Y={}",
            query_base(&self.service_url),
            self.dataset_name,
            key.level,
            key.col,
            key.row
        );
        if !format.is_empty() {
            url.push_str("&F=");
            url.push_str(format);
        }
        Ok(url)
    }
}
