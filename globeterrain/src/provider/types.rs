//! Core types for URL building and tile transport.

use thiserror::Error;

use crate::coord::Sector;
use crate::level::TileKey;

/// Errors from URL construction and tile transport.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("Provider '{0}' cannot build composite requests")]
    CompositeUnsupported(String),
}

/// Everything a URL builder needs to know about one tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TileRequest {
    pub key: TileKey,
    pub sector: Sector,
    pub width: u32,
    pub height: u32,
}

impl TileRequest {
    pub fn new(key: TileKey, sector: Sector, width: u32, height: u32) -> Self {
        Self {
            key,
            sector,
            width,
            height,
        }
    }
}

/// Protocol strategy producing request URLs for tiles.
///
/// One implementation per protocol. The elevation model is parameterized by
/// an `Arc<dyn UrlBuilder>` chosen at construction time.
pub trait UrlBuilder: Send + Sync {
    /// Short protocol name used in logs and errors.
    fn name(&self) -> &str;

    /// Request URL for one tile in the given data format.
    fn tile_url(&self, request: &TileRequest, format: &str) -> Result<String, ProviderError>;

    /// Request URL for an arbitrary sector resampled to `width x height`.
    ///
    /// Only protocols that render on demand support this.
    fn composite_url(
        &self,
        _sector: &Sector,
        _width: u32,
        _height: u32,
        _format: &str,
    ) -> Result<String, ProviderError> {
        Err(ProviderError::CompositeUnsupported(self.name().to_string()))
    }
}

/// Service URL with `params` appended as a form-encoded query.
///
/// Parameters already present in `service_url` are kept.
pub(crate) fn encoded_query(service_url: &str, params: &[(&str, &str)]) -> Result<String, ProviderError> {
    reqwest::Url::parse_with_params(service_url, params)
        .map(String::from)
        .map_err(|e| ProviderError::InvalidConfig(format!("service URL '{}': {}", service_url, e)))
}

/// Service URL ready for query parameters to be appended.
pub(crate) fn query_base(service_url: &str) -> String {
    if service_url.ends_with('?') || service_url.ends_with('&') {
        service_url.to_string()
    } else if service_url.contains('?') {
        format!("{}&", service_url)
    } else {
        format!("{}?", service_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoded_query_escapes_values() {
        let url = encoded_query(
            "http://h/wms?map=/srv/elev.map",
            &[("LAYERS", "srtm 30&gebco"), ("FORMAT", "application/bil16")],
        )
        .unwrap();
        assert_eq!(
            url,
            "http://h/wms?map=/srv/elev.map&LAYERS=srtm+30%26gebco&FORMAT=application%2Fbil16"
        );
        assert!(matches!(
            encoded_query("not a url", &[("A", "b")]),
            Err(ProviderError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_query_base() {
        assert_eq!(query_base("http://h/elev"), "http://h/elev?");
        assert_eq!(query_base("http://h/elev?"), "http://h/elev?");
        assert_eq!(query_base("http://h/elev?key=1"), "http://h/elev?key=1&");
        assert_eq!(query_base("http://h/elev?key=1&"), "http://h/elev?key=1&");
    }
}
