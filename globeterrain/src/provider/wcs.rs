//! OGC Web Coverage Service 1.0.0 GetCoverage URL builder.

use crate::coord::Sector;

use super::types::{encoded_query, ProviderError, TileRequest, UrlBuilder};

/// URL builder for WCS 1.0.0 GetCoverage requests.
///
/// The bounding box is always `min_lon,min_lat,max_lon,max_lat`.
#[derive(Debug, Clone)]
pub struct WcsUrlBuilder {
    service_url: String,
    coverage: String,
    coordinate_system: String,
}

impl WcsUrlBuilder {
    pub fn new(
        service_url: impl Into<String>,
        coverage: impl Into<String>,
        coordinate_system: impl Into<String>,
    ) -> Result<Self, ProviderError> {
        let coverage = coverage.into();
        if coverage.is_empty() {
            return Err(ProviderError::InvalidConfig(
                "WCS requires a coverage name".to_string(),
            ));
        }
        Ok(Self {
            service_url: service_url.into(),
            coverage,
            coordinate_system: coordinate_system.into(),
        })
    }

    fn get_coverage(
        &self,
        sector: &Sector,
        width: u32,
        height: u32,
        format: &str,
    ) -> Result<String, ProviderError> {
        let bbox = format!(
            "{},{},{},{}",
            sector.min_lon(),
            sector.min_lat(),
            sector.max_lon(),
            sector.max_lat()
        );
        let (width, height) = (width.to_string(), height.to_string());
        encoded_query(
            &self.service_url,
            &[
                ("SERVICE", "WCS"),
                ("REQUEST", "GetCoverage"),
                ("VERSION", "1.0.0"),
                ("COVERAGE", self.coverage.as_str()),
                ("CRS", self.coordinate_system.as_str()),
                ("BBOX", bbox.as_str()),
                ("WIDTH", width.as_str()),
                ("HEIGHT", height.as_str()),
                ("FORMAT", format),
            ],
        )
    }
}

impl UrlBuilder for WcsUrlBuilder {
    fn name(&self) -> &str {
        "wcs"
    }

    fn tile_url(&self, request: &TileRequest, format: &str) -> Result<String, ProviderError> {
        self.get_coverage(&request.sector, request.width, request.height, format)
    }

    fn composite_url(
        &self,
        sector: &Sector,
        width: u32,
        height: u32,
        format: &str,
    ) -> Result<String, ProviderError> {
        self.get_coverage(sector, width, height, format)
    }
}
