//! OGC Web Map Service GetMap URL builder.
//!
//! # Axis order
//!
//! - 1.1.1 uses `SRS=` and always lists the bounding box as
//!   `min_lon,min_lat,max_lon,max_lat`
//! - 1.3.0 uses `CRS=`; for `EPSG:4326` the axis order is latitude first
//!   (`min_lat,min_lon,max_lat,max_lon`), for `CRS:84` longitude first

use std::fmt;
use std::str::FromStr;

use crate::coord::Sector;

use super::types::{encoded_query, ProviderError, TileRequest, UrlBuilder};

/// Supported WMS protocol versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WmsVersion {
    V1_1_1,
    #[default]
    V1_3_0,
}

impl FromStr for WmsVersion {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1.1.1" => Ok(WmsVersion::V1_1_1),
            "1.3.0" => Ok(WmsVersion::V1_3_0),
            other => Err(ProviderError::InvalidConfig(format!(
                "unsupported WMS version '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for WmsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WmsVersion::V1_1_1 => write!(f, "1.1.1"),
            WmsVersion::V1_3_0 => write!(f, "1.3.0"),
        }
    }
}

/// URL builder for WMS GetMap requests.
#[derive(Debug, Clone)]
pub struct WmsUrlBuilder {
    service_url: String,
    layer_names: String,
    style_names: String,
    coordinate_system: String,
    version: WmsVersion,
}

impl WmsUrlBuilder {
    pub fn new(
        service_url: impl Into<String>,
        layer_names: &[String],
        coordinate_system: impl Into<String>,
        version: WmsVersion,
    ) -> Result<Self, ProviderError> {
        if layer_names.is_empty() {
            return Err(ProviderError::InvalidConfig(
                "WMS requires at least one layer name".to_string(),
            ));
        }
        Ok(Self {
            service_url: service_url.into(),
            layer_names: layer_names.join(","),
            style_names: String::new(),
            coordinate_system: coordinate_system.into(),
            version,
        })
    }

    pub fn with_styles(mut self, styles: &[String]) -> Self {
        self.style_names = styles.join(",");
        self
    }

    fn bbox(&self, sector: &Sector) -> String {
        let lat_first =
            self.version == WmsVersion::V1_3_0 && self.coordinate_system.eq_ignore_ascii_case("EPSG:4326");
        if lat_first {
            format!(
                "{},{},{},{}",
                sector.min_lat(),
                sector.min_lon(),
                sector.max_lat(),
                sector.max_lon()
            )
        } else {
            format!(
                "{},{},{},{}",
                sector.min_lon(),
                sector.min_lat(),
                sector.max_lon(),
                sector.max_lat()
            )
        }
    }

    fn get_map(
        &self,
        sector: &Sector,
        width: u32,
        height: u32,
        format: &str,
    ) -> Result<String, ProviderError> {
        let crs_param = match self.version {
            WmsVersion::V1_1_1 => "SRS",
            WmsVersion::V1_3_0 => "CRS",
        };
        let version = self.version.to_string();
        let bbox = self.bbox(sector);
        let (width, height) = (width.to_string(), height.to_string());
        encoded_query(
            &self.service_url,
            &[
                ("SERVICE", "WMS"),
                ("REQUEST", "GetMap"),
                ("VERSION", version.as_str()),
                ("LAYERS", self.layer_names.as_str()),
                ("STYLES", self.style_names.as_str()),
                (crs_param, self.coordinate_system.as_str()),
                ("FORMAT", format),
                ("BBOX", bbox.as_str()),
                ("WIDTH", width.as_str()),
                ("HEIGHT", height.as_str()),
            ],
        )
    }
}

impl UrlBuilder for WmsUrlBuilder {
    fn name(&self) -> &str {
        "wms"
    }

    fn tile_url(&self, request: &TileRequest, format: &str) -> Result<String, ProviderError> {
        self.get_map(&request.sector, request.width, request.height, format)
    }

    fn composite_url(
        &self,
        sector: &Sector,
        width: u32,
        height: u32,
        format: &str,
    ) -> Result<String, ProviderError> {
        self.get_map(sector, width, height, format)
    }
}
