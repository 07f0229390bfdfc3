//! URL builder registry.
//!
//! Maps a protocol tag from configuration to a concrete [`UrlBuilder`].

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use super::local::LocalUrlBuilder;
use super::tiled::TiledUrlBuilder;
use super::types::{ProviderError, UrlBuilder};
use super::wcs::WcsUrlBuilder;
use super::wms::{WmsUrlBuilder, WmsVersion};

/// Supported retrieval protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProviderKind {
    #[default]
    Tiled,
    Wms,
    Wcs,
    Local,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::Tiled,
        ProviderKind::Wms,
        ProviderKind::Wcs,
        ProviderKind::Local,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            ProviderKind::Tiled => "tiled",
            ProviderKind::Wms => "wms",
            ProviderKind::Wcs => "wcs",
            ProviderKind::Local => "local",
        }
    }

    /// True if the protocol can render arbitrary sectors on request.
    pub fn supports_composite(&self) -> bool {
        matches!(self, ProviderKind::Wms | ProviderKind::Wcs)
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        ProviderKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == tag)
            .ok_or_else(|| ProviderError::UnsupportedProvider(s.to_string()))
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Settings consumed when building a URL builder.
#[derive(Debug, Clone, PartialEq)]
pub struct UrlBuilderConfig {
    pub kind: ProviderKind,
    pub service_url: String,
    pub dataset_name: String,
    pub layer_names: Vec<String>,
    pub coordinate_system: String,
    pub wms_version: WmsVersion,
    pub local_root: Option<PathBuf>,
    pub format_suffix: String,
}

/// Creates URL builders from configuration.
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn create(config: &UrlBuilderConfig) -> Result<Arc<dyn UrlBuilder>, ProviderError> {
        let builder: Arc<dyn UrlBuilder> = match config.kind {
            ProviderKind::Tiled => Arc::new(TiledUrlBuilder::new(
                &config.service_url,
                &config.dataset_name,
            )),
            ProviderKind::Wms => {
                let layers = layers_or_dataset(config);
                Arc::new(WmsUrlBuilder::new(
                    &config.service_url,
                    &layers,
                    &config.coordinate_system,
                    config.wms_version,
                )?)
            }
            ProviderKind::Wcs => {
                let coverage = layers_or_dataset(config).join(",");
                Arc::new(WcsUrlBuilder::new(
                    &config.service_url,
                    coverage,
                    &config.coordinate_system,
                )?)
            }
            ProviderKind::Local => {
                let root = config
                    .local_root
                    .clone()
                    .or_else(|| {
                        config
                            .service_url
                            .strip_prefix("file://")
                            .map(PathBuf::from)
                    })
                    .ok_or_else(|| {
                        ProviderError::InvalidConfig(
                            "local provider needs local_root or a file:// service_url".to_string(),
                        )
                    })?;
                Arc::new(LocalUrlBuilder::new(root, &config.format_suffix))
            }
        };
        Ok(builder)
    }
}

fn layers_or_dataset(config: &UrlBuilderConfig) -> Vec<String> {
    if config.layer_names.is_empty() {
        vec![config.dataset_name.clone()]
    } else {
        config.layer_names.clone()
    }
}
