//! Elevation tile provider abstraction
//!
//! This module turns tile descriptors into request URLs for the supported
//! protocols and fetches them over HTTP (or from `file://` paths).
//!
//! # Factory Pattern
//!
//! For centralized builder creation, use the [`ProviderFactory`]:
//!
//! ```ignore
//! use globeterrain::provider::{ProviderFactory, ProviderKind, UrlBuilderConfig};
//!
//! let builder = ProviderFactory::create(&config)?;
//! let url = builder.tile_url(&request, "application/bil16")?;
//! ```

mod factory;
mod http;
mod local;
mod tiled;
mod types;
mod wcs;
mod wms;

pub use factory::{ProviderFactory, ProviderKind, UrlBuilderConfig};
pub use http::{HttpClient, ReqwestClient, DEFAULT_CONNECT_TIMEOUT, DEFAULT_READ_TIMEOUT};
pub use local::LocalUrlBuilder;
pub use tiled::TiledUrlBuilder;
pub use types::{ProviderError, TileRequest, UrlBuilder};
pub use wcs::WcsUrlBuilder;
pub use wms::{WmsUrlBuilder, WmsVersion};

#[cfg(test)]
pub use http::tests::MockHttpClient;
