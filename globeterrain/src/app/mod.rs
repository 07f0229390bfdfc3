//! Engine assembly.
//!
//! This module provides [`EngineContext`], the explicit composition root of
//! an application: it reads the configuration file, owns the shared tile
//! store and fetch runtime, and builds an [`ElevationModel`] per dataset.
//!
//! # Configuration layout
//!
//! ```text
//! [engine]            -> ContextConfig
//! cache_root = ~/.cache/globeterrain
//!
//! [srtm30]            -> ElevationModelConfig
//! service_url = ...
//! ```
//!
//! # Example
//!
//! ```ignore
//! use globeterrain::app::{ContextConfig, EngineContext};
//!
//! let context = EngineContext::start(ContextConfig::default(), datasets)?;
//! let model = context.default_model()?;
//! ```
//!
//! [`ElevationModel`]: crate::elevation::ElevationModel

mod config;
mod context;
mod error;

pub use config::{default_cache_root, ContextConfig, ENGINE_SECTION};
pub use context::{load_ini_file, load_ini_str, EngineContext};
pub use error::AppError;
