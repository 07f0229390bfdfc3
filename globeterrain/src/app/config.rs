//! Engine-wide configuration.
//!
//! Read from the `[engine]` section of the configuration file; every other
//! section describes an elevation dataset.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, Properties};

use crate::cache::DEFAULT_MEMORY_CACHE_BYTES;
use crate::elevation::ConfigError;
use crate::retrieve::DEFAULT_MAX_CONCURRENT_FETCHES;

/// Name of the engine section in configuration files.
pub const ENGINE_SECTION: &str = "engine";

/// Default cache root: the platform cache directory plus `globeterrain`.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("globeterrain")
}

/// Settings shared by every dataset of an engine.
#[derive(Clone, Debug, PartialEq)]
pub struct ContextConfig {
    /// Root directory of the disk tile cache.
    pub cache_root: PathBuf,

    /// Memory cache capacity per dataset, in bytes.
    pub memory_cache_bytes: u64,

    /// Concurrent fetches per dataset.
    pub max_concurrent_fetches: usize,

    /// Directory for rolling log files. No file logging when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            memory_cache_bytes: DEFAULT_MEMORY_CACHE_BYTES,
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            log_dir: None,
        }
    }
}

impl ContextConfig {
    /// Create a configuration rooted at `cache_root` with default limits.
    pub fn new(cache_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            ..Default::default()
        }
    }

    /// Set the memory cache size.
    pub fn with_memory_cache_bytes(mut self, bytes: u64) -> Self {
        self.memory_cache_bytes = bytes;
        self
    }

    /// Set the fetch concurrency.
    pub fn with_max_concurrent_fetches(mut self, max: usize) -> Self {
        self.max_concurrent_fetches = max;
        self
    }

    /// Enable file logging into `dir`.
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Read the `[engine]` section, falling back to defaults for absent keys
    /// or an absent section.
    pub fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let Some(props) = ini.section(Some(ENGINE_SECTION)) else {
            return Ok(config);
        };

        if let Some(root) = value(props, "cache_root") {
            config.cache_root = expand_home(root);
        }
        if let Some(bytes) = value(props, "memory_cache_bytes") {
            config.memory_cache_bytes = parse(bytes, "memory_cache_bytes")?;
        }
        if let Some(max) = value(props, "max_concurrent_fetches") {
            config.max_concurrent_fetches = parse(max, "max_concurrent_fetches")?;
            if config.max_concurrent_fetches == 0 {
                return Err(ConfigError::invalid(
                    "max_concurrent_fetches",
                    max,
                    "must be at least 1",
                ));
            }
        }
        if let Some(dir) = value(props, "log_dir") {
            config.log_dir = Some(expand_home(dir));
        }
        Ok(config)
    }
}

fn value<'a>(props: &'a Properties, key: &str) -> Option<&'a str> {
    props.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse<T: FromStr>(raw: &str, key: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e: T::Err| ConfigError::invalid(key, raw, e.to_string()))
}

/// Expand a leading `~` to the home directory.
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| Path::new(raw).to_path_buf()),
        None => PathBuf::from(raw),
    }
}
