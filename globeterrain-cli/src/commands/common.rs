//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;

use globeterrain::app::{load_ini_file, ContextConfig, EngineContext};
use globeterrain::coord::Sector;
use globeterrain::elevation::{ElevationModel, ElevationModelConfig};
use globeterrain::logging::{init_logging, LoggingConfig, LoggingGuard};
use serde::Serialize;

use crate::error::CliError;

/// Name of the configuration file in the user configuration directory.
pub const CONFIG_FILE_NAME: &str = "globeterrain.ini";

/// Options accepted by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<PathBuf>,
    pub json: bool,
    pub verbose: bool,
}

/// A started engine and the logging guard that must outlive it.
pub struct Engine {
    pub context: EngineContext,
    _logging: LoggingGuard,
}

/// Default configuration file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("globeterrain")
        .join(CONFIG_FILE_NAME)
}

impl GlobalOptions {
    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(default_config_path)
    }

    /// Load the configuration. A missing default file yields defaults and no
    /// datasets; a missing explicit file is an error.
    pub fn load_config(&self) -> Result<(ContextConfig, Vec<ElevationModelConfig>), CliError> {
        let path = self.config_path();
        if self.config.is_none() && !path.exists() {
            return Ok((ContextConfig::default(), Vec::new()));
        }
        Ok(load_ini_file(&path)?)
    }

    pub fn init_logging(&self, log_dir: Option<PathBuf>) -> Result<LoggingGuard, CliError> {
        let filter = if self.verbose {
            "globeterrain=debug"
        } else {
            "globeterrain=warn"
        };
        let mut config = LoggingConfig::default().with_filter(filter);
        if let Some(dir) = log_dir {
            config = config.with_log_dir(dir);
        }
        Ok(init_logging(config)?)
    }

    /// Load the configuration, install logging and start the engine.
    pub fn start_engine(&self) -> Result<Engine, CliError> {
        let (config, datasets) = self.load_config()?;
        if datasets.is_empty() {
            return Err(CliError::Config(format!(
                "no elevation datasets configured in {}",
                self.config_path().display()
            )));
        }
        let logging = self.init_logging(config.log_dir.clone())?;
        tracing::debug!(
            config = %self.config_path().display(),
            datasets = datasets.len(),
            "Starting engine"
        );
        let context = EngineContext::start(config, datasets)?;
        Ok(Engine {
            context,
            _logging: logging,
        })
    }
}

impl Engine {
    /// The named dataset's model, or the first configured one.
    pub fn model(&self, dataset: Option<&str>) -> Result<ElevationModel, CliError> {
        Ok(match dataset {
            Some(name) => self.context.model(name)?,
            None => self.context.default_model()?,
        })
    }
}

/// Parse `min_lat,max_lat,min_lon,max_lon`.
pub fn parse_sector(s: &str) -> Result<Sector, String> {
    let values = s
        .split(',')
        .map(|part| part.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("invalid number in sector '{}': {}", s, e))?;
    match values.as_slice() {
        [min_lat, max_lat, min_lon, max_lon] => {
            Sector::new(*min_lat, *max_lat, *min_lon, *max_lon).map_err(|e| e.to_string())
        }
        _ => Err(format!(
            "sector '{}' must be min_lat,max_lat,min_lon,max_lon",
            s
        )),
    }
}

/// Print `value` as JSON, or run `human` to print it for people.
pub fn emit<T: Serialize>(json: bool, value: &T, human: impl FnOnce(&T)) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}
