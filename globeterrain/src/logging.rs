//! Logging setup.
//!
//! Installs a `tracing` subscriber with an `EnvFilter` (overridable through
//! `RUST_LOG`), a console layer and an optional daily-rolling log file.
//! The returned [`LoggingGuard`] flushes the file writer when dropped and
//! must be held for the life of the process.

use std::path::PathBuf;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "globeterrain=info";

/// Errors installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Failed to create log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to install log subscriber: {0}")]
    Init(String),
}

/// Logging options.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Filter directives used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Write human-readable logs to stderr.
    pub console: bool,
    /// Directory for daily log files; none when unset.
    pub log_dir: Option<PathBuf>,
    /// File name prefix of the log files.
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            console: true,
            log_dir: None,
            file_prefix: "globeterrain.log".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.default_filter = filter.into();
        self
    }

    pub fn with_console(mut self, console: bool) -> Self {
        self.console = console;
        self
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }
}

/// Keeps the file writer alive.
#[must_use = "logs written to file are lost when the guard is dropped"]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// Call early, before worker threads start, so the local UTC offset can be
/// determined; timestamps fall back to UTC otherwise.
pub fn init_logging(config: LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    let timer = OffsetTime::local_rfc_3339()
        .unwrap_or_else(|_| OffsetTime::new(time::UtcOffset::UTC, Rfc3339));

    let console = config.console.then(|| {
        fmt::layer()
            .with_timer(timer.clone())
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir).map_err(|source| LoggingError::LogDir {
                path: dir.clone(),
                source,
            })?;
            let appender = tracing_appender::rolling::daily(dir, &config.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_timer(timer)
                .with_ansi(false)
                .with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.default_filter, DEFAULT_FILTER);
        assert!(config.console);
        assert!(config.log_dir.is_none());
    }

    #[test]
    fn test_file_logging_and_single_install() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        let config = LoggingConfig::default()
            .with_console(false)
            .with_log_dir(&logs);

        let guard = init_logging(config.clone()).unwrap();
        tracing::info!(target: "globeterrain", "file logging test");
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(&logs).unwrap().collect();
        assert_eq!(files.len(), 1);

        // A second global subscriber is refused.
        assert!(matches!(init_logging(config), Err(LoggingError::Init(_))));
    }
}
