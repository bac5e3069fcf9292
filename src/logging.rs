//! Logging configuration using the tracing ecosystem.
//!
//! Diagnostics go to stderr so they never mix with a command's own stdout.
//! The level comes from `RELAY_LOG` (an `EnvFilter` directive), then
//! `[logging] level`, then `warn`. When `[logging] file` is set, events are
//! also appended to that file through a non-blocking writer.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "RELAY_LOG";

/// `[logging]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive: trace, debug, info, warn, error, off, or `relay=debug,warn`.
    #[serde(default = "default_level")]
    pub level: String,
    /// `text` or `json`.
    #[serde(default = "default_format")]
    pub format: String,
    /// Optional log file, appended to.
    #[serde(default)]
    pub file: Option<PathBuf>,
}

fn default_level() -> String {
    "warn".to_string()
}

fn default_format() -> String {
    "text".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            file: None,
        }
    }
}

/// Keeps the file writer flushing until dropped. Hold it for the life of `main`.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
pub fn init(config: &LoggingConfig, base_dir: &Path) -> Result<LogGuard> {
    let directive = std::env::var(LOG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| config.level.clone());
    let json = config.format.eq_ignore_ascii_case("json");

    let stderr_layer = if json {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .without_time()
            .boxed()
    };

    let (file_layer, guard) = match &config.file {
        Some(file) => {
            let path = if file.is_absolute() {
                file.clone()
            } else {
                base_dir.join(file)
            };
            let (writer, guard) = non_blocking_file(&path)?;
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true);
            let layer = if json { layer.json().boxed() } else { layer.boxed() };
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .with(build_filter(&directive)?)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "relay starting");
    Ok(LogGuard { _file: guard })
}

fn build_filter(directive: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directive)
        .with_context(|| format!("Invalid log filter '{}'", directive))
}

fn non_blocking_file(
    path: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;
    Ok(tracing_appender::non_blocking(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, "warn");
        assert_eq!(config.format, "text");
        assert!(config.file.is_none());
    }

    #[test]
    fn test_filter_accepts_module_directives() {
        assert!(build_filter("relay=debug,warn").is_ok());
        assert!(build_filter("info").is_ok());
    }

    #[test]
    fn test_filter_rejects_garbage() {
        assert!(build_filter("relay=loud").is_err());
    }

    #[test]
    fn test_non_blocking_file_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/relay.log");
        let (_writer, _guard) = non_blocking_file(&path).unwrap();
        assert!(path.exists());
    }
}
