//! File logging for blender-depot.
//!
//! Logs go to ~/.blender-depot/logs/, one file per run. Old files are
//! removed at startup according to the retention setting.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::depot_dir;

/// Default log retention in hours.
pub const DEFAULT_LOG_RETENTION_HOURS: u32 = 24;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log retention period in hours.
    pub retention_hours: u32,
    /// Log level (trace, debug, info, warn, error, off).
    pub level: String,
    /// Whether logging is enabled.
    pub enabled: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            retention_hours: DEFAULT_LOG_RETENTION_HOURS,
            level: DEFAULT_LOG_LEVEL.to_string(),
            enabled: true,
        }
    }
}

impl LogConfig {
    /// Parses log level from string.
    #[must_use]
    pub fn parse_level(value: &str) -> String {
        match value.to_lowercase().as_str() {
            "trace" => "trace".to_string(),
            "debug" => "debug".to_string(),
            "info" => "info".to_string(),
            "warn" | "warning" => "warn".to_string(),
            "error" => "error".to_string(),
            "off" | "none" | "disabled" => "off".to_string(),
            _ => DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

/// Returns the log directory path (~/.blender-depot/logs/).
#[must_use]
pub fn log_directory() -> PathBuf {
    depot_dir().join("logs")
}

/// Returns a fresh log file path inside `dir`.
#[must_use]
pub fn log_path_in(dir: &Path) -> PathBuf {
    let now = chrono::Local::now();
    let filename = format!("depot_{}.log", now.format("%Y-%m-%d_%H-%M-%S"));
    dir.join(filename)
}

/// Removes `.log` files in `dir` older than the retention period.
///
/// # Errors
/// Returns error if directory cannot be read.
pub fn cleanup_old_logs(dir: &Path, retention_hours: u32) -> io::Result<u32> {
    if !dir.exists() {
        return Ok(0);
    }

    let retention = Duration::from_secs(u64::from(retention_hours) * 3600);
    let now = SystemTime::now();
    let mut deleted_count = 0;

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();

        if path.extension().and_then(|e| e.to_str()) != Some("log") {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > retention) && fs::remove_file(&path).is_ok() {
            deleted_count += 1;
        }
    }

    Ok(deleted_count)
}

/// Initializes file logging.
///
/// `RUST_LOG` takes precedence over the configured level.
///
/// # Errors
/// Returns error if the log directory or file cannot be created.
pub fn init(config: &LogConfig) -> io::Result<Option<PathBuf>> {
    let level = LogConfig::parse_level(&config.level);
    if !config.enabled || level == "off" {
        return Ok(None);
    }

    let log_dir = log_directory();
    fs::create_dir_all(&log_dir)?;

    let deleted = cleanup_old_logs(&log_dir, config.retention_hours)?;

    let log_path = log_path_in(&log_dir);
    let log_file = File::create(&log_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let file_layer = fmt::layer()
        .with_writer(log_file.with_max_level(tracing::Level::TRACE))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(io::Error::other)?;

    tracing::info!("blender-depot {} logging initialized", env!("CARGO_PKG_VERSION"));
    tracing::info!("Log file: {}", log_path.display());
    tracing::info!("Log level: {}", level);
    if deleted > 0 {
        tracing::info!("Cleaned up {} old log file(s)", deleted);
    }

    Ok(Some(log_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.retention_hours, DEFAULT_LOG_RETENTION_HOURS);
        assert_eq!(config.level, DEFAULT_LOG_LEVEL);
        assert!(config.enabled);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(LogConfig::parse_level("debug"), "debug");
        assert_eq!(LogConfig::parse_level("DEBUG"), "debug");
        assert_eq!(LogConfig::parse_level("warning"), "warn");
        assert_eq!(LogConfig::parse_level("none"), "off");
        assert_eq!(LogConfig::parse_level("invalid"), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_log_directory() {
        let dir = log_directory();
        assert!(dir.to_string_lossy().contains(".blender-depot"));
        assert!(dir.ends_with("logs"));
    }

    #[test]
    fn test_cleanup_keeps_fresh_logs() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.log"), "x").unwrap();
        fs::write(tmp.path().join("notes.txt"), "x").unwrap();

        assert_eq!(cleanup_old_logs(tmp.path(), 24).unwrap(), 0);
        assert!(tmp.path().join("a.log").exists());
        assert_eq!(cleanup_old_logs(&tmp.path().join("missing"), 24).unwrap(), 0);
    }

    #[test]
    fn test_log_path_in() {
        let path = log_path_in(Path::new("/logs"));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("depot_"));
        assert!(name.ends_with(".log"));
    }
}
