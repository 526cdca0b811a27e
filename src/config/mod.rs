//! Configuration module for blender-depot.
//!
//! Loads `~/.blender-depot/config.toml`. Every key is optional; a missing
//! file yields the defaults.

pub mod platform;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use platform::{blender_addons_dir, depot_dir};

use crate::addons::github::{DEFAULT_API_BASE, DEFAULT_TIMEOUT_SECS};
use crate::addons::{ConflictPolicy, parse_version};
use crate::logging::LogConfig;

/// Maximum config file size (64KB).
const MAX_FILE_SIZE: u64 = 64 * 1024;

/// Blender version assumed when none is configured.
pub const DEFAULT_BLENDER_VERSION: &str = "4.2";

/// Default config file content with all keys documented.
const DEFAULT_CONFIG: &str = r#"# blender-depot configuration
# ============================
# Lines starting with '#' are comments. All keys are optional.

# Where fetched packages are extracted (default: ~/.blender-depot/cache)
# cache_dir = "/path/to/cache"

# Blender add-ons directory to install into
# (default: the user scripts/addons folder for blender_version)
# addons_dir = "/path/to/blender/scripts/addons"

# Blender version used for the default add-ons dir and compatibility checks
# blender_version = "4.2"

# GitHub API endpoint and request timeout
# api_base = "https://api.github.com"
# request_timeout_secs = 30

# What to do when an add-on is already installed: "skip" or "overwrite"
# on_conflict = "skip"

# [log]
# enabled = true
# level = "info"           # trace, debug, info, warn, error, off
# retention_hours = 24
"#;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// TOML parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// File too large.
    #[error("File too large (max {MAX_FILE_SIZE} bytes)")]
    FileTooLarge,

    /// Invalid value.
    #[error("Invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache directory override.
    pub cache_dir: Option<PathBuf>,
    /// Add-ons directory override.
    pub addons_dir: Option<PathBuf>,
    /// Host Blender version, e.g. "4.2".
    pub blender_version: Option<String>,
    /// GitHub API endpoint.
    pub api_base: String,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Install conflict policy.
    pub on_conflict: ConflictPolicy,
    /// Logging configuration.
    pub log: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            addons_dir: None,
            blender_version: None,
            api_base: DEFAULT_API_BASE.to_string(),
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            on_conflict: ConflictPolicy::Skip,
            log: LogConfig::default(),
        }
    }
}

impl Config {
    /// Returns the default config file path (~/.blender-depot/config.toml).
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        depot_dir().join("config.toml")
    }

    /// Loads the config from the default path.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::default_config_path())
    }

    /// Loads the config from `path`; a missing file gives the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let metadata = match fs::metadata(path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        if metadata.len() > MAX_FILE_SIZE {
            return Err(ConfigError::FileTooLarge);
        }

        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses TOML text and validates it.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(ref version) = self.blender_version {
            if parse_version(version).is_none() {
                return Err(ConfigError::Invalid {
                    key: "blender_version",
                    value: version.clone(),
                });
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "request_timeout_secs",
                value: "0".to_string(),
            });
        }
        if self.api_base.trim().is_empty() {
            return Err(ConfigError::Invalid {
                key: "api_base",
                value: self.api_base.clone(),
            });
        }
        Ok(())
    }

    /// Writes the documented default config to `path` if it does not exist.
    pub fn create_default(path: &Path) -> Result<bool, ConfigError> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, DEFAULT_CONFIG)?;
        Ok(true)
    }

    /// Serializes the effective config as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Directory fetched packages are extracted into.
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir
            .clone()
            .unwrap_or_else(|| depot_dir().join("cache"))
    }

    /// Blender version string in effect.
    #[must_use]
    pub fn blender_version(&self) -> &str {
        self.blender_version
            .as_deref()
            .unwrap_or(DEFAULT_BLENDER_VERSION)
    }

    /// Host version used for compatibility checks, if one is configured.
    #[must_use]
    pub fn host_version(&self) -> Option<Vec<u32>> {
        self.blender_version.as_deref().and_then(parse_version)
    }

    /// Directory add-ons are installed into.
    #[must_use]
    pub fn addons_dir(&self) -> PathBuf {
        self.addons_dir
            .clone()
            .unwrap_or_else(|| blender_addons_dir(self.blender_version()))
    }

    /// HTTP request timeout.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
