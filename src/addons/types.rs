//! Add-on type definitions.
//!
//! Core data structures shared by the extractor, walker, fetcher and
//! installer.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Separator used in place of `/` when a resource ID becomes a folder name.
///
/// GitHub owner and repository names never contain `+`, so the mapping is
/// reversible and distinct IDs never share a folder.
pub const FOLDER_SEPARATOR: char = '+';

/// Add-on error types.
#[derive(Debug, Error)]
pub enum AddonError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Network error during a GitHub API call.
    #[error("Network error: {0}")]
    Network(String),

    /// Non-success HTTP status.
    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    /// GitHub API rate limit exceeded.
    #[error("GitHub API rate limit exceeded")]
    RateLimitExceeded,

    /// Downloaded archive could not be read or extracted.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Resource ID is not in `owner/name` form.
    #[error("Invalid resource ID '{0}' (expected owner/name)")]
    InvalidResourceId(String),

    /// Package manifest is malformed.
    #[error("Manifest error: {0}")]
    Manifest(String),

    /// Package manifest needs a newer importer.
    #[error("Incompatible package: requires importer {required}, this is {current}")]
    IncompatibleManifest { required: String, current: String },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Install destination already exists.
    #[error("Destination already exists: {}", .0.display())]
    Conflict(PathBuf),
}

/// A remote repository identifier in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId {
    owner: String,
    name: String,
}

impl ResourceId {
    /// Parses an `owner/name` reference.
    pub fn parse(input: &str) -> Result<Self, AddonError> {
        let invalid = || AddonError::InvalidResourceId(input.to_string());

        let (owner, name) = input.trim().split_once('/').ok_or_else(invalid)?;
        if owner.is_empty()
            || name.is_empty()
            || name.contains('/')
            || owner.contains(FOLDER_SEPARATOR)
            || name.contains(FOLDER_SEPARATOR)
            || owner.contains('\\')
            || name.contains('\\')
        {
            return Err(invalid());
        }

        Ok(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// Recovers an ID from a folder produced by [`ResourceId::folder_name`].
    #[must_use]
    pub fn from_folder_name(folder: &str) -> Option<Self> {
        let (owner, name) = folder.split_once(FOLDER_SEPARATOR)?;
        Self::parse(&format!("{}/{}", owner, name)).ok()
    }

    /// Repository owner.
    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Local folder name for this resource (`owner+name`).
    #[must_use]
    pub fn folder_name(&self) -> String {
        format!("{}{}{}", self.owner, FOLDER_SEPARATOR, self.name)
    }

    /// File name of the temporary download archive.
    #[must_use]
    pub fn archive_name(&self) -> String {
        format!("{}.zip", self.folder_name())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for ResourceId {
    type Err = AddonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Metadata parsed from an add-on's `bl_info` literal, plus provenance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddonInfo {
    /// Key/value pairs of the literal, tuples mapped to arrays.
    pub fields: Map<String, Value>,
    /// Installable unit: the package folder or the single script file.
    pub addon_path: PathBuf,
    /// Folder name to install a package add-on under.
    pub addon_folder: Option<String>,
}

impl AddonInfo {
    /// Creates a descriptor for the given fields and location.
    #[must_use]
    pub fn new(fields: Map<String, Value>, addon_path: PathBuf) -> Self {
        Self {
            fields,
            addon_path,
            addon_folder: None,
        }
    }

    /// Sets the install folder name.
    #[must_use]
    pub fn with_folder(mut self, folder: String) -> Self {
        self.addon_folder = Some(folder);
        self
    }

    fn str_field(&self, key: &str) -> &str {
        self.fields.get(key).and_then(Value::as_str).unwrap_or("")
    }

    fn version_field(&self, key: &str) -> Vec<u32> {
        match self.fields.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_u64)
                .filter_map(|n| u32::try_from(n).ok())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.str_field("name")
    }

    /// Author string.
    #[must_use]
    pub fn author(&self) -> &str {
        self.str_field("author")
    }

    /// Description.
    #[must_use]
    pub fn description(&self) -> &str {
        self.str_field("description")
    }

    /// Blender category, e.g. "Import-Export".
    #[must_use]
    pub fn category(&self) -> &str {
        self.str_field("category")
    }

    /// Add-on version as integer components.
    #[must_use]
    pub fn version(&self) -> Vec<u32> {
        self.version_field("version")
    }

    /// Minimum Blender version as integer components.
    #[must_use]
    pub fn blender(&self) -> Vec<u32> {
        self.version_field("blender")
    }

    /// Lookup key used by the selection operations (name + author).
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}{}", self.name(), self.author())
    }

    /// Returns true if the add-on is a package folder.
    #[must_use]
    pub fn is_package(&self) -> bool {
        self.addon_folder.is_some()
    }

    /// Name of the entry created in the add-ons directory on install.
    #[must_use]
    pub fn install_name(&self) -> String {
        if let Some(ref folder) = self.addon_folder {
            return folder.clone();
        }
        file_name_of(&self.addon_path).unwrap_or_else(|| self.name().to_string())
    }
}

/// Formats version components as `1.2.3`.
#[must_use]
pub fn format_version(parts: &[u32]) -> String {
    parts
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

fn file_name_of(path: &Path) -> Option<String> {
    path.file_name().map(|n| n.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn info(value: Value) -> AddonInfo {
        let Value::Object(fields) = value else {
            panic!("expected object");
        };
        AddonInfo::new(fields, PathBuf::from("/tmp/addon.py"))
    }

    #[test]
    fn test_resource_id_parse() {
        let id = ResourceId::parse("acme/widget").unwrap();
        assert_eq!(id.owner(), "acme");
        assert_eq!(id.name(), "widget");
        assert_eq!(id.to_string(), "acme/widget");
    }

    #[test]
    fn test_resource_id_invalid() {
        assert!(ResourceId::parse("invalid").is_err());
        assert!(ResourceId::parse("too/many/parts").is_err());
        assert!(ResourceId::parse("/repo").is_err());
        assert!(ResourceId::parse("owner/").is_err());
        assert!(ResourceId::parse("own+er/repo").is_err());
    }

    #[test]
    fn test_folder_name_round_trip() {
        let id = ResourceId::parse("acme/my.addon_v2").unwrap();
        assert_eq!(id.folder_name(), "acme+my.addon_v2");
        assert_eq!(id.archive_name(), "acme+my.addon_v2.zip");
        assert_eq!(ResourceId::from_folder_name(&id.folder_name()), Some(id));
        assert!(!ResourceId::parse("a/b").unwrap().folder_name().contains('/'));
    }

    #[test]
    fn test_folder_names_distinct() {
        let a = ResourceId::parse("ab/c").unwrap();
        let b = ResourceId::parse("a/bc").unwrap();
        assert_ne!(a.folder_name(), b.folder_name());
    }

    #[test]
    fn test_addon_info_accessors() {
        let addon = info(json!({
            "name": "Widget",
            "author": "Acme",
            "version": [1, 2, 0],
            "blender": [2, 80, 0],
            "category": "Mesh",
        }));

        assert_eq!(addon.name(), "Widget");
        assert_eq!(addon.key(), "WidgetAcme");
        assert_eq!(addon.version(), vec![1, 2, 0]);
        assert_eq!(addon.blender(), vec![2, 80, 0]);
        assert_eq!(addon.description(), "");
        assert_eq!(addon.install_name(), "addon.py");
        assert_eq!(format_version(&addon.blender()), "2.80.0");
    }

    #[test]
    fn test_install_name_prefers_folder() {
        let addon = info(json!({"name": "Widget"})).with_folder("widget".to_string());
        assert!(addon.is_package());
        assert_eq!(addon.install_name(), "widget");
    }
}
