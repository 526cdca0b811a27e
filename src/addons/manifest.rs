//! Package manifest parsing.
//!
//! A package file lists the add-on repositories to fetch and the minimum
//! importer version able to handle it.

use std::cmp::Ordering;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::types::{AddonError, ResourceId};

/// Maximum manifest size accepted (1 MB).
const MAX_MANIFEST_SIZE: u64 = 1024 * 1024;

/// A package manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    /// Minimum importer version, dot separated.
    pub min_version: String,
    /// Resources to fetch, in order.
    pub addons: Vec<ResourceId>,
}

impl PackageManifest {
    /// Loads a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self, AddonError> {
        let size = fs::metadata(path)?.len();
        if size > MAX_MANIFEST_SIZE {
            return Err(AddonError::Manifest(format!(
                "{} is too large ({} bytes)",
                path.display(),
                size
            )));
        }

        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Parses a manifest from JSON text.
    pub fn from_json(content: &str) -> Result<Self, AddonError> {
        let manifest: Self =
            serde_json::from_str(content).map_err(|e| AddonError::Manifest(e.to_string()))?;

        if parse_version(&manifest.min_version).is_none() {
            return Err(AddonError::Manifest(format!(
                "invalid min_version '{}'",
                manifest.min_version
            )));
        }

        Ok(manifest)
    }

    /// Checks that an importer at `importer_version` can handle this package.
    pub fn check_compatible(&self, importer_version: &str) -> Result<(), AddonError> {
        let incompatible = || AddonError::IncompatibleManifest {
            required: self.min_version.clone(),
            current: importer_version.to_string(),
        };

        let required = parse_version(&self.min_version).ok_or_else(incompatible)?;
        let current = parse_version(importer_version).ok_or_else(incompatible)?;

        if compare_versions(&required, &current) == Ordering::Greater {
            return Err(incompatible());
        }
        Ok(())
    }
}

/// Parses `1.2.3` (optionally `v`-prefixed) into components.
///
/// Returns `None` if any component is not a number.
#[must_use]
pub fn parse_version(version: &str) -> Option<Vec<u32>> {
    let version = version.trim().trim_start_matches('v');
    if version.is_empty() {
        return None;
    }
    version.split('.').map(|part| part.parse().ok()).collect()
}

/// Compares version components numerically, padding the shorter with zeros.
#[must_use]
pub fn compare_versions(a: &[u32], b: &[u32]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|ord| *ord != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
