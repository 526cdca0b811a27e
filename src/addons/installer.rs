//! Add-on installer.
//!
//! Copies selected add-ons from the cache into Blender's add-ons directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::types::{AddonError, AddonInfo};

/// What to do when the install destination already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictPolicy {
    /// Leave the existing add-on in place.
    #[default]
    Skip,
    /// Replace the existing add-on.
    Overwrite,
}

impl ConflictPolicy {
    /// Parses a policy name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "skip" => Some(Self::Skip),
            "overwrite" | "replace" => Some(Self::Overwrite),
            _ => None,
        }
    }
}

/// Outcome of an install run.
#[derive(Debug, Default)]
pub struct InstallReport {
    /// Destinations written.
    pub installed: Vec<PathBuf>,
    /// Destinations left alone because they already existed.
    pub skipped: Vec<PathBuf>,
    /// Add-ons that could not be installed.
    pub failed: Vec<(String, AddonError)>,
}

/// Copies add-ons into an add-ons directory.
#[derive(Debug)]
pub struct AddonInstaller {
    /// Target add-ons directory.
    addons_dir: PathBuf,
    /// Conflict handling.
    policy: ConflictPolicy,
}

impl AddonInstaller {
    /// Creates an installer targeting `addons_dir`.
    #[must_use]
    pub fn new(addons_dir: PathBuf, policy: ConflictPolicy) -> Self {
        assert!(!addons_dir.as_os_str().is_empty(), "Add-ons dir must not be empty");
        Self { addons_dir, policy }
    }

    /// Returns the target directory.
    #[must_use]
    pub fn addons_dir(&self) -> &Path {
        &self.addons_dir
    }

    /// Installs every add-on, continuing past failures.
    pub fn install<'a, I>(&self, addons: I) -> InstallReport
    where
        I: IntoIterator<Item = &'a AddonInfo>,
    {
        let mut report = InstallReport::default();

        if let Err(e) = fs::create_dir_all(&self.addons_dir) {
            warn!("[INSTALL] Cannot create {}: {}", self.addons_dir.display(), e);
            for addon in addons {
                let err = io::Error::new(e.kind(), e.to_string());
                report.failed.push((addon.name().to_string(), err.into()));
            }
            return report;
        }

        for addon in addons {
            match self.install_one(addon) {
                Ok(dest) => {
                    info!("[INSTALL] Installed '{}' to {}", addon.name(), dest.display());
                    report.installed.push(dest);
                }
                Err(AddonError::Conflict(dest)) => {
                    info!("[INSTALL] Skipping '{}': {} exists", addon.name(), dest.display());
                    report.skipped.push(dest);
                }
                Err(e) => {
                    warn!("[INSTALL] Failed to install '{}': {}", addon.name(), e);
                    report.failed.push((addon.name().to_string(), e));
                }
            }
        }

        report
    }

    /// Installs a single add-on and returns its destination.
    pub fn install_one(&self, addon: &AddonInfo) -> Result<PathBuf, AddonError> {
        let name = addon.install_name();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(AddonError::Config(format!("invalid install name '{}'", name)));
        }
        let dest = self.addons_dir.join(&name);

        if fs::symlink_metadata(&dest).is_ok() {
            match self.policy {
                ConflictPolicy::Skip => return Err(AddonError::Conflict(dest)),
                ConflictPolicy::Overwrite => remove_path(&dest)?,
            }
        }

        let source = &addon.addon_path;
        if source.is_dir() {
            copy_dir_recursive(source, &dest)?;
        } else if source.is_file() {
            fs::copy(source, &dest)?;
        } else {
            return Err(AddonError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} no longer exists", source.display()),
            )));
        }

        Ok(dest)
    }
}

/// Recursively copies a directory, skipping symlinks.
fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if file_type.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else if file_type.is_file() {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}

fn remove_path(path: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tempfile::TempDir;

    fn addon(path: PathBuf, folder: Option<&str>) -> AddonInfo {
        let Value::Object(fields) = json!({"name": "Widget", "author": "Acme"}) else {
            unreachable!();
        };
        let info = AddonInfo::new(fields, path);
        match folder {
            Some(f) => info.with_folder(f.to_string()),
            None => info,
        }
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(ConflictPolicy::parse("Skip"), Some(ConflictPolicy::Skip));
        assert_eq!(ConflictPolicy::parse("overwrite"), Some(ConflictPolicy::Overwrite));
        assert_eq!(ConflictPolicy::parse("merge"), None);
        assert_eq!(ConflictPolicy::default(), ConflictPolicy::Skip);
    }

    #[test]
    fn test_install_package_and_script() {
        let tmp = TempDir::new().unwrap();
        let pkg = tmp.path().join("cache/acme+widget");
        fs::create_dir_all(pkg.join("sub")).unwrap();
        fs::write(pkg.join("__init__.py"), "x").unwrap();
        fs::write(pkg.join("sub/mod.py"), "y").unwrap();
        let script = tmp.path().join("cache/tool.py");
        fs::write(&script, "z").unwrap();

        let target = tmp.path().join("addons");
        let installer = AddonInstaller::new(target.clone(), ConflictPolicy::Skip);
        let addons = [addon(pkg, Some("widget")), addon(script, None)];
        let report = installer.install(&addons);

        assert_eq!(report.installed.len(), 2);
        assert!(target.join("widget/sub/mod.py").is_file());
        assert!(target.join("tool.py").is_file());
    }

    #[test]
    fn test_skip_and_overwrite() {
        let tmp = TempDir::new().unwrap();
        let script = tmp.path().join("tool.py");
        fs::write(&script, "new").unwrap();
        let target = tmp.path().join("addons");
        fs::create_dir_all(&target).unwrap();
        fs::write(target.join("tool.py"), "old").unwrap();
        let addons = [addon(script, None)];

        let report = AddonInstaller::new(target.clone(), ConflictPolicy::Skip).install(&addons);
        assert_eq!(report.skipped, vec![target.join("tool.py")]);
        assert_eq!(fs::read_to_string(target.join("tool.py")).unwrap(), "old");

        let report =
            AddonInstaller::new(target.clone(), ConflictPolicy::Overwrite).install(&addons);
        assert_eq!(report.installed.len(), 1);
        assert_eq!(fs::read_to_string(target.join("tool.py")).unwrap(), "new");
    }

    #[test]
    fn test_missing_source_fails_without_stopping() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("good.py");
        fs::write(&good, "g").unwrap();
        let addons = [addon(tmp.path().join("gone.py"), None), addon(good, None)];

        let report =
            AddonInstaller::new(tmp.path().join("addons"), ConflictPolicy::Skip).install(&addons);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.installed.len(), 1);
    }
}
