//! Platform paths.
//!
//! Resolves the depot data directory and Blender's per-user add-ons folder.

use std::path::PathBuf;

/// Returns the depot data directory (~/.blender-depot).
#[must_use]
pub fn depot_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".blender-depot")
}

/// Returns Blender's user add-ons directory for `version` (e.g. "4.2").
///
/// Linux: `~/.config/blender/<v>/scripts/addons`
/// macOS: `~/Library/Application Support/Blender/<v>/scripts/addons`
/// Windows: `%APPDATA%\Blender Foundation\Blender\<v>\scripts\addons`
#[must_use]
pub fn blender_addons_dir(version: &str) -> PathBuf {
    blender_config_root()
        .join(major_minor(version))
        .join("scripts")
        .join("addons")
}

#[cfg(windows)]
fn blender_config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Blender Foundation")
        .join("Blender")
}

#[cfg(target_os = "macos")]
fn blender_config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Blender")
}

#[cfg(all(not(windows), not(target_os = "macos")))]
fn blender_config_root() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("blender")
}

/// Blender names its config folders after `major.minor` only.
fn major_minor(version: &str) -> String {
    version
        .trim()
        .split('.')
        .take(2)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depot_dir() {
        assert!(depot_dir().to_string_lossy().contains(".blender-depot"));
    }

    #[test]
    fn test_major_minor() {
        assert_eq!(major_minor("4.2.1"), "4.2");
        assert_eq!(major_minor("3.6"), "3.6");
        assert_eq!(major_minor("4"), "4");
    }

    #[test]
    fn test_blender_addons_dir() {
        let dir = blender_addons_dir("4.2.3");
        assert!(dir.ends_with("4.2/scripts/addons"));
    }
}
