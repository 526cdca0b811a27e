//! Metadata extraction from add-on sources.
//!
//! Reads a Python file, pulls out its `bl_info` literal and records where the
//! installable unit lives.

use std::fs;
use std::path::Path;

use tracing::{debug, trace};

use super::literal::find_bl_info;
use super::types::{AddonInfo, FOLDER_SEPARATOR, ResourceId};

/// Entry point file of a package-style add-on.
pub const PACKAGE_ENTRY: &str = "__init__.py";

/// Folder names that wrap the real add-on folder in build layouts.
const BUILD_FOLDERS: [&str; 3] = ["src", "dist", "build"];

/// Extracts add-on metadata from a source file.
///
/// Returns `None` when the file is unreadable, has no `bl_info` literal,
/// or the literal cannot be parsed. None of these are errors: the file is
/// simply not an add-on.
///
/// Without a known cache root, a package folder's `owner+` prefix is
/// dropped only when the folder name is a valid resource folder.
#[must_use]
pub fn extract(path: &Path) -> Option<AddonInfo> {
    extract_in(path, None)
}

/// Like [`extract`], for a file found under the cache directory `root`.
///
/// Only a direct child of `root` is treated as a resource folder.
#[must_use]
pub fn extract_in(path: &Path, root: Option<&Path>) -> Option<AddonInfo> {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            debug!("[EXTRACT] Cannot read {}: {}", path.display(), e);
            return None;
        }
    };

    let Some(fields) = find_bl_info(&source) else {
        trace!("[EXTRACT] No bl_info in {}", path.display());
        return None;
    };

    let is_package = path.file_name().is_some_and(|name| name == PACKAGE_ENTRY);
    if !is_package {
        return Some(AddonInfo::new(fields, path.to_path_buf()));
    }

    let folder = path.parent()?;
    let info = AddonInfo::new(fields, folder.to_path_buf());
    Some(match install_folder_name(folder, root) {
        Some(name) => info.with_folder(name),
        None => info,
    })
}

/// Works out the folder name a package add-on should be installed under.
///
/// Skips build wrapper folders (`src`, `dist`, `build`) and drops the
/// `owner+` prefix of a resource folder. With `root`, only its direct
/// children are resource folders; nested names keep their `+`.
#[must_use]
pub fn install_folder_name(folder: &Path, root: Option<&Path>) -> Option<String> {
    let mut current = Some(folder);
    while let Some(dir) = current {
        let name = dir.file_name()?.to_string_lossy();
        if BUILD_FOLDERS.contains(&name.as_ref()) {
            current = dir.parent();
            continue;
        }

        let is_resource = match root {
            Some(root) => dir.parent() == Some(root),
            None => ResourceId::from_folder_name(&name).is_some(),
        };
        let name = match name.split_once(FOLDER_SEPARATOR) {
            Some((_, repo)) if is_resource && !repo.is_empty() => repo.to_string(),
            _ => name.to_string(),
        };
        return Some(name);
    }

    None
}
