//! Bounded directory walk that discovers add-ons.
//!
//! Handles both layouts found in the wild: one add-on per repository, and
//! repositories holding several add-ons in subfolders.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::extractor::{PACKAGE_ENTRY, extract_in};
use super::types::{AddonInfo, ResourceId};

/// Depth at which the walk stops descending (levels 0..MAX_DEPTH are examined).
pub const MAX_DEPTH: usize = 3;

/// Walks `root` and returns every add-on found.
///
/// With `resources`, only those resource folders are examined at the top
/// level; stray files next to them are ignored.
#[must_use]
pub fn discover(root: &Path, resources: Option<&[ResourceId]>) -> Vec<AddonInfo> {
    let mut found = Vec::new();
    walk(root, resources, 0, &mut found);
    info!(
        "[WALK] Discovered {} add-on(s) under {}",
        found.len(),
        root.display()
    );
    found
}

/// Recursive step of [`discover`]. Appends to `out` in discovery order.
pub fn walk(
    root: &Path,
    resources: Option<&[ResourceId]>,
    depth: usize,
    out: &mut Vec<AddonInfo>,
) {
    if depth >= MAX_DEPTH {
        return;
    }
    // `root` is `depth` levels below the directory the walk started in
    let cache_root = root.ancestors().nth(depth);

    let children = match resources {
        Some(ids) if depth == 0 && !ids.is_empty() => ids
            .iter()
            .map(|id| root.join(id.folder_name()))
            .collect(),
        _ => list_dir(root),
    };

    for child in children {
        // Never follow symlinks; a link back up the tree would loop.
        let Ok(meta) = fs::symlink_metadata(&child) else {
            debug!("[WALK] Skipping missing path {}", child.display());
            continue;
        };
        if meta.file_type().is_symlink() {
            debug!("[WALK] Skipping symlink {}", child.display());
            continue;
        }

        let entry = child.join(PACKAGE_ENTRY);
        if meta.is_dir() && is_regular_file(&entry) {
            if let Some(info) = extract_in(&entry, cache_root) {
                debug!("[WALK] Package add-on '{}' at {}", info.name(), child.display());
                out.push(info);
            }
        } else if meta.is_file() && child.extension().is_some_and(|ext| ext == "py") {
            if let Some(info) = extract_in(&child, cache_root) {
                debug!("[WALK] Script add-on '{}' at {}", info.name(), child.display());
                out.push(info);
            }
        } else if meta.is_dir() {
            walk(&child, None, depth + 1, out);
        }
    }
}

fn is_regular_file(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok_and(|meta| meta.is_file())
}

/// Directory listing in name order, so results do not depend on the filesystem.
fn list_dir(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();
    paths
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn addon(name: &str) -> String {
        format!("bl_info = {{'name': '{}', 'author': 'a', 'blender': (2, 80, 0)}}\n", name)
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn names(found: &[AddonInfo]) -> Vec<&str> {
        found.iter().map(AddonInfo::name).collect()
    }

    #[test]
    fn test_package_stops_descent() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "acme+pkg/__init__.py", &addon("Pkg"));
        write(tmp.path(), "acme+pkg/sub/other.py", &addon("Inner"));

        let found = discover(tmp.path(), None);
        assert_eq!(names(&found), vec!["Pkg"]);
    }

    #[test]
    fn test_monorepo_layout() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "acme+mono/one/__init__.py", &addon("One"));
        write(tmp.path(), "acme+mono/two.py", &addon("Two"));
        write(tmp.path(), "acme+mono/README.md", "# readme");

        let found = discover(tmp.path(), None);
        assert_eq!(names(&found), vec!["One", "Two"]);
        assert_eq!(found[0].addon_folder.as_deref(), Some("one"));
    }

    #[test]
    fn test_nested_plus_folder_keeps_name() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "acme+mono/node+tools/__init__.py", &addon("Nodes"));
        write(tmp.path(), "acme+single/__init__.py", &addon("Single"));

        let found = discover(tmp.path(), None);
        assert_eq!(names(&found), vec!["Nodes", "Single"]);
        assert_eq!(found[0].addon_folder.as_deref(), Some("node+tools"));
        assert_eq!(found[1].addon_folder.as_deref(), Some("single"));
    }

    #[test]
    fn test_depth_limit() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "l0/l1/shallow.py", &addon("Shallow"));
        write(tmp.path(), "l0/l1/l2/l3/deep.py", &addon("Deep"));

        let found = discover(tmp.path(), None);
        assert_eq!(names(&found), vec!["Shallow"]);
    }

    #[test]
    fn test_missing_named_resource_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let ids = [ResourceId::parse("ghost/repo").unwrap()];
        assert!(discover(tmp.path(), Some(&ids)).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_not_followed() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "real/loop.py", &addon("Once"));
        std::os::unix::fs::symlink(tmp.path(), tmp.path().join("real/back")).unwrap();

        let found = discover(tmp.path(), None);
        assert_eq!(names(&found), vec!["Once"]);
    }
}
