//! Package fetcher.
//!
//! Downloads each resource's release asset (or a branch snapshot) and
//! extracts it into the cache. A failing resource never stops the batch.

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use super::github::{GitHubAsset, GitHubRelease, RemoteApi};
use super::types::{AddonError, ResourceId};

/// Outcome of fetching a batch of resources.
#[derive(Debug, Default)]
pub struct FetchReport {
    /// Resources extracted successfully, in request order.
    pub fetched: Vec<ResourceId>,
    /// Resources that failed, with the reason.
    pub failures: Vec<(ResourceId, AddonError)>,
}

impl FetchReport {
    /// Returns true if every resource was fetched.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Where a resource's archive comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadSource {
    /// An asset of the latest stable release.
    Asset(String),
    /// A snapshot of the default branch.
    Snapshot,
}

/// Fetches resources through a [`RemoteApi`].
pub struct PackageFetcher<'a, R: RemoteApi> {
    /// Remote API implementation.
    remote: &'a R,
    /// Platform name matched against asset names.
    platform: String,
}

impl<'a, R: RemoteApi> PackageFetcher<'a, R> {
    /// Creates a fetcher matching assets for the current platform.
    #[must_use]
    pub fn new(remote: &'a R) -> Self {
        Self::with_platform(remote, &platform_name())
    }

    /// Creates a fetcher matching assets for `platform`.
    #[must_use]
    pub fn with_platform(remote: &'a R, platform: &str) -> Self {
        Self {
            remote,
            platform: platform.to_lowercase(),
        }
    }

    /// Fetches every resource into `destination`.
    pub fn fetch(&self, destination: &Path, ids: &[ResourceId]) -> FetchReport {
        let mut report = FetchReport::default();

        if let Err(e) = fs::create_dir_all(destination) {
            warn!("[FETCH] Cannot create {}: {}", destination.display(), e);
            let message = e.to_string();
            for id in ids {
                let err = io::Error::new(e.kind(), message.clone());
                report.failures.push((id.clone(), AddonError::Io(err)));
            }
            return report;
        }

        for id in ids {
            match self.fetch_one(destination, id) {
                Ok(dir) => {
                    info!("[FETCH] {} extracted to {}", id, dir.display());
                    report.fetched.push(id.clone());
                }
                Err(e) => {
                    warn!("[FETCH] {} failed: {}", id, e);
                    report.failures.push((id.clone(), e));
                }
            }
        }

        report
    }

    /// Downloads and extracts one resource, returning its folder.
    pub fn fetch_one(&self, destination: &Path, id: &ResourceId) -> Result<PathBuf, AddonError> {
        let (source, bytes) = self.download(id)?;
        debug!("[FETCH] {} downloaded from {:?}", id, source);

        let archive_path = destination.join(id.archive_name());
        let _guard = TempFile(archive_path.clone());
        fs::write(&archive_path, &bytes)?;

        let target = destination.join(id.folder_name());
        extract_archive(&archive_path, &target)?;
        Ok(target)
    }

    fn download(&self, id: &ResourceId) -> Result<(DownloadSource, Vec<u8>), AddonError> {
        let releases = self.remote.list_releases(id)?;

        match select_asset(&releases, &self.platform) {
            Some(asset) => {
                info!("[FETCH] {}: using release asset {}", id, asset.name);
                let bytes = self.remote.download_asset(asset)?;
                Ok((DownloadSource::Asset(asset.name.clone()), bytes))
            }
            None => {
                info!("[FETCH] {}: no release asset, using branch snapshot", id);
                let bytes = self.remote.download_snapshot(id)?;
                Ok((DownloadSource::Snapshot, bytes))
            }
        }
    }
}

/// Picks the asset to download from a release list.
///
/// Uses the first non-prerelease release. Prefers an asset whose name
/// mentions `platform`, else the first asset.
#[must_use]
pub fn select_asset<'r>(releases: &'r [GitHubRelease], platform: &str) -> Option<&'r GitHubAsset> {
    let release = releases.iter().find(|r| !r.prerelease)?;
    let platform = platform.to_lowercase();

    release
        .assets
        .iter()
        .find(|a| !platform.is_empty() && a.name.to_lowercase().contains(&platform))
        .or_else(|| release.assets.first())
}

/// Canonical platform name used in asset names (`mac`, `linux`, `windows`).
#[must_use]
pub fn platform_name() -> String {
    match std::env::consts::OS {
        "macos" => "mac".to_string(),
        os => os.to_lowercase(),
    }
}

/// Extracts a zip archive into `dest`, replacing previous contents.
///
/// Strips the archive's top-level folder when the first entry is a
/// directory, which is how branch snapshots are packed. Entries are
/// unpacked into a sibling `<dest>.partial` folder that replaces `dest`
/// only once every entry succeeded; on failure `dest` is left as it was.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<(), AddonError> {
    let staging = staging_path(dest)?;
    if fs::symlink_metadata(&staging).is_ok() {
        fs::remove_dir_all(&staging)?;
    }

    if let Err(e) = unpack(archive_path, &staging) {
        if staging.exists() {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!("[FETCH] Failed to remove {}: {}", staging.display(), cleanup);
            }
        }
        return Err(e);
    }

    if dest.exists() {
        fs::remove_dir_all(dest)?;
    }
    fs::rename(&staging, dest)?;
    Ok(())
}

/// Sibling folder that an archive is unpacked into before it replaces `dest`.
fn staging_path(dest: &Path) -> Result<PathBuf, AddonError> {
    let name = dest.file_name().ok_or_else(|| {
        AddonError::Archive(format!("Invalid extraction target: {}", dest.display()))
    })?;
    let mut staging = name.to_os_string();
    staging.push(".partial");
    Ok(dest.with_file_name(staging))
}

fn unpack(archive_path: &Path, dest: &Path) -> Result<(), AddonError> {
    let file = File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| AddonError::Archive(format!("Failed to open archive: {}", e)))?;

    let root_prefix = if archive.is_empty() {
        None
    } else {
        let first = archive
            .by_index(0)
            .map_err(|e| AddonError::Archive(format!("Failed to read archive entry: {}", e)))?;
        first.is_dir().then(|| first.name().to_string())
    };

    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| AddonError::Archive(format!("Failed to read archive entry: {}", e)))?;

        let Some(enclosed) = file.enclosed_name() else {
            return Err(AddonError::Archive(format!(
                "Unsafe path in archive: {}",
                file.name()
            )));
        };

        let relative = match root_prefix {
            Some(ref prefix) => match enclosed.strip_prefix(prefix) {
                Ok(stripped) => stripped.to_path_buf(),
                Err(_) => enclosed,
            },
            None => enclosed,
        };

        if relative.as_os_str().is_empty() {
            continue;
        }

        let outpath = dest.join(&relative);
        if file.is_dir() {
            fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut outfile = File::create(&outpath)?;
            io::copy(&mut file, &mut outfile)?;
        }
    }

    Ok(())
}

/// Removes the wrapped file when dropped.
struct TempFile(PathBuf);

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = fs::remove_file(&self.0) {
                warn!("[FETCH] Failed to remove {}: {}", self.0.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn asset(name: &str) -> GitHubAsset {
        GitHubAsset {
            name: name.to_string(),
            browser_download_url: format!("https://example.test/{}", name),
        }
    }

    fn release(prerelease: bool, assets: Vec<GitHubAsset>) -> GitHubRelease {
        GitHubRelease {
            tag_name: "v1".to_string(),
            prerelease,
            assets,
        }
    }

    fn zip_bytes(dirs: &[&str], files: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for dir in dirs {
            writer.add_directory(*dir, options).unwrap();
        }
        for (name, content) in files {
            writer.start_file(*name, options).unwrap();
            writer.write_all(content.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_select_prefers_platform_asset() {
        let releases = vec![release(
            false,
            vec![asset("widget-windows.zip"), asset("widget-Linux.zip")],
        )];
        let chosen = select_asset(&releases, "linux").unwrap();
        assert_eq!(chosen.name, "widget-Linux.zip");
    }

    #[test]
    fn test_select_falls_back_to_first_asset() {
        let releases = vec![release(false, vec![asset("widget.zip"), asset("extra.zip")])];
        assert_eq!(select_asset(&releases, "mac").unwrap().name, "widget.zip");
    }

    #[test]
    fn test_select_skips_prereleases() {
        let releases = vec![
            release(true, vec![asset("beta.zip")]),
            release(false, vec![asset("stable.zip")]),
        ];
        assert_eq!(select_asset(&releases, "linux").unwrap().name, "stable.zip");
        assert!(select_asset(&[release(true, vec![asset("beta.zip")])], "linux").is_none());
        assert!(select_asset(&[], "linux").is_none());
    }

    #[test]
    fn test_platform_name() {
        let name = platform_name();
        assert!(!name.is_empty());
        assert_eq!(name, name.to_lowercase());
        assert_ne!(name, "macos");
    }

    #[test]
    fn test_extract_strips_wrapper_dir() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        fs::write(
            &archive,
            zip_bytes(&["acme-widget-abc123/"], &[("acme-widget-abc123/__init__.py", "x")]),
        )
        .unwrap();

        let dest = tmp.path().join("out");
        extract_archive(&archive, &dest).unwrap();
        assert!(dest.join("__init__.py").is_file());
    }

    #[test]
    fn test_extract_keeps_flat_archive() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        fs::write(
            &archive,
            zip_bytes(&[], &[("widget/__init__.py", "x"), ("README.md", "r")]),
        )
        .unwrap();

        let dest = tmp.path().join("out");
        fs::create_dir_all(dest.join("stale")).unwrap();
        extract_archive(&archive, &dest).unwrap();
        assert!(dest.join("widget/__init__.py").is_file());
        assert!(dest.join("README.md").is_file());
        assert!(!dest.join("stale").exists());
    }

    #[test]
    fn test_extract_rejects_corrupt_archive() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("bad.zip");
        fs::write(&archive, b"not a zip").unwrap();

        let err = extract_archive(&archive, &tmp.path().join("out")).unwrap_err();
        assert!(matches!(err, AddonError::Archive(_)));
    }

    #[test]
    fn test_extract_failure_leaves_nothing_behind() {
        let tmp = TempDir::new().unwrap();
        let archive = tmp.path().join("a.zip");
        fs::write(
            &archive,
            zip_bytes(&[], &[("widget/__init__.py", "x"), ("../evil.txt", "e")]),
        )
        .unwrap();

        let dest = tmp.path().join("out");
        let err = extract_archive(&archive, &dest).unwrap_err();
        assert!(matches!(err, AddonError::Archive(_)));
        assert!(!dest.exists());
        assert!(!tmp.path().join("out.partial").exists());
        assert!(!tmp.path().join("evil.txt").exists());
    }

    #[test]
    fn test_extract_failure_keeps_previous_contents() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("__init__.py"), "old").unwrap();

        let archive = tmp.path().join("a.zip");
        fs::write(
            &archive,
            zip_bytes(&[], &[("__init__.py", "new"), ("../evil.txt", "e")]),
        )
        .unwrap();

        assert!(extract_archive(&archive, &dest).is_err());
        assert_eq!(fs::read_to_string(dest.join("__init__.py")).unwrap(), "old");
    }

    #[test]
    fn test_staging_path_keeps_dots() {
        let staging = staging_path(Path::new("/cache/acme+my.addon")).unwrap();
        assert_eq!(staging, PathBuf::from("/cache/acme+my.addon.partial"));
    }

    #[test]
    fn test_temp_file_guard_removes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("x.zip");
        fs::write(&path, b"data").unwrap();
        drop(TempFile(path.clone()));
        assert!(!path.exists());
    }
}
