//! Import workflow.
//!
//! Ties the pieces together the way the add-on preferences panel drives
//! them: import a package, pick add-ons, install, clear the cache.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::addons::{
    AddonError, AddonInstaller, ConflictPolicy, FetchReport, InstallReport, PackageFetcher,
    PackageManifest, RemoteApi, ResourceId, Session, discover,
};

/// Importer version checked against a package's `min_version`.
pub const IMPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Outcome of importing a package.
#[derive(Debug)]
pub struct ImportReport {
    /// Number of add-ons discovered.
    pub discovered: usize,
    /// Per-resource fetch results.
    pub fetch: FetchReport,
}

/// Drives package import and installation for one session.
pub struct Importer<R: RemoteApi> {
    /// Remote API used for downloads.
    remote: R,
    /// Working directory of extracted packages.
    cache_dir: PathBuf,
    /// Blender add-ons directory.
    addons_dir: PathBuf,
    /// Importer version.
    version: String,
    /// Discovered add-ons.
    session: Session,
}

impl<R: RemoteApi> Importer<R> {
    /// Creates an importer.
    #[must_use]
    pub fn new(
        remote: R,
        cache_dir: PathBuf,
        addons_dir: PathBuf,
        host_version: Option<Vec<u32>>,
    ) -> Self {
        Self {
            remote,
            cache_dir,
            addons_dir,
            version: IMPORTER_VERSION.to_string(),
            session: Session::new(host_version),
        }
    }

    /// Overrides the importer version (used by tests).
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    /// Cache directory.
    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Add-ons directory.
    #[must_use]
    pub fn addons_dir(&self) -> &Path {
        &self.addons_dir
    }

    /// Current session.
    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current session, mutable for selection changes.
    pub fn session_mut(&mut self) -> &mut Session {
        &mut self.session
    }

    /// Imports the package at `manifest_path`.
    ///
    /// An incompatible package is rejected before anything is written.
    pub fn import_package(&mut self, manifest_path: &Path) -> Result<ImportReport, AddonError> {
        let manifest = PackageManifest::load(manifest_path)?;
        self.import_manifest(&manifest)
    }

    /// Imports an already loaded manifest.
    pub fn import_manifest(
        &mut self,
        manifest: &PackageManifest,
    ) -> Result<ImportReport, AddonError> {
        self.session.clear();

        if let Err(e) = manifest.check_compatible(&self.version) {
            warn!("[IMPORT] {}", e);
            return Err(e);
        }

        info!("[IMPORT] Fetching {} resource(s)", manifest.addons.len());
        let fetch = PackageFetcher::new(&self.remote).fetch(&self.cache_dir, &manifest.addons);

        let found = discover(&self.cache_dir, Some(&manifest.addons));
        let discovered = found.len();
        self.session.replace(found);

        info!(
            "[IMPORT] {} add-on(s) found, {} resource(s) failed",
            discovered,
            fetch.failures.len()
        );
        Ok(ImportReport { discovered, fetch })
    }

    /// Re-discovers add-ons from everything already in the cache.
    pub fn rescan(&mut self) -> usize {
        let found = discover(&self.cache_dir, None);
        let count = found.len();
        self.session.replace(found);
        count
    }

    /// Resource folders currently in the cache.
    #[must_use]
    pub fn cached_resources(&self) -> Vec<ResourceId> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };

        let mut ids: Vec<ResourceId> = entries
            .flatten()
            .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|e| ResourceId::from_folder_name(&e.file_name().to_string_lossy()))
            .collect();
        ids.sort();
        ids
    }

    /// Installs the selected add-ons.
    pub fn install_selected(&self, policy: ConflictPolicy) -> InstallReport {
        let installer = AddonInstaller::new(self.addons_dir.clone(), policy);
        installer.install(self.session.selected())
    }

    /// Deletes and recreates the cache. Installed add-ons are untouched.
    pub fn clear_cache(&mut self) -> Result<(), AddonError> {
        self.session.clear();

        if self.cache_dir.exists() {
            fs::remove_dir_all(&self.cache_dir)?;
        }
        fs::create_dir_all(&self.cache_dir)?;
        info!("[IMPORT] Cleared cache {}", self.cache_dir.display());
        Ok(())
    }
}
