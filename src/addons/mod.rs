//! Blender add-on discovery and installation.
//!
//! # Architecture
//!
//! - **types**: Core data structures (`AddonInfo`, `ResourceId`, `AddonError`)
//! - **literal**: Parser for the `bl_info` dict literal
//! - **extractor**: Pulls `bl_info` out of a source file and records provenance
//! - **walker**: Bounded directory walk that finds add-ons in fetched trees
//! - **github**: GitHub API client behind the `RemoteApi` trait
//! - **fetcher**: Downloads and extracts each resource, isolating failures
//! - **manifest**: Package manifest loading and version checks
//! - **session**: Discovered add-ons plus selection state
//! - **installer**: Copies selected add-ons into Blender's add-ons directory
//!
//! # Usage
//!
//! ```ignore
//! use blender_depot::addons::{discover, GitHubClient, PackageFetcher, PackageManifest};
//!
//! let manifest = PackageManifest::load(path)?;
//! let client = GitHubClient::default();
//! let report = PackageFetcher::new(&client).fetch(&cache, &manifest.addons);
//! let found = discover(&cache, Some(&manifest.addons));
//! ```

pub mod extractor;
pub mod fetcher;
pub mod github;
pub mod installer;
pub mod literal;
pub mod manifest;
pub mod session;
pub mod types;
pub mod walker;

pub use extractor::{extract, extract_in};
pub use fetcher::{FetchReport, PackageFetcher, extract_archive, platform_name, select_asset};
pub use github::{GitHubAsset, GitHubClient, GitHubRelease, RemoteApi};
pub use installer::{AddonInstaller, ConflictPolicy, InstallReport};
pub use manifest::{PackageManifest, compare_versions, parse_version};
pub use session::{Session, SessionEntry};
pub use types::{AddonError, AddonInfo, FOLDER_SEPARATOR, ResourceId, format_version};
pub use walker::{MAX_DEPTH, discover, walk};
