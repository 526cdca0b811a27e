//! blender-depot
//!
//! Imports Blender add-on packages from GitHub.
//!
//! # Architecture
//!
//! - **Addons Module**: `bl_info` parsing, discovery walk, GitHub fetching,
//!   selection session and installation
//! - **Importer**: The import / install / clear-cache workflow
//! - **Config Module**: TOML configuration and platform paths
//! - **Logging**: File logging via `tracing`
//!
//! # Usage
//!
//! ```no_run
//! use blender_depot::addons::{ConflictPolicy, GitHubClient};
//! use blender_depot::config::Config;
//! use blender_depot::importer::Importer;
//!
//! let config = Config::load().expect("config");
//! let client = GitHubClient::new(&config.api_base, config.request_timeout());
//! let mut importer = Importer::new(
//!     client,
//!     config.cache_dir(),
//!     config.addons_dir(),
//!     config.host_version(),
//! );
//! importer.import_package("package.json".as_ref()).expect("import");
//! importer.session_mut().select_all(true);
//! let report = importer.install_selected(ConflictPolicy::Skip);
//! println!("installed {}", report.installed.len());
//! ```

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

pub mod addons;
pub mod config;
pub mod importer;
pub mod logging;

pub use addons::{AddonError, AddonInfo, ResourceId, Session};
pub use config::Config;
pub use importer::{ImportReport, Importer};
