//! GitHub API client for resource downloads.
//!
//! Lists releases and downloads release assets or default-branch zipballs.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::types::{AddonError, ResourceId};

/// Default API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Environment variable holding an optional API token.
const TOKEN_ENV: &str = "GITHUB_TOKEN";

/// GitHub release information.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubRelease {
    /// Release tag.
    #[serde(default)]
    pub tag_name: String,
    /// Whether the release is marked as a pre-release.
    #[serde(default)]
    pub prerelease: bool,
    /// Attached assets.
    #[serde(default)]
    pub assets: Vec<GitHubAsset>,
}

/// GitHub release asset.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubAsset {
    /// Asset file name.
    pub name: String,
    /// Direct download URL.
    pub browser_download_url: String,
}

/// Remote operations the fetcher needs.
pub trait RemoteApi {
    /// Lists releases of a repository, newest first.
    fn list_releases(&self, id: &ResourceId) -> Result<Vec<GitHubRelease>, AddonError>;

    /// Downloads a release asset.
    fn download_asset(&self, asset: &GitHubAsset) -> Result<Vec<u8>, AddonError>;

    /// Downloads a zip snapshot of the default branch.
    fn download_snapshot(&self, id: &ResourceId) -> Result<Vec<u8>, AddonError>;
}

/// Blocking GitHub REST client.
pub struct GitHubClient {
    /// HTTP client.
    client: reqwest::blocking::Client,
    /// API base URL without trailing slash.
    api_base: String,
    /// Optional bearer token.
    token: Option<String>,
}

impl Default for GitHubClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl GitHubClient {
    /// Creates a client for `api_base` with the given request timeout.
    #[must_use]
    pub fn new(api_base: &str, timeout: Duration) -> Self {
        assert!(!api_base.is_empty(), "API base must not be empty");

        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("blender-depot/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::blocking::Client::new());

        Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: std::env::var(TOKEN_ENV).ok().filter(|t| !t.is_empty()),
        }
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// URL of the releases listing.
    #[must_use]
    pub fn releases_url(&self, id: &ResourceId) -> String {
        format!("{}/repos/{}/releases", self.api_base, id)
    }

    /// URL of the default-branch zipball.
    #[must_use]
    pub fn snapshot_url(&self, id: &ResourceId) -> String {
        format!("{}/repos/{}/zipball", self.api_base, id)
    }

    fn get(&self, url: &str, accept: &str) -> Result<reqwest::blocking::Response, AddonError> {
        debug!("[GITHUB] GET {}", url);
        let start = Instant::now();

        let mut request = self.client.get(url).header("Accept", accept);
        if let Some(ref token) = self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| {
            warn!("[GITHUB] HTTP request failed: {}", e);
            AddonError::Network(e.to_string())
        })?;

        let status = response.status();
        debug!("[GITHUB] Response: {} in {:?}", status, start.elapsed());

        if status == reqwest::StatusCode::FORBIDDEN
            || status == reqwest::StatusCode::TOO_MANY_REQUESTS
        {
            if let Some(remaining) = response.headers().get("x-ratelimit-remaining") {
                if remaining.to_str().unwrap_or("1") == "0" {
                    warn!("[GITHUB] Rate limit exceeded");
                    return Err(AddonError::RateLimitExceeded);
                }
            }
        }

        if !status.is_success() {
            warn!("[GITHUB] {} returned {}", url, status);
            return Err(AddonError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }

    fn get_bytes(&self, url: &str) -> Result<Vec<u8>, AddonError> {
        let bytes = self
            .get(url, "application/octet-stream")?
            .bytes()
            .map_err(|e| AddonError::Network(format!("Failed to read response: {}", e)))?;

        info!("[GITHUB] Downloaded {} bytes from {}", bytes.len(), url);
        Ok(bytes.to_vec())
    }
}

impl RemoteApi for GitHubClient {
    fn list_releases(&self, id: &ResourceId) -> Result<Vec<GitHubRelease>, AddonError> {
        let url = self.releases_url(id);
        self.get(&url, "application/vnd.github.v3+json")?
            .json::<Vec<GitHubRelease>>()
            .map_err(|e| AddonError::Network(format!("Failed to parse releases: {}", e)))
    }

    fn download_asset(&self, asset: &GitHubAsset) -> Result<Vec<u8>, AddonError> {
        self.get_bytes(&asset.browser_download_url)
    }

    fn download_snapshot(&self, id: &ResourceId) -> Result<Vec<u8>, AddonError> {
        self.get_bytes(&self.snapshot_url(id))
    }
}
