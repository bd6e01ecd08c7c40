use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::version::ReleaseVersion;

/// Stable release listing on the libretro buildbot.
pub const BASE_URL: &str = "https://buildbot.libretro.com/stable/";

/// OS/architecture segment of the download path.
pub const PLATFORM_SEGMENT: &str = "linux/x86_64";

/// Core-pack archive filename, identical across versions.
pub const CORES_ARCHIVE: &str = "RetroArch_cores.7z";

/// Snapshot archive of the upstream core descriptor repository.
pub const CORE_INFO_BUNDLE_URL: &str =
    "https://github.com/libretro/libretro-core-info/archive/refs/heads/master.zip";

const USER_AGENT: &str = concat!("deckcores/", env!("CARGO_PKG_VERSION"));

/// Metadata requests are small; anything slower than this is down.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Matches version-directory links in the buildbot listing page, e.g.
/// `href="/stable/1.21.0/"` or `href="1.21.0/"`.
static VERSION_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"href="[^"]*?(\d+\.\d+\.\d+)/?""#).unwrap()
});

/// Availability info for one release, as shown in the version picker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub url: String,
    /// Archive size from `content-length`; 0 when the server omits it.
    pub size_bytes: u64,
    pub available: bool,
}

/// Fetches and resolves RetroArch core-pack releases.
pub struct VersionCatalog {
    client: reqwest::Client,
    base_url: String,
}

impl Default for VersionCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionCatalog {
    /// Creates a catalog pointed at the libretro buildbot.
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Creates a catalog with a custom listing base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    /// Lists available release versions, newest first.
    ///
    /// Duplicates collapse to one entry. Fails soft: any network or parse
    /// error logs a warning and yields an empty list.
    pub async fn fetch_available_versions(&self) -> Vec<ReleaseVersion> {
        let response = self
            .client
            .get(&self.base_url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .and_then(|r| r.error_for_status());

        let body = match response {
            Ok(r) => match r.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "failed to read version listing body");
                    return Vec::new();
                }
            },
            Err(e) => {
                warn!(error = %e, url = %self.base_url, "failed to fetch version listing");
                return Vec::new();
            }
        };

        let versions = parse_version_listing(&body);
        debug!(count = versions.len(), "fetched version listing");
        versions
    }

    /// Returns the newest available version, if any.
    pub async fn latest_version(&self) -> Option<ReleaseVersion> {
        self.fetch_available_versions().await.into_iter().next()
    }

    /// Composes the core-pack download URL for a version. No network call.
    pub fn download_url(&self, version: &str) -> String {
        format!(
            "{}{}/{}/{}",
            self.base_url, version, PLATFORM_SEGMENT, CORES_ARCHIVE
        )
    }

    /// Checks that a version's archive exists, with a metadata-only request.
    pub async fn validate_version(&self, version: &str) -> bool {
        let url = self.download_url(version);
        match self
            .client
            .head(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                warn!(error = %e, url = %url, "version validation request failed");
                false
            }
        }
    }

    /// Fetches availability and archive size for a version.
    pub async fn version_info(&self, version: &str) -> VersionInfo {
        let url = self.download_url(version);
        let response = self
            .client
            .head(&url)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await;

        match response {
            Ok(r) if r.status().is_success() => VersionInfo {
                version: version.to_string(),
                size_bytes: header_content_length(&r),
                url,
                available: true,
            },
            _ => VersionInfo {
                version: version.to_string(),
                size_bytes: 0,
                url,
                available: false,
            },
        }
    }
}

/// Reads `content-length` from the headers. HEAD responses carry no body,
/// so `Response::content_length` would report 0 here.
fn header_content_length(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Extracts version directory names from a listing page, newest first.
fn parse_version_listing(html: &str) -> Vec<ReleaseVersion> {
    let unique: BTreeSet<&str> = VERSION_HREF
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
        .collect();

    let mut versions: Vec<ReleaseVersion> =
        unique.into_iter().map(ReleaseVersion::parse).collect();
    versions.sort_by(|a, b| b.cmp(a));
    versions
}
