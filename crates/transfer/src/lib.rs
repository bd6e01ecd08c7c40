//! Streaming downloads for the update pipeline.
//!
//! Two fetchers: [`ArchiveFetcher`] streams a core-pack archive to disk
//! with per-chunk cancellation and byte-level progress; [`MetadataFetcher`]
//! pulls the upstream descriptor bundle and lays its files out under the
//! cores directory, dropping the repository wrapper directory.

mod archive;
mod metadata;

pub use archive::ArchiveFetcher;
pub use metadata::{MetadataFetcher, extract_bundle};

use std::time::Duration;

pub(crate) const USER_AGENT: &str = concat!("deckcores/", env!("CARGO_PKG_VERSION"));

/// Connection establishment bound. No total timeout: archives run to
/// hundreds of MB on slow SD-card Wi-Fi.
pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors produced by the fetchers.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("unsafe bundle entry path: {0}")]
    InvalidEntryPath(String),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("cancelled")]
    Cancelled,
}

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
