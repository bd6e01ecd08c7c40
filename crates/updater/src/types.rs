//! Data types for the update pipeline.

use std::path::PathBuf;

/// Event emitted by a running update session.
///
/// Consumers must not assume a fixed cardinality; the only ordering
/// guarantee is that `Finished` — when emitted — is last and unique.
/// Cancelled sessions emit no `Finished` at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateEvent {
    /// Human-readable step description.
    Status { message: String },
    /// Cumulative progress, 0–100, non-decreasing.
    Progress { percent: u8 },
    /// Human-readable failure cause; at most one per session.
    Error { message: String },
    /// Terminal outcome of the session.
    Finished { success: bool },
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Completed,
    Failed,
    /// Rolled back on request; no `Finished` event was emitted.
    Cancelled,
}

/// What to do when the pre-update snapshot cannot be taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackupPolicy {
    /// Log and continue without a safety net.
    #[default]
    BestEffort,
    /// Abort the session before any destructive step.
    Required,
}

/// Parameters of one update session.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Release version being installed; tags the snapshot path.
    pub version: String,
    /// Cores directory receiving the update.
    pub target: PathBuf,
    /// Core-pack archive download URL.
    pub archive_url: String,
    /// Descriptor bundle download URL.
    pub core_info_url: String,
    pub backup_policy: BackupPolicy,
}

impl UpdateConfig {
    pub fn new(
        version: impl Into<String>,
        target: impl Into<PathBuf>,
        archive_url: impl Into<String>,
        core_info_url: impl Into<String>,
    ) -> Self {
        Self {
            version: version.into(),
            target: target.into(),
            archive_url: archive_url.into(),
            core_info_url: core_info_url.into(),
            backup_policy: BackupPolicy::default(),
        }
    }

    pub fn with_backup_policy(mut self, policy: BackupPolicy) -> Self {
        self.backup_policy = policy;
        self
    }
}
