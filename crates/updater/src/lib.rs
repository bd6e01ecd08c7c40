//! Core-pack update pipeline.
//!
//! One [`UpdateOrchestrator`] run is a fixed sequence of steps — backup,
//! clean, metadata fetch, archive fetch, extract, cleanup, finalize —
//! executed on a background task, reporting through an event channel and
//! rolling the cores directory back to its pre-update state on failure or
//! cancellation. The cores directory is never left half-populated: the
//! destructive window is bracketed by a live [`deckcores_backup::Snapshot`]
//! at a deterministic sibling path.
//!
//! # Pipeline
//!
//! 1. **Backup** — snapshot the cores directory (10%)
//! 2. **Clean** — recreate it empty (20%)
//! 3. **FetchMetadata** — populate core descriptor files (40%)
//! 4. **FetchArchive** — stream the core pack (40–70%)
//! 5. **Extract** — unpack into the cores directory (90%)
//! 6. **Cleanup** — drop known extraction artifacts
//! 7. **Finalize** — discard the snapshot (100%)

mod locks;
mod orchestrator;
mod session;
mod types;

pub use locks::{TargetGuard, TargetLocks};
pub use orchestrator::{UpdateHandle, UpdateOrchestrator, start};
pub use session::UpdateStep;
pub use types::{BackupPolicy, UpdateConfig, UpdateEvent, UpdateOutcome};

use std::path::PathBuf;

/// Errors that prevent a session from running at all.
///
/// Failures *inside* a running session never surface here — they become
/// an [`UpdateEvent::Error`] plus a failed outcome.
#[derive(Debug, thiserror::Error)]
pub enum UpdateError {
    #[error("an update is already running for {0}")]
    TargetBusy(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}
