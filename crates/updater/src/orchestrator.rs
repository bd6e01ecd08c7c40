//! The update state machine.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use deckcores_backup::Snapshot;
use deckcores_extract::Extractor;
use deckcores_transfer::{ArchiveFetcher, FetchError, MetadataFetcher};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::UpdateError;
use crate::locks::TargetLocks;
use crate::session::{UpdateSession, UpdateStep};
use crate::types::{BackupPolicy, UpdateConfig, UpdateEvent, UpdateOutcome};

const EVENT_CAPACITY: usize = 256;

/// Scratch filename for the downloaded core pack.
const ARCHIVE_FILENAME: &str = "RetroArch_cores.7z";

/// Archive download maps into the 40–70% progress band.
const ARCHIVE_PROGRESS_START: u64 = 40;
const ARCHIVE_PROGRESS_SPAN: u64 = 30;

/// Extraneous top-level entries the buildbot archive leaves behind.
const CLEANUP_ENTRIES: &[&str] = &[
    "configure",
    "cores",
    "retroarch",
    "RetroArch-Linux-x86_64",
    "RetroArch-Linux-x86_64.AppImage.home",
];

/// Runs one cancellable update session against a cores directory.
///
/// Create, take the event receiver, then either `await`
/// [`run`](UpdateOrchestrator::run) directly or hand the orchestrator to
/// [`start`] to run it on a background task.
pub struct UpdateOrchestrator {
    config: UpdateConfig,
    locks: Arc<TargetLocks>,
    events_tx: mpsc::Sender<UpdateEvent>,
    events_rx: Option<mpsc::Receiver<UpdateEvent>>,
    cancel: CancellationToken,
    extractor: Extractor,
}

impl UpdateOrchestrator {
    pub fn new(config: UpdateConfig, locks: Arc<TargetLocks>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        Self {
            config,
            locks,
            events_tx,
            events_rx: Some(events_rx),
            cancel: CancellationToken::new(),
            extractor: Extractor::default(),
        }
    }

    /// Replaces the archive extractor (tests pin the zip decoder).
    pub fn with_extractor(mut self, extractor: Extractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Takes the event receiver. Can only be called once.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UpdateEvent>> {
        self.events_rx.take()
    }

    /// Returns the cancellation token for this session.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the session to a terminal outcome.
    ///
    /// Returns `Err` only when the session cannot start (target locked) or
    /// on host-level faults (scratch dir, task join); every in-pipeline
    /// failure becomes an [`UpdateEvent::Error`] plus
    /// `Ok(UpdateOutcome::Failed)`. The cancellation token is honored at
    /// step boundaries and inside the download loops; a cancelled session
    /// rolls back and emits no `Finished` event.
    pub async fn run(&self) -> Result<UpdateOutcome, UpdateError> {
        let Some(_guard) = self.locks.acquire(&self.config.target) else {
            warn!(target = %self.config.target.display(), "update already in progress for target");
            return Err(UpdateError::TargetBusy(self.config.target.clone()));
        };

        let mut session = UpdateSession::new(self.events_tx.clone());
        let mut snapshot: Option<Snapshot> = None;

        session.enter(UpdateStep::Init);
        session.status("Preparing update...").await;
        let scratch = tempfile::tempdir()?;

        if self.cancelled(&mut snapshot).await {
            return Ok(UpdateOutcome::Cancelled);
        }

        // Backup.
        session.enter(UpdateStep::Backup);
        session.status("Backing up existing cores...").await;
        let backup_result = {
            let target = self.config.target.clone();
            let version = self.config.version.clone();
            tokio::task::spawn_blocking(move || deckcores_backup::snapshot(&target, &version))
                .await?
        };
        snapshot = match backup_result {
            Ok(snapshot) => snapshot,
            Err(e) => match self.config.backup_policy {
                BackupPolicy::BestEffort => {
                    warn!(error = %e, "could not back up cores directory, continuing without one");
                    None
                }
                BackupPolicy::Required => {
                    session.error("failed to back up existing cores").await;
                    session.finish(false).await;
                    return Ok(UpdateOutcome::Failed);
                }
            },
        };
        session.progress(10).await;

        if self.cancelled(&mut snapshot).await {
            return Ok(UpdateOutcome::Cancelled);
        }

        // Clean.
        session.enter(UpdateStep::Clean);
        session.status("Cleaning cores directory...").await;
        let clean_result = {
            let target = self.config.target.clone();
            tokio::task::spawn_blocking(move || clean_directory(&target)).await?
        };
        if let Err(e) = clean_result {
            error!(error = %e, target = %self.config.target.display(), "failed to clean cores directory");
            return Ok(self
                .fail_step(&mut session, snapshot.take(), "failed to prepare cores directory")
                .await);
        }
        session.progress(20).await;

        if self.cancelled(&mut snapshot).await {
            return Ok(UpdateOutcome::Cancelled);
        }

        // FetchMetadata.
        session.enter(UpdateStep::FetchMetadata);
        session.status("Downloading core information...").await;
        let metadata = MetadataFetcher::new(&self.config.core_info_url);
        match metadata.populate(&self.config.target, &self.cancel).await {
            Ok(()) => {}
            Err(FetchError::Cancelled) => {
                info!("update cancelled during metadata download, rolling back");
                self.rollback(snapshot.take()).await;
                return Ok(UpdateOutcome::Cancelled);
            }
            Err(e) => {
                error!(error = %e, "descriptor bundle fetch failed");
                return Ok(self
                    .fail_step(&mut session, snapshot.take(), "failed to download core information")
                    .await);
            }
        }
        session.progress(40).await;

        if self.cancelled(&mut snapshot).await {
            return Ok(UpdateOutcome::Cancelled);
        }

        // FetchArchive.
        session.enter(UpdateStep::FetchArchive);
        session.status("Downloading cores archive...").await;
        let archive_path = scratch.path().join(ARCHIVE_FILENAME);
        let fetch_result = {
            let events_tx = self.events_tx.clone();
            let reported = Arc::new(AtomicU8::new(session.current_progress()));
            let progress = Arc::clone(&reported);
            let result = ArchiveFetcher::new()
                .fetch(
                    &self.config.archive_url,
                    &archive_path,
                    &self.cancel,
                    move |written, total| {
                        // Without a declared length there is no percentage
                        // to report; progress holds until the step ends.
                        let Some(total) = total.filter(|t| *t > 0) else {
                            return;
                        };
                        let percent = (ARCHIVE_PROGRESS_START
                            + written.min(total) * ARCHIVE_PROGRESS_SPAN / total)
                            as u8;
                        if percent > progress.fetch_max(percent, Ordering::Relaxed) {
                            let _ = events_tx.try_send(UpdateEvent::Progress { percent });
                        }
                    },
                )
                .await;
            session.observe(reported.load(Ordering::Relaxed));
            result
        };
        match fetch_result {
            Ok(()) => {}
            Err(FetchError::Cancelled) => {
                info!("update cancelled during archive download, rolling back");
                self.rollback(snapshot.take()).await;
                return Ok(UpdateOutcome::Cancelled);
            }
            Err(e) => {
                error!(error = %e, url = %self.config.archive_url, "core archive download failed");
                return Ok(self
                    .fail_step(&mut session, snapshot.take(), "failed to download cores archive")
                    .await);
            }
        }

        if self.cancelled(&mut snapshot).await {
            return Ok(UpdateOutcome::Cancelled);
        }

        // Extract.
        session.enter(UpdateStep::Extract);
        session.status("Extracting cores...").await;
        if let Err(e) = self
            .extractor
            .extract(&archive_path, &self.config.target)
            .await
        {
            error!(error = %e, "core archive extraction failed");
            return Ok(self
                .fail_step(&mut session, snapshot.take(), "failed to extract cores")
                .await);
        }
        session.progress(90).await;

        if self.cancelled(&mut snapshot).await {
            return Ok(UpdateOutcome::Cancelled);
        }

        // Cleanup. Best-effort: artifacts failing to delete never fail the
        // update itself.
        session.enter(UpdateStep::Cleanup);
        session.status("Finalizing installation...").await;
        {
            let target = self.config.target.clone();
            tokio::task::spawn_blocking(move || cleanup_extracted(&target)).await?;
        }

        if self.cancelled(&mut snapshot).await {
            return Ok(UpdateOutcome::Cancelled);
        }

        // Finalize.
        session.enter(UpdateStep::Finalize);
        if let Some(snapshot) = snapshot.take() {
            tokio::task::spawn_blocking(move || snapshot.discard()).await?;
        }
        session.progress(100).await;
        session.status("Update completed successfully!").await;
        session.finish(true).await;
        info!(
            version = %self.config.version,
            target = %self.config.target.display(),
            "core update completed"
        );
        Ok(UpdateOutcome::Completed)
    }

    /// Rollback-and-fail tail shared by the fallible steps.
    async fn fail_step(
        &self,
        session: &mut UpdateSession,
        snapshot: Option<Snapshot>,
        message: &str,
    ) -> UpdateOutcome {
        warn!(step = ?session.step(), "update step failed, rolling back");
        self.rollback(snapshot).await;
        session.error(message).await;
        session.finish(false).await;
        UpdateOutcome::Failed
    }

    async fn cancelled(&self, snapshot: &mut Option<Snapshot>) -> bool {
        if !self.cancel.is_cancelled() {
            return false;
        }
        info!(target = %self.config.target.display(), "update cancelled, rolling back");
        self.rollback(snapshot.take()).await;
        true
    }

    async fn rollback(&self, snapshot: Option<Snapshot>) {
        if let Some(snapshot) = snapshot {
            if let Err(e) = tokio::task::spawn_blocking(move || snapshot.restore()).await {
                error!(error = %e, "rollback task failed");
            }
        }
    }
}

/// A session running on a background task.
pub struct UpdateHandle {
    events: Option<mpsc::Receiver<UpdateEvent>>,
    cancel: CancellationToken,
    join: tokio::task::JoinHandle<Result<UpdateOutcome, UpdateError>>,
}

/// Spawns the orchestrator onto a background task so the caller never
/// blocks on the pipeline.
pub fn start(mut orchestrator: UpdateOrchestrator) -> UpdateHandle {
    let events = orchestrator.take_events();
    let cancel = orchestrator.cancel_token();
    let join = tokio::spawn(async move { orchestrator.run().await });
    UpdateHandle {
        events,
        cancel,
        join,
    }
}

impl UpdateHandle {
    /// Takes the event receiver, unless it was taken before spawning.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<UpdateEvent>> {
        self.events.take()
    }

    /// Requests cooperative cancellation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the session to reach its terminal outcome.
    pub async fn wait(self) -> Result<UpdateOutcome, UpdateError> {
        self.join.await?
    }

    /// Cancels and waits up to `timeout` for the worker to reach a safe
    /// stopping point. `false` means the worker is still busy and the
    /// target must not be assumed free yet.
    pub async fn cancel_and_wait(self, timeout: Duration) -> bool {
        self.cancel.cancel();
        tokio::time::timeout(timeout, self.join).await.is_ok()
    }
}

/// Recreates the target as an empty directory.
fn clean_directory(target: &Path) -> io::Result<()> {
    if target.exists() {
        fs::remove_dir_all(target)?;
    }
    fs::create_dir_all(target)
}

/// Removes known extraction leftovers from the target top level.
fn cleanup_extracted(target: &Path) {
    for name in CLEANUP_ENTRIES {
        let path = target.join(name);
        if !path.exists() {
            continue;
        }
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        if let Err(e) = result {
            warn!(entry = name, error = %e, "failed to remove extraction artifact");
        }
    }
}
