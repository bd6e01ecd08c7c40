//! Run-state of a single update session.

use tokio::sync::mpsc;
use tracing::debug;

use crate::types::UpdateEvent;

/// The fixed step sequence of the update state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStep {
    Init,
    Backup,
    Clean,
    FetchMetadata,
    FetchArchive,
    Extract,
    Cleanup,
    Finalize,
}

/// Mutable state of one orchestrator run: current step, monotone progress,
/// and the at-most-once `Finished` latch. Event sends are best-effort —
/// a departed consumer never stalls the pipeline's terminal bookkeeping.
pub(crate) struct UpdateSession {
    events_tx: mpsc::Sender<UpdateEvent>,
    step: UpdateStep,
    progress: u8,
    finished: bool,
}

impl UpdateSession {
    pub fn new(events_tx: mpsc::Sender<UpdateEvent>) -> Self {
        Self {
            events_tx,
            step: UpdateStep::Init,
            progress: 0,
            finished: false,
        }
    }

    pub fn enter(&mut self, step: UpdateStep) {
        debug!(step = ?step, "entering update step");
        self.step = step;
    }

    pub fn step(&self) -> UpdateStep {
        self.step
    }

    pub async fn status(&self, message: &str) {
        let _ = self
            .events_tx
            .send(UpdateEvent::Status {
                message: message.to_string(),
            })
            .await;
    }

    /// Raises cumulative progress; regressions are ignored so consumers
    /// always observe a non-decreasing sequence.
    pub async fn progress(&mut self, percent: u8) {
        if percent <= self.progress {
            return;
        }
        self.progress = percent;
        let _ = self
            .events_tx
            .send(UpdateEvent::Progress { percent })
            .await;
    }

    /// Raises the internal progress floor without emitting, for steps that
    /// report incrementally through their own channel clone.
    pub fn observe(&mut self, percent: u8) {
        self.progress = self.progress.max(percent);
    }

    pub fn current_progress(&self) -> u8 {
        self.progress
    }

    pub async fn error(&self, message: &str) {
        let _ = self
            .events_tx
            .send(UpdateEvent::Error {
                message: message.to_string(),
            })
            .await;
    }

    /// Emits the terminal event; later calls are no-ops.
    pub async fn finish(&mut self, success: bool) {
        if self.finished {
            return;
        }
        self.finished = true;
        let _ = self.events_tx.send(UpdateEvent::Finished { success }).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn drain(rx: &mut mpsc::Receiver<UpdateEvent>) -> Vec<UpdateEvent> {
        let mut events = Vec::new();
        while let Ok(e) = rx.try_recv() {
            events.push(e);
        }
        events
    }

    #[tokio::test]
    async fn progress_is_monotone() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut session = UpdateSession::new(tx);

        session.progress(10).await;
        session.progress(40).await;
        session.progress(20).await; // regression — swallowed
        session.progress(40).await; // duplicate — swallowed
        session.progress(90).await;

        let events = drain(&mut rx).await;
        assert_eq!(
            events,
            vec![
                UpdateEvent::Progress { percent: 10 },
                UpdateEvent::Progress { percent: 40 },
                UpdateEvent::Progress { percent: 90 },
            ]
        );
        assert_eq!(session.current_progress(), 90);
    }

    #[tokio::test]
    async fn finish_emits_once() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut session = UpdateSession::new(tx);

        session.finish(true).await;
        session.finish(false).await;

        let events = drain(&mut rx).await;
        assert_eq!(events, vec![UpdateEvent::Finished { success: true }]);
    }

    #[tokio::test]
    async fn observe_raises_floor_without_emitting() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut session = UpdateSession::new(tx);

        session.observe(70);
        assert_eq!(session.current_progress(), 70);
        assert!(drain(&mut rx).await.is_empty());

        // Later emitted progress must still be above the floor.
        session.progress(60).await;
        assert!(drain(&mut rx).await.is_empty());
        session.progress(90).await;
        assert_eq!(
            drain(&mut rx).await,
            vec![UpdateEvent::Progress { percent: 90 }]
        );
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_stall() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut session = UpdateSession::new(tx);
        session.status("Preparing update...").await;
        session.progress(10).await;
        session.finish(true).await;
    }

    #[tokio::test]
    async fn step_tracking() {
        let (tx, _rx) = mpsc::channel(4);
        let mut session = UpdateSession::new(tx);
        assert_eq!(session.step(), UpdateStep::Init);
        session.enter(UpdateStep::Extract);
        assert_eq!(session.step(), UpdateStep::Extract);
    }
}
