//! Per-target session locks.
//!
//! Replaces a global "current updater" singleton: the caller owns a
//! [`TargetLocks`] registry and every session acquires its target path up
//! front. A second session against a locked target is rejected, never
//! interleaved.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Registry of cores directories with an active update session.
#[derive(Debug, Default)]
pub struct TargetLocks {
    active: Mutex<HashSet<PathBuf>>,
}

impl TargetLocks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Claims `target` for one session. `None` when already claimed.
    pub fn acquire(self: &Arc<Self>, target: &Path) -> Option<TargetGuard> {
        let mut active = self.active.lock().unwrap();
        if !active.insert(target.to_path_buf()) {
            return None;
        }
        Some(TargetGuard {
            locks: Arc::clone(self),
            target: target.to_path_buf(),
        })
    }

    /// True while a session holds `target`.
    pub fn is_locked(&self, target: &Path) -> bool {
        self.active.lock().unwrap().contains(target)
    }
}

/// Exclusive claim on one target path; released on drop.
#[derive(Debug)]
pub struct TargetGuard {
    locks: Arc<TargetLocks>,
    target: PathBuf,
}

impl Drop for TargetGuard {
    fn drop(&mut self) {
        self.locks.active.lock().unwrap().remove(&self.target);
    }
}
