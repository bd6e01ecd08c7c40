//! Directory snapshots for rollback.
//!
//! Before a destructive update step, the cores directory is copied to a
//! deterministic sibling path. On failure or cancellation the snapshot is
//! moved back verbatim; on success it is deleted. The sibling path is a
//! pure function of target + version, so a snapshot left on disk after a
//! crash marks an interrupted update for the next run to find.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{error, info, warn};

/// Errors produced while taking a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// A live full-tree copy of a directory, restorable to its original path.
///
/// Consumed exactly once, by [`restore`](Snapshot::restore) or
/// [`discard`](Snapshot::discard).
#[derive(Debug)]
pub struct Snapshot {
    original: PathBuf,
    backup: PathBuf,
}

/// Returns the sibling path a snapshot of `target` lives at.
///
/// `<parent>/<dirname>_backup_<version>` — deterministic so an interrupted
/// update is detectable from the filesystem alone.
pub fn snapshot_path(target: &Path, version: &str) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "cores".to_string());
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    parent.join(format!("{name}_backup_{version}"))
}

/// Takes a snapshot of `target` before mutation.
///
/// Returns `Ok(None)` when the target does not exist — nothing to protect.
/// A stale snapshot at the sibling path is replaced. Copy failure is an
/// error so the caller can decide between best-effort and fail-closed.
pub fn snapshot(target: &Path, version: &str) -> Result<Option<Snapshot>, BackupError> {
    if !target.exists() {
        return Ok(None);
    }

    let backup = snapshot_path(target, version);
    if backup.exists() {
        fs::remove_dir_all(&backup)?;
    }
    copy_dir_recursive(target, &backup)?;

    info!(target = %target.display(), backup = %backup.display(), "snapshot taken");
    Ok(Some(Snapshot {
        original: target.to_path_buf(),
        backup,
    }))
}

impl Snapshot {
    /// Path the snapshot copy lives at.
    pub fn backup_path(&self) -> &Path {
        &self.backup
    }

    /// Path the snapshot was taken from.
    pub fn original_path(&self) -> &Path {
        &self.original
    }

    /// Puts the snapshot back in place of whatever is at the original path.
    ///
    /// Failures are logged, not raised: rollback runs on paths that are
    /// already failing and must not compound the damage.
    pub fn restore(self) {
        match self.try_restore() {
            Ok(()) => info!(path = %self.original.display(), "snapshot restored"),
            Err(e) => {
                error!(
                    path = %self.original.display(),
                    backup = %self.backup.display(),
                    error = %e,
                    "failed to restore snapshot"
                );
            }
        }
    }

    fn try_restore(&self) -> io::Result<()> {
        if self.original.exists() {
            fs::remove_dir_all(&self.original)?;
        }
        // rename is atomic on the same filesystem; snapshots are siblings so
        // this is the normal path. Fall back to copy+delete just in case.
        match fs::rename(&self.backup, &self.original) {
            Ok(()) => Ok(()),
            Err(_) => {
                copy_dir_recursive(&self.backup, &self.original)?;
                fs::remove_dir_all(&self.backup)
            }
        }
    }

    /// Deletes the snapshot tree after a successful update.
    pub fn discard(self) {
        if let Err(e) = fs::remove_dir_all(&self.backup) {
            warn!(backup = %self.backup.display(), error = %e, "failed to discard snapshot");
        }
    }
}

/// Recursively copies a directory tree, preserving the relative layout.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let dest = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir_recursive(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn populate(dir: &Path) {
        fs::create_dir_all(dir.join("info")).unwrap();
        fs::write(dir.join("snes9x_libretro.so"), b"core-binary").unwrap();
        fs::write(dir.join("info").join("snes9x_libretro.info"), b"display_name = \"SNES\"").unwrap();
    }

    fn read_tree(dir: &Path) -> Vec<(String, Vec<u8>)> {
        let mut out = Vec::new();
        let mut stack = vec![dir.to_path_buf()];
        while let Some(d) = stack.pop() {
            for entry in fs::read_dir(&d).unwrap() {
                let entry = entry.unwrap();
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else {
                    let rel = path.strip_prefix(dir).unwrap().to_string_lossy().into_owned();
                    out.push((rel, fs::read(&path).unwrap()));
                }
            }
        }
        out.sort();
        out
    }

    #[test]
    fn snapshot_path_is_deterministic_sibling() {
        let path = snapshot_path(Path::new("/home/deck/RetroArch/cores"), "1.21.0");
        assert_eq!(
            path,
            PathBuf::from("/home/deck/RetroArch/cores_backup_1.21.0")
        );
    }

    #[test]
    fn snapshot_missing_target_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let result = snapshot(&tmp.path().join("cores"), "1.0.0").unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn snapshot_restore_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let cores = tmp.path().join("cores");
        populate(&cores);
        let before = read_tree(&cores);

        let snap = snapshot(&cores, "1.21.0").unwrap().unwrap();
        assert!(snap.backup_path().exists());

        // Simulate a half-finished update.
        fs::remove_dir_all(&cores).unwrap();
        fs::create_dir_all(&cores).unwrap();
        fs::write(cores.join("partial.tmp"), b"junk").unwrap();

        snap.restore();
        assert_eq!(read_tree(&cores), before);
        assert!(!tmp.path().join("cores_backup_1.21.0").exists());
    }

    #[test]
    fn restore_when_original_is_gone() {
        let tmp = tempfile::tempdir().unwrap();
        let cores = tmp.path().join("cores");
        populate(&cores);
        let before = read_tree(&cores);

        let snap = snapshot(&cores, "1.0.0").unwrap().unwrap();
        fs::remove_dir_all(&cores).unwrap();

        snap.restore();
        assert_eq!(read_tree(&cores), before);
    }

    #[test]
    fn discard_removes_backup_and_keeps_target() {
        let tmp = tempfile::tempdir().unwrap();
        let cores = tmp.path().join("cores");
        populate(&cores);

        let snap = snapshot(&cores, "1.0.0").unwrap().unwrap();
        let backup = snap.backup_path().to_path_buf();
        snap.discard();

        assert!(!backup.exists());
        assert!(cores.exists());
    }

    #[test]
    fn stale_snapshot_is_replaced() {
        let tmp = tempfile::tempdir().unwrap();
        let cores = tmp.path().join("cores");
        populate(&cores);

        let stale = snapshot_path(&cores, "1.0.0");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("leftover"), b"old").unwrap();

        let snap = snapshot(&cores, "1.0.0").unwrap().unwrap();
        assert!(!snap.backup_path().join("leftover").exists());
        assert!(snap.backup_path().join("snes9x_libretro.so").exists());
    }

    #[test]
    fn copy_dir_recursive_copies_nested_trees() {
        let tmp = tempfile::tempdir().unwrap();
        let src = tmp.path().join("src");
        populate(&src);

        let dst = tmp.path().join("dst");
        copy_dir_recursive(&src, &dst).unwrap();
        assert_eq!(read_tree(&src), read_tree(&dst));
    }
}
