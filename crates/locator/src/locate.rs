use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where an installation lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Internal,
    #[serde(rename = "sd")]
    SdCard,
}

/// A discovered RetroArch cores directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Installation {
    pub kind: LocationKind,
    /// Absolute path of the cores directory.
    pub path: String,
    /// Human-readable label for the location picker.
    pub display_name: String,
}

/// Steam's RetroArch install dir relative to `$HOME`.
const INTERNAL_RETROARCH: &str = ".local/share/Steam/steamapps/common/RetroArch";

/// RetroArch install dir relative to an SD card mount point.
const SD_RETROARCH: &str = "steamapps/common/RetroArch";

/// Files that mark a directory as a RetroArch installation.
const RETROARCH_INDICATORS: &[&str] = &[
    "retroarch",
    "retroarch.cfg",
    "RetroArch-Linux-x86_64.AppImage",
];

/// Discovers RetroArch cores directories on the system.
pub struct InstallLocator {
    home: PathBuf,
    media_roots: Vec<PathBuf>,
}

impl Default for InstallLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallLocator {
    /// Creates a locator with the Steam Deck default roots.
    pub fn new() -> Self {
        Self {
            home: crate::home_dir(),
            media_roots: vec![PathBuf::from("/run/media"), PathBuf::from("/media")],
        }
    }

    /// Creates a locator with custom roots, for tests and odd layouts.
    pub fn with_roots(home: impl Into<PathBuf>, media_roots: Vec<PathBuf>) -> Self {
        Self {
            home: home.into(),
            media_roots,
        }
    }

    /// Detects all RetroArch installations, internal storage first.
    pub fn detect_installations(&self) -> Vec<Installation> {
        let mut installations = Vec::new();

        if let Some(cores) = self.internal_cores_dir() {
            installations.push(Installation {
                kind: LocationKind::Internal,
                path: cores.to_string_lossy().into_owned(),
                display_name: "Internal Storage".to_string(),
            });
        }

        for (mount_name, cores) in self.sd_cores_dirs() {
            installations.push(Installation {
                kind: LocationKind::SdCard,
                path: cores.to_string_lossy().into_owned(),
                display_name: format!("SD Card ({mount_name})"),
            });
        }

        debug!(count = installations.len(), "detected RetroArch installations");
        installations
    }

    /// Returns the preferred update target: internal storage when present,
    /// otherwise the first SD card installation.
    pub fn recommended_path(&self) -> Option<String> {
        let installations = self.detect_installations();
        installations
            .iter()
            .find(|i| i.kind == LocationKind::Internal)
            .or_else(|| installations.first())
            .map(|i| i.path.clone())
    }

    fn internal_cores_dir(&self) -> Option<PathBuf> {
        let install = self.home.join(INTERNAL_RETROARCH);
        if !install.is_dir() {
            return None;
        }
        let cores = install.join("cores");
        (cores.exists() || can_create_dir(&cores)).then_some(cores)
    }

    fn sd_cores_dirs(&self) -> Vec<(String, PathBuf)> {
        let mut found = Vec::new();
        for root in &self.media_roots {
            let Ok(entries) = fs::read_dir(root) else {
                continue;
            };
            for entry in entries.flatten() {
                let mount = entry.path();
                if !mount.is_dir() {
                    continue;
                }
                let install = mount.join(SD_RETROARCH);
                if !install.is_dir() {
                    continue;
                }
                let cores = install.join("cores");
                if cores.exists() || can_create_dir(&cores) {
                    let mount_name = entry.file_name().to_string_lossy().into_owned();
                    found.push((mount_name, cores));
                }
            }
        }
        found
    }

    /// Checks that `path` is a plausible cores directory: its parent must
    /// exist and contain a RetroArch installation marker.
    pub fn validate_install_path(path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        if !parent.exists() {
            return false;
        }
        RETROARCH_INDICATORS
            .iter()
            .any(|marker| parent.join(marker).exists())
    }
}

fn can_create_dir(path: &Path) -> bool {
    fs::create_dir_all(path).is_ok()
}
