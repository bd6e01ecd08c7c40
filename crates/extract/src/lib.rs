//! Core-pack archive extraction.
//!
//! The buildbot ships cores as a 7z archive, which an external `7z`
//! binary unpacks when present. The pure-Rust zip decoder is the
//! fallback; feeding it a real 7z archive is reported as an explicit
//! [`ExtractError::FormatMismatch`] instead of producing partial output.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tracing::{debug, warn};

/// Bound on the external decompressor; a hung child is killed.
pub const SUBPROCESS_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors produced during extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(zip::result::ZipError),

    #[error("archive format not supported by the available decoders: {0}")]
    FormatMismatch(String),

    #[error("decoder exited with {0}")]
    DecoderFailed(String),

    #[error("decoder timed out after {0:?}")]
    Timeout(Duration),

    #[error("no usable decoder available")]
    NoDecoder,

    #[error("task join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// One extraction strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoder {
    /// External `7z`/`7za` subprocess. Skipped when no binary is found.
    SevenZip,
    /// Pure-Rust zip decoder.
    Zip,
}

/// Unpacks an archive into a target directory, trying decoders in order.
pub struct Extractor {
    decoders: Vec<Decoder>,
    subprocess_timeout: Duration,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            decoders: vec![Decoder::SevenZip, Decoder::Zip],
            subprocess_timeout: SUBPROCESS_TIMEOUT,
        }
    }
}

impl Extractor {
    /// Builds an extractor with an explicit decoder order.
    pub fn with_decoders(decoders: Vec<Decoder>) -> Self {
        Self {
            decoders,
            subprocess_timeout: SUBPROCESS_TIMEOUT,
        }
    }

    /// Extracts `archive` into `target`, which must already exist.
    ///
    /// Decoders whose tool is absent are skipped; the first success wins;
    /// when every decoder fails, the last failure is returned.
    pub async fn extract(&self, archive: &Path, target: &Path) -> Result<(), ExtractError> {
        let mut last_err = None;

        for decoder in &self.decoders {
            match decoder {
                Decoder::SevenZip => {
                    let Some(binary) = seven_zip_binary() else {
                        debug!("no 7z binary on PATH, skipping subprocess decoder");
                        continue;
                    };
                    match self.run_seven_zip(&binary, archive, target).await {
                        Ok(()) => return Ok(()),
                        Err(e) => {
                            warn!(error = %e, "7z extraction failed, trying next decoder");
                            last_err = Some(e);
                        }
                    }
                }
                Decoder::Zip => {
                    let archive = archive.to_path_buf();
                    let target = target.to_path_buf();
                    match tokio::task::spawn_blocking(move || extract_zip(&archive, &target))
                        .await?
                    {
                        Ok(()) => return Ok(()),
                        Err(e) => {
                            warn!(error = %e, "zip extraction failed");
                            last_err = Some(e);
                        }
                    }
                }
            }
        }

        Err(last_err.unwrap_or(ExtractError::NoDecoder))
    }

    async fn run_seven_zip(
        &self,
        binary: &Path,
        archive: &Path,
        target: &Path,
    ) -> Result<(), ExtractError> {
        let mut command = tokio::process::Command::new(binary);
        command
            .arg("e")
            .arg(archive)
            .arg(format!("-o{}", target.display()))
            .arg("-y")
            .current_dir(target)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = tokio::time::timeout(self.subprocess_timeout, command.status())
            .await
            .map_err(|_| ExtractError::Timeout(self.subprocess_timeout))??;

        if !status.success() {
            return Err(ExtractError::DecoderFailed(status.to_string()));
        }
        debug!(archive = %archive.display(), "7z extraction complete");
        Ok(())
    }
}

/// Locates a 7z binary on PATH.
pub fn seven_zip_binary() -> Option<PathBuf> {
    which::which("7z").or_else(|_| which::which("7za")).ok()
}

fn extract_zip(archive: &Path, target: &Path) -> Result<(), ExtractError> {
    let file = fs::File::open(archive)?;
    let mut bundle = zip::ZipArchive::new(file).map_err(|e| map_zip_error(e, archive))?;
    bundle
        .extract(target)
        .map_err(|e| map_zip_error(e, archive))?;
    debug!(archive = %archive.display(), "zip extraction complete");
    Ok(())
}

fn map_zip_error(error: zip::result::ZipError, archive: &Path) -> ExtractError {
    match error {
        zip::result::ZipError::InvalidArchive(_) => {
            ExtractError::FormatMismatch(archive.display().to_string())
        }
        other => ExtractError::Archive(other),
    }
}
