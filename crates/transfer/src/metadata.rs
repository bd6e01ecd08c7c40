use std::fs;
use std::path::{Component, Path};

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{ArchiveFetcher, FetchError};

/// Downloads the upstream descriptor bundle and lays it out under a
/// target directory.
pub struct MetadataFetcher {
    fetcher: ArchiveFetcher,
    bundle_url: String,
}

impl MetadataFetcher {
    pub fn new(bundle_url: impl Into<String>) -> Self {
        Self {
            fetcher: ArchiveFetcher::new(),
            bundle_url: bundle_url.into(),
        }
    }

    /// Populates `target` with the descriptor files from the bundle.
    ///
    /// The bundle is a repository snapshot whose entries all live under a
    /// single top-level wrapper directory; that first path component is
    /// discarded so descriptors land directly under `target`.
    pub async fn populate(
        &self,
        target: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), FetchError> {
        let scratch = tempfile::tempdir()?;
        let bundle_path = scratch.path().join("core-info-bundle.zip");

        self.fetcher
            .fetch(&self.bundle_url, &bundle_path, cancel, |_, _| {})
            .await?;

        let target = target.to_path_buf();
        tokio::task::spawn_blocking(move || extract_bundle(&bundle_path, &target)).await??;
        Ok(())
    }
}

/// Unpacks a descriptor bundle, stripping one leading path component from
/// every entry name.
///
/// Directory entries are skipped; regular files are recreated with their
/// remaining relative path under `target`. Entries whose stripped path
/// would escape `target` are rejected.
pub fn extract_bundle(archive: &Path, target: &Path) -> Result<(), FetchError> {
    let file = fs::File::open(archive)?;
    let mut bundle = zip::ZipArchive::new(file)?;

    let mut files = 0usize;
    for i in 0..bundle.len() {
        let mut entry = bundle.by_index(i)?;
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_string();
        // Drop the wrapper directory; entries without one are not part of
        // the repository snapshot layout.
        let Some((_, rest)) = name.split_once('/') else {
            continue;
        };
        if rest.is_empty() {
            continue;
        }

        let rel = Path::new(rest);
        if rel.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        }) {
            return Err(FetchError::InvalidEntryPath(name));
        }

        let out = target.join(rel);
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out_file = fs::File::create(&out)?;
        std::io::copy(&mut entry, &mut out_file)?;
        files += 1;
    }

    debug!(files, target = %target.display(), "descriptor bundle extracted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use zip::ZipWriter;
    use zip::write::SimpleFileOptions;

    fn bundle_bytes(entries: &[(&str, &[u8])], dirs: &[&str]) -> Vec<u8> {
        let mut writer = ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for dir in dirs {
            writer.add_directory(*dir, options).unwrap();
        }
        for (name, data) in entries {
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn extract_strips_wrapper_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("bundle.zip");
        std::fs::write(
            &archive,
            bundle_bytes(
                &[
                    ("libretro-core-info-master/snes9x_libretro.info", b"snes"),
                    ("libretro-core-info-master/dat/mame.dat", b"mame"),
                ],
                &["libretro-core-info-master/", "libretro-core-info-master/dat/"],
            ),
        )
        .unwrap();

        let target = tmp.path().join("cores");
        std::fs::create_dir_all(&target).unwrap();
        extract_bundle(&archive, &target).unwrap();

        assert_eq!(
            std::fs::read(target.join("snes9x_libretro.info")).unwrap(),
            b"snes"
        );
        assert_eq!(std::fs::read(target.join("dat/mame.dat")).unwrap(), b"mame");
        // The wrapper never materializes under the target.
        assert!(!target.join("libretro-core-info-master").exists());
    }

    #[test]
    fn extract_skips_rootless_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("bundle.zip");
        std::fs::write(&archive, bundle_bytes(&[("README.md", b"top")], &[])).unwrap();

        let target = tmp.path().join("cores");
        std::fs::create_dir_all(&target).unwrap();
        extract_bundle(&archive, &target).unwrap();

        assert!(std::fs::read_dir(&target).unwrap().next().is_none());
    }

    #[test]
    fn extract_rejects_traversal_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("bundle.zip");
        std::fs::write(
            &archive,
            bundle_bytes(&[("wrapper/../../escape.info", b"evil")], &[]),
        )
        .unwrap();

        let target = tmp.path().join("cores");
        std::fs::create_dir_all(&target).unwrap();
        let result = extract_bundle(&archive, &target);
        assert!(matches!(result, Err(FetchError::InvalidEntryPath(_))));
        assert!(!tmp.path().join("escape.info").exists());
    }

    #[test]
    fn extract_garbage_archive_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let archive = tmp.path().join("bundle.zip");
        std::fs::write(&archive, b"this is not a zip file").unwrap();

        let target = tmp.path().join("cores");
        std::fs::create_dir_all(&target).unwrap();
        let result = extract_bundle(&archive, &target);
        assert!(matches!(result, Err(FetchError::Archive(_))));
    }

    #[tokio::test]
    async fn populate_fetches_and_extracts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/master.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(bundle_bytes(
                &[("wrapper-dir/fceumm_libretro.info", b"nes" as &[u8])],
                &["wrapper-dir/"],
            )))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("cores");
        std::fs::create_dir_all(&target).unwrap();

        let fetcher = MetadataFetcher::new(format!("{}/master.zip", server.uri()));
        let cancel = CancellationToken::new();
        fetcher.populate(&target, &cancel).await.unwrap();

        assert_eq!(
            std::fs::read(target.join("fceumm_libretro.info")).unwrap(),
            b"nes"
        );
        assert!(!target.join("wrapper-dir").exists());
    }

    #[tokio::test]
    async fn populate_download_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/master.zip"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("cores");
        std::fs::create_dir_all(&target).unwrap();

        let fetcher = MetadataFetcher::new(format!("{}/master.zip", server.uri()));
        let cancel = CancellationToken::new();
        let result = fetcher.populate(&target, &cancel).await;
        assert!(matches!(result, Err(FetchError::Http(_))));
    }
}
