use std::path::Path;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::FetchError;

/// Streams a remote archive to local storage.
pub struct ArchiveFetcher {
    client: reqwest::Client,
}

impl Default for ArchiveFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveFetcher {
    pub fn new() -> Self {
        Self {
            client: crate::http_client(),
        }
    }

    /// Downloads `url` to `dest`, checking `cancel` before writing each chunk.
    ///
    /// `on_chunk(bytes_written, total)` fires after every write; `total` is
    /// the declared `content-length` and is `None` when the server omits it,
    /// in which case callers must not assume completion signaling.
    ///
    /// On cancellation the partial file is left at `dest` for the caller's
    /// scratch directory to discard.
    pub async fn fetch<F>(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        mut on_chunk: F,
    ) -> Result<(), FetchError>
    where
        F: FnMut(u64, Option<u64>),
    {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let total = response.content_length();

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            if cancel.is_cancelled() {
                debug!(url, written, "archive download cancelled");
                return Err(FetchError::Cancelled);
            }
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            on_chunk(written, total);
        }
        file.flush().await?;

        debug!(url, bytes = written, "archive download complete");
        Ok(())
    }
}
