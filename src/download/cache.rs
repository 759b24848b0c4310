//! On-disk fetch cache: one download per URL, ever.
//!
//! [`FetchCache::fetch_file`] maps a URL to its cache location, returns it
//! straight away when it is already present, and otherwise downloads it with
//! the bounded retry loop of [`RetryPolicy`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info, instrument, warn};

use super::client::{BodyStream, Downloader};
use super::constants::PARTIAL_SUFFIX;
use super::error::DownloadError;
use super::filename::{CachePath, cache_path_for_url, non_capture_extension};
use super::retry::{FailureType, RetryDecision, RetryPolicy, classify_error};

/// A URL resolved to local storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedFile {
    /// The capture file, or the expansion folder for archives.
    pub path: PathBuf,
    /// Where the archive was downloaded to, for archive URLs.
    pub archive: Option<PathBuf>,
}

/// Cache of downloaded captures rooted at a directory.
pub struct FetchCache {
    root: PathBuf,
    downloader: Arc<dyn Downloader>,
    retry_policy: RetryPolicy,
}

impl std::fmt::Debug for FetchCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchCache")
            .field("root", &self.root)
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

impl FetchCache {
    /// Creates a cache rooted at `root`.
    #[must_use]
    pub fn new(
        root: impl Into<PathBuf>,
        downloader: Arc<dyn Downloader>,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            root: root.into(),
            downloader,
            retry_policy,
        }
    }

    /// Cache root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `url` to a local path, downloading it if needed.
    ///
    /// For archive URLs the returned path is the expansion target folder and
    /// `archive` points at the downloaded archive.
    ///
    /// # Errors
    ///
    /// - `InvalidUrl` / `NotCapture` before any request is made
    /// - `RedirectUnsupported`, `AuthRequired`, `RemoteMissing`, `HttpStatus`
    ///   for non-200 responses
    /// - `RetriesExhausted` when throttling outlasts the retry budget
    /// - `Network`, `Timeout`, `Io` for transport and disk failures
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch_file(&self, url: &str) -> Result<FetchedFile, DownloadError> {
        let cache_path = cache_path_for_url(&self.root, url)?;
        if let Some(extension) = non_capture_extension(&cache_path.file_name) {
            debug!(extension = %extension, "rejecting known non-capture type");
            return Err(DownloadError::not_capture(url, extension));
        }

        let fetched = fetched_file(&cache_path);
        if path_exists(&cache_path.target).await
            || (cache_path.is_archive() && path_exists(&cache_path.download_path).await)
        {
            debug!(path = %cache_path.target.display(), "cache hit");
            return Ok(fetched);
        }

        if let Some(parent) = cache_path.download_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DownloadError::io(parent, e))?;
        }

        self.download_with_retry(url, &cache_path.download_path)
            .await?;
        Ok(fetched)
    }

    /// Bounded retry loop carrying `(attempt, delay)` between iterations.
    async fn download_with_retry(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let mut attempt: u32 = 0;
        let mut delay = Duration::ZERO;

        loop {
            attempt += 1;
            let error = match self.download_once(url, dest).await {
                Ok(bytes) => {
                    info!(path = %dest.display(), bytes, attempt, "download complete");
                    return Ok(bytes);
                }
                Err(e) => e,
            };

            let failure_type = classify_error(&error);
            match self
                .retry_policy
                .should_retry(failure_type, attempt, delay)
            {
                RetryDecision::Retry {
                    delay: next_delay,
                    attempt: next_attempt,
                } => {
                    info!(
                        url = %url,
                        attempt = next_attempt,
                        delay_ms = next_delay.as_millis(),
                        error = %error,
                        "upstream throttling, retrying download"
                    );
                    tokio::time::sleep(next_delay).await;
                    delay = next_delay;
                }
                RetryDecision::DoNotRetry { reason } => {
                    debug!(url = %url, attempt, reason = %reason, "not retrying");
                    if failure_type == FailureType::Throttled {
                        warn!(url = %url, attempts = attempt, "retry budget exhausted");
                        return Err(DownloadError::RetriesExhausted {
                            url: url.to_string(),
                            attempts: attempt,
                            status: error.status().unwrap_or_default(),
                        });
                    }
                    return Err(error);
                }
            }
        }
    }

    /// One GET, streamed into `<dest>.part` and renamed on success.
    async fn download_once(&self, url: &str, dest: &Path) -> Result<u64, DownloadError> {
        let response = self.downloader.get(url).await?;
        if response.status != 200 {
            return Err(DownloadError::from_status(
                url,
                response.status,
                response.location,
            ));
        }

        let partial = partial_path(dest);
        let stream_result = stream_to_file(response.body, &partial).await;
        if stream_result.is_err() {
            debug!(path = %partial.display(), "cleaning up partial file after error");
            let _ = tokio::fs::remove_file(&partial).await;
        }
        let bytes = stream_result?;

        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;
        Ok(bytes)
    }
}

fn fetched_file(cache_path: &CachePath) -> FetchedFile {
    FetchedFile {
        path: cache_path.target.clone(),
        archive: cache_path
            .is_archive()
            .then(|| cache_path.download_path.clone()),
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    PathBuf::from(name)
}

async fn path_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// Streams a body to `path`, returning bytes written.
async fn stream_to_file(mut body: BodyStream, path: &Path) -> Result<u64, DownloadError> {
    let file = File::create(path)
        .await
        .map_err(|e| DownloadError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(path, e))?;

    Ok(bytes_written)
}
