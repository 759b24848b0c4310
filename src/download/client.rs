//! HTTP transport for capture downloads.
//!
//! [`Downloader`] is the seam the fetch cache talks to: one GET, returning
//! the status and a byte stream. [`HttpClient`] implements it over reqwest
//! with redirects disabled.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use reqwest::Client;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use tracing::{debug, instrument};

use super::constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use super::error::DownloadError;

/// Response body as a stream of chunks.
pub type BodyStream = BoxStream<'static, Result<Vec<u8>, DownloadError>>;

/// Result of a single GET.
pub struct DownloadResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Location` header, kept for redirect diagnostics.
    pub location: Option<String>,
    /// Response body.
    pub body: BodyStream,
}

impl std::fmt::Debug for DownloadResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadResponse")
            .field("status", &self.status)
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

/// Issues a GET and hands back status plus body.
///
/// Implementations must not follow redirects.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Requests `url`.
    ///
    /// # Errors
    ///
    /// Returns `DownloadError::Network` or `DownloadError::Timeout` when no
    /// response arrives. Non-200 statuses are not errors at this level.
    async fn get(&self, url: &str) -> Result<DownloadResponse, DownloadError>;
}

/// reqwest-backed [`Downloader`].
///
/// Created once and shared, so connections are pooled across workers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpClient {
    /// Creates a client with default timeouts (30s connect, 5min idle read).
    ///
    /// There is no limit on the total transfer time; only a stalled
    /// connection times out.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit timeout values.
    ///
    /// `read_timeout_secs` bounds each wait for more bytes, not the whole
    /// download.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .read_timeout(Duration::from_secs(read_timeout_secs))
            .redirect(Policy::none())
            .user_agent(concat!("capcache/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpClient {
    #[instrument(skip(self), fields(url = %url))]
    async fn get(&self, url: &str) -> Result<DownloadResponse, DownloadError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                DownloadError::timeout(url)
            } else {
                DownloadError::network(url, e)
            }
        })?;

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);
        debug!(status, "response received");

        let owned_url = url.to_string();
        let body = response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map(|bytes| bytes.to_vec()).map_err(|e| {
                    if e.is_timeout() {
                        DownloadError::timeout(owned_url.clone())
                    } else {
                        DownloadError::network(owned_url.clone(), e)
                    }
                })
            })
            .boxed();

        Ok(DownloadResponse {
            status,
            location,
            body,
        })
    }
}
