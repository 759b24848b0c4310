//! Error types for the download module.
//!
//! Every failure of [`FetchCache::fetch_file`](super::FetchCache::fetch_file)
//! is returned as a [`DownloadError`]; nothing in this module panics or logs
//! fatally.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while fetching a capture into the local cache.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Network-level error (DNS resolution, connection refused, TLS errors, etc.)
    #[error("network error downloading {url}: {source}")]
    Network {
        /// The URL that failed to download.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout downloading {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Unexpected HTTP status, surfaced verbatim.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The server answered with a redirect. Redirects are never followed.
    #[error("redirection not implemented (HTTP {status}) for {url}")]
    RedirectUnsupported {
        /// The requested URL.
        url: String,
        /// 302 or 303.
        status: u16,
        /// The `Location` header, if any.
        location: Option<String>,
    },

    /// The remote identifier does not resolve to a file (HTTP 404/500).
    #[error("remote resource missing (HTTP {status}) for {url}")]
    RemoteMissing {
        /// The requested URL.
        url: String,
        /// 404 or 500.
        status: u16,
    },

    /// Access to the resource is denied (HTTP 401/403).
    #[error("authorization required (HTTP {status}) for {url}")]
    AuthRequired {
        /// The requested URL.
        url: String,
        /// 401 or 403.
        status: u16,
    },

    /// The upstream kept throttling until the retry budget ran out.
    #[error("gave up on {url} after {attempts} attempts (HTTP {status})")]
    RetriesExhausted {
        /// The requested URL.
        url: String,
        /// Number of requests issued.
        attempts: u32,
        /// Status of the last response.
        status: u16,
    },

    /// File system error during download (create file, write, rename, etc.)
    #[error("IO error writing to {path}: {source}")]
    Io {
        /// The file path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or names no file.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The URL names a file type that is never a capture.
    #[error("not a capture: {url} has extension .{extension}")]
    NotCapture {
        /// The rejected URL.
        url: String,
        /// The offending extension, lowercased.
        extension: String,
    },
}

impl DownloadError {
    /// Creates a network error from a reqwest error.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a rejected-extension error.
    pub fn not_capture(url: impl Into<String>, extension: impl Into<String>) -> Self {
        Self::NotCapture {
            url: url.into(),
            extension: extension.into(),
        }
    }

    /// Maps a non-200 status to the matching error variant.
    ///
    /// | Status | Variant |
    /// |--------|---------|
    /// | 302, 303 | `RedirectUnsupported` |
    /// | 401, 403 | `AuthRequired` |
    /// | 404, 500 | `RemoteMissing` |
    /// | other | `HttpStatus` |
    pub fn from_status(url: impl Into<String>, status: u16, location: Option<String>) -> Self {
        let url = url.into();
        match status {
            302 | 303 => Self::RedirectUnsupported {
                url,
                status,
                location,
            },
            401 | 403 => Self::AuthRequired { url, status },
            404 | 500 => Self::RemoteMissing { url, status },
            _ => Self::HttpStatus { url, status },
        }
    }

    /// Returns the HTTP status behind this error, if there is one.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. }
            | Self::RedirectUnsupported { status, .. }
            | Self::RemoteMissing { status, .. }
            | Self::AuthRequired { status, .. }
            | Self::RetriesExhausted { status, .. } => Some(*status),
            _ => None,
        }
    }
}
