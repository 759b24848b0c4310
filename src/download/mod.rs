//! Capture download and fetch cache.
//!
//! This module resolves capture URLs to files in a local cache directory,
//! downloading each URL at most once.
//!
//! # Features
//!
//! - Pure, deterministic URL → cache path mapping (one folder per site)
//! - Known non-capture types rejected before any request
//! - Streaming downloads through a temporary `.part` file
//! - Bounded retry with randomized, non-decreasing backoff on HTTP 525
//! - Redirects reported, never followed
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use capcache_core::download::{FetchCache, HttpClient, RetryPolicy};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = FetchCache::new(".cache", Arc::new(HttpClient::new()), RetryPolicy::default());
//! let fetched = cache.fetch_file("https://wiki.wireshark.org/uploads/dns.cap").await?;
//! println!("cached at {}", fetched.path.display());
//! # Ok(())
//! # }
//! ```

mod cache;
mod client;
mod constants;
mod error;
mod filename;
mod retry;

pub use cache::{FetchCache, FetchedFile};
pub use client::{BodyStream, DownloadResponse, Downloader, HttpClient};
pub use constants::THROTTLED_STATUS;
pub use error::DownloadError;
pub use filename::{
    CachePath, NON_CAPTURE_EXTENSIONS, cache_path_for_url, file_name_from_url,
    non_capture_extension, site_folder,
};
pub use retry::{DEFAULT_MAX_RETRIES, FailureType, RetryDecision, RetryPolicy, classify_error};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
