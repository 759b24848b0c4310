//! Link sources feeding the pipeline.
//!
//! A link file holds one link per line:
//!
//! ```text
//! # comment
//! https://wiki.wireshark.org/uploads/__moin_import__/attachments/SampleCaptures/dns.cap	DNS queries
//! https://packetlife.net/captures/ARP_Gratuitous.cap
//! ```
//!
//! The description follows a tab. A line with only a URL gets
//! [`NO_DESCRIPTION`].

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, instrument};

/// Description used when a source gives none.
pub const NO_DESCRIPTION: &str = "No Description";

/// A capture link and its human description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub url: String,
    pub description: String,
}

impl Link {
    /// Creates a link, percent-encoding spaces and commas in the URL.
    pub fn new(url: &str, description: impl Into<String>) -> Self {
        Self {
            url: url.trim().replace(' ', "%20").replace(',', "%2C"),
            description: description.into(),
        }
    }
}

/// Errors from enumerating links.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The link file could not be read.
    #[error("failed to read link file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Yields the links to process.
#[async_trait]
pub trait LinkSource: Send + Sync {
    /// Enumerates all links.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] when the links cannot be read at all.
    async fn links(&self) -> Result<Vec<Link>, SourceError>;
}

/// Links read from a tab-separated file.
#[derive(Debug, Clone)]
pub struct FileLinkSource {
    path: PathBuf,
}

impl FileLinkSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LinkSource for FileLinkSource {
    #[instrument(skip(self), fields(path = %self.path.display()))]
    async fn links(&self) -> Result<Vec<Link>, SourceError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| SourceError::Io {
                path: self.path.clone(),
                source,
            })?;
        let links = parse_link_lines(&text);
        debug!(count = links.len(), "links loaded");
        Ok(links)
    }
}

/// A fixed list of links.
#[derive(Debug, Clone, Default)]
pub struct StaticLinkSource {
    links: Vec<Link>,
}

impl StaticLinkSource {
    #[must_use]
    pub fn new(links: Vec<Link>) -> Self {
        Self { links }
    }
}

#[async_trait]
impl LinkSource for StaticLinkSource {
    async fn links(&self) -> Result<Vec<Link>, SourceError> {
        Ok(self.links.clone())
    }
}

/// Parses link file content.
#[must_use]
pub fn parse_link_lines(text: &str) -> Vec<Link> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| match line.split_once('\t') {
            Some((url, description)) if !description.trim().is_empty() => {
                Link::new(url, description.trim())
            }
            Some((url, _)) => Link::new(url, NO_DESCRIPTION),
            None => Link::new(line, NO_DESCRIPTION),
        })
        .collect()
}
