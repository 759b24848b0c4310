//! Failure classification into sentinel records.
//!
//! Expected failures do not stop a run. Each one is classified into a
//! [`FailureKind`] and recorded under that kind's sentinel key, so every
//! source failing the same way ends up in a single record.

use crate::archive::ArchiveError;
use crate::capture::ClassifyError;
use crate::download::DownloadError;

/// Longest error text kept in logs and records.
pub const MAX_ERROR_LEN: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FailureKind {
    NotCapture,
    AuthRequired,
    InvalidRemoteId,
    EmptyArchive,
    DownloadFailed,
    ArchiveUnreadable,
    MetadataFailed,
}

impl FailureKind {
    /// Every kind, in key order.
    pub const ALL: [Self; 7] = [
        Self::NotCapture,
        Self::AuthRequired,
        Self::InvalidRemoteId,
        Self::EmptyArchive,
        Self::DownloadFailed,
        Self::ArchiveUnreadable,
        Self::MetadataFailed,
    ];

    /// Record key for this kind. Always starts with `-`, which no hex
    /// digest does.
    #[must_use]
    pub fn sentinel_key(self) -> &'static str {
        match self {
            Self::NotCapture => "-not-a-capture",
            Self::AuthRequired => "-authorization-required",
            Self::InvalidRemoteId => "-invalid-remote-id",
            Self::EmptyArchive => "-archive-had-no-captures",
            Self::DownloadFailed => "-download-failed",
            Self::ArchiveUnreadable => "-archive-unreadable",
            Self::MetadataFailed => "-metadata-unavailable",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::NotCapture => "Not a capture",
            Self::AuthRequired => "Authorization required",
            Self::InvalidRemoteId => "Invalid remote id",
            Self::EmptyArchive => "Archive had no captures",
            Self::DownloadFailed => "Download failed",
            Self::ArchiveUnreadable => "Archive unreadable",
            Self::MetadataFailed => "Metadata unavailable",
        }
    }

    /// Classifies a fetch failure.
    #[must_use]
    pub fn from_download_error(error: &DownloadError) -> Self {
        match error {
            DownloadError::NotCapture { .. } => Self::NotCapture,
            DownloadError::AuthRequired { .. } => Self::AuthRequired,
            DownloadError::RemoteMissing { .. } | DownloadError::InvalidUrl { .. } => {
                Self::InvalidRemoteId
            }
            DownloadError::Network { .. }
            | DownloadError::Timeout { .. }
            | DownloadError::HttpStatus { .. }
            | DownloadError::RedirectUnsupported { .. }
            | DownloadError::RetriesExhausted { .. }
            | DownloadError::Io { .. } => Self::DownloadFailed,
        }
    }

    /// Classifies an expansion failure.
    ///
    /// A missing archive means the download never landed; anything else is
    /// an archive that could not be read.
    #[must_use]
    pub fn from_archive_error(error: &ArchiveError) -> Self {
        match error {
            ArchiveError::Missing { .. } => Self::DownloadFailed,
            ArchiveError::Io { .. }
            | ArchiveError::Zip { .. }
            | ArchiveError::Unsupported { .. }
            | ArchiveError::Task { .. } => Self::ArchiveUnreadable,
        }
    }

    /// Classifies a rejected capture.
    #[must_use]
    pub fn from_classify_error(error: &ClassifyError) -> Self {
        match error {
            ClassifyError::NotRecognized { .. } => Self::NotCapture,
            ClassifyError::Tool { .. } => Self::MetadataFailed,
        }
    }
}

/// Whether `key` is a sentinel rather than a content hash.
#[must_use]
pub fn is_sentinel_key(key: &str) -> bool {
    key.starts_with('-')
}

/// Cuts an error message to its first line and [`MAX_ERROR_LEN`] characters,
/// appending `..` when anything was dropped.
#[must_use]
pub fn truncate_message(message: &str) -> String {
    let trimmed = message.trim();
    let first_line = trimmed.lines().next().unwrap_or_default();
    let multi_line = first_line.len() < trimmed.len();

    let mut chars = first_line.char_indices();
    match chars.nth(MAX_ERROR_LEN) {
        Some((cut, _)) => format!("{}..", &first_line[..cut]),
        None if multi_line => format!("{first_line}.."),
        None => first_line.to_string(),
    }
}
