//! Error types for archive expansion.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while expanding a downloaded archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// File system error while creating, reading or removing files.
    #[error("IO error on {path}: {source}")]
    Io {
        /// Path the operation touched.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The zip container could not be read.
    #[error("unreadable zip archive {path}: {source}")]
    Zip {
        /// The archive.
        path: PathBuf,
        /// The underlying zip error.
        #[source]
        source: zip::result::ZipError,
    },

    /// The archive format is recognized but no codec handles it.
    #[error("unsupported archive format '{format}' for {path}")]
    Unsupported {
        /// The archive.
        path: PathBuf,
        /// Suffix that identified the format.
        format: String,
    },

    /// Neither the archive nor a previously expanded folder exists.
    #[error("archive {path} is missing and was never expanded")]
    Missing {
        /// The archive.
        path: PathBuf,
    },

    /// The blocking extraction task died.
    #[error("extraction task for {path} failed: {message}")]
    Task {
        /// The archive.
        path: PathBuf,
        /// Join error text.
        message: String,
    },
}

impl ArchiveError {
    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a zip error.
    pub fn zip(path: impl Into<PathBuf>, source: zip::result::ZipError) -> Self {
        Self::Zip {
            path: path.into(),
            source,
        }
    }

    /// Creates an unsupported-format error.
    pub fn unsupported(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self::Unsupported {
            path: path.into(),
            format: format.into(),
        }
    }
}
