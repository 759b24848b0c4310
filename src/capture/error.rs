//! Error types for capture classification and metadata extraction.

use std::path::PathBuf;

use thiserror::Error;

/// Why a file was not accepted as a capture.
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// The classifier ran and did not recognize the file.
    #[error("{path} is not a recognized capture (type: {file_type})")]
    NotRecognized {
        /// The inspected file.
        path: PathBuf,
        /// What the classifier reported instead.
        file_type: String,
    },

    /// The classifier could not be run or failed.
    #[error("{tool} failed on {path}: {message}")]
    Tool {
        /// Binary name.
        tool: &'static str,
        /// The inspected file.
        path: PathBuf,
        /// First line of the failure output.
        message: String,
    },
}

impl ClassifyError {
    /// Creates a not-recognized error.
    pub fn not_recognized(path: impl Into<PathBuf>, file_type: impl Into<String>) -> Self {
        Self::NotRecognized {
            path: path.into(),
            file_type: file_type.into(),
        }
    }

    /// Creates a tool failure.
    pub fn tool(tool: &'static str, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Tool {
            tool,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Metadata extraction failed outright (no usable output at all).
#[derive(Debug, Error)]
#[error("{tool} failed on {path}: {message}")]
pub struct ExtractError {
    /// Binary name.
    pub tool: &'static str,
    /// The inspected file.
    pub path: PathBuf,
    /// First line of the failure output.
    pub message: String,
}

impl ExtractError {
    /// Creates an extraction error.
    pub fn new(tool: &'static str, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            tool,
            path: path.into(),
            message: message.into(),
        }
    }
}

/// A required binary is not on `PATH`.
#[derive(Debug, Error)]
#[error("required tool '{tool}' not found on PATH: {source}")]
pub struct ToolNotFound {
    /// Binary name.
    pub tool: &'static str,
    /// Lookup failure.
    #[source]
    pub source: which::Error,
}
