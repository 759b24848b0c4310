//! Capture classification and metadata extraction.
//!
//! The pipeline only sees the [`CaptureClassifier`] and
//! [`MetadataExtractor`] traits; [`WiresharkTools`] implements both by
//! running the Wireshark command-line suite.

mod error;
mod fields;
mod wireshark;

use std::path::Path;

use async_trait::async_trait;

pub use error::{ClassifyError, ExtractError, ToolNotFound};
pub use fields::{
    Ports, TCP_DST_PORTS, TCP_SRC_PORTS, TrafficSummary, UDP_DST_PORTS, UDP_SRC_PORTS,
    parse_field_lines,
};
pub use wireshark::WiresharkTools;

/// Raw report text from the metadata tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReport {
    /// Report text, possibly partial.
    pub text: String,
    /// Set when the tool complained but still produced output, e.g. for a
    /// capture that was cut short.
    pub warning: Option<String>,
}

/// Decides whether a file is a recognized capture.
#[async_trait]
pub trait CaptureClassifier: Send + Sync {
    /// Succeeds iff `path` is a recognized capture.
    ///
    /// # Errors
    ///
    /// [`ClassifyError::NotRecognized`] for non-captures,
    /// [`ClassifyError::Tool`] when classification could not run.
    async fn is_pcap(&self, path: &Path) -> Result<(), ClassifyError>;
}

/// Produces the raw report and traffic summary of a capture.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    /// Returns the key/value report for `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the tool produced no usable output.
    async fn report(&self, path: &Path) -> Result<RawReport, ExtractError>;

    /// Returns protocols and ports seen in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the tool produced no usable output.
    async fn protocols_and_ports(&self, path: &Path) -> Result<TrafficSummary, ExtractError>;
}
