//! Error types for report parsing.

use thiserror::Error;

/// The report does not have the shape the parser knows.
///
/// Both variants are fatal for a run: they mean the metadata tool changed its
/// output format, not that one capture is bad.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    /// A value-less header that opens neither an interface block nor a
    /// packet-count list.
    #[error("unrecognized report header on line {line}: '{key}'")]
    UnrecognizedHeader {
        /// 1-based line number.
        line: usize,
        /// Header text without the trailing colon.
        key: String,
    },

    /// A line that is neither blank nor a header and has no delimiter.
    #[error("missing delimiter on report line {line}: '{text}'")]
    MissingDelimiter {
        /// 1-based line number.
        line: usize,
        /// The offending line, trimmed.
        text: String,
    },
}

impl ReportError {
    /// Creates an unrecognized-header error.
    pub fn unrecognized_header(line: usize, key: impl Into<String>) -> Self {
        Self::UnrecognizedHeader {
            line,
            key: key.into(),
        }
    }

    /// Creates a missing-delimiter error.
    pub fn missing_delimiter(line: usize, text: impl Into<String>) -> Self {
        Self::MissingDelimiter {
            line,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unrecognized_header_display() {
        let err = ReportError::unrecognized_header(7, "Mystery section");
        let msg = err.to_string();
        assert!(msg.contains("line 7"));
        assert!(msg.contains("Mystery section"));
    }

    #[test]
    fn test_missing_delimiter_display() {
        let err = ReportError::missing_delimiter(3, "no colon here");
        assert!(err.to_string().contains("no colon here"));
    }
}
