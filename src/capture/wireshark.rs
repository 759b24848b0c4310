//! Capture inspection through the Wireshark command-line suite.
//!
//! - `captype <file>` prints `<file>: <type>`; `unknown` means not a capture.
//! - `capinfos -M <file>` prints the key/value report parsed by
//!   [`crate::report`].
//! - `tshark -T fields` lists per-frame protocols and ports.
//!
//! Truncated captures make `capinfos` and `tshark` complain on stderr while
//! still printing useful stdout; that output is kept and the complaint is
//! returned as a warning.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::error::{ClassifyError, ExtractError, ToolNotFound};
use super::fields::{TrafficSummary, parse_field_lines};
use super::{CaptureClassifier, MetadataExtractor, RawReport};
use crate::failure::truncate_message;

const CAPTYPE: &str = "captype";
const CAPINFOS: &str = "capinfos";
const TSHARK: &str = "tshark";

/// Paths to the three Wireshark binaries.
#[derive(Debug, Clone)]
pub struct WiresharkTools {
    captype: PathBuf,
    capinfos: PathBuf,
    tshark: PathBuf,
}

impl WiresharkTools {
    /// Uses explicit binary paths.
    #[must_use]
    pub fn new(captype: PathBuf, capinfos: PathBuf, tshark: PathBuf) -> Self {
        Self {
            captype,
            capinfos,
            tshark,
        }
    }

    /// Locates all three binaries on `PATH`.
    ///
    /// # Errors
    ///
    /// Returns [`ToolNotFound`] naming the first missing binary.
    pub fn from_path() -> Result<Self, ToolNotFound> {
        let find = |tool: &'static str| {
            which::which(tool).map_err(|source| ToolNotFound { tool, source })
        };
        Ok(Self::new(find(CAPTYPE)?, find(CAPINFOS)?, find(TSHARK)?))
    }
}

#[async_trait]
impl CaptureClassifier for WiresharkTools {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn is_pcap(&self, path: &Path) -> Result<(), ClassifyError> {
        let output = Command::new(&self.captype)
            .arg(path)
            .output()
            .await
            .map_err(|e| ClassifyError::tool(CAPTYPE, path, e.to_string()))?;

        if !output.status.success() {
            return Err(ClassifyError::tool(
                CAPTYPE,
                path,
                truncate_message(&String::from_utf8_lossy(&output.stderr)),
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let file_type = parse_captype_output(&stdout);
        debug!(file_type = %file_type, "captype");
        if file_type.is_empty() || file_type == "unknown" {
            Err(ClassifyError::not_recognized(path, file_type))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MetadataExtractor for WiresharkTools {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn report(&self, path: &Path) -> Result<RawReport, ExtractError> {
        let output = Command::new(&self.capinfos)
            .arg("-M")
            .arg(path)
            .output()
            .await
            .map_err(|e| ExtractError::new(CAPINFOS, path, e.to_string()))?;

        let (text, warning) = tolerate_truncation(CAPINFOS, path, &output)?;
        Ok(RawReport { text, warning })
    }

    #[instrument(skip(self), fields(path = %path.display()))]
    async fn protocols_and_ports(&self, path: &Path) -> Result<TrafficSummary, ExtractError> {
        let output = Command::new(&self.tshark)
            .args(["-T", "fields", "-E", "separator=|"])
            .args(["-e", "frame.protocols", "-e", "udp.port", "-e", "tcp.port"])
            .arg("-r")
            .arg(path)
            .output()
            .await
            .map_err(|e| ExtractError::new(TSHARK, path, e.to_string()))?;

        let (text, warning) = tolerate_truncation(TSHARK, path, &output)?;
        if let Some(warning) = warning {
            debug!(warning = %warning, "tshark reported a problem, keeping partial output");
        }
        Ok(parse_field_lines(&text))
    }
}

/// Extracts the type from `captype` output (`<path>: <type>`).
fn parse_captype_output(stdout: &str) -> String {
    let line = stdout.lines().next().unwrap_or_default();
    line.rsplit_once(": ")
        .map_or(line, |(_, file_type)| file_type)
        .trim()
        .to_string()
}

/// Keeps stdout when there is any; reports stderr as a warning alongside it.
fn tolerate_truncation(
    tool: &'static str,
    path: &Path,
    output: &Output,
) -> Result<(String, Option<String>), ExtractError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    let complaint = (!stderr.trim().is_empty()).then(|| truncate_message(stderr.trim()));

    if stdout.trim().is_empty() && (!output.status.success() || complaint.is_some()) {
        return Err(ExtractError::new(
            tool,
            path,
            complaint.unwrap_or_else(|| format!("exited with {}", output.status)),
        ));
    }
    Ok((stdout, complaint))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[cfg(unix)]
    use std::os::unix::process::ExitStatusExt;

    #[test]
    fn test_parse_captype_output() {
        assert_eq!(parse_captype_output("/tmp/a.pcap: pcap\n"), "pcap");
        assert_eq!(parse_captype_output("/tmp/x: unknown\n"), "unknown");
        assert_eq!(
            parse_captype_output("/tmp/dir: with: colons.pcapng: pcapng\n"),
            "pcapng"
        );
        assert_eq!(parse_captype_output(""), "");
    }

    #[cfg(unix)]
    fn output(code: i32, stdout: &str, stderr: &str) -> Output {
        Output {
            status: std::process::ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_truncated_capture_keeps_output_with_warning() {
        let out = output(
            2,
            "File name: x\nNumber of packets: 5\n",
            "capinfos: The file \"x\" appears to have been cut short in the middle of a packet.\n",
        );
        let (text, warning) = tolerate_truncation(CAPINFOS, Path::new("x"), &out).unwrap();
        assert!(text.contains("Number of packets"));
        assert!(warning.unwrap().contains("cut short"));
    }

    #[cfg(unix)]
    #[test]
    fn test_failure_without_output_is_error() {
        let out = output(1, "", "capinfos: Can't open x\n");
        let err = tolerate_truncation(CAPINFOS, Path::new("x"), &out).unwrap_err();
        assert!(err.message.contains("Can't open"));
        assert_eq!(err.tool, CAPINFOS);
    }

    #[cfg(unix)]
    #[test]
    fn test_clean_run_has_no_warning() {
        let out = output(0, "eth:ip||\n", "");
        let (_, warning) = tolerate_truncation(TSHARK, Path::new("x"), &out).unwrap();
        assert!(warning.is_none());
    }

    #[test]
    fn test_missing_tool_is_reported_by_name() {
        let err = which::which("capcache-definitely-missing-tool")
            .map_err(|source| ToolNotFound {
                tool: "capcache-definitely-missing-tool",
                source,
            })
            .unwrap_err();
        assert!(err.to_string().contains("capcache-definitely-missing-tool"));
    }
}
