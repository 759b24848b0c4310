//! Shared fixtures for integration tests: fake Wireshark capabilities,
//! in-test archives, and mock server helpers.

#![allow(dead_code)]

use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use capcache_core::archive::{ArchiveExpander, NativeCodec};
use capcache_core::capture::{
    CaptureClassifier, ClassifyError, ExtractError, MetadataExtractor, Ports, RawReport,
    TrafficSummary, UDP_SRC_PORTS,
};
use capcache_core::download::{FetchCache, HttpClient, RetryPolicy};
use capcache_core::pipeline::Pipeline;
use sha2::{Digest, Sha256};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Bytes every fake capture starts with.
pub const CAPTURE_MAGIC: &[u8] = b"PCAP";

/// Treats any file starting with [`CAPTURE_MAGIC`] as a capture.
pub struct PrefixClassifier;

#[async_trait]
impl CaptureClassifier for PrefixClassifier {
    async fn is_pcap(&self, path: &Path) -> Result<(), ClassifyError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ClassifyError::tool("captype", path, e.to_string()))?;
        if bytes.starts_with(CAPTURE_MAGIC) {
            Ok(())
        } else {
            Err(ClassifyError::not_recognized(path, "unknown"))
        }
    }
}

/// Returns a fixed report and a small DNS traffic summary.
pub struct FakeExtractor {
    pub report: String,
    pub warning: Option<String>,
    pub fail_protocols: bool,
}

impl FakeExtractor {
    pub fn new() -> Self {
        Self {
            report: SAMPLE_REPORT.to_string(),
            warning: None,
            fail_protocols: false,
        }
    }

    pub fn with_report(report: &str) -> Self {
        Self {
            report: report.to_string(),
            ..Self::new()
        }
    }
}

pub const SAMPLE_REPORT: &str = concat!(
    "File name:           /tmp/dns.cap\n",
    "File type:           Wireshark/tcpdump/... - pcap\n",
    "File encapsulation:  Ethernet\n",
    "Number of packets:   4\n",
    "File size:           1064 bytes\n",
    "Data byte rate:      212.84 bytes/s\n",
);

#[async_trait]
impl MetadataExtractor for FakeExtractor {
    async fn report(&self, _path: &Path) -> Result<RawReport, ExtractError> {
        Ok(RawReport {
            text: self.report.clone(),
            warning: self.warning.clone(),
        })
    }

    async fn protocols_and_ports(&self, path: &Path) -> Result<TrafficSummary, ExtractError> {
        if self.fail_protocols {
            return Err(ExtractError::new("tshark", path, "tshark: capture is cut short"));
        }
        Ok(TrafficSummary {
            protocols: vec!["eth".into(), "ip".into(), "udp".into(), "dns".into()],
            ports: Ports::from([(UDP_SRC_PORTS.to_string(), vec![53])]),
        })
    }
}

/// Retry policy without real waiting.
pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_retries + 1,
        Duration::from_millis(1),
        Duration::from_millis(5),
        2.0,
    )
    .with_max_jitter(Duration::ZERO)
}

/// Pipeline over real HTTP and real archives with fake capture tools.
pub fn pipeline(cache_root: &Path, extractor: FakeExtractor) -> Pipeline {
    let classifier = Arc::new(PrefixClassifier);
    let fetch = FetchCache::new(cache_root, Arc::new(HttpClient::new()), fast_policy(2));
    let expander = ArchiveExpander::new(Arc::new(NativeCodec), classifier.clone());
    Pipeline::new(4, fetch, expander, classifier, Arc::new(extractor))
        .expect("valid concurrency")
}

/// Serves `body` with status 200 at `route`, expecting exactly `hits` requests.
pub async fn serve(server: &MockServer, route: &str, body: &[u8], hits: u64) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .expect(hits)
        .mount(server)
        .await;
}

/// Serves an empty response with `status` at `route`.
pub async fn serve_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// Builds the bytes of a `.tar.gz` holding `members`.
pub fn tar_gz(members: &[(&str, &[u8])]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, *data)
            .expect("append tar member");
    }
    builder
        .into_inner()
        .expect("finish tar")
        .finish()
        .expect("finish gzip")
}

/// Writes a `.zip` holding `members` to `dest`.
pub fn write_zip(dest: &Path, members: &[(&str, &[u8])]) {
    use std::io::Write;

    let mut writer = zip::ZipWriter::new(File::create(dest).expect("create zip"));
    for (name, data) in members {
        writer
            .start_file(*name, zip::write::FileOptions::default())
            .expect("start zip member");
        writer.write_all(data).expect("write zip member");
    }
    writer.finish().expect("finish zip");
}

/// Hex SHA-256, the key captures are stored under.
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
