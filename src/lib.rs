//! capcache core library
//!
//! Harvests public packet captures: every link is downloaded once into a
//! local cache, archives are expanded, each capture is summarized with the
//! Wireshark command-line tools, and the results are merged into a JSON
//! cache keyed by the SHA-256 of the capture bytes.
//!
//! # Architecture
//!
//! - [`source`] - link lists (`url<TAB>description`)
//! - [`download`] - URL to cache path mapping and throttle-aware fetching
//! - [`archive`] - archive expansion filtered down to captures
//! - [`capture`] - classifier and metadata extractor capabilities
//! - [`report`] - parser for the capture-info text report
//! - [`store`] - records and the shared, merging result store
//! - [`failure`] - sentinel records for expected failures
//! - [`pipeline`] - concurrent per-link units under one supervisor
//! - [`persistence`] - loading and idempotently writing `captures.json`

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod archive;
pub mod capture;
pub mod download;
pub mod failure;
pub mod persistence;
pub mod pipeline;
pub mod report;
pub mod source;
pub mod store;

// Re-export commonly used types
pub use archive::{ArchiveExpander, NativeCodec};
pub use capture::{CaptureClassifier, MetadataExtractor, WiresharkTools};
pub use download::{DownloadError, FetchCache, HttpClient, RetryPolicy};
pub use failure::FailureKind;
pub use persistence::{CacheFile, PersistError};
pub use pipeline::{Pipeline, PipelineError, RunOutput, RunStats};
pub use report::{MetaValue, ReportError, parse_report};
pub use source::{FileLinkSource, Link, LinkSource};
pub use store::{CaptureRecord, ResultStore};
