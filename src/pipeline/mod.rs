//! The harvesting pipeline.
//!
//! Every link becomes a unit: fetch, then either inspect the capture or
//! expand the archive and submit one unit per capture inside. Units run
//! concurrently under a semaphore and report into a shared
//! [`ResultStore`]. Expected failures are stored as sentinel records; only a
//! report the parser cannot understand stops the run.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use capcache_core::archive::{ArchiveExpander, NativeCodec};
//! use capcache_core::capture::WiresharkTools;
//! use capcache_core::download::{FetchCache, HttpClient, RetryPolicy};
//! use capcache_core::pipeline::Pipeline;
//! use capcache_core::source::FileLinkSource;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tools = Arc::new(WiresharkTools::from_path()?);
//! let fetch = FetchCache::new(".cache", Arc::new(HttpClient::new()), RetryPolicy::default());
//! let expander = ArchiveExpander::new(Arc::new(NativeCodec), tools.clone());
//! let pipeline = Pipeline::new(10, fetch, expander, tools.clone(), tools)?;
//! let output = pipeline.run(&FileLinkSource::new("links.tsv")).await?;
//! println!("stored {}, failed {}", output.stats.stored(), output.stats.failed());
//! # Ok(())
//! # }
//! ```

mod supervisor;
mod unit;

pub use supervisor::{Supervisor, UnitSpawner};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use crate::archive::ArchiveExpander;
use crate::capture::{CaptureClassifier, MetadataExtractor};
use crate::download::FetchCache;
use crate::report::ReportError;
use crate::source::{LinkSource, SourceError};
use crate::store::{Records, ResultStore};
use unit::UnitContext;

/// Minimum allowed concurrency value.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum allowed concurrency value.
pub const MAX_CONCURRENCY: usize = 100;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Errors that end a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency { value: usize },

    /// The metadata report has a shape the parser does not know. The
    /// external tool is probably a version this build cannot read.
    #[error("unsupported report format for {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: ReportError,
    },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

/// Counters for one run, updated from concurrent units.
#[derive(Debug, Default)]
pub struct RunStats {
    units: AtomicUsize,
    stored: AtomicUsize,
    failed: AtomicUsize,
    skipped: AtomicUsize,
}

impl RunStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Units started: one per fetched link plus one per archive member.
    #[must_use]
    pub fn units(&self) -> usize {
        self.units.load(Ordering::SeqCst)
    }

    /// Captures stored under their content hash.
    #[must_use]
    pub fn stored(&self) -> usize {
        self.stored.load(Ordering::SeqCst)
    }

    /// Failures stored under a sentinel key.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Links skipped because an earlier run already handled them.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped.load(Ordering::SeqCst)
    }

    fn increment_units(&self) {
        self.units.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_stored(&self) {
        self.stored.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::SeqCst);
    }

    fn copy_of(other: &Self) -> Self {
        let copy = Self::new();
        copy.units.store(other.units(), Ordering::SeqCst);
        copy.stored.store(other.stored(), Ordering::SeqCst);
        copy.failed.store(other.failed(), Ordering::SeqCst);
        copy.skipped.store(other.skipped(), Ordering::SeqCst);
        copy
    }
}

/// Records and counters from a finished run.
#[derive(Debug)]
pub struct RunOutput {
    pub records: Records,
    pub stats: RunStats,
}

/// Drives links through fetch, expansion and inspection.
pub struct Pipeline {
    fetch: Arc<FetchCache>,
    expander: Arc<ArchiveExpander>,
    classifier: Arc<dyn CaptureClassifier>,
    extractor: Arc<dyn MetadataExtractor>,
    concurrency: usize,
    known_sources: HashSet<String>,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("fetch", &self.fetch)
            .field("concurrency", &self.concurrency)
            .field("known_sources", &self.known_sources.len())
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline running at most `concurrency` units at once.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    pub fn new(
        concurrency: usize,
        fetch: FetchCache,
        expander: ArchiveExpander,
        classifier: Arc<dyn CaptureClassifier>,
        extractor: Arc<dyn MetadataExtractor>,
    ) -> Result<Self, PipelineError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(PipelineError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, root = %fetch.root().display(), "creating pipeline");

        Ok(Self {
            fetch: Arc::new(fetch),
            expander: Arc::new(expander),
            classifier,
            extractor,
            concurrency,
            known_sources: HashSet::new(),
        })
    }

    /// URLs to leave alone, usually the sources of the prior cache.
    #[must_use]
    pub fn with_known_sources(mut self, known_sources: HashSet<String>) -> Self {
        self.known_sources = known_sources;
        self
    }

    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Processes every link of `source` and returns this run's records.
    ///
    /// Repeated URLs are processed once; known URLs are skipped.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Source`] if the links cannot be listed,
    /// [`PipelineError::Report`] if any report has an unknown shape.
    /// Nothing from a failed run should be persisted.
    #[instrument(skip(self, source))]
    pub async fn run(&self, source: &dyn LinkSource) -> Result<RunOutput, PipelineError> {
        let links = source.links().await?;
        info!(links = links.len(), "starting run");

        let store = Arc::new(ResultStore::new());
        let stats = Arc::new(RunStats::new());
        let ctx = Arc::new(UnitContext {
            fetch: Arc::clone(&self.fetch),
            expander: Arc::clone(&self.expander),
            classifier: Arc::clone(&self.classifier),
            extractor: Arc::clone(&self.extractor),
            semaphore: Arc::new(Semaphore::new(self.concurrency)),
            store: Arc::clone(&store),
            stats: Arc::clone(&stats),
        });

        let supervisor = Supervisor::new();
        let spawner = supervisor.spawner();
        let mut seen = HashSet::new();
        for link in links {
            if !seen.insert(link.url.clone()) {
                continue;
            }
            if self.known_sources.contains(&link.url) {
                debug!(url = %link.url, "already cached, skipping");
                stats.increment_skipped();
                continue;
            }
            spawner.spawn(unit::link_unit(Arc::clone(&ctx), spawner.clone(), link));
        }
        drop(ctx);

        supervisor.run().await?;

        let records = Arc::try_unwrap(store)
            .map_or_else(|shared| shared.snapshot(), ResultStore::into_records);
        let stats = Arc::try_unwrap(stats).unwrap_or_else(|shared| RunStats::copy_of(&shared));
        info!(
            units = stats.units(),
            stored = stats.stored(),
            failed = stats.failed(),
            skipped = stats.skipped(),
            records = records.len(),
            "run complete"
        );
        Ok(RunOutput { records, stats })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_run_stats_start_at_zero() {
        let stats = RunStats::new();
        assert_eq!(
            (stats.units(), stats.stored(), stats.failed(), stats.skipped()),
            (0, 0, 0, 0)
        );
    }

    #[test]
    fn test_run_stats_copy() {
        let stats = RunStats::new();
        stats.increment_units();
        stats.increment_units();
        stats.increment_stored();
        stats.increment_failed();
        stats.increment_skipped();
        let copy = RunStats::copy_of(&stats);
        assert_eq!(copy.units(), 2);
        assert_eq!(copy.stored(), 1);
        assert_eq!(copy.failed(), 1);
        assert_eq!(copy.skipped(), 1);
    }

    #[test]
    fn test_invalid_concurrency_message() {
        let err = PipelineError::InvalidConcurrency { value: 0 };
        assert!(err.to_string().contains("between 1 and 100"));
    }
}
