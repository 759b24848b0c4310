//! Work done by a single pipeline unit.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tokio::sync::{Semaphore, SemaphorePermit};
use tracing::{debug, instrument, warn};

use super::supervisor::UnitSpawner;
use super::{PipelineError, RunStats};
use crate::archive::{ArchiveExpander, expansion_target};
use crate::capture::{CaptureClassifier, MetadataExtractor};
use crate::download::{FetchCache, cache_path_for_url};
use crate::failure::{FailureKind, truncate_message};
use crate::report::{FILE_NAME_KEY, parse_report};
use crate::source::Link;
use crate::store::{CaptureRecord, ResultStore};

const EMPTY_ARCHIVE_MESSAGE: &str = "archive contained no recognized captures";

/// Everything a unit needs, shared by all units of a run.
pub(super) struct UnitContext {
    pub(super) fetch: Arc<FetchCache>,
    pub(super) expander: Arc<ArchiveExpander>,
    pub(super) classifier: Arc<dyn CaptureClassifier>,
    pub(super) extractor: Arc<dyn MetadataExtractor>,
    pub(super) semaphore: Arc<Semaphore>,
    pub(super) store: Arc<ResultStore>,
    pub(super) stats: Arc<RunStats>,
}

impl UnitContext {
    async fn permit(&self) -> Result<SemaphorePermit<'_>, PipelineError> {
        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| PipelineError::SemaphoreClosed)?;
        self.stats.increment_units();
        Ok(permit)
    }

    /// `path` relative to the cache root, as stored in records.
    fn relative_name(&self, path: &Path) -> String {
        path.strip_prefix(self.fetch.root())
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned()
    }

    fn relative_name_for_url(&self, url: &str) -> String {
        cache_path_for_url(self.fetch.root(), url)
            .map(|cache_path| self.relative_name(&cache_path.target))
            .unwrap_or_default()
    }

    fn record_failure(&self, kind: FailureKind, link: &Link, filename: String, message: &str) {
        let message = truncate_message(message);
        warn!(url = %link.url, kind = kind.label(), error = %message, "recording failure");
        let record =
            CaptureRecord::new(&link.url, &link.description, filename).with_error(message);
        self.store.set(kind.sentinel_key(), record);
        self.stats.increment_failed();
    }
}

/// Fetches one link and either inspects it or expands it.
#[instrument(skip_all, fields(url = %link.url))]
pub(super) async fn link_unit(
    ctx: Arc<UnitContext>,
    spawner: UnitSpawner,
    link: Link,
) -> Result<(), PipelineError> {
    let _permit = ctx.permit().await?;

    let fetched = match ctx.fetch.fetch_file(&link.url).await {
        Ok(fetched) => fetched,
        Err(e) => {
            let kind = FailureKind::from_download_error(&e);
            let filename = ctx.relative_name_for_url(&link.url);
            ctx.record_failure(kind, &link, filename, &e.to_string());
            return Ok(());
        }
    };

    match fetched.archive {
        Some(archive) => {
            expand_archive(&ctx, &spawner, &link, &archive).await;
            Ok(())
        }
        None => inspect_capture(&ctx, &link, &fetched.path, false).await,
    }
}

/// Expands an archive and submits one unit per capture inside.
async fn expand_archive(
    ctx: &Arc<UnitContext>,
    spawner: &UnitSpawner,
    link: &Link,
    archive: &Path,
) {
    let target = expansion_target(archive);
    let members = match ctx.expander.expand(archive).await {
        Ok(members) => members,
        Err(e) => {
            let filename = ctx.relative_name(&target);
            let kind = FailureKind::from_archive_error(&e);
            ctx.record_failure(kind, link, filename, &e.to_string());
            return;
        }
    };

    if members.is_empty() {
        if let Err(e) = ctx.expander.discard(&target).await {
            warn!(target = %target.display(), error = %e, "failed to remove empty archive folder");
        }
        let filename = ctx.relative_name(&target);
        ctx.record_failure(FailureKind::EmptyArchive, link, filename, EMPTY_ARCHIVE_MESSAGE);
        return;
    }

    debug!(members = members.len(), "submitting archive members");
    for member in members {
        spawner.spawn(member_unit(Arc::clone(ctx), link.clone(), member));
    }
}

/// Inspects one capture found inside an archive.
#[instrument(skip_all, fields(url = %link.url, member = %member.display()))]
async fn member_unit(
    ctx: Arc<UnitContext>,
    link: Link,
    member: PathBuf,
) -> Result<(), PipelineError> {
    let _permit = ctx.permit().await?;
    inspect_capture(&ctx, &link, &member, true).await
}

/// Leaf path: classify, report, parse, summarize, hash, store.
///
/// `preclassified` skips the classifier for archive members, which the
/// expander already classified.
async fn inspect_capture(
    ctx: &UnitContext,
    link: &Link,
    path: &Path,
    preclassified: bool,
) -> Result<(), PipelineError> {
    let filename = ctx.relative_name(path);

    if !preclassified {
        if let Err(e) = ctx.classifier.is_pcap(path).await {
            let kind = FailureKind::from_classify_error(&e);
            ctx.record_failure(kind, link, filename, &e.to_string());
            return Ok(());
        }
    }

    let report = match ctx.extractor.report(path).await {
        Ok(report) => report,
        Err(e) => {
            ctx.record_failure(FailureKind::MetadataFailed, link, filename, &e.to_string());
            return Ok(());
        }
    };

    let mut metadata = parse_report(&report.text).map_err(|source| PipelineError::Report {
        path: path.to_path_buf(),
        source,
    })?;
    metadata.remove(FILE_NAME_KEY);

    let mut problems: Vec<String> = report.warning.into_iter().collect();
    let mut record = CaptureRecord::new(&link.url, &link.description, filename.clone());
    record.metadata = metadata;
    match ctx.extractor.protocols_and_ports(path).await {
        Ok(summary) => {
            record.protocols = summary.protocols;
            record.ports = summary.ports;
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "no protocol summary");
            problems.push(e.to_string());
        }
    }
    if !problems.is_empty() {
        record.error_str = Some(truncate_message(&problems.join("; ")));
    }

    let hash = match content_hash(path).await {
        Ok(hash) => hash,
        Err(e) => {
            ctx.record_failure(FailureKind::MetadataFailed, link, filename, &e.to_string());
            return Ok(());
        }
    };

    debug!(hash = %hash, "capture stored");
    ctx.store.set(hash, record);
    ctx.stats.increment_stored();
    Ok(())
}

/// Hex SHA-256 of a file's bytes.
async fn content_hash(path: &Path) -> io::Result<String> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha256::new();
        io::copy(&mut file, &mut hasher)?;
        Ok::<_, io::Error>(format!("{:x}", hasher.finalize()))
    })
    .await
    .map_err(io::Error::other)?
}
