//! Archive expansion.
//!
//! An archive is expanded into a folder named after it (archive suffixes
//! removed), the archive is deleted once extraction succeeded, and only the
//! members the classifier recognizes as captures are returned.

mod codec;
mod error;

use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

pub use codec::{ArchiveCodec, ArchiveFormat, NativeCodec};
pub use error::ArchiveError;

use crate::capture::CaptureClassifier;

/// Ordered alternation: longer suffixes are tried before their tails, and an
/// optional `.pcap`/`.cap` in front of the archive suffix is removed too.
#[allow(clippy::expect_used)]
static ARCHIVE_SUFFIX_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(.*?)(?:\.p?cap)?\.(?:n?tar\.gz|tar\.bz2|tar\.xz|tgz|tbz2|txz|bz2|gz|zip|xz|lzma|rar|tar)$",
    )
    .expect("archive suffix regex is valid") // Static pattern, safe to panic
});

/// Removes archive suffixes from a file name.
///
/// Names without an archive suffix are returned unchanged.
///
/// ```
/// use capcache_core::archive::strip_archive_ext;
///
/// assert_eq!(strip_archive_ext("ws_w-I.pcap.tgz"), "ws_w-I");
/// assert_eq!(strip_archive_ext("dns.cap"), "dns.cap");
/// ```
#[must_use]
pub fn strip_archive_ext(name: &str) -> &str {
    ARCHIVE_SUFFIX_PATTERN
        .captures(name)
        .and_then(|caps| caps.get(1))
        .map_or(name, |stem| stem.as_str())
}

/// Expansion folder for an archive path.
#[must_use]
pub fn expansion_target(archive: &Path) -> PathBuf {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    archive.with_file_name(strip_archive_ext(&name))
}

/// Expands archives and filters their members down to captures.
pub struct ArchiveExpander {
    codec: Arc<dyn ArchiveCodec>,
    classifier: Arc<dyn CaptureClassifier>,
}

impl std::fmt::Debug for ArchiveExpander {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveExpander").finish_non_exhaustive()
    }
}

impl ArchiveExpander {
    /// Creates an expander.
    #[must_use]
    pub fn new(codec: Arc<dyn ArchiveCodec>, classifier: Arc<dyn CaptureClassifier>) -> Self {
        Self { codec, classifier }
    }

    /// Expands `archive` and returns the recognized captures inside, sorted.
    ///
    /// When the archive is already gone but its folder exists (an earlier
    /// run expanded it) the folder is walked again without extracting.
    /// An empty result is not an error; the caller decides what to record.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError`] if extraction fails, the folder cannot be
    /// walked, or neither archive nor folder exists.
    #[instrument(skip(self), fields(archive = %archive.display()))]
    pub async fn expand(&self, archive: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
        let target = expansion_target(archive);

        if tokio::fs::try_exists(archive).await.unwrap_or(false) {
            tokio::fs::create_dir_all(&target)
                .await
                .map_err(|e| ArchiveError::io(&target, e))?;
            self.codec.extract(archive, &target).await?;
            tokio::fs::remove_file(archive)
                .await
                .map_err(|e| ArchiveError::io(archive, e))?;
            debug!(target = %target.display(), "archive extracted and removed");
        } else if !tokio::fs::try_exists(&target).await.unwrap_or(false) {
            return Err(ArchiveError::Missing {
                path: archive.to_path_buf(),
            });
        }

        let mut captures = Vec::new();
        for member in list_files(&target).await? {
            match self.classifier.is_pcap(&member).await {
                Ok(()) => captures.push(member),
                Err(e) => debug!(member = %member.display(), error = %e, "skipping member"),
            }
        }

        info!(
            target = %target.display(),
            captures = captures.len(),
            "archive expanded"
        );
        Ok(captures)
    }

    /// Removes an expansion folder that held no captures.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Io`] if the folder cannot be removed.
    pub async fn discard(&self, target: &Path) -> Result<(), ArchiveError> {
        tokio::fs::remove_dir_all(target)
            .await
            .map_err(|e| ArchiveError::io(target, e))
    }
}

/// Recursively lists regular files below `dir`, sorted.
async fn list_files(dir: &Path) -> Result<Vec<PathBuf>, ArchiveError> {
    let root = dir.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut files = Vec::new();
        for entry in WalkDir::new(&root) {
            let entry = entry.map_err(|e| {
                let path = e.path().map_or_else(|| root.clone(), Path::to_path_buf);
                ArchiveError::io(path, e.into())
            })?;
            if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        files.sort();
        Ok(files)
    })
    .await
    .map_err(|e| ArchiveError::Task {
        path: dir.to_path_buf(),
        message: e.to_string(),
    })?
}
