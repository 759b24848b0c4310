//! Loading and saving the capture cache file.
//!
//! The file is one JSON object of key → record, pretty-printed with two
//! spaces, keys sorted, and a trailing newline. It is replaced through a
//! temporary sibling and a rename, and only when a run changed something.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::store::{Records, merge_into};

/// File name of the cache inside the cache root.
pub const CACHE_FILE_NAME: &str = "captures.json";

const TEMP_SUFFIX: &str = "tmp";

/// Errors reading or writing the cache file. All of them end the run.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("failed to read cache {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cache {path} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode cache: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to write cache {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Result of [`CacheFile::write_if_changed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was replaced; holds the record count written.
    Written(usize),
    /// Nothing new; the file was left untouched.
    Unchanged,
}

/// The persisted cache file.
#[derive(Debug, Clone)]
pub struct CacheFile {
    path: PathBuf,
}

impl CacheFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The cache file inside `cache_root`.
    #[must_use]
    pub fn in_dir(cache_root: &Path) -> Self {
        Self::new(cache_root.join(CACHE_FILE_NAME))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads prior records. A missing file is an empty cache.
    ///
    /// # Errors
    ///
    /// [`PersistError::Read`] or [`PersistError::Parse`] when the file exists
    /// but cannot be used.
    #[instrument(skip(self), fields(path = %self.path.display()))]
    pub async fn load(&self) -> Result<Records, PersistError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no prior cache");
                return Ok(Records::new());
            }
            Err(source) => {
                return Err(PersistError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let records: Records =
            serde_json::from_slice(&bytes).map_err(|source| PersistError::Parse {
                path: self.path.clone(),
                source,
            })?;
        debug!(records = records.len(), "prior cache loaded");
        Ok(records)
    }

    /// Folds `fresh` into `prior` and writes the result if anything changed.
    ///
    /// # Errors
    ///
    /// [`PersistError::Encode`] or [`PersistError::Write`].
    #[instrument(skip(self, prior, fresh), fields(path = %self.path.display()))]
    pub async fn write_if_changed(
        &self,
        mut prior: Records,
        fresh: Records,
    ) -> Result<WriteOutcome, PersistError> {
        if !merge_records(&mut prior, fresh) {
            info!("cache unchanged, not writing");
            return Ok(WriteOutcome::Unchanged);
        }

        let bytes = encode(&prior).map_err(PersistError::Encode)?;
        self.replace(&bytes).await?;
        info!(records = prior.len(), "cache written");
        Ok(WriteOutcome::Written(prior.len()))
    }

    async fn replace(&self, bytes: &[u8]) -> Result<(), PersistError> {
        let write_err = |source| PersistError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        let temp = self.path.with_extension(TEMP_SUFFIX);
        tokio::fs::write(&temp, bytes).await.map_err(write_err)?;
        tokio::fs::rename(&temp, &self.path).await.map_err(write_err)
    }
}

/// Merges `fresh` into `prior`; returns whether `prior` changed.
pub fn merge_records(prior: &mut Records, fresh: Records) -> bool {
    let mut changed = false;
    for (key, record) in fresh {
        changed |= merge_into(prior, key, record).is_change();
    }
    changed
}

/// Encodes records in the on-disk format.
///
/// # Errors
///
/// Returns the serializer error, which only happens for non-string map keys.
pub fn encode(records: &Records) -> Result<Vec<u8>, serde_json::Error> {
    let mut bytes = serde_json::to_vec_pretty(records)?;
    bytes.push(b'\n');
    Ok(bytes)
}
