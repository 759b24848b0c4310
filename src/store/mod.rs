//! Content-addressed result store shared by pipeline units.
//!
//! A single lock guards the whole map. Writes are paced by downloads and
//! subprocesses, so the lock is never contended enough to matter.

mod record;

pub use record::{CaptureRecord, MergeOutcome, merge_into};

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::failure::is_sentinel_key;

/// Records keyed by content hash or sentinel key.
pub type Records = BTreeMap<String, CaptureRecord>;

/// Concurrency-safe map of capture records.
#[derive(Debug, Default)]
pub struct ResultStore {
    records: Mutex<Records>,
}

impl ResultStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges `record` under `key`; see [`merge_into`].
    pub fn set(&self, key: impl Into<String>, record: CaptureRecord) -> MergeOutcome {
        let key = key.into();
        let mut records = self.lock();
        let outcome = merge_into(&mut records, key.clone(), record);
        trace!(key = %key, ?outcome, "record stored");
        outcome
    }

    /// Clone of a single record.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<CaptureRecord> {
        self.lock().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clone of the whole map.
    #[must_use]
    pub fn snapshot(&self) -> Records {
        self.lock().clone()
    }

    /// Consumes the store.
    #[must_use]
    pub fn into_records(self) -> Records {
        self.records
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // A panicking unit cannot leave a half-merged record behind, so a
    // poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, Records> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// URLs that need no processing on this run.
///
/// With `include_failures` false, sources that only appear in sentinel
/// records are left out so they get another attempt.
#[must_use]
pub fn known_sources(records: &Records, include_failures: bool) -> HashSet<String> {
    let mut known = HashSet::new();
    for (key, record) in records {
        if include_failures || !is_sentinel_key(key) {
            known.extend(record.sources.iter().cloned());
        }
    }
    known
}
