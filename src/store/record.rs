//! Cache record and the merge rule shared by the store and persistence.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::capture::Ports;
use crate::report::MetaValue;

/// One entry of the capture cache, keyed by content hash or sentinel key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CaptureRecord {
    /// URLs this content (or failure) was seen at.
    pub sources: BTreeSet<String>,
    pub description: String,
    /// Path relative to the cache root.
    pub filename: String,
    #[serde(default)]
    pub metadata: MetaValue,
    #[serde(default)]
    pub protocols: Vec<String>,
    #[serde(default)]
    pub ports: Ports,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_str: Option<String>,
}

impl CaptureRecord {
    /// Creates a record seen at a single source.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        description: impl Into<String>,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            sources: BTreeSet::from([source.into()]),
            description: description.into(),
            filename: filename.into(),
            ..Self::default()
        }
    }

    /// Sets the failure summary.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error_str = Some(error.into());
        self
    }
}

/// What [`merge_into`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// Key was absent; the record was stored as is.
    Inserted,
    /// Key was present with the same sources.
    Unchanged,
    /// Key was present; new sources were added to the existing record.
    SourcesExtended,
}

impl MergeOutcome {
    /// Whether the map differs from before the merge.
    #[must_use]
    pub fn is_change(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Merges `record` under `key`.
///
/// The first record for a key keeps its content; later ones only contribute
/// their sources.
pub fn merge_into(
    records: &mut BTreeMap<String, CaptureRecord>,
    key: String,
    record: CaptureRecord,
) -> MergeOutcome {
    match records.get_mut(&key) {
        None => {
            records.insert(key, record);
            MergeOutcome::Inserted
        }
        Some(existing) if record.sources.is_subset(&existing.sources) => MergeOutcome::Unchanged,
        Some(existing) => {
            existing.sources.extend(record.sources);
            MergeOutcome::SourcesExtended
        }
    }
}
