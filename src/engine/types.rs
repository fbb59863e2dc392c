//! Public types for the sync engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::conflict::ConflictRecord;
use crate::value::FieldValue;

/// Final status of one item in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Written (or, under dry-run, would have been written).
    Completed,
    /// Transform, resolution or write failed after retries.
    Failed,
    /// Conflicts detected and left unresolved; nothing written.
    Conflict,
    /// Unchanged since the last run, or nothing to write.
    Skipped,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Conflict => write!(f, "conflict"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// Per-item outcome. Immutable once produced; exactly one per input pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResult {
    pub item_id: String,
    pub status: SyncStatus,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conflicts: Vec<ConflictRecord>,
    /// Fields that were (or would be) written, in the target schema.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub changes: BTreeMap<String, FieldValue>,
    pub retry_count: usize,
}

impl SyncResult {
    fn base(item_id: &str, status: SyncStatus) -> Self {
        Self {
            item_id: item_id.to_string(),
            status,
            timestamp: Utc::now(),
            error: None,
            conflicts: Vec::new(),
            changes: BTreeMap::new(),
            retry_count: 0,
        }
    }

    pub fn completed(
        item_id: &str,
        changes: BTreeMap<String, FieldValue>,
        retry_count: usize,
    ) -> Self {
        Self {
            changes,
            retry_count,
            ..Self::base(item_id, SyncStatus::Completed)
        }
    }

    pub fn skipped(item_id: &str) -> Self {
        Self::base(item_id, SyncStatus::Skipped)
    }

    pub fn failed(item_id: &str, error: impl std::fmt::Display, retry_count: usize) -> Self {
        Self {
            error: Some(error.to_string()),
            retry_count,
            ..Self::base(item_id, SyncStatus::Failed)
        }
    }

    pub fn conflict(item_id: &str, conflicts: Vec<ConflictRecord>) -> Self {
        Self {
            conflicts,
            ..Self::base(item_id, SyncStatus::Conflict)
        }
    }
}

/// Run-level aggregate, persisted (or reported) at the end of a run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncState {
    pub run_id: String,
    pub last_sync: DateTime<Utc>,
    pub items_synced: usize,
    pub items_failed: usize,
    pub items_skipped: usize,
    pub items_conflicted: usize,
    pub unresolved_conflicts: Vec<ConflictRecord>,
    pub dry_run: bool,
}

impl SyncState {
    /// Fold per-item results into the run aggregate.
    #[must_use]
    pub fn aggregate(run_id: String, dry_run: bool, results: &[SyncResult]) -> Self {
        let mut state = Self {
            run_id,
            last_sync: Utc::now(),
            items_synced: 0,
            items_failed: 0,
            items_skipped: 0,
            items_conflicted: 0,
            unresolved_conflicts: Vec::new(),
            dry_run,
        };
        for result in results {
            match result.status {
                SyncStatus::Completed => state.items_synced += 1,
                SyncStatus::Failed => state.items_failed += 1,
                SyncStatus::Skipped => state.items_skipped += 1,
                SyncStatus::Conflict => {
                    state.items_conflicted += 1;
                    state.unresolved_conflicts.extend(result.conflicts.iter().cloned());
                }
            }
        }
        state
    }

    /// Total items the run produced a result for.
    #[must_use]
    pub fn total(&self) -> usize {
        self.items_synced + self.items_failed + self.items_skipped + self.items_conflicted
    }
}

/// Everything a run produced: ordered per-item results plus the aggregate.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub state: SyncState,
    pub results: Vec<SyncResult>,
}
