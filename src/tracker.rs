// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Change tracking: checksums and last-sync timestamps.
//!
//! The tracker is the only state that survives across runs. Its checksum
//! covers exactly the mapped-field subset of an item, so unmapped fields
//! never trigger a resync. A missing or corrupt state file is never fatal:
//! it just means "no prior state" and forces a full resync.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use reconciler::{ChangeTracker, FieldValue};
//!
//! let mut fields = BTreeMap::new();
//! fields.insert("title".to_string(), FieldValue::String("Bug A".into()));
//!
//! let mut tracker = ChangeTracker::new();
//! assert!(tracker.has_changed("X1", &fields)); // no prior checksum
//!
//! tracker.update("X1", &fields, chrono::Utc::now());
//! assert!(!tracker.has_changed("X1", &fields));
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::StateError;
use crate::value::FieldValue;

/// Per-item tracking record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedEntry {
    /// Hex SHA-256 over the canonicalized mapped-field subset.
    pub checksum: String,
    /// When the item was last synced.
    pub last_sync: DateTime<Utc>,
}

/// Checksum store: `external_id → {checksum, last_sync}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeTracker {
    entries: BTreeMap<String, TrackedEntry>,
    #[serde(skip)]
    path: Option<PathBuf>,
}

impl ChangeTracker {
    /// Empty in-memory tracker, not bound to a file.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load tracker state from `path`.
    ///
    /// Missing file → empty state. Corrupt file → empty state with a
    /// warning (full resync); the engine never aborts over tracker state.
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let mut tracker = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<Self>(&bytes) {
                Ok(tracker) => {
                    debug!(path = %path.display(), entries = tracker.entries.len(), "Loaded tracker state");
                    tracker
                }
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %StateError::Corruption(e.to_string()),
                        "Tracker state corrupt, starting cold (full resync)"
                    );
                    Self::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "No tracker state file, starting cold");
                Self::new()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Tracker state unreadable, starting cold");
                Self::new()
            }
        };
        tracker.path = Some(path);
        tracker
    }

    /// Persist state to the bound path. Atomic: writes a sibling temp file
    /// then renames over the target, so readers never see a torn file.
    pub async fn save(&self) -> Result<(), StateError> {
        let Some(ref path) = self.path else {
            return Ok(()); // in-memory tracker, nothing to persist
        };
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| StateError::Corruption(e.to_string()))?;

        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(path = %path.display(), entries = self.entries.len(), "Saved tracker state");
        Ok(())
    }

    /// Deterministic checksum over canonicalized, order-independent
    /// key/value pairs.
    #[must_use]
    pub fn compute_checksum(fields: &BTreeMap<String, FieldValue>) -> String {
        let mut hasher = Sha256::new();
        for (key, value) in fields {
            hasher.update(key.as_bytes());
            hasher.update([0x1f]);
            hasher.update(value.canonical_string().as_bytes());
            hasher.update([0x1e]);
        }
        hex::encode(hasher.finalize())
    }

    /// True if no prior checksum exists for `id` or it differs from the
    /// checksum of `fields`.
    #[must_use]
    pub fn has_changed(&self, id: &str, fields: &BTreeMap<String, FieldValue>) -> bool {
        match self.entries.get(id) {
            Some(entry) => entry.checksum != Self::compute_checksum(fields),
            None => true,
        }
    }

    /// Record the checksum of `fields` for `id`. Callers skip this under
    /// dry-run; the tracker itself does not know about run modes.
    pub fn update(&mut self, id: &str, fields: &BTreeMap<String, FieldValue>, at: DateTime<Utc>) {
        self.entries.insert(
            id.to_string(),
            TrackedEntry {
                checksum: Self::compute_checksum(fields),
                last_sync: at,
            },
        );
    }

    /// Tracking record for `id`, if any.
    #[must_use]
    pub fn entry(&self, id: &str) -> Option<&TrackedEntry> {
        self.entries.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
