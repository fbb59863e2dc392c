// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pure field-level diff between a mapped source item and its target.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FieldMapping;
use crate::sync_item::SyncItem;
use crate::value::FieldValue;

/// One conflicting field. Transient: exists only during resolution and in
/// the unresolved-conflict report.
///
/// Carries both sides' `last_modified` so resolvers never re-derive the
/// timestamp comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    pub item_id: String,
    /// Field name in the target schema.
    pub field: String,
    pub source_value: Option<FieldValue>,
    pub target_value: Option<FieldValue>,
    pub source_modified: DateTime<Utc>,
    pub target_modified: DateTime<Utc>,
}

/// Diff the mapped source fields against the target item.
///
/// Side-effect free. Returns exactly the mapped fields whose normalized
/// values differ; a field missing on one side is a conflict only when the
/// mapping is `required`.
#[must_use]
pub fn diff(
    mapped_source: &BTreeMap<String, FieldValue>,
    target: &SyncItem,
    mappings: &[FieldMapping],
    source_modified: DateTime<Utc>,
) -> Vec<ConflictRecord> {
    let mut conflicts = Vec::new();

    for mapping in mappings {
        let field = mapping.target_field.as_str();
        let source_value = mapped_source.get(field);
        let target_value = target.field(field);

        let conflicting = match (source_value, target_value) {
            (Some(s), Some(t)) => !s.normalized_eq(t),
            (None, None) => false,
            // One-sided values conflict only when the field is required.
            _ => mapping.required,
        };

        if conflicting {
            conflicts.push(ConflictRecord {
                item_id: target.external_id.clone(),
                field: field.to_string(),
                source_value: source_value.cloned(),
                target_value: target_value.cloned(),
                source_modified,
                target_modified: target.last_modified,
            });
        }
    }

    conflicts
}
