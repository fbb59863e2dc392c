// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Strategy dispatch for conflicting items.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{ConflictStrategy, TieBreak};
use crate::conflict::ConflictRecord;
use crate::error::ItemError;
use crate::sync_item::SyncItem;
use crate::value::FieldValue;

/// Outcome of resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Merged data map, ready to write to the target.
    Resolved(BTreeMap<String, FieldValue>),
    /// The strategy declined to resolve; the item is reported as
    /// `Conflict` and nothing is written.
    Unresolved,
}

/// Apply `strategy` to the detected conflicts.
///
/// `mapped_source` is the target-schema view of the source item; the
/// merged result starts from it and swaps in the winning side per field.
/// A failing `Custom` resolver returns `Err`, which downgrades only this
/// item to `Failed`.
pub fn resolve(
    strategy: &ConflictStrategy,
    tie_break: TieBreak,
    source: &SyncItem,
    target: &SyncItem,
    mapped_source: &BTreeMap<String, FieldValue>,
    conflicts: &[ConflictRecord],
) -> Result<Resolution, ItemError> {
    match strategy {
        ConflictStrategy::Manual => Ok(Resolution::Unresolved),

        ConflictStrategy::Custom(f) => {
            let merged = f(source, target, conflicts).map_err(ItemError::Resolver)?;
            Ok(Resolution::Resolved(merged))
        }

        ConflictStrategy::SourceWins => Ok(Resolution::Resolved(mapped_source.clone())),

        ConflictStrategy::TargetWins => {
            let mut merged = mapped_source.clone();
            for conflict in conflicts {
                apply_side(&mut merged, &conflict.field, conflict.target_value.as_ref());
            }
            Ok(Resolution::Resolved(merged))
        }

        ConflictStrategy::LastWriteWins => {
            let mut merged = mapped_source.clone();
            for conflict in conflicts {
                let source_wins = match conflict
                    .source_modified
                    .cmp(&conflict.target_modified)
                {
                    std::cmp::Ordering::Greater => true,
                    std::cmp::Ordering::Less => false,
                    std::cmp::Ordering::Equal => tie_break == TieBreak::PreferSource,
                };
                debug!(
                    item = %conflict.item_id,
                    field = %conflict.field,
                    source_wins,
                    "last-write-wins pick"
                );
                if !source_wins {
                    apply_side(&mut merged, &conflict.field, conflict.target_value.as_ref());
                }
            }
            Ok(Resolution::Resolved(merged))
        }
    }
}

/// Put the winning side's value in place; a winning absent side removes
/// the field from the merged map.
fn apply_side(
    merged: &mut BTreeMap<String, FieldValue>,
    field: &str,
    value: Option<&FieldValue>,
) {
    match value {
        Some(v) => {
            merged.insert(field.to_string(), v.clone());
        }
        None => {
            merged.remove(field);
        }
    }
}
