//! Sync item data structure.
//!
//! The [`SyncItem`] is the core data unit that flows through the engine.
//! Items arrive from injected clients, are paired by `external_id`, and are
//! treated as copy-on-write: the engine never mutates a caller's item in
//! place, it builds new data maps during mapping and resolution.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value::FieldValue;

/// A single item as seen by one platform.
///
/// # Example
///
/// ```
/// use reconciler::SyncItem;
///
/// let item = SyncItem::new("PROJ-42", "tracker_a")
///     .with_field("title", "Fix login bug")
///     .with_field("priority", 2.0);
///
/// assert_eq!(item.external_id, "PROJ-42");
/// assert!(item.data.contains_key("title"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncItem {
    /// Stable cross-platform key. Always caller-supplied; the engine never
    /// invents one.
    pub external_id: String,
    /// Platform this view of the item came from.
    pub platform: String,
    /// Field name → typed value.
    pub data: BTreeMap<String, FieldValue>,
    /// When the platform last saw this item change.
    pub last_modified: DateTime<Utc>,
    /// Checksum over the mapped-field subset, if one has been computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl SyncItem {
    /// Create an empty item stamped with the current time.
    pub fn new(external_id: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            platform: platform.into(),
            data: BTreeMap::new(),
            last_modified: Utc::now(),
            checksum: None,
        }
    }

    /// Builder-style field insertion.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.data.insert(name.into(), value.into());
        self
    }

    /// Builder-style timestamp override.
    #[must_use]
    pub fn with_modified(mut self, at: DateTime<Utc>) -> Self {
        self.last_modified = at;
        self
    }

    /// Look up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.data.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_new_sync_item() {
        let item = SyncItem::new("X1", "jira");

        assert_eq!(item.external_id, "X1");
        assert_eq!(item.platform, "jira");
        assert!(item.data.is_empty());
        assert!(item.checksum.is_none());
    }

    #[test]
    fn test_builder_fields() {
        let item = SyncItem::new("X1", "jira")
            .with_field("title", "Bug A")
            .with_field("open", true);

        assert_eq!(item.field("title"), Some(&FieldValue::String("Bug A".into())));
        assert_eq!(item.field("open"), Some(&FieldValue::Boolean(true)));
        assert!(item.field("missing").is_none());
    }

    #[test]
    fn test_with_modified_overrides_timestamp() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let item = SyncItem::new("X1", "jira").with_modified(at);
        assert_eq!(item.last_modified, at);
    }

    #[test]
    fn test_serialize_skips_none_checksum() {
        let item = SyncItem::new("X1", "jira");
        let json = serde_json::to_string(&item).unwrap();
        assert!(!json.contains("checksum"));
    }

    #[test]
    fn test_serialize_round_trip() {
        let item = SyncItem::new("X1", "jira")
            .with_field("title", "Bug A")
            .with_field("count", 3.0);

        let json = serde_json::to_string(&item).unwrap();
        let back: SyncItem = serde_json::from_str(&json).unwrap();

        assert_eq!(back.external_id, item.external_id);
        assert_eq!(back.data, item.data);
    }
}
