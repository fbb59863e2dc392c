//! Property-based tests for the reconciliation primitives.
//!
//! Uses proptest to generate random field data and verify the invariants
//! the engine leans on: checksum stability, conversion round-trips and
//! clean failure on malformed input.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::collections::BTreeMap;

use proptest::prelude::*;

use reconciler::{
    ChangeTracker, FieldMapping, FieldTransformer, FieldType, FieldValue, SyncItem,
    TransformRegistry,
};

// =============================================================================
// Strategies for generating test data
// =============================================================================

fn field_name_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,15}"
}

/// Scalar field values; finite numbers only, NaN never round-trips.
fn scalar_value_strategy() -> impl Strategy<Value = FieldValue> {
    prop_oneof![
        "[ -~]{0,40}".prop_map(FieldValue::String),
        (-1.0e9f64..1.0e9).prop_map(FieldValue::Number),
        any::<bool>().prop_map(FieldValue::Boolean),
    ]
}

fn field_map_strategy() -> impl Strategy<Value = BTreeMap<String, FieldValue>> {
    prop::collection::btree_map(field_name_strategy(), scalar_value_strategy(), 0..8)
}

fn transformer() -> FieldTransformer {
    FieldTransformer::new(TransformRegistry::new())
}

// =============================================================================
// Checksum Properties
// =============================================================================

proptest! {
    /// The checksum is a pure function of the field map's contents.
    #[test]
    fn checksum_is_deterministic(fields in field_map_strategy()) {
        prop_assert_eq!(
            ChangeTracker::compute_checksum(&fields),
            ChangeTracker::compute_checksum(&fields.clone())
        );
    }

    /// Dropping any entry changes the checksum: field boundaries are
    /// unambiguous, adjacent entries never merge.
    #[test]
    fn checksum_detects_removed_field(fields in field_map_strategy()) {
        prop_assume!(!fields.is_empty());
        let full = ChangeTracker::compute_checksum(&fields);
        for key in fields.keys() {
            let mut without = fields.clone();
            without.remove(key);
            prop_assert_ne!(&full, &ChangeTracker::compute_checksum(&without));
        }
    }

    /// Changing any single value changes the checksum.
    #[test]
    fn checksum_detects_single_field_change(
        fields in field_map_strategy(),
        name in field_name_strategy(),
        value in "[ -~]{1,20}",
    ) {
        let mut changed = fields.clone();
        let altered = FieldValue::String(format!("{value}!"));
        prop_assume!(changed.get(&name) != Some(&altered));
        changed.insert(name, altered);
        prop_assert_ne!(
            ChangeTracker::compute_checksum(&fields),
            ChangeTracker::compute_checksum(&changed)
        );
    }

    /// A tracked item reports unchanged for the same fields and changed
    /// for any different map.
    #[test]
    fn tracker_round_trip(fields in field_map_strategy()) {
        let mut tracker = ChangeTracker::new();
        tracker.update("X1", &fields, chrono::Utc::now());
        prop_assert!(!tracker.has_changed("X1", &fields));
        prop_assert!(tracker.has_changed("unknown", &fields));
    }
}

// =============================================================================
// Conversion Round-Trips
// =============================================================================

proptest! {
    /// number → string → number is lossless for finite values.
    #[test]
    fn number_string_round_trip(n in -1.0e12f64..1.0e12) {
        let t = transformer();
        let s = t.convert(&FieldValue::Number(n), FieldType::Number, FieldType::String).unwrap();
        let back = t.convert(&s, FieldType::String, FieldType::Number).unwrap();
        match back {
            FieldValue::Number(m) => prop_assert!((m - n).abs() <= n.abs() * 1e-12),
            other => prop_assert!(false, "got {:?}", other),
        }
    }

    /// boolean → string → boolean is exact.
    #[test]
    fn boolean_string_round_trip(b in any::<bool>()) {
        let t = transformer();
        let s = t.convert(&FieldValue::Boolean(b), FieldType::Boolean, FieldType::String).unwrap();
        let back = t.convert(&s, FieldType::String, FieldType::Boolean).unwrap();
        prop_assert_eq!(back, FieldValue::Boolean(b));
    }

    /// array → string → array is exact for delimiter-free elements.
    #[test]
    fn array_string_round_trip(
        items in prop::collection::vec("[a-zA-Z0-9_]{1,10}", 1..6),
    ) {
        let t = transformer();
        let array = FieldValue::Array(
            items.iter().cloned().map(FieldValue::String).collect(),
        );
        let s = t.convert(&array, FieldType::Array, FieldType::String).unwrap();
        let back = t.convert(&s, FieldType::String, FieldType::Array).unwrap();
        prop_assert_eq!(back, array);
    }

    /// datetime → string → datetime preserves the instant at second
    /// precision (the canonical form).
    #[test]
    fn datetime_string_round_trip(secs in 0i64..4_102_444_800) {
        let t = transformer();
        let dt = chrono::DateTime::from_timestamp(secs, 0).unwrap();
        let value = FieldValue::DateTime(dt);
        let s = t.convert(&value, FieldType::DateTime, FieldType::String).unwrap();
        let back = t.convert(&s, FieldType::String, FieldType::DateTime).unwrap();
        prop_assert_eq!(back, value);
    }

    /// Unparseable numeric strings fail cleanly, never panic.
    #[test]
    fn bad_number_strings_fail_cleanly(s in "[a-zA-Z !@#$%^&*]{1,20}") {
        prop_assume!(s.trim().parse::<f64>().is_err());
        let result = transformer().convert(
            &FieldValue::String(s),
            FieldType::String,
            FieldType::Number,
        );
        prop_assert!(result.is_err());
    }

    /// Arbitrary strings through the json parser fail cleanly or produce
    /// a real object; no panics.
    #[test]
    fn arbitrary_json_strings_never_panic(s in ".{0,200}") {
        let _ = transformer().convert(
            &FieldValue::String(s),
            FieldType::Json,
            FieldType::Object,
        );
    }
}

// =============================================================================
// Mapping Properties
// =============================================================================

proptest! {
    /// map_item only ever emits mapped target fields.
    #[test]
    fn map_item_emits_only_mapped_fields(
        data in field_map_strategy(),
        mapped_name in field_name_strategy(),
    ) {
        let mut item = SyncItem::new("X1", "jira");
        item.data = data;
        let mappings = vec![FieldMapping::new(
            mapped_name.clone(),
            "out",
            FieldType::String,
        )];

        // Force the source value to a string so conversion cannot fail.
        if item.field(&mapped_name).is_some() {
            item.data.insert(mapped_name.clone(), FieldValue::String("v".into()));
        }

        let mapped = transformer()
            .map_item(&item, &mappings, reconciler::MappingLeg::Forward)
            .unwrap();
        prop_assert!(mapped.keys().all(|k| k == "out"));
        prop_assert_eq!(mapped.contains_key("out"), item.field(&mapped_name).is_some());
    }

    /// Serialized items always deserialize back to an equal item.
    #[test]
    fn sync_item_serde_round_trip(data in field_map_strategy()) {
        let mut item = SyncItem::new("X1", "jira");
        item.data = data;
        let json = serde_json::to_string(&item).unwrap();
        let back: SyncItem = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.external_id, item.external_id);
        prop_assert_eq!(back.data, item.data);
    }
}
