// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Field transformer: type conversions and named custom transforms.
//!
//! The conversion table is an exhaustive match over the closed
//! [`FieldType`] set. Custom transforms live in an explicit
//! [`TransformRegistry`] passed in at construction, so two engine
//! instances (or two tests) never share transform state.
//!
//! # Example
//!
//! ```
//! use reconciler::{FieldTransformer, TransformRegistry, FieldValue, FieldType};
//!
//! let mut registry = TransformRegistry::new();
//! registry.register("upper", |v| match v {
//!     FieldValue::String(s) => Ok(FieldValue::String(s.to_uppercase())),
//!     other => Ok(other.clone()),
//! });
//!
//! let transformer = FieldTransformer::new(registry);
//! let out = transformer
//!     .convert(&FieldValue::String("42".into()), FieldType::String, FieldType::Number)
//!     .unwrap();
//! assert_eq!(out, FieldValue::Number(42.0));
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as Json;
use tracing::warn;

use crate::config::FieldMapping;
use crate::error::TransformError;
use crate::sync_item::SyncItem;
use crate::value::{FieldType, FieldValue};

/// A named value transform.
pub type TransformFn =
    Arc<dyn Fn(&FieldValue) -> Result<FieldValue, TransformError> + Send + Sync>;

/// Per-instance registry of named transforms. Not global state.
#[derive(Default, Clone)]
pub struct TransformRegistry {
    transforms: HashMap<String, TransformFn>,
}

impl TransformRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a transform under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&FieldValue) -> Result<FieldValue, TransformError> + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(f));
    }

    fn get(&self, name: &str) -> Option<&TransformFn> {
        self.transforms.get(name)
    }

    /// Number of registered transforms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.transforms.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.transforms.is_empty()
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TransformRegistry")
            .field("transforms", &names)
            .finish()
    }
}

/// Which leg of a mapping [`FieldTransformer::map_item`] is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingLeg {
    /// Source schema → target schema; named transforms apply.
    Forward,
    /// Target schema → source schema; only bidirectional mappings apply
    /// and named transforms are skipped (they need not be invertible).
    Reverse,
}

/// Converts values between canonical types and applies named transforms.
pub struct FieldTransformer {
    registry: TransformRegistry,
    array_delimiter: String,
}

impl FieldTransformer {
    /// Build with the default `,` array delimiter.
    #[must_use]
    pub fn new(registry: TransformRegistry) -> Self {
        Self {
            registry,
            array_delimiter: ",".to_string(),
        }
    }

    /// Override the delimiter used by array↔string conversions.
    #[must_use]
    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.array_delimiter = delimiter.into();
        self
    }

    /// Convert `value` from `src` to `dst`.
    ///
    /// The table covers: identity, string↔number, string↔boolean,
    /// array↔string (delimiter join/split), object/array↔json and
    /// date/datetime↔string (canonical ISO-8601). Anything else is a
    /// [`TransformError::TypeConversion`].
    pub fn convert(
        &self,
        value: &FieldValue,
        src: FieldType,
        dst: FieldType,
    ) -> Result<FieldValue, TransformError> {
        if src == dst {
            return Ok(value.clone());
        }

        let fail = |detail: String| TransformError::TypeConversion {
            src: src.name(),
            dst: dst.name(),
            detail,
        };

        // A declared-json value travels as a string; parse it out first so
        // the general string arms below don't swallow it.
        if src == FieldType::Json {
            let FieldValue::String(s) = value else {
                return Err(fail(format!(
                    "json value is {}, not a string",
                    value.field_type()
                )));
            };
            return match dst {
                FieldType::Object => match serde_json::from_str::<Json>(s) {
                    Ok(Json::Object(map)) => Ok(FieldValue::Object(map)),
                    Ok(other) => Err(fail(format!("json is {}, not an object", json_kind(&other)))),
                    Err(e) => Err(fail(format!("invalid json: {e}"))),
                },
                FieldType::Array => match serde_json::from_str::<Json>(s) {
                    Ok(Json::Array(items)) => Ok(FieldValue::Array(
                        items.iter().map(json_element).collect::<Result<_, _>>()?,
                    )),
                    Ok(other) => Err(fail(format!("json is {}, not an array", json_kind(&other)))),
                    Err(e) => Err(fail(format!("invalid json: {e}"))),
                },
                FieldType::String => Ok(value.clone()),
                _ => Err(fail("json converts only to object, array or string".into())),
            };
        }

        match (value, dst) {
            // string → *
            (FieldValue::String(s), FieldType::Number) => s
                .trim()
                .parse::<f64>()
                .map(FieldValue::Number)
                .map_err(|e| fail(format!("'{s}' is not numeric: {e}"))),
            (FieldValue::String(s), FieldType::Boolean) => {
                match s.trim().to_ascii_lowercase().as_str() {
                    "true" | "1" => Ok(FieldValue::Boolean(true)),
                    "false" | "0" => Ok(FieldValue::Boolean(false)),
                    other => Err(fail(format!("'{other}' is not a boolean"))),
                }
            }
            (FieldValue::String(s), FieldType::Date) => {
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(FieldValue::Date)
                    .map_err(|e| fail(format!("'{s}' is not an ISO-8601 date: {e}")))
            }
            (FieldValue::String(s), FieldType::DateTime) => {
                DateTime::parse_from_rfc3339(s.trim())
                    .map(|dt| FieldValue::DateTime(dt.with_timezone(&Utc)))
                    .map_err(|e| fail(format!("'{s}' is not an RFC 3339 datetime: {e}")))
            }
            (FieldValue::String(s), FieldType::Array) => {
                let items = s
                    .split(self.array_delimiter.as_str())
                    .map(|part| FieldValue::String(part.trim().to_string()))
                    .collect();
                Ok(FieldValue::Array(items))
            }
            // string → json: a serialized form is just the string itself
            (FieldValue::String(_), FieldType::Json) => Ok(value.clone()),

            // number / boolean / date / datetime → string
            (FieldValue::Number(_), FieldType::String)
            | (FieldValue::Boolean(_), FieldType::String)
            | (FieldValue::Date(_), FieldType::String)
            | (FieldValue::DateTime(_), FieldType::String) => {
                Ok(FieldValue::String(value.canonical_string()))
            }

            // array → string / json
            (FieldValue::Array(items), FieldType::String) => {
                let joined = items
                    .iter()
                    .map(FieldValue::canonical_string)
                    .collect::<Vec<_>>()
                    .join(&self.array_delimiter);
                Ok(FieldValue::String(joined))
            }
            (FieldValue::Array(_), FieldType::Json) => {
                Ok(FieldValue::String(value.to_canonical_json().to_string()))
            }

            // object → json
            (FieldValue::Object(map), FieldType::Json) => {
                Ok(FieldValue::String(Json::Object(map.clone()).to_string()))
            }

            (actual, _) => Err(fail(format!(
                "no conversion from {} value",
                actual.field_type()
            ))),
        }
    }

    /// Apply the named transform from the registry.
    pub fn apply_transform(
        &self,
        name: &str,
        value: &FieldValue,
    ) -> Result<FieldValue, TransformError> {
        let f = self
            .registry
            .get(name)
            .ok_or_else(|| TransformError::UnknownTransform(name.to_string()))?;
        f(value)
    }

    /// Map an item's fields into the opposite schema.
    ///
    /// Emits only fields reachable on `leg`: reverse legs skip
    /// non-bidirectional mappings. A conversion failure substitutes the
    /// mapping's `default_value` (with a warning) when one exists; a
    /// missing required field without a default fails the item.
    pub fn map_item(
        &self,
        item: &SyncItem,
        mappings: &[FieldMapping],
        leg: MappingLeg,
    ) -> Result<BTreeMap<String, FieldValue>, TransformError> {
        let mut mapped = BTreeMap::new();

        for mapping in mappings {
            let m;
            let m = match leg {
                MappingLeg::Forward => mapping,
                MappingLeg::Reverse => {
                    if !mapping.bidirectional {
                        continue;
                    }
                    m = mapping.reversed();
                    &m
                }
            };

            let value = match item.field(&m.source_field) {
                Some(value) => {
                    let converted = match self.convert(value, m.source_type, m.target_type) {
                        Ok(v) => v,
                        Err(err @ TransformError::TypeConversion { .. }) => {
                            match &m.default_value {
                                Some(default) => {
                                    warn!(
                                        item = %item.external_id,
                                        field = %m.source_field,
                                        error = %err,
                                        "Conversion failed, substituting default value"
                                    );
                                    default.clone()
                                }
                                None => return Err(err),
                            }
                        }
                        Err(err) => return Err(err),
                    };
                    match (&m.transform, leg) {
                        (Some(name), MappingLeg::Forward) => {
                            self.apply_transform(name, &converted)?
                        }
                        _ => converted,
                    }
                }
                None => match &m.default_value {
                    Some(default) => default.clone(),
                    None if m.required => {
                        return Err(TransformError::MissingRequiredField(
                            m.source_field.clone(),
                        ))
                    }
                    None => continue,
                },
            };

            mapped.insert(m.target_field.clone(), value);
        }

        Ok(mapped)
    }
}

fn json_kind(v: &Json) -> &'static str {
    match v {
        Json::Null => "null",
        Json::Bool(_) => "a boolean",
        Json::Number(_) => "a number",
        Json::String(_) => "a string",
        Json::Array(_) => "an array",
        Json::Object(_) => "an object",
    }
}

fn json_element(v: &Json) -> Result<FieldValue, TransformError> {
    let fail = |detail: String| TransformError::TypeConversion {
        src: "json",
        dst: "array",
        detail,
    };
    match v {
        Json::String(s) => Ok(FieldValue::String(s.clone())),
        Json::Number(n) => n
            .as_f64()
            .map(FieldValue::Number)
            .ok_or_else(|| fail("non-finite number".into())),
        Json::Bool(b) => Ok(FieldValue::Boolean(*b)),
        Json::Object(map) => Ok(FieldValue::Object(map.clone())),
        Json::Array(items) => Ok(FieldValue::Array(
            items.iter().map(json_element).collect::<Result<_, _>>()?,
        )),
        Json::Null => Err(fail("null element".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FieldMapping;
    use chrono::TimeZone;

    fn transformer() -> FieldTransformer {
        FieldTransformer::new(TransformRegistry::new())
    }

    #[test]
    fn test_identity_conversion() {
        let v = FieldValue::String("hello".into());
        let out = transformer()
            .convert(&v, FieldType::String, FieldType::String)
            .unwrap();
        assert_eq!(out, v);
    }

    #[test]
    fn test_string_number_round_trip() {
        let t = transformer();
        let n = t
            .convert(
                &FieldValue::String("3.5".into()),
                FieldType::String,
                FieldType::Number,
            )
            .unwrap();
        assert_eq!(n, FieldValue::Number(3.5));

        let s = t
            .convert(&n, FieldType::Number, FieldType::String)
            .unwrap();
        assert_eq!(s, FieldValue::String("3.5".into()));
    }

    #[test]
    fn test_string_boolean_case_insensitive() {
        let t = transformer();
        for (input, expected) in [("TRUE", true), ("false", false), ("1", true), ("0", false)] {
            let out = t
                .convert(
                    &FieldValue::String(input.into()),
                    FieldType::String,
                    FieldType::Boolean,
                )
                .unwrap();
            assert_eq!(out, FieldValue::Boolean(expected), "input {input}");
        }
    }

    #[test]
    fn test_bad_boolean_fails() {
        let err = transformer()
            .convert(
                &FieldValue::String("yes".into()),
                FieldType::String,
                FieldType::Boolean,
            )
            .unwrap_err();
        assert!(matches!(err, TransformError::TypeConversion { .. }));
    }

    #[test]
    fn test_array_string_join_split() {
        let t = transformer();
        let arr = FieldValue::Array(vec!["a".into(), "b".into(), "c".into()]);
        let joined = t
            .convert(&arr, FieldType::Array, FieldType::String)
            .unwrap();
        assert_eq!(joined, FieldValue::String("a,b,c".into()));

        let back = t
            .convert(&joined, FieldType::String, FieldType::Array)
            .unwrap();
        assert_eq!(back, arr);
    }

    #[test]
    fn test_array_string_custom_delimiter() {
        let t = transformer().with_delimiter("; ");
        let arr = FieldValue::Array(vec!["x".into(), "y".into()]);
        let joined = t
            .convert(&arr, FieldType::Array, FieldType::String)
            .unwrap();
        assert_eq!(joined, FieldValue::String("x; y".into()));
    }

    #[test]
    fn test_object_json_round_trip() {
        let t = transformer();
        let mut map = serde_json::Map::new();
        map.insert("k".into(), serde_json::json!("v"));
        let obj = FieldValue::Object(map.clone());

        let json = t.convert(&obj, FieldType::Object, FieldType::Json).unwrap();
        assert_eq!(json, FieldValue::String(r#"{"k":"v"}"#.into()));

        let back = t.convert(&json, FieldType::Json, FieldType::Object).unwrap();
        assert_eq!(back, FieldValue::Object(map));
    }

    #[test]
    fn test_json_to_object_rejects_non_object() {
        let err = transformer()
            .convert(
                &FieldValue::String("[1,2]".into()),
                FieldType::Json,
                FieldType::Object,
            )
            .unwrap_err();
        assert!(matches!(err, TransformError::TypeConversion { .. }));
    }

    #[test]
    fn test_datetime_string_round_trip() {
        let t = transformer();
        let dt = FieldValue::DateTime(Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap());

        let s = t
            .convert(&dt, FieldType::DateTime, FieldType::String)
            .unwrap();
        assert_eq!(s, FieldValue::String("2025-06-01T12:00:00Z".into()));

        let back = t
            .convert(&s, FieldType::String, FieldType::DateTime)
            .unwrap();
        assert_eq!(back, dt);
    }

    #[test]
    fn test_date_string_round_trip() {
        let t = transformer();
        let d = FieldValue::Date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        let s = t.convert(&d, FieldType::Date, FieldType::String).unwrap();
        let back = t.convert(&s, FieldType::String, FieldType::Date).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_unknown_transform() {
        let err = transformer()
            .apply_transform("nope", &FieldValue::Boolean(true))
            .unwrap_err();
        assert!(matches!(err, TransformError::UnknownTransform(name) if name == "nope"));
    }

    #[test]
    fn test_registered_transform_applies() {
        let mut registry = TransformRegistry::new();
        registry.register("status_map", |v| match v {
            FieldValue::String(s) if s == "To Do" => Ok(FieldValue::String("open".into())),
            other => Ok(other.clone()),
        });
        let t = FieldTransformer::new(registry);

        let out = t
            .apply_transform("status_map", &FieldValue::String("To Do".into()))
            .unwrap();
        assert_eq!(out, FieldValue::String("open".into()));
    }

    #[test]
    fn test_registries_are_isolated() {
        let mut a = TransformRegistry::new();
        a.register("only_in_a", |v| Ok(v.clone()));
        let ta = FieldTransformer::new(a);
        let tb = FieldTransformer::new(TransformRegistry::new());

        assert!(ta.apply_transform("only_in_a", &FieldValue::Boolean(true)).is_ok());
        assert!(tb.apply_transform("only_in_a", &FieldValue::Boolean(true)).is_err());
    }

    fn mapping(src: &str, dst: &str) -> FieldMapping {
        FieldMapping::new(src, dst, FieldType::String)
    }

    #[test]
    fn test_map_item_renames_fields() {
        let item = SyncItem::new("X1", "jira").with_field("summary", "Bug A");
        let mapped = transformer()
            .map_item(&item, &[mapping("summary", "title")], MappingLeg::Forward)
            .unwrap();
        assert_eq!(
            mapped.get("title"),
            Some(&FieldValue::String("Bug A".into()))
        );
        assert!(!mapped.contains_key("summary"));
    }

    #[test]
    fn test_map_item_missing_required_fails() {
        let item = SyncItem::new("X1", "jira");
        let mut m = mapping("summary", "title");
        m.required = true;
        let err = transformer()
            .map_item(&item, &[m], MappingLeg::Forward)
            .unwrap_err();
        assert!(matches!(err, TransformError::MissingRequiredField(f) if f == "summary"));
    }

    #[test]
    fn test_map_item_missing_with_default_substitutes() {
        let item = SyncItem::new("X1", "jira");
        let mut m = mapping("status", "state");
        m.required = true;
        m.default_value = Some(FieldValue::String("open".into()));
        let mapped = transformer()
            .map_item(&item, &[m], MappingLeg::Forward)
            .unwrap();
        assert_eq!(mapped.get("state"), Some(&FieldValue::String("open".into())));
    }

    #[test]
    fn test_map_item_missing_optional_omitted() {
        let item = SyncItem::new("X1", "jira");
        let mapped = transformer()
            .map_item(&item, &[mapping("status", "state")], MappingLeg::Forward)
            .unwrap();
        assert!(mapped.is_empty());
    }

    #[test]
    fn test_map_item_conversion_failure_uses_default() {
        let item = SyncItem::new("X1", "jira").with_field("count", "not-a-number");
        let mut m = FieldMapping::new("count", "count", FieldType::String);
        m.target_type = FieldType::Number;
        m.default_value = Some(FieldValue::Number(0.0));
        let mapped = transformer()
            .map_item(&item, &[m], MappingLeg::Forward)
            .unwrap();
        assert_eq!(mapped.get("count"), Some(&FieldValue::Number(0.0)));
    }

    #[test]
    fn test_map_item_reverse_skips_one_way_mappings() {
        let item = SyncItem::new("X1", "github")
            .with_field("title", "Bug A")
            .with_field("notes", "internal");
        let two_way = mapping("summary", "title");
        let mut one_way = mapping("comment", "notes");
        one_way.bidirectional = false;

        let mapped = transformer()
            .map_item(&item, &[two_way, one_way], MappingLeg::Reverse)
            .unwrap();

        assert!(mapped.contains_key("summary"));
        assert!(!mapped.contains_key("comment"));
    }

    #[test]
    fn test_map_item_reverse_skips_named_transform() {
        let mut registry = TransformRegistry::new();
        registry.register("status_map", |_| {
            panic!("transform must not run on the reverse leg")
        });
        let t = FieldTransformer::new(registry);

        let item = SyncItem::new("X1", "github").with_field("state", "open");
        let mut m = mapping("status", "state");
        m.transform = Some("status_map".into());

        let mapped = t.map_item(&item, &[m], MappingLeg::Reverse).unwrap();
        assert_eq!(
            mapped.get("status"),
            Some(&FieldValue::String("open".into()))
        );
    }
}
