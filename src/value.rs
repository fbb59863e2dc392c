// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Typed field values and the closed type set.
//!
//! Item `data` maps field names to a [`FieldValue`], a small closed variant
//! set. Keeping the set closed means the conversion table in
//! [`crate::transform`] is an exhaustive match rather than runtime type
//! inspection, and adding a variant is a compile error until every
//! conversion is decided.
//!
//! # Example
//!
//! ```
//! use reconciler::FieldValue;
//!
//! let v = FieldValue::Number(42.0);
//! assert_eq!(v.canonical_string(), "42");
//!
//! // 1.0 and 1 normalize to the same canonical form
//! assert!(FieldValue::Number(1.0).normalized_eq(&FieldValue::Number(1.0)));
//! ```

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// The closed set of field types a mapping may declare.
///
/// `Json` is not a value variant: it names the serialized-string form used
/// by object/array↔json conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    DateTime,
    Array,
    Object,
    Json,
}

impl FieldType {
    /// Static name, used in conversion error messages.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::DateTime => "datetime",
            Self::Array => "array",
            Self::Object => "object",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A typed field value.
///
/// Serialized form is externally tagged (`{"type": "number", "value": 42}`)
/// so audit records and state files round-trip without type guessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Object(serde_json::Map<String, Json>),
}

impl FieldValue {
    /// The [`FieldType`] tag this value carries.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::String(_) => FieldType::String,
            Self::Number(_) => FieldType::Number,
            Self::Boolean(_) => FieldType::Boolean,
            Self::Date(_) => FieldType::Date,
            Self::DateTime(_) => FieldType::DateTime,
            Self::Array(_) => FieldType::Array,
            Self::Object(_) => FieldType::Object,
        }
    }

    /// Canonical JSON form.
    ///
    /// Dates render as ISO-8601 strings, datetimes as RFC 3339 at second
    /// precision in UTC, and integral numbers as JSON integers so `1.0`
    /// and `1` share one canonical form. Used by checksums and by
    /// normalized comparison in the conflict detector.
    #[must_use]
    pub fn to_canonical_json(&self) -> Json {
        match self {
            Self::String(s) => Json::String(s.clone()),
            Self::Number(n) => canonical_number(*n),
            Self::Boolean(b) => Json::Bool(*b),
            Self::Date(d) => Json::String(d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => {
                Json::String(dt.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            Self::Array(items) => {
                Json::Array(items.iter().map(Self::to_canonical_json).collect())
            }
            Self::Object(map) => Json::Object(map.clone()),
        }
    }

    /// Canonical string form (compact JSON of [`Self::to_canonical_json`],
    /// minus the quotes for plain strings).
    #[must_use]
    pub fn canonical_string(&self) -> String {
        match self.to_canonical_json() {
            Json::String(s) => s,
            other => other.to_string(),
        }
    }

    /// Value equality after canonicalization.
    #[must_use]
    pub fn normalized_eq(&self, other: &Self) -> bool {
        self.to_canonical_json() == other.to_canonical_json()
    }
}

fn canonical_number(n: f64) -> Json {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Json::Number((n as i64).into())
    } else {
        serde_json::Number::from_f64(n)
            .map(Json::Number)
            .unwrap_or(Json::Null)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for FieldValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for FieldValue {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}
