// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for a reconciliation run.
//!
//! Parsing the configuration document (YAML, JSON, ...) is the caller's
//! concern; this module defines the parsed structure and the pre-run
//! validation that is the engine's only fatal error surface.
//!
//! # Example
//!
//! ```
//! use reconciler::{SyncConfiguration, FieldMapping, FieldType, SyncDirection};
//!
//! let config = SyncConfiguration {
//!     name: "jira-to-github".into(),
//!     source_platform: "jira".into(),
//!     target_platform: "github".into(),
//!     direction: SyncDirection::SourceToTarget,
//!     mappings: vec![FieldMapping::new("summary", "title", FieldType::String)],
//!     ..Default::default()
//! };
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.batch_size, 10); // default
//! ```

use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::conflict::ConflictRecord;
use crate::error::ConfigError;
use crate::sync_item::SyncItem;
use crate::value::{FieldType, FieldValue};

/// Which way fields flow during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    SourceToTarget,
    TargetToSource,
    Bidirectional,
}

/// Tie-break policy for `LastWriteWins` when both sides carry an identical
/// `last_modified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    PreferSource,
    PreferTarget,
}

/// Signature for a caller-supplied resolver.
///
/// Receives both raw items plus the detected conflicts and returns the
/// merged data map to write. An `Err` downgrades that one item to `Failed`
/// without aborting the run.
pub type CustomResolver = Arc<
    dyn Fn(&SyncItem, &SyncItem, &[ConflictRecord]) -> Result<BTreeMap<String, FieldValue>, String>
        + Send
        + Sync,
>;

/// Conflict resolution strategy.
///
/// A closed tagged union: the engine dispatches by matching the tag, never
/// by comparing strategy names. `Custom` is injected programmatically and
/// cannot appear in a configuration document.
#[derive(Clone)]
pub enum ConflictStrategy {
    /// Per conflicting field, the side with the later `last_modified` wins.
    LastWriteWins,
    /// Source value wins for every conflicting field.
    SourceWins,
    /// Target value wins for every conflicting field.
    TargetWins,
    /// Never resolves; conflicted items are reported and not written.
    Manual,
    /// Caller-supplied resolver function.
    Custom(CustomResolver),
}

impl ConflictStrategy {
    /// Tag name, used in logs and audit records.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::LastWriteWins => "last_write_wins",
            Self::SourceWins => "source_wins",
            Self::TargetWins => "target_wins",
            Self::Manual => "manual",
            Self::Custom(_) => "custom",
        }
    }
}

impl std::fmt::Debug for ConflictStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

impl<'de> Deserialize<'de> for ConflictStrategy {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        match tag.as_str() {
            "last_write_wins" => Ok(Self::LastWriteWins),
            "source_wins" => Ok(Self::SourceWins),
            "target_wins" => Ok(Self::TargetWins),
            "manual" => Ok(Self::Manual),
            other => Err(serde::de::Error::custom(format!(
                "unknown conflict_strategy '{other}' \
                 (expected last_write_wins, source_wins, target_wins or manual)"
            ))),
        }
    }
}

/// One field correspondence between the two platforms.
#[derive(Debug, Clone, Deserialize)]
pub struct FieldMapping {
    pub source_field: String,
    pub target_field: String,
    pub source_type: FieldType,
    pub target_type: FieldType,
    /// Whether the mapping also applies on the target→source leg.
    #[serde(default = "default_true")]
    pub bidirectional: bool,
    /// A missing required field (with no default) fails the item.
    #[serde(default)]
    pub required: bool,
    /// Substituted when the field is missing or a conversion fails.
    #[serde(default)]
    pub default_value: Option<FieldValue>,
    /// Named custom transform, looked up in the engine's registry.
    #[serde(default)]
    pub transform: Option<String>,
}

impl FieldMapping {
    /// Same-type mapping with defaults (bidirectional, not required).
    pub fn new(
        source_field: impl Into<String>,
        target_field: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            source_field: source_field.into(),
            target_field: target_field.into(),
            source_type: field_type,
            target_type: field_type,
            bidirectional: true,
            required: false,
            default_value: None,
            transform: None,
        }
    }

    /// The same mapping viewed from the target side. Named transforms are
    /// dropped: they are not required to be invertible.
    #[must_use]
    pub fn reversed(&self) -> Self {
        Self {
            source_field: self.target_field.clone(),
            target_field: self.source_field.clone(),
            source_type: self.target_type,
            target_type: self.source_type,
            bidirectional: self.bidirectional,
            required: self.required,
            default_value: self.default_value.clone(),
            transform: None,
        }
    }
}

/// Configuration for one reconciliation run. Immutable once the run starts.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfiguration {
    pub name: String,
    pub source_platform: String,
    pub target_platform: String,
    pub direction: SyncDirection,
    #[serde(default = "default_strategy")]
    pub conflict_strategy: ConflictStrategy,
    #[serde(default = "default_tie_break")]
    pub tie_break: TieBreak,
    /// Max in-flight item pipelines (concurrency bound, not a transaction).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Total attempts per external write, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// Initial backoff delay; doubles each retry.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    pub mappings: Vec<FieldMapping>,
    #[serde(default = "default_true")]
    pub enable_audit: bool,
    /// Compute and report decisions without writing anything.
    #[serde(default)]
    pub dry_run: bool,
    /// Array↔string conversions join/split on this delimiter.
    #[serde(default = "default_delimiter")]
    pub array_delimiter: String,
}

fn default_true() -> bool {
    true
}
fn default_strategy() -> ConflictStrategy {
    ConflictStrategy::Manual
}
fn default_tie_break() -> TieBreak {
    TieBreak::PreferSource
}
fn default_batch_size() -> usize {
    10
}
fn default_max_retries() -> usize {
    3
}
fn default_retry_delay_ms() -> u64 {
    1000
}
fn default_delimiter() -> String {
    ",".to_string()
}

impl Default for SyncConfiguration {
    fn default() -> Self {
        Self {
            name: String::new(),
            source_platform: String::new(),
            target_platform: String::new(),
            direction: SyncDirection::SourceToTarget,
            conflict_strategy: default_strategy(),
            tie_break: default_tie_break(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            mappings: Vec::new(),
            enable_audit: true,
            dry_run: false,
            array_delimiter: default_delimiter(),
        }
    }
}

impl SyncConfiguration {
    /// Initial retry delay as a [`Duration`].
    #[must_use]
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Validate before any item is processed.
    ///
    /// This is the only place the engine aborts a run. Unknown strategy
    /// tags are already rejected at deserialize time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source_platform.is_empty() {
            return Err(ConfigError::EmptyPlatform { side: "source" });
        }
        if self.target_platform.is_empty() {
            return Err(ConfigError::EmptyPlatform { side: "target" });
        }
        if self.source_platform == self.target_platform {
            return Err(ConfigError::SamePlatform {
                platform: self.source_platform.clone(),
            });
        }
        if self.batch_size == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.mappings.is_empty() {
            return Err(ConfigError::NoMappings {
                name: self.name.clone(),
            });
        }
        let mut seen = HashSet::new();
        for m in &self.mappings {
            if m.source_field.is_empty() {
                return Err(ConfigError::EmptyFieldName { side: "source" });
            }
            if m.target_field.is_empty() {
                return Err(ConfigError::EmptyFieldName { side: "target" });
            }
            if !seen.insert(m.target_field.as_str()) {
                return Err(ConfigError::DuplicateMapping {
                    field: m.target_field.clone(),
                });
            }
        }
        Ok(())
    }
}
