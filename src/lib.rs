//! # Reconciler
//!
//! A reconciliation engine for keeping items in sync between two
//! heterogeneous platforms (issue trackers, CRMs, inventory systems).
//!
//! ## Architecture
//!
//! Each run pairs items by external id and pushes every pair through an
//! independent pipeline:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Platform Clients                       │
//! │  • SyncClient trait: fetch / create / update                │
//! │  • Writes wrapped in bounded exponential-backoff retry      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Change Tracker                         │
//! │  • SHA-256 checksum over the mapped-field subset            │
//! │  • Unchanged pairs skip the pipeline entirely               │
//! │  • State persisted atomically between runs                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Transform → Detect → Resolve                  │
//! │  • Field renames, type conversions, named transforms        │
//! │  • Per-field conflict records with both sides' values       │
//! │  • Strategy union: last-write-wins, source/target wins,     │
//! │    manual, custom resolver                                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Write + Audit + Report                   │
//! │  • One SyncResult and one audit entry per pair              │
//! │  • Dry-run computes changes without touching anything       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use reconciler::{
//!     ChangeTracker, FieldMapping, FieldType, InMemoryClient, MemoryAuditLog,
//!     SyncConfiguration, SyncEngine, TransformRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = SyncConfiguration {
//!         name: "jira-to-github".into(),
//!         source_platform: "jira".into(),
//!         target_platform: "github".into(),
//!         mappings: vec![
//!             FieldMapping::new("summary", "title", FieldType::String),
//!             FieldMapping::new("status", "state", FieldType::String),
//!         ],
//!         ..Default::default()
//!     };
//!
//!     let engine = SyncEngine::new(
//!         config,
//!         TransformRegistry::new(),
//!         ChangeTracker::load("sync-state.json").await,
//!         Arc::new(InMemoryClient::new("jira")),
//!         Arc::new(InMemoryClient::new("github")),
//!         Arc::new(MemoryAuditLog::new()),
//!     )
//!     .expect("invalid configuration");
//!
//!     let report = engine.sync_all().await;
//!     println!(
//!         "synced {} failed {} conflicts {}",
//!         report.state.items_synced,
//!         report.state.items_failed,
//!         report.state.unresolved_conflicts.len()
//!     );
//! }
//! ```
//!
//! ## Features
//!
//! - **Field Mapping**: Renames plus type conversions across a closed type set
//! - **Change Detection**: Checksum-based skip of unchanged items
//! - **Conflict Handling**: Per-field detection with pluggable resolution
//! - **Bidirectional Sync**: Forward and reverse legs over the same mappings
//! - **Bounded Retries**: Exponential backoff with an injectable clock
//! - **Dry Run**: Full pipeline without writes or state changes
//! - **Audit Trail**: Queryable per-item history, in memory or JSONL
//!
//! ## Modules
//!
//! - [`engine`]: The [`SyncEngine`] orchestrating a run
//! - [`transform`]: Type conversions and named custom transforms
//! - [`tracker`]: Checksum-based change detection with persisted state
//! - [`conflict`]: Conflict detection and strategy dispatch
//! - [`audit`]: Audit sinks (memory, JSONL)
//! - [`clients`]: The [`SyncClient`] trait and an in-memory implementation
//! - [`resilience`]: Bounded retry with exponential backoff

pub mod audit;
pub mod clients;
pub mod config;
pub mod conflict;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod resilience;
pub mod sync_item;
pub mod tracker;
pub mod transform;
pub mod value;

pub use audit::{AuditSink, JsonlAuditLog, MemoryAuditLog};
pub use clients::{InMemoryClient, SyncClient};
pub use config::{
    ConflictStrategy, CustomResolver, FieldMapping, SyncConfiguration, SyncDirection, TieBreak,
};
pub use conflict::{ConflictRecord, Resolution};
pub use engine::{CancelHandle, RunReport, SyncEngine, SyncResult, SyncState, SyncStatus};
pub use error::{
    AuditWriteError, ClientError, ConfigError, ItemError, StateError, TransformError,
};
pub use resilience::{retry, Exhausted, RetryPolicy, Sleeper, TokioSleeper};
pub use sync_item::SyncItem;
pub use tracker::{ChangeTracker, TrackedEntry};
pub use transform::{FieldTransformer, MappingLeg, TransformFn, TransformRegistry};
pub use value::{FieldType, FieldValue};
