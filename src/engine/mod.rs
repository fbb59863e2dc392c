// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync engine orchestrator.
//!
//! Drives one reconciliation cycle: pairs items by `external_id`, consults
//! the change tracker, runs transform → detect → resolve per item, performs
//! retried writes through the injected clients, audits every outcome and
//! aggregates a run-level [`SyncState`].
//!
//! # Per-item state machine
//!
//! ```text
//! Pending → Skipped
//! Pending → Transforming → Detecting → Clean      → Writing → Completed
//!                                    → Conflicted → Resolving → Completed | Conflict
//! Failed is reachable from any stage on error.
//! ```
//!
//! Items are independent tasks bounded by `batch_size`; one item's failure
//! never aborts the run. No two tasks share an `external_id` (pairing
//! guarantees it). Cancelling a run stops dispatching new items but lets
//! in-flight pipelines finish.

mod types;

pub use types::{RunReport, SyncResult, SyncState, SyncStatus};

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::audit::AuditSink;
use crate::clients::SyncClient;
use crate::config::{FieldMapping, SyncConfiguration, SyncDirection};
use crate::conflict::{self, ConflictRecord, Resolution};
use crate::error::{ClientError, ConfigError, ItemError};
use crate::resilience::retry::{retry, RetryPolicy, Sleeper, TokioSleeper};
use crate::sync_item::SyncItem;
use crate::tracker::ChangeTracker;
use crate::transform::{FieldTransformer, MappingLeg, TransformRegistry};
use crate::value::FieldValue;

/// Cancels a run in progress. Cheap to clone and send across tasks.
#[derive(Clone)]
pub struct CancelHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Stop dispatching new items. In-flight item pipelines finish and are
    /// reported normally.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Everything an item pipeline needs. Shared across item tasks.
struct ItemContext {
    config: SyncConfiguration,
    transformer: FieldTransformer,
    tracker: Arc<RwLock<ChangeTracker>>,
    source: Arc<dyn SyncClient>,
    target: Arc<dyn SyncClient>,
    sleeper: Arc<dyn Sleeper>,
    policy: RetryPolicy,
}

/// Main orchestrator for one source/target pairing.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use reconciler::{
///     InMemoryClient, MemoryAuditLog, SyncConfiguration, SyncEngine,
///     ChangeTracker, TransformRegistry,
/// };
///
/// # async fn example(config: SyncConfiguration) -> Result<(), reconciler::ConfigError> {
/// let engine = SyncEngine::new(
///     config,
///     TransformRegistry::new(),
///     ChangeTracker::new(),
///     Arc::new(InMemoryClient::new("jira")),
///     Arc::new(InMemoryClient::new("github")),
///     Arc::new(MemoryAuditLog::new()),
/// )?;
/// let report = engine.sync_all().await;
/// println!("synced {}", report.state.items_synced);
/// # Ok(())
/// # }
/// ```
pub struct SyncEngine {
    config: SyncConfiguration,
    transformer_registry: TransformRegistry,
    tracker: Arc<RwLock<ChangeTracker>>,
    source: Arc<dyn SyncClient>,
    target: Arc<dyn SyncClient>,
    audit: Arc<dyn AuditSink>,
    sleeper: Arc<dyn Sleeper>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl SyncEngine {
    /// Build an engine. Validates the configuration; this is the only
    /// fatal error surface, nothing discovered mid-batch aborts a run.
    pub fn new(
        config: SyncConfiguration,
        registry: TransformRegistry,
        tracker: ChangeTracker,
        source: Arc<dyn SyncClient>,
        target: Arc<dyn SyncClient>,
        audit: Arc<dyn AuditSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Ok(Self {
            config,
            transformer_registry: registry,
            tracker: Arc::new(RwLock::new(tracker)),
            source,
            target,
            audit,
            sleeper: Arc::new(TokioSleeper),
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        })
    }

    /// Replace the backoff sleeper (tests use a recording fake).
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Handle for cancelling a run from another task.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            tx: self.cancel_tx.clone(),
        }
    }

    /// Fetch from both clients, then [`run`](Self::run).
    ///
    /// If either fetch fails after retries the run is abandoned with an
    /// empty report: a missing side must not be mistaken for a deleted
    /// one, especially under bidirectional creates.
    pub async fn sync_all(&self) -> RunReport {
        let policy = self.retry_policy();
        let source_items = match retry("fetch_source", &policy, self.sleeper.as_ref(), || {
            self.source.fetch_items()
        })
        .await
        {
            Ok((items, _)) => items,
            Err(exhausted) => {
                error!(error = %exhausted.error, "Source fetch failed, abandoning run");
                return self.empty_report();
            }
        };
        let target_items = match retry("fetch_target", &policy, self.sleeper.as_ref(), || {
            self.target.fetch_items()
        })
        .await
        {
            Ok((items, _)) => items,
            Err(exhausted) => {
                error!(error = %exhausted.error, "Target fetch failed, abandoning run");
                return self.empty_report();
            }
        };
        self.run(source_items, target_items).await
    }

    fn empty_report(&self) -> RunReport {
        RunReport {
            state: SyncState::aggregate(
                uuid::Uuid::new_v4().to_string(),
                self.config.dry_run,
                &[],
            ),
            results: Vec::new(),
        }
    }

    /// Run one reconciliation cycle over the supplied items.
    ///
    /// Every input pair yields exactly one [`SyncResult`] and (when audit
    /// is enabled) one audit entry. Results come back in pairing order.
    #[tracing::instrument(skip_all, fields(config = %self.config.name, run_id))]
    pub async fn run(&self, source_items: Vec<SyncItem>, target_items: Vec<SyncItem>) -> RunReport {
        let started = Instant::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        tracing::Span::current().record("run_id", run_id.as_str());

        info!(
            source_items = source_items.len(),
            target_items = target_items.len(),
            direction = ?self.config.direction,
            strategy = self.config.conflict_strategy.tag(),
            dry_run = self.config.dry_run,
            "Starting reconciliation run"
        );

        let pairs = pair_by_external_id(source_items, target_items);
        let ctx = Arc::new(ItemContext {
            config: self.config.clone(),
            transformer: FieldTransformer::new(self.transformer_registry.clone())
                .with_delimiter(self.config.array_delimiter.clone()),
            tracker: self.tracker.clone(),
            source: self.source.clone(),
            target: self.target.clone(),
            sleeper: self.sleeper.clone(),
            policy: self.retry_policy(),
        });

        let semaphore = Arc::new(Semaphore::new(self.config.batch_size));
        let mut tasks: JoinSet<(usize, SyncResult)> = JoinSet::new();
        let mut dispatched = 0usize;

        for (index, (id, (source, target))) in pairs.into_iter().enumerate() {
            if *self.cancel_rx.borrow() {
                warn!(dispatched, "Run cancelled, not dispatching remaining items");
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break; // semaphore closed, engine dropped
            };
            let ctx = ctx.clone();
            dispatched += 1;
            tasks.spawn(async move {
                let _permit = permit;
                let result = process_pair(ctx, &id, source, target).await;
                (index, result)
            });
        }

        let mut indexed = Vec::with_capacity(dispatched);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(entry) => indexed.push(entry),
                Err(e) => error!(error = %e, "Item task aborted"),
            }
        }
        indexed.sort_by_key(|(index, _)| *index);
        let results: Vec<SyncResult> = indexed.into_iter().map(|(_, r)| r).collect();

        for result in &results {
            crate::metrics::record_item(result.status);
            crate::metrics::record_conflicts(result.conflicts.len());
            if self.config.enable_audit {
                if let Err(e) = self.audit.log(result).await {
                    warn!(item = %result.item_id, error = %e, "Audit write failed (non-fatal)");
                }
            }
        }

        if !self.config.dry_run {
            let snapshot = self.tracker.read().clone();
            if let Err(e) = snapshot.save().await {
                warn!(error = %e, "Failed to persist tracker state");
            }
        }

        let state = SyncState::aggregate(run_id, self.config.dry_run, &results);
        crate::metrics::record_run_duration(started.elapsed());
        crate::metrics::set_last_run_items(state.total());
        crate::metrics::set_last_run_unresolved(state.unresolved_conflicts.len());

        info!(
            synced = state.items_synced,
            failed = state.items_failed,
            skipped = state.items_skipped,
            conflicted = state.items_conflicted,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run complete"
        );

        RunReport { state, results }
    }

    /// History for one item from the configured audit sink.
    pub async fn audit_history(
        &self,
        item_id: &str,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<SyncResult>, crate::error::AuditWriteError> {
        self.audit.query(item_id, since).await
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.config.max_retries, self.config.retry_delay())
    }
}

/// Pair source and target items by external id, preserving first-seen
/// order of the source list then remaining targets.
fn pair_by_external_id(
    source_items: Vec<SyncItem>,
    target_items: Vec<SyncItem>,
) -> Vec<(String, (Option<SyncItem>, Option<SyncItem>))> {
    let mut order: Vec<String> = Vec::new();
    let mut pairs: BTreeMap<String, (Option<SyncItem>, Option<SyncItem>)> = BTreeMap::new();

    for item in source_items {
        let id = item.external_id.clone();
        if !pairs.contains_key(&id) {
            order.push(id.clone());
        }
        pairs.entry(id).or_insert((None, None)).0 = Some(item);
    }
    for item in target_items {
        let id = item.external_id.clone();
        if !pairs.contains_key(&id) {
            order.push(id.clone());
        }
        pairs.entry(id).or_insert((None, None)).1 = Some(item);
    }

    order
        .into_iter()
        .filter_map(|id| pairs.remove(&id).map(|pair| (id, pair)))
        .collect()
}

/// Raw values of the mapped-field subset on both sides, key-prefixed per
/// side. This is exactly what the change checksum covers.
fn tracked_subset(
    source: Option<&SyncItem>,
    target: Option<&SyncItem>,
    mappings: &[FieldMapping],
) -> BTreeMap<String, FieldValue> {
    let mut subset = BTreeMap::new();
    if let Some(item) = source {
        for m in mappings {
            if let Some(v) = item.field(&m.source_field) {
                subset.insert(format!("source/{}", m.source_field), v.clone());
            }
        }
    }
    if let Some(item) = target {
        for m in mappings {
            if let Some(v) = item.field(&m.target_field) {
                subset.insert(format!("target/{}", m.target_field), v.clone());
            }
        }
    }
    subset
}

/// Which way a single leg writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    /// Write the source's view into the target.
    Forward,
    /// Write the target's view into the source.
    Reverse,
}

/// What one leg wants to write, computed before any write happens. All
/// legs of a pair are planned first so an unresolved conflict on either
/// leg can suppress every write for the item.
struct LegPlan {
    leg: Leg,
    changes: BTreeMap<String, FieldValue>,
    conflicts: Vec<ConflictRecord>,
    unresolved: bool,
}

#[tracing::instrument(skip_all, fields(item = %id, phase = "pending"))]
async fn process_pair(
    ctx: Arc<ItemContext>,
    id: &str,
    source: Option<SyncItem>,
    target: Option<SyncItem>,
) -> SyncResult {
    let started = Instant::now();
    let result = match (source, target, ctx.config.direction) {
        (Some(source), Some(target), _) => process_matched(&ctx, id, &source, &target).await,
        (Some(source), None, SyncDirection::SourceToTarget | SyncDirection::Bidirectional) => {
            process_create(&ctx, id, &source, Leg::Forward).await
        }
        (None, Some(target), SyncDirection::TargetToSource | SyncDirection::Bidirectional) => {
            process_create(&ctx, id, &target, Leg::Reverse).await
        }
        // Unmatched item with no work to do in this direction.
        (Some(_), None, SyncDirection::TargetToSource)
        | (None, Some(_), SyncDirection::SourceToTarget) => {
            debug!("No work for this direction");
            SyncResult::skipped(id)
        }
        (None, None, _) => SyncResult::skipped(id), // unreachable by pairing
    };
    crate::metrics::record_item_latency(started.elapsed());
    result
}

/// Pipeline for a pair present on both sides.
async fn process_matched(
    ctx: &ItemContext,
    id: &str,
    source: &SyncItem,
    target: &SyncItem,
) -> SyncResult {
    let span = tracing::Span::current();

    // Skip-if-unchanged before any transform work.
    let tracked = tracked_subset(Some(source), Some(target), &ctx.config.mappings);
    if !ctx.tracker.read().has_changed(id, &tracked) {
        span.record("phase", "skipped");
        debug!("Unchanged since last sync");
        return SyncResult::skipped(id);
    }

    let legs = match ctx.config.direction {
        SyncDirection::SourceToTarget => vec![Leg::Forward],
        SyncDirection::TargetToSource => vec![Leg::Reverse],
        SyncDirection::Bidirectional => vec![Leg::Forward, Leg::Reverse],
    };

    // Plan every leg before writing anything: an unresolved conflict on
    // one leg must leave the whole item untouched, including clean
    // additions the other leg would have written.
    let mut plans = Vec::with_capacity(legs.len());
    for leg in legs {
        match plan_leg(ctx, source, target, leg) {
            Ok(plan) => plans.push(plan),
            Err(error) => {
                span.record("phase", "failed");
                return SyncResult::failed(id, error, 0);
            }
        }
    }

    let conflicts: Vec<ConflictRecord> = plans
        .iter()
        .flat_map(|plan| plan.conflicts.iter().cloned())
        .collect();

    if plans.iter().any(|plan| plan.unresolved) {
        span.record("phase", "conflict");
        debug!(conflicts = conflicts.len(), "Unresolved conflicts, not writing");
        return SyncResult::conflict(id, conflicts);
    }

    let mut changes = BTreeMap::new();
    let mut retries = 0;
    let mut wrote = false;
    let mut updated_source = source.clone();
    let mut updated_target = target.clone();

    for plan in &plans {
        if plan.changes.is_empty() {
            continue;
        }
        changes.extend(plan.changes.clone());

        if ctx.config.dry_run {
            debug!(changes = plan.changes.len(), "Dry-run, skipping write");
            continue;
        }

        span.record("phase", "writing");
        let client = match plan.leg {
            Leg::Forward => &ctx.target,
            Leg::Reverse => &ctx.source,
        };
        match write_with_retry(ctx, client.as_ref(), id, &plan.changes).await {
            Ok(attempts) => {
                retries += attempts - 1;
                wrote = true;
                // Track each leg's writes on the side it touched.
                match plan.leg {
                    Leg::Forward => overlay(&mut updated_target, &plan.changes),
                    Leg::Reverse => overlay(&mut updated_source, &plan.changes),
                }
            }
            Err((error, leg_retries)) => {
                span.record("phase", "failed");
                return SyncResult::failed(id, error, retries + leg_retries);
            }
        }
    }

    if changes.is_empty() {
        // Mapped values already agree; refresh the checksum so the next
        // run takes the early-skip path.
        span.record("phase", "skipped");
        if !ctx.config.dry_run {
            ctx.tracker
                .write()
                .update(id, &tracked, chrono::Utc::now());
        }
        return SyncResult::skipped(id);
    }

    span.record("phase", "completed");
    if !ctx.config.dry_run && wrote {
        // Checksum over the post-write view, so an identical next run skips.
        let after =
            tracked_subset(Some(&updated_source), Some(&updated_target), &ctx.config.mappings);
        ctx.tracker.write().update(id, &after, chrono::Utc::now());
    }

    let mut result = SyncResult::completed(id, changes, retries);
    result.conflicts = conflicts;
    result
}

fn overlay(item: &mut SyncItem, changes: &BTreeMap<String, FieldValue>) {
    for (field, value) in changes {
        item.data.insert(field.clone(), value.clone());
    }
}

/// One direction of a matched pair: transform, diff, resolve. Produces a
/// write plan; the caller decides whether any plan actually executes.
fn plan_leg(
    ctx: &ItemContext,
    source: &SyncItem,
    target: &SyncItem,
    leg: Leg,
) -> Result<LegPlan, ItemError> {
    let span = tracing::Span::current();
    span.record("phase", "transforming");

    // `incoming` is the from-side's data in the write schema; `current`
    // is the item being written to.
    let (incoming, current, leg_mappings) = match leg {
        Leg::Forward => {
            let mapped = ctx
                .transformer
                .map_item(source, &ctx.config.mappings, MappingLeg::Forward)
                .map_err(ItemError::Transform)?;
            (mapped, target, ctx.config.mappings.clone())
        }
        Leg::Reverse => {
            let mapped = ctx
                .transformer
                .map_item(target, &ctx.config.mappings, MappingLeg::Reverse)
                .map_err(ItemError::Transform)?;
            let reversed: Vec<FieldMapping> = ctx
                .config
                .mappings
                .iter()
                .filter(|m| m.bidirectional)
                .map(FieldMapping::reversed)
                .collect();
            (mapped, source, reversed)
        }
    };

    span.record("phase", "detecting");
    let from_modified = match leg {
        Leg::Forward => source.last_modified,
        Leg::Reverse => target.last_modified,
    };
    let mut records = conflict::diff(&incoming, current, &leg_mappings, from_modified);

    // Normalize records so source_value/source_modified always refer to
    // the configured source platform, whichever way the leg points.
    if leg == Leg::Reverse {
        for record in &mut records {
            std::mem::swap(&mut record.source_value, &mut record.target_value);
            std::mem::swap(&mut record.source_modified, &mut record.target_modified);
        }
    }

    // Additions: non-conflicting fields the current side simply lacks.
    let conflicted: std::collections::HashSet<&str> =
        records.iter().map(|r| r.field.as_str()).collect();
    let mut changes: BTreeMap<String, FieldValue> = incoming
        .iter()
        .filter(|(field, _)| {
            current.field(field).is_none() && !conflicted.contains(field.as_str())
        })
        .map(|(field, value)| (field.clone(), value.clone()))
        .collect();

    if !records.is_empty() {
        span.record("phase", "resolving");
        // Source-platform values in the write schema, the merge base.
        let base = match leg {
            Leg::Forward => incoming.clone(),
            Leg::Reverse => leg_mappings
                .iter()
                .filter_map(|m| {
                    current
                        .field(&m.target_field)
                        .map(|v| (m.target_field.clone(), v.clone()))
                })
                .collect(),
        };

        match conflict::resolve(
            &ctx.config.conflict_strategy,
            ctx.config.tie_break,
            source,
            target,
            &base,
            &records,
        )? {
            Resolution::Unresolved => {
                return Ok(LegPlan {
                    leg,
                    changes: BTreeMap::new(),
                    conflicts: records,
                    unresolved: true,
                });
            }
            Resolution::Resolved(merged) => {
                // Conflicted fields are always written with their resolved
                // value; a winning absent side just drops the field.
                for record in &records {
                    if let Some(value) = merged.get(&record.field) {
                        changes.insert(record.field.clone(), value.clone());
                    }
                }
            }
        }
    }

    Ok(LegPlan {
        leg,
        changes,
        conflicts: records,
        unresolved: false,
    })
}

/// Unmatched item: create it on the other side, subject to direction.
async fn process_create(ctx: &ItemContext, id: &str, item: &SyncItem, leg: Leg) -> SyncResult {
    let span = tracing::Span::current();
    span.record("phase", "transforming");

    let mapping_leg = match leg {
        Leg::Forward => MappingLeg::Forward,
        Leg::Reverse => MappingLeg::Reverse,
    };
    let mapped = match ctx
        .transformer
        .map_item(item, &ctx.config.mappings, mapping_leg)
    {
        Ok(mapped) => mapped,
        Err(e) => {
            span.record("phase", "failed");
            return SyncResult::failed(id, ItemError::Transform(e), 0);
        }
    };

    if mapped.is_empty() {
        span.record("phase", "skipped");
        return SyncResult::skipped(id);
    }

    if ctx.config.dry_run {
        span.record("phase", "completed");
        debug!("Dry-run, skipping create");
        return SyncResult::completed(id, mapped, 0);
    }

    span.record("phase", "writing");
    let client = match leg {
        Leg::Forward => &ctx.target,
        Leg::Reverse => &ctx.source,
    };
    let outcome = retry(
        "create_item",
        &ctx.policy,
        ctx.sleeper.as_ref(),
        || client.create_item(id, &mapped),
    )
    .await;

    match outcome {
        Ok((_, attempts)) => {
            if attempts > 1 {
                crate::metrics::record_retry("create");
            }
            crate::metrics::record_write("create", "success");
            span.record("phase", "completed");

            // The created side now mirrors the mapped data.
            let mut created = SyncItem::new(id, client.platform());
            created.data = mapped.clone();
            let (src_view, tgt_view) = match leg {
                Leg::Forward => (Some(item), Some(&created)),
                Leg::Reverse => (Some(&created), Some(item)),
            };
            let after = tracked_subset(src_view, tgt_view, &ctx.config.mappings);
            ctx.tracker.write().update(id, &after, chrono::Utc::now());

            SyncResult::completed(id, mapped, attempts - 1)
        }
        Err(exhausted) => {
            crate::metrics::record_write("create", "error");
            span.record("phase", "failed");
            SyncResult::failed(
                id,
                ItemError::Client(exhausted.error),
                exhausted.attempts - 1,
            )
        }
    }
}

async fn write_with_retry(
    ctx: &ItemContext,
    client: &dyn SyncClient,
    id: &str,
    changes: &BTreeMap<String, FieldValue>,
) -> Result<usize, (ItemError, usize)> {
    let outcome: Result<((), usize), crate::resilience::retry::Exhausted<ClientError>> = retry(
        "update_item",
        &ctx.policy,
        ctx.sleeper.as_ref(),
        || client.update_item(id, changes),
    )
    .await;

    match outcome {
        Ok((_, attempts)) => {
            if attempts > 1 {
                crate::metrics::record_retry("update");
            }
            crate::metrics::record_write("update", "success");
            Ok(attempts)
        }
        Err(exhausted) => {
            crate::metrics::record_write("update", "error");
            Err((
                ItemError::Client(exhausted.error),
                exhausted.attempts - 1,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemoryAuditLog;
    use crate::clients::InMemoryClient;
    use crate::value::FieldType;

    fn test_config() -> SyncConfiguration {
        SyncConfiguration {
            name: "test".into(),
            source_platform: "jira".into(),
            target_platform: "github".into(),
            mappings: vec![FieldMapping::new("title", "title", FieldType::String)],
            retry_delay_ms: 1,
            ..Default::default()
        }
    }

    fn test_engine(config: SyncConfiguration) -> SyncEngine {
        SyncEngine::new(
            config,
            TransformRegistry::new(),
            ChangeTracker::new(),
            Arc::new(InMemoryClient::new("jira")),
            Arc::new(InMemoryClient::new("github")),
            Arc::new(MemoryAuditLog::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_new_validates_config() {
        let bad = SyncConfiguration {
            mappings: vec![],
            ..test_config()
        };
        let result = SyncEngine::new(
            bad,
            TransformRegistry::new(),
            ChangeTracker::new(),
            Arc::new(InMemoryClient::new("jira")),
            Arc::new(InMemoryClient::new("github")),
            Arc::new(MemoryAuditLog::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_pairing_by_external_id() {
        let sources = vec![
            SyncItem::new("a", "jira"),
            SyncItem::new("b", "jira"),
        ];
        let targets = vec![
            SyncItem::new("b", "github"),
            SyncItem::new("c", "github"),
        ];

        let pairs = pair_by_external_id(sources, targets);
        assert_eq!(pairs.len(), 3);

        let ids: Vec<&str> = pairs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let by_id: BTreeMap<_, _> = pairs.into_iter().collect();
        assert!(by_id["a"].0.is_some() && by_id["a"].1.is_none());
        assert!(by_id["b"].0.is_some() && by_id["b"].1.is_some());
        assert!(by_id["c"].0.is_none() && by_id["c"].1.is_some());
    }

    #[test]
    fn test_tracked_subset_covers_only_mapped_fields() {
        let mappings = vec![FieldMapping::new("title", "name", FieldType::String)];
        let source = SyncItem::new("X1", "jira")
            .with_field("title", "Bug A")
            .with_field("unmapped", "ignored");
        let target = SyncItem::new("X1", "github").with_field("name", "Bug A");

        let subset = tracked_subset(Some(&source), Some(&target), &mappings);
        assert_eq!(subset.len(), 2);
        assert!(subset.contains_key("source/title"));
        assert!(subset.contains_key("target/name"));
        assert!(!subset.keys().any(|k| k.contains("unmapped")));
    }

    #[tokio::test]
    async fn test_run_empty_inputs() {
        let engine = test_engine(test_config());
        let report = engine.run(Vec::new(), Vec::new()).await;
        assert_eq!(report.state.total(), 0);
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_before_run_dispatches_nothing() {
        let engine = test_engine(test_config());
        engine.cancel_handle().cancel();

        let report = engine
            .run(
                vec![SyncItem::new("a", "jira").with_field("title", "t")],
                Vec::new(),
            )
            .await;
        assert!(report.results.is_empty());
    }

    #[tokio::test]
    async fn test_one_result_per_pair() {
        let engine = test_engine(test_config());
        let report = engine
            .run(
                vec![
                    SyncItem::new("a", "jira").with_field("title", "1"),
                    SyncItem::new("b", "jira").with_field("title", "2"),
                ],
                vec![SyncItem::new("c", "github").with_field("title", "3")],
            )
            .await;
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.state.total(), 3);
    }
}
