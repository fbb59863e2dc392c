// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for the reconciliation engine.
//!
//! Uses the `metrics` crate for backend-agnostic collection; the embedding
//! process chooses the exporter (Prometheus, OTEL, ...).
//!
//! # Metric Naming Convention
//! - `reconciler_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `status`: completed, failed, conflict, skipped
//! - `operation`: create, update, fetch

use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::engine::SyncStatus;

/// Record one finished item.
pub fn record_item(status: SyncStatus) {
    counter!(
        "reconciler_items_total",
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a retried client operation.
pub fn record_retry(operation: &str) {
    counter!(
        "reconciler_retries_total",
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a client write outcome.
pub fn record_write(operation: &str, status: &str) {
    counter!(
        "reconciler_writes_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record conflicts detected for one item.
pub fn record_conflicts(count: usize) {
    if count > 0 {
        counter!("reconciler_conflicts_total").increment(count as u64);
    }
}

/// Record a full run's wall time.
pub fn record_run_duration(duration: Duration) {
    histogram!("reconciler_run_seconds").record(duration.as_secs_f64());
}

/// Record per-item pipeline latency.
pub fn record_item_latency(duration: Duration) {
    histogram!("reconciler_item_seconds").record(duration.as_secs_f64());
}

/// Gauge: items in the most recent run.
pub fn set_last_run_items(count: usize) {
    gauge!("reconciler_last_run_items").set(count as f64);
}

/// Gauge: unresolved conflicts left by the most recent run.
pub fn set_last_run_unresolved(count: usize) {
    gauge!("reconciler_last_run_unresolved_conflicts").set(count as f64);
}
