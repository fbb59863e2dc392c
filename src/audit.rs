// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Append-only audit log of per-item outcomes.
//!
//! Every item that enters the engine produces exactly one audit entry,
//! including failures and unresolved conflicts. Audit writes are never
//! fatal: the engine catches [`AuditWriteError`], logs it and carries on.
//!
//! Two sinks are provided: [`MemoryAuditLog`] for tests and embedding, and
//! [`JsonlAuditLog`] for an append-only JSON-lines file whose writes are
//! serialized behind an async lock.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::engine::SyncResult;
use crate::error::AuditWriteError;

/// Destination for audit entries.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one entry.
    async fn log(&self, result: &SyncResult) -> Result<(), AuditWriteError>;

    /// History for one item, ordered by timestamp ascending. Finite and
    /// restartable: querying again replays the same (possibly grown)
    /// sequence.
    async fn query(
        &self,
        item_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SyncResult>, AuditWriteError>;
}

/// In-memory audit log.
#[derive(Default)]
pub struct MemoryAuditLog {
    entries: parking_lot::Mutex<Vec<SyncResult>>,
}

impl MemoryAuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries logged so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn log(&self, result: &SyncResult) -> Result<(), AuditWriteError> {
        self.entries.lock().push(result.clone());
        Ok(())
    }

    async fn query(
        &self,
        item_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SyncResult>, AuditWriteError> {
        let mut matches: Vec<SyncResult> = self
            .entries
            .lock()
            .iter()
            .filter(|r| r.item_id == item_id)
            .filter(|r| since.map_or(true, |at| r.timestamp >= at))
            .cloned()
            .collect();
        matches.sort_by_key(|r| r.timestamp);
        Ok(matches)
    }
}

/// JSON-lines file audit log. One serialized [`SyncResult`] per line,
/// append-only.
pub struct JsonlAuditLog {
    path: PathBuf,
    /// Serializes appends; the filesystem does not guarantee atomic
    /// multi-line appends across tasks.
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonlAuditLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl AuditSink for JsonlAuditLog {
    async fn log(&self, result: &SyncResult) -> Result<(), AuditWriteError> {
        let mut line = serde_json::to_vec(result)
            .map_err(|e| AuditWriteError(format!("serialize: {e}")))?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AuditWriteError(format!("open {}: {e}", self.path.display())))?;
        file.write_all(&line)
            .await
            .map_err(|e| AuditWriteError(format!("append: {e}")))?;
        file.flush()
            .await
            .map_err(|e| AuditWriteError(format!("flush: {e}")))?;
        Ok(())
    }

    async fn query(
        &self,
        item_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SyncResult>, AuditWriteError> {
        let file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AuditWriteError(format!(
                    "open {}: {e}",
                    self.path.display()
                )))
            }
        };

        // Streamed line by line; only matching entries are materialized.
        let mut lines = BufReader::new(file).lines();
        let mut matches = Vec::new();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| AuditWriteError(format!("read: {e}")))?
        {
            if line.trim().is_empty() {
                continue;
            }
            let result: SyncResult = serde_json::from_str(&line)
                .map_err(|e| AuditWriteError(format!("corrupt entry: {e}")))?;
            if result.item_id == item_id && since.map_or(true, |at| result.timestamp >= at) {
                matches.push(result);
            }
        }
        matches.sort_by_key(|r| r.timestamp);
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn result_at(id: &str, offset_secs: i64) -> SyncResult {
        let mut r = SyncResult::skipped(id);
        r.timestamp = Utc::now() + Duration::seconds(offset_secs);
        r
    }

    #[tokio::test]
    async fn test_memory_log_and_query() {
        let log = MemoryAuditLog::new();
        log.log(&result_at("X1", 0)).await.unwrap();
        log.log(&result_at("X2", 0)).await.unwrap();
        log.log(&result_at("X1", 1)).await.unwrap();

        let history = log.query("X1", None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history[0].timestamp <= history[1].timestamp);
    }

    #[tokio::test]
    async fn test_memory_query_since_filters() {
        let log = MemoryAuditLog::new();
        log.log(&result_at("X1", -3600)).await.unwrap();
        log.log(&result_at("X1", 10)).await.unwrap();

        let recent = log.query("X1", Some(Utc::now())).await.unwrap();
        assert_eq!(recent.len(), 1);
    }

    #[tokio::test]
    async fn test_memory_query_is_restartable() {
        let log = MemoryAuditLog::new();
        log.log(&result_at("X1", 0)).await.unwrap();

        let first = log.query("X1", None).await.unwrap();
        let second = log.query("X1", None).await.unwrap();
        assert_eq!(first.len(), second.len());
    }

    #[tokio::test]
    async fn test_jsonl_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(dir.path().join("audit.jsonl"));

        log.log(&result_at("X1", 0)).await.unwrap();
        log.log(&result_at("X1", 1)).await.unwrap();
        log.log(&result_at("X2", 0)).await.unwrap();

        let history = log.query("X1", None).await.unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.item_id == "X1"));
    }

    #[tokio::test]
    async fn test_jsonl_query_filters_while_streaming() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(dir.path().join("audit.jsonl"));

        // One matching entry buried among many for other items.
        for i in 0..50i64 {
            log.log(&result_at(&format!("other-{i}"), i)).await.unwrap();
        }
        log.log(&result_at("X1", 99)).await.unwrap();

        let history = log.query("X1", None).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].item_id, "X1");
    }

    #[tokio::test]
    async fn test_jsonl_query_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlAuditLog::new(dir.path().join("nope.jsonl"));
        assert!(log.query("X1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_jsonl_appends_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");

        JsonlAuditLog::new(&path).log(&result_at("X1", 0)).await.unwrap();
        JsonlAuditLog::new(&path).log(&result_at("X1", 1)).await.unwrap();

        let history = JsonlAuditLog::new(&path).query("X1", None).await.unwrap();
        assert_eq!(history.len(), 2);
    }
}
