//! In-memory [`SyncClient`] with injectable failures.
//!
//! Backs tests and local experiments. Failure injection mimics a flaky
//! platform API: an id can be made to fail its next N update calls, or to
//! fail forever.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use super::traits::SyncClient;
use crate::error::ClientError;
use crate::sync_item::SyncItem;
use crate::value::FieldValue;

/// How many consecutive calls for an id should fail.
#[derive(Debug, Clone, Copy)]
enum FailureMode {
    Times(usize),
    Always,
}

pub struct InMemoryClient {
    platform: String,
    items: DashMap<String, SyncItem>,
    failures: DashMap<String, FailureMode>,
    update_calls: AtomicUsize,
    create_calls: AtomicUsize,
}

impl InMemoryClient {
    #[must_use]
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            items: DashMap::new(),
            failures: DashMap::new(),
            update_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
        }
    }

    /// Seed an item directly into the store.
    pub fn insert(&self, item: SyncItem) {
        self.items.insert(item.external_id.clone(), item);
    }

    /// Fail every write for `id` until cleared.
    pub fn fail_writes_for(&self, id: &str) {
        self.failures.insert(id.to_string(), FailureMode::Always);
    }

    /// Fail the next `n` writes for `id`, then succeed.
    pub fn fail_next_writes_for(&self, id: &str, n: usize) {
        self.failures.insert(id.to_string(), FailureMode::Times(n));
    }

    /// Total `update_item` calls observed (including failed ones).
    #[must_use]
    pub fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    /// Total `create_item` calls observed (including failed ones).
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Total write calls (creates + updates).
    #[must_use]
    pub fn write_calls(&self) -> usize {
        self.update_calls() + self.create_calls()
    }

    /// Current stored item, if any.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<SyncItem> {
        self.items.get(id).map(|r| r.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn check_failure(&self, id: &str) -> Result<(), ClientError> {
        let Some(mut entry) = self.failures.get_mut(id) else {
            return Ok(());
        };
        match *entry.value() {
            FailureMode::Always => Err(ClientError::Backend(format!(
                "injected failure for '{id}'"
            ))),
            FailureMode::Times(0) => Ok(()),
            FailureMode::Times(n) => {
                *entry.value_mut() = FailureMode::Times(n - 1);
                Err(ClientError::Backend(format!(
                    "injected transient failure for '{id}' ({n} left)"
                )))
            }
        }
    }
}

#[async_trait]
impl SyncClient for InMemoryClient {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn fetch_items(&self) -> Result<Vec<SyncItem>, ClientError> {
        Ok(self.items.iter().map(|r| r.value().clone()).collect())
    }

    async fn create_item(
        &self,
        external_id: &str,
        data: &BTreeMap<String, FieldValue>,
    ) -> Result<String, ClientError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(external_id)?;

        let mut item = SyncItem::new(external_id, self.platform.clone());
        item.data = data.clone();
        item.last_modified = Utc::now();
        self.items.insert(external_id.to_string(), item);
        Ok(external_id.to_string())
    }

    async fn update_item(
        &self,
        external_id: &str,
        data: &BTreeMap<String, FieldValue>,
    ) -> Result<(), ClientError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(external_id)?;

        let mut item = self
            .items
            .get_mut(external_id)
            .ok_or_else(|| ClientError::NotFound(external_id.to_string()))?;
        for (k, v) in data {
            item.data.insert(k.clone(), v.clone());
        }
        item.last_modified = Utc::now();
        Ok(())
    }
}
