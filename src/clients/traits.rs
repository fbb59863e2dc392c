use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::sync_item::SyncItem;
use crate::value::FieldValue;

/// A platform client, injected by the caller. The same trait serves both
/// the source and target roles of a run.
#[async_trait]
pub trait SyncClient: Send + Sync {
    /// Platform name, used for pairing diagnostics and logging.
    fn platform(&self) -> &str;

    /// Fetch the current items from the platform.
    async fn fetch_items(&self) -> Result<Vec<SyncItem>, ClientError>;

    /// Create an item; returns the platform's id for it. The engine only
    /// passes through caller-known external ids, it never invents them.
    async fn create_item(
        &self,
        external_id: &str,
        data: &BTreeMap<String, FieldValue>,
    ) -> Result<String, ClientError>;

    /// Update an existing item's fields.
    async fn update_item(
        &self,
        external_id: &str,
        data: &BTreeMap<String, FieldValue>,
    ) -> Result<(), ClientError>;
}
