//! Durable FIFO of mutations awaiting replay.

use std::collections::HashSet;

use serde_json::Value;

use crate::db::LocalStore;
use crate::error::Result;
use crate::models::{Collection, SyncAction, SyncQueueItem};

/// Pending mutations, persisted in the store's `sync_queue` table.
///
/// Items are never merged: two toggles of the same flag are two items.
#[derive(Clone)]
pub struct SyncQueue {
    store: LocalStore,
}

impl SyncQueue {
    pub const fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Append a mutation; it is durable once this returns
    pub async fn enqueue(
        &self,
        collection: Collection,
        action: SyncAction,
        payload: Value,
    ) -> Result<SyncQueueItem> {
        let item = SyncQueueItem::new(collection, action, payload);
        self.store.put(&item).await?;
        tracing::debug!(
            "Queued {} on {} ({})",
            item.action,
            item.collection,
            item.id
        );
        Ok(item)
    }

    /// Every pending item, oldest first
    pub async fn list_pending(&self) -> Result<Vec<SyncQueueItem>> {
        let mut items = self.store.get_all::<SyncQueueItem>().await?;
        items.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        Ok(items)
    }

    /// Remove a replayed item; removing an unknown id is a no-op
    pub async fn dequeue(&self, id: &str) -> Result<()> {
        self.store.remove::<SyncQueueItem>(id).await
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.count::<SyncQueueItem>().await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn clear(&self) -> Result<()> {
        self.store.clear::<SyncQueueItem>().await
    }

    /// Point queued payloads at a confirmed id instead of the temporary one.
    ///
    /// Returns how many items changed.
    pub async fn retarget(&self, temporary: &str, confirmed: &str) -> Result<usize> {
        let mut changed = 0;
        for mut item in self.list_pending().await? {
            if item.retarget(temporary, confirmed) {
                self.store.put(&item).await?;
                changed += 1;
            }
        }
        if changed > 0 {
            tracing::debug!("Retargeted {changed} queued changes from {temporary} to {confirmed}");
        }
        Ok(changed)
    }

    /// Drop pending items that target one of `ids`.
    ///
    /// Returns how many items were dropped.
    pub async fn discard_targeting(&self, ids: &HashSet<String>) -> Result<usize> {
        let mut dropped = 0;
        for item in self.list_pending().await? {
            if item.target_id().is_some_and(|target| ids.contains(target)) {
                self.store.remove::<SyncQueueItem>(&item.id).await?;
                dropped += 1;
            }
        }
        if dropped > 0 {
            tracing::debug!("Discarded {dropped} queued changes for removed records");
        }
        Ok(dropped)
    }

    /// Ids referenced by a pending payload
    pub async fn pending_ids(&self) -> Result<HashSet<String>> {
        Ok(self
            .list_pending()
            .await?
            .iter()
            .flat_map(SyncQueueItem::referenced_ids)
            .map(str::to_string)
            .collect())
    }
}
