//! Outbound sync queue.
//!
//! A durable FIFO of local mutations that the server has not confirmed yet.
//! The queue only stores items; an external driver reads them with
//! [`SyncQueue::peek_all`], applies them remotely and then calls
//! [`SyncQueue::remove`] or [`SyncQueue::increment_retry`]. Timing, retry
//! limits and backoff belong to the driver.

use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::codec::Backend;
use crate::collection::Collection;
use crate::error::{StoreError, StoreResult};
use crate::models::{SyncItemKind, SyncQueueItem};

const KEY: &str = Collection::SyncQueue.key();

#[derive(Clone)]
pub struct SyncQueue {
    backend: Arc<Backend>,
}

impl SyncQueue {
    pub(crate) fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    async fn load(&self) -> StoreResult<Vec<SyncQueueItem>> {
        self.backend.read_or_default(KEY).await
    }

    /// Appends a mutation to the end of the queue.
    pub async fn enqueue<P: Serialize + ?Sized>(
        &self,
        kind: SyncItemKind,
        payload: &P,
    ) -> StoreResult<SyncQueueItem> {
        let payload = serde_json::to_value(payload).map_err(|source| StoreError::Encode {
            key: KEY.to_string(),
            source,
        })?;

        let _guard = self.backend.locks.lock(Collection::SyncQueue).await;
        let mut items = self.load().await?;

        let item = SyncQueueItem {
            id: Uuid::new_v4().to_string(),
            kind,
            payload,
            created_at: self.backend.clock.now(),
            retries: 0,
        };
        items.push(item.clone());
        self.backend.write(KEY, &items).await?;

        tracing::debug!(id = %item.id, kind = %item.kind, pending = items.len(), "enqueued sync item");
        Ok(item)
    }

    /// Snapshot of every pending item, oldest first.
    pub async fn peek_all(&self) -> StoreResult<Vec<SyncQueueItem>> {
        self.load().await
    }

    pub async fn len(&self) -> StoreResult<usize> {
        Ok(self.load().await?.len())
    }

    pub async fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len().await? == 0)
    }

    /// Drops an item after the server applied it.
    ///
    /// Returns `Ok(false)` if the item was already gone.
    pub async fn remove(&self, id: &str) -> StoreResult<bool> {
        let _guard = self.backend.locks.lock(Collection::SyncQueue).await;
        let mut items = self.load().await?;

        let before = items.len();
        items.retain(|item| item.id != id);
        if items.len() == before {
            return Ok(false);
        }

        self.backend.write(KEY, &items).await?;
        tracing::debug!(id, pending = items.len(), "removed sync item");
        Ok(true)
    }

    /// Bumps the retry counter of an item and returns the new count.
    pub async fn increment_retry(&self, id: &str) -> StoreResult<u32> {
        let _guard = self.backend.locks.lock(Collection::SyncQueue).await;
        let mut items = self.load().await?;

        let item = items
            .iter_mut()
            .find(|item| item.id == id)
            .ok_or_else(|| StoreError::not_found("sync item", id))?;
        item.retries = item.retries.saturating_add(1);
        let retries = item.retries;

        self.backend.write(KEY, &items).await?;
        Ok(retries)
    }

    /// Removes every pending item. Unsynced changes are lost.
    pub async fn clear(&self) -> StoreResult<()> {
        let _guard = self.backend.locks.lock(Collection::SyncQueue).await;
        self.clear_locked().await
    }

    /// Clears the queue; the caller holds the `SyncQueue` lock.
    pub(crate) async fn clear_locked(&self) -> StoreResult<()> {
        self.backend.adapter.remove(KEY).await?;
        tracing::info!("cleared sync queue");
        Ok(())
    }
}
