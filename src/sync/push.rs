//! Drains the outbound queue through a [`SyncTransport`].
//!
//! Items are sent oldest first. The first failure stops the push so that a
//! later change never reaches the server ahead of an earlier one.

use calai_core::{LocalStore, StoreError, SyncItemKind, SyncQueueItem};

use super::client::SyncTransport;

/// The item that stopped a push.
#[derive(Debug, Clone)]
pub struct FailedItem {
    pub id: String,
    pub kind: SyncItemKind,
    pub retries: u32,
    pub error: String,
}

/// Outcome of one push.
#[derive(Debug, Clone, Default)]
pub struct PushReport {
    /// Unsynced meals that had lost their queue item and were enqueued again.
    pub requeued: usize,
    pub sent: usize,
    pub failed: Option<FailedItem>,
    pub remaining: usize,
}

/// Sends up to `limit` queued items in FIFO order.
///
/// Unsynced meals without a pending `meal` item are enqueued first. A
/// delivered item is removed from the queue; a delivered `meal` item also
/// marks its meal synced. On the first delivery failure the item's retry
/// counter is bumped and the push stops.
pub async fn push(
    store: &LocalStore,
    transport: &dyn SyncTransport,
    limit: usize,
) -> Result<PushReport, StoreError> {
    let mut report = PushReport {
        requeued: store.meals().requeue_unsynced().await?,
        ..PushReport::default()
    };

    for item in store.queue().peek_all().await?.into_iter().take(limit) {
        match transport.send(&item).await {
            Ok(()) => {
                store.queue().remove(&item.id).await?;
                if item.kind == SyncItemKind::Meal {
                    mark_meal_synced(store, &item).await?;
                }
                report.sent += 1;
            }
            Err(e) => {
                let retries = store.queue().increment_retry(&item.id).await?;
                tracing::warn!(id = %item.id, kind = %item.kind, retries, error = %e, "sync push failed");
                report.failed = Some(FailedItem {
                    id: item.id,
                    kind: item.kind,
                    retries,
                    error: e.to_string(),
                });
                break;
            }
        }
    }

    report.remaining = store.queue().len().await?;
    tracing::info!(sent = report.sent, remaining = report.remaining, "sync push finished");
    Ok(report)
}

async fn mark_meal_synced(store: &LocalStore, item: &SyncQueueItem) -> Result<(), StoreError> {
    let Some(meal_id) = item.payload.get("id").and_then(|id| id.as_str()) else {
        return Ok(());
    };
    match store.meals().mark_synced(meal_id).await {
        // Deleted locally since it was queued
        Err(e) if e.is_not_found() => Ok(()),
        result => result,
    }
}
