//! Expiring cache for remote reads.
//!
//! Entries live under their own adapter key, `cache:<name>`, as
//! `{"data": ..., "expires_at": <epoch ms>}`. Expiry is checked lazily: an
//! expired entry is deleted when read, and [`TtlCache::sweep`] removes the
//! rest on demand. There is no background timer.

use chrono::Duration;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::codec::{self, Backend};
use crate::collection::{Collection, CACHE_PREFIX};
use crate::error::{StoreError, StoreResult};

/// Stored form of a cache entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: serde_json::Value,
    /// Absolute expiry, milliseconds since the Unix epoch.
    pub expires_at: i64,
}

impl CacheEntry {
    /// An entry is dead once `expires_at <= now_ms`.
    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expires_at <= now_ms
    }
}

#[derive(Clone)]
pub struct TtlCache {
    backend: Arc<Backend>,
}

impl TtlCache {
    pub(crate) fn new(backend: Arc<Backend>) -> Self {
        Self { backend }
    }

    fn storage_key(key: &str) -> String {
        format!("{}{}", CACHE_PREFIX, key)
    }

    fn now_ms(&self) -> i64 {
        self.backend.clock.now().timestamp_millis()
    }

    /// Stores `value` for `ttl`.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> StoreResult<()> {
        let storage_key = Self::storage_key(key);
        let data = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            key: storage_key.clone(),
            source,
        })?;

        let _guard = self.backend.locks.lock(Collection::Cache).await;
        let entry = CacheEntry {
            data,
            expires_at: self.now_ms().saturating_add(ttl.num_milliseconds()),
        };
        self.backend.write(&storage_key, &entry).await
    }

    /// Returns the cached value if present and unexpired.
    ///
    /// An expired entry is removed before returning `None`. A value that no
    /// longer decodes as `T` also reads as `None`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let storage_key = Self::storage_key(key);

        let _guard = self.backend.locks.lock(Collection::Cache).await;
        let Some(entry) = self.backend.read::<CacheEntry>(&storage_key).await? else {
            return Ok(None);
        };

        if entry.is_expired(self.now_ms()) {
            self.backend.adapter.remove(&storage_key).await?;
            tracing::debug!(key, "expired cache entry removed on read");
            return Ok(None);
        }

        match serde_json::from_value(entry.data) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.backend.diagnostics.record_corruption(
                    &storage_key,
                    &e.to_string(),
                    self.backend.clock.now(),
                );
                Ok(None)
            }
        }
    }

    /// Drops one entry whether or not it has expired.
    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        let _guard = self.backend.locks.lock(Collection::Cache).await;
        self.backend.adapter.remove(&Self::storage_key(key)).await?;
        Ok(())
    }

    /// Removes every expired or unreadable entry and returns how many were
    /// removed.
    pub async fn sweep(&self) -> StoreResult<usize> {
        let _guard = self.backend.locks.lock(Collection::Cache).await;
        let now_ms = self.now_ms();
        let mut removed = 0;

        for storage_key in self.backend.adapter.list_keys(CACHE_PREFIX).await? {
            let Some(bytes) = self.backend.adapter.get(&storage_key).await? else {
                continue;
            };
            let dead = match codec::decode::<CacheEntry>(&bytes) {
                Ok(entry) => entry.is_expired(now_ms),
                Err(e) => {
                    self.backend.diagnostics.record_corruption(
                        &storage_key,
                        &e.to_string(),
                        self.backend.clock.now(),
                    );
                    true
                }
            };
            if dead {
                self.backend.adapter.remove(&storage_key).await?;
                removed += 1;
            }
        }

        tracing::debug!(removed, "cache sweep finished");
        Ok(removed)
    }

    /// Removes every cache entry.
    pub async fn clear(&self) -> StoreResult<usize> {
        let _guard = self.backend.locks.lock(Collection::Cache).await;
        self.clear_locked().await
    }

    /// Clears the namespace; the caller holds the `Cache` lock.
    pub(crate) async fn clear_locked(&self) -> StoreResult<usize> {
        let keys = self.backend.adapter.list_keys(CACHE_PREFIX).await?;
        for storage_key in &keys {
            self.backend.adapter.remove(storage_key).await?;
        }
        Ok(keys.len())
    }
}
