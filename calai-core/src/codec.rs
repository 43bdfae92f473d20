//! JSON encoding of collections and the tolerant read path.
//!
//! Writes always serialize the whole value and fail loudly. Reads treat an
//! unparseable value as absent: the failure is recorded in [`Diagnostics`]
//! and the caller sees an empty collection, which is replaced on the next
//! successful write.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use crate::clock::Clock;
use crate::collection::CollectionLocks;
use crate::diagnostics::Diagnostics;
use crate::error::{StoreError, StoreResult};
use crate::kv::KvAdapter;

/// Serializes `value` for storage under `key`.
pub fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}

/// Parses a stored value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Adapter plus the state every component shares: clock, collection locks and
/// the corruption log.
pub(crate) struct Backend {
    pub adapter: Arc<dyn KvAdapter>,
    pub clock: Arc<dyn Clock>,
    pub locks: CollectionLocks,
    pub diagnostics: Diagnostics,
}

impl Backend {
    pub fn new(adapter: Arc<dyn KvAdapter>, clock: Arc<dyn Clock>) -> Self {
        Self {
            adapter,
            clock,
            locks: CollectionLocks::new(),
            diagnostics: Diagnostics::new(),
        }
    }

    /// Reads and decodes `key`. Missing and unreadable values are both
    /// `None`; only the latter is recorded as corruption.
    pub async fn read<T: DeserializeOwned>(&self, key: &str) -> StoreResult<Option<T>> {
        let Some(bytes) = self.adapter.get(key).await? else {
            return Ok(None);
        };

        match decode(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                self.diagnostics
                    .record_corruption(key, &e.to_string(), self.clock.now());
                Ok(None)
            }
        }
    }

    /// Reads `key`, falling back to `T::default()` when missing or unreadable.
    pub async fn read_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> StoreResult<T> {
        Ok(self.read(key).await?.unwrap_or_default())
    }

    /// Encodes and stores `value` under `key`.
    pub async fn write<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let bytes = encode(key, value)?;
        self.adapter.set(key, &bytes).await?;
        tracing::debug!(key, bytes = bytes.len(), "wrote value");
        Ok(())
    }

    /// Writes `value` under `key`, then runs `then`. If `then` fails the
    /// previous bytes of `key` are put back, so a change and its sync queue
    /// entry are stored together or not at all.
    pub async fn write_then<T, R>(
        &self,
        key: &str,
        value: &T,
        then: impl Future<Output = StoreResult<R>>,
    ) -> StoreResult<R>
    where
        T: Serialize + ?Sized,
    {
        let previous = self.adapter.get(key).await?;
        self.write(key, value).await?;

        let err = match then.await {
            Ok(result) => return Ok(result),
            Err(err) => err,
        };

        let restored = match &previous {
            Some(bytes) => self.adapter.set(key, bytes).await,
            None => self.adapter.remove(key).await,
        };
        match restored {
            Ok(()) => tracing::warn!(key, error = %err, "rolled back write"),
            Err(restore_err) => {
                tracing::error!(key, error = %err, restore_error = %restore_err, "failed to roll back write")
            }
        }
        Err(err)
    }
}
