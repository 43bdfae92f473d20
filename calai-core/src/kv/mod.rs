//! Key/value adapters the store persists through.
//!
//! An adapter offers whole-value operations on string keys and nothing else:
//! no transactions, no partial updates, atomicity per key only. Every
//! read-modify-write built on top of it is serialized by the store's
//! collection locks.
//!
//! # Adapters
//!
//! - [`MemoryAdapter`]: in-process map, used by tests and ephemeral stores
//! - [`FileAdapter`]: one file per key under a data directory

mod file;
mod memory;

use async_trait::async_trait;

use crate::error::KvError;

pub use file::FileAdapter;
pub use memory::MemoryAdapter;

/// Durable string-keyed blob storage.
#[async_trait]
pub trait KvAdapter: Send + Sync {
    /// Reads the value stored under `key`, or `None` if there is none.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    /// Replaces the value stored under `key`.
    async fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), KvError>;

    /// Lists every stored key starting with `prefix`.
    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, KvError>;
}
