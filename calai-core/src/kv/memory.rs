//! In-memory adapter.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::KvAdapter;
use crate::error::KvError;

/// Adapter backed by a `HashMap`.
///
/// Every call yields to the scheduler once before touching the map, the way a
/// real adapter suspends on I/O, so interleavings between independent callers
/// show up in tests. A byte capacity, an availability switch and per-key
/// read-only flags let tests exercise the `Full` and `Unavailable` failure
/// paths.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    capacity_bytes: Option<usize>,
    unavailable: AtomicBool,
    read_only: RwLock<HashSet<String>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an adapter that rejects writes once the total stored size
    /// (keys plus values) would exceed `capacity_bytes`.
    pub fn with_capacity_bytes(capacity_bytes: usize) -> Self {
        Self {
            capacity_bytes: Some(capacity_bytes),
            ..Self::default()
        }
    }

    /// Toggles whether operations succeed or fail with `Unavailable`.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Makes writes to `key` fail with `Unavailable` while reads still work.
    pub fn set_read_only(&self, key: &str, read_only: bool) {
        let mut keys = self.read_only.write().unwrap_or_else(|e| e.into_inner());
        if read_only {
            keys.insert(key.to_string());
        } else {
            keys.remove(key);
        }
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check_available(&self) -> Result<(), KvError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(KvError::Unavailable("memory adapter offline".to_string()));
        }
        Ok(())
    }

    fn check_writable(&self, key: &str) -> Result<(), KvError> {
        self.check_available()?;
        let read_only = self.read_only.read().unwrap_or_else(|e| e.into_inner());
        if read_only.contains(key) {
            return Err(KvError::Unavailable(format!("{} is read-only", key)));
        }
        Ok(())
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl KvAdapter for MemoryAdapter {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        tokio::task::yield_now().await;
        self.check_available()?;
        Ok(self.read_entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
        tokio::task::yield_now().await;
        self.check_writable(key)?;

        let mut entries = self.write_entries();
        if let Some(capacity) = self.capacity_bytes {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            if used + key.len() + value.len() > capacity {
                return Err(KvError::Full);
            }
        }
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), KvError> {
        tokio::task::yield_now().await;
        self.check_writable(key)?;
        self.write_entries().remove(key);
        Ok(())
    }

    async fn list_keys(&self, prefix: &str) -> Result<Vec<String>, KvError> {
        tokio::task::yield_now().await;
        self.check_available()?;
        let mut keys: Vec<String> = self
            .read_entries()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}
