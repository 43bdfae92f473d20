//! Logical collections owned by the store and the locks that guard them.

use tokio::sync::{Mutex, MutexGuard};

/// Prefix of every cache entry key.
pub const CACHE_PREFIX: &str = "cache:";

/// Logical collections, each persisted under one adapter key (the cache
/// namespace under many keys sharing [`CACHE_PREFIX`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Meals,
    Profile,
    NutritionGoals,
    Settings,
    SyncQueue,
    Cache,
}

impl Collection {
    /// Every collection, in lock order. `SyncQueue` is always last because
    /// other collections enqueue while holding their own lock.
    pub const ALL: [Collection; 6] = [
        Collection::Meals,
        Collection::Profile,
        Collection::NutritionGoals,
        Collection::Settings,
        Collection::Cache,
        Collection::SyncQueue,
    ];

    /// Returns the adapter key for this collection.
    pub const fn key(&self) -> &'static str {
        match self {
            Collection::Meals => "meals",
            Collection::Profile => "profile",
            Collection::NutritionGoals => "nutrition_goals",
            Collection::Settings => "settings",
            Collection::SyncQueue => "sync_queue",
            Collection::Cache => CACHE_PREFIX,
        }
    }
}

/// One async mutex per collection.
///
/// Every read-modify-write of a collection runs while holding its guard, so
/// concurrent callers queue up instead of overwriting each other's writes.
/// Waiters are served in arrival order.
#[derive(Debug, Default)]
pub struct CollectionLocks {
    meals: Mutex<()>,
    profile: Mutex<()>,
    nutrition_goals: Mutex<()>,
    settings: Mutex<()>,
    sync_queue: Mutex<()>,
    cache: Mutex<()>,
}

impl CollectionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for and takes the lock of `collection`.
    pub async fn lock(&self, collection: Collection) -> MutexGuard<'_, ()> {
        let mutex = match collection {
            Collection::Meals => &self.meals,
            Collection::Profile => &self.profile,
            Collection::NutritionGoals => &self.nutrition_goals,
            Collection::Settings => &self.settings,
            Collection::SyncQueue => &self.sync_queue,
            Collection::Cache => &self.cache,
        };
        mutex.lock().await
    }

    /// Takes every lock in [`Collection::ALL`] order.
    pub async fn lock_all(&self) -> Vec<MutexGuard<'_, ()>> {
        let mut guards = Vec::with_capacity(Collection::ALL.len());
        for collection in Collection::ALL {
            guards.push(self.lock(collection).await);
        }
        guards
    }
}
