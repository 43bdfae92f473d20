//! Profile, nutrition goals and settings.
//!
//! The profile and the goals are single records replaced as a whole
//! (last write wins). Settings are a flat JSON object whose keys are merged
//! one at a time. Each save is rolled back if its sync queue entry cannot
//! be written.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::codec::Backend;
use crate::collection::Collection;
use crate::error::{StoreError, StoreResult};
use crate::models::{NutritionGoals, Profile, SyncItemKind};
use crate::queue::SyncQueue;

pub type SettingsMap = serde_json::Map<String, serde_json::Value>;

#[derive(Serialize)]
struct SettingPayload<'a> {
    key: &'a str,
    value: &'a serde_json::Value,
}

#[derive(Clone)]
pub struct ProfileStore {
    backend: Arc<Backend>,
    queue: SyncQueue,
}

impl ProfileStore {
    pub(crate) fn new(backend: Arc<Backend>, queue: SyncQueue) -> Self {
        Self { backend, queue }
    }

    pub async fn get_profile(&self) -> StoreResult<Option<Profile>> {
        self.backend.read(Collection::Profile.key()).await
    }

    /// Replaces the profile and enqueues it for sync.
    pub async fn save_profile(&self, profile: &Profile) -> StoreResult<()> {
        let _guard = self.backend.locks.lock(Collection::Profile).await;
        self.backend
            .write_then(
                Collection::Profile.key(),
                profile,
                self.queue.enqueue(SyncItemKind::Profile, profile),
            )
            .await?;
        tracing::debug!("saved profile");
        Ok(())
    }

    pub async fn get_nutrition_goals(&self) -> StoreResult<Option<NutritionGoals>> {
        self.backend.read(Collection::NutritionGoals.key()).await
    }

    /// Replaces the nutrition goals and enqueues them for sync.
    pub async fn save_nutrition_goals(&self, goals: &NutritionGoals) -> StoreResult<()> {
        let _guard = self.backend.locks.lock(Collection::NutritionGoals).await;
        self.backend
            .write_then(
                Collection::NutritionGoals.key(),
                goals,
                self.queue.enqueue(SyncItemKind::NutritionGoals, goals),
            )
            .await?;
        tracing::debug!(daily_calories = goals.daily_calories, "saved nutrition goals");
        Ok(())
    }

    /// Goals to measure against: the stored goals, else the profile's, else
    /// the defaults.
    pub async fn effective_goals(&self) -> StoreResult<NutritionGoals> {
        if let Some(goals) = self.get_nutrition_goals().await? {
            return Ok(goals);
        }
        Ok(self
            .get_profile()
            .await?
            .map(|profile| profile.goals)
            .unwrap_or_default())
    }

    /// Every stored setting. An unreadable settings blob reads as empty.
    pub async fn get_settings(&self) -> StoreResult<SettingsMap> {
        self.backend
            .read_or_default(Collection::Settings.key())
            .await
    }

    /// Sets one setting, keeping every other key.
    pub async fn save_setting<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let value = serde_json::to_value(value).map_err(|source| StoreError::Encode {
            key: format!("{}.{}", Collection::Settings.key(), key),
            source,
        })?;

        let _guard = self.backend.locks.lock(Collection::Settings).await;
        let mut settings = self.get_settings().await?;
        settings.insert(key.to_string(), value.clone());
        let payload = SettingPayload { key, value: &value };
        self.backend
            .write_then(
                Collection::Settings.key(),
                &settings,
                self.queue.enqueue(SyncItemKind::Settings, &payload),
            )
            .await?;

        tracing::debug!(key, "saved setting");
        Ok(())
    }

    /// Returns the setting `key`, or `default` if it is missing or does not
    /// decode as `T`.
    pub async fn get_setting<T: DeserializeOwned>(&self, key: &str, default: T) -> StoreResult<T> {
        let mut settings = self.get_settings().await?;
        let Some(value) = settings.remove(key) else {
            return Ok(default);
        };

        match serde_json::from_value(value) {
            Ok(value) => Ok(value),
            Err(e) => {
                self.backend.diagnostics.record_corruption(
                    &format!("{}.{}", Collection::Settings.key(), key),
                    &e.to_string(),
                    self.backend.clock.now(),
                );
                Ok(default)
            }
        }
    }

    /// Removes all three records; the caller holds their locks.
    pub(crate) async fn clear_locked(&self) -> StoreResult<()> {
        for collection in [
            Collection::Profile,
            Collection::NutritionGoals,
            Collection::Settings,
        ] {
            self.backend.adapter.remove(collection.key()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::error::KvError;
    use crate::kv::{KvAdapter, MemoryAdapter};
    use futures::future::join_all;

    fn setup() -> (ProfileStore, SyncQueue, Arc<MemoryAdapter>, Arc<Backend>) {
        let adapter = Arc::new(MemoryAdapter::new());
        let backend = Arc::new(Backend::new(adapter.clone(), Arc::new(SystemClock)));
        let queue = SyncQueue::new(backend.clone());
        (
            ProfileStore::new(backend.clone(), queue.clone()),
            queue,
            adapter,
            backend,
        )
    }

    #[tokio::test]
    async fn test_profile_absent_until_saved() {
        let (store, _, _, _) = setup();
        assert_eq!(store.get_profile().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_profile_last_write_wins() {
        let (store, queue, _, _) = setup();

        let mut first = Profile::new("Ana", "ana@example.com");
        first.preferences.allergies = vec!["peanuts".to_string()];
        store.save_profile(&first).await.unwrap();

        let second = Profile::new("Ana B", "ana@example.com");
        store.save_profile(&second).await.unwrap();

        // No field merge: the allergy list of the first write is gone
        assert_eq!(store.get_profile().await.unwrap(), Some(second));

        let items = queue.peek_all().await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.kind == SyncItemKind::Profile));
    }

    #[tokio::test]
    async fn test_effective_goals_fallbacks() {
        let (store, queue, _, _) = setup();
        assert_eq!(store.effective_goals().await.unwrap(), NutritionGoals::default());

        let profile_goals = NutritionGoals {
            daily_calories: 1800.0,
            ..NutritionGoals::default()
        };
        store
            .save_profile(&Profile::new("Ana", "a@b.c").with_goals(profile_goals.clone()))
            .await
            .unwrap();
        assert_eq!(store.effective_goals().await.unwrap(), profile_goals);

        let goals = NutritionGoals {
            daily_calories: 2500.0,
            ..NutritionGoals::default()
        };
        store.save_nutrition_goals(&goals).await.unwrap();
        assert_eq!(store.effective_goals().await.unwrap(), goals);
        assert_eq!(
            queue.peek_all().await.unwrap().last().unwrap().kind,
            SyncItemKind::NutritionGoals
        );
    }

    #[tokio::test]
    async fn test_save_setting_merges_keys() {
        let (store, _, _, _) = setup();
        store.save_setting("units", "metric").await.unwrap();
        store.save_setting("reminders", &true).await.unwrap();
        store.save_setting("units", "imperial").await.unwrap();

        let settings = store.get_settings().await.unwrap();
        assert_eq!(settings.len(), 2);
        assert_eq!(settings["units"], "imperial");
        assert_eq!(settings["reminders"], true);
    }

    #[tokio::test]
    async fn test_concurrent_setting_writes_keep_every_key() {
        let (store, _, _, _) = setup();

        let calls = (0..15).map(|i| {
            let store = store.clone();
            async move { store.save_setting(&format!("key{}", i), &i).await }
        });
        for result in join_all(calls).await {
            result.unwrap();
        }

        assert_eq!(store.get_settings().await.unwrap().len(), 15);
    }

    #[tokio::test]
    async fn test_get_setting_defaults() {
        let (store, _, _, backend) = setup();
        assert_eq!(store.get_setting("missing", 7u32).await.unwrap(), 7);

        store.save_setting("name", "Ana").await.unwrap();
        // Wrong type falls back to the default and is recorded
        assert_eq!(store.get_setting("name", 7u32).await.unwrap(), 7);
        assert_eq!(backend.diagnostics.corruption_count(), 1);

        assert_eq!(
            store.get_setting("name", String::new()).await.unwrap(),
            "Ana"
        );
    }

    #[tokio::test]
    async fn test_corrupt_settings_blob_reads_as_default() {
        let (store, _, adapter, backend) = setup();
        adapter.set("settings", b"[1, 2").await.unwrap();

        assert!(store.get_setting("units", true).await.unwrap());
        assert_eq!(backend.diagnostics.corruption_count(), 1);

        // The next write replaces the broken blob
        store.save_setting("units", "metric").await.unwrap();
        assert_eq!(store.get_settings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_profile_failure_propagates() {
        let (store, queue, adapter, _) = setup();
        adapter.set_available(false);
        assert!(store
            .save_profile(&Profile::new("Ana", "a@b.c"))
            .await
            .is_err());
        adapter.set_available(true);
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_save_profile_rolled_back_when_queue_write_fails() {
        let (store, queue, adapter, _) = setup();
        let first = Profile::new("Ana", "a@b.c");
        store.save_profile(&first).await.unwrap();

        adapter.set_read_only("sync_queue", true);
        let result = store.save_profile(&Profile::new("Bea", "b@b.c")).await;
        assert!(matches!(result, Err(StoreError::Kv(KvError::Unavailable(_)))));

        assert_eq!(store.get_profile().await.unwrap(), Some(first));
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_setting_rolled_back_when_queue_write_fails() {
        let (store, queue, adapter, _) = setup();
        store.save_setting("units", "metric").await.unwrap();

        adapter.set_read_only("sync_queue", true);
        assert!(matches!(
            store.save_setting("units", "imperial").await,
            Err(StoreError::Kv(KvError::Unavailable(_)))
        ));
        assert!(store.save_setting("theme", "dark").await.is_err());

        let settings = store.get_settings().await.unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings["units"], "metric");
        assert_eq!(queue.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_goals_rolled_back_when_queue_is_full() {
        let adapter = Arc::new(MemoryAdapter::with_capacity_bytes(200));
        let backend = Arc::new(Backend::new(adapter.clone(), Arc::new(SystemClock)));
        let queue = SyncQueue::new(backend.clone());
        let store = ProfileStore::new(backend, queue.clone());

        // The goals record fits, the queue item wrapping it does not
        let result = store.save_nutrition_goals(&NutritionGoals::default()).await;
        assert!(matches!(result, Err(StoreError::Kv(KvError::Full))));

        assert_eq!(store.get_nutrition_goals().await.unwrap(), None);
        assert!(queue.is_empty().await.unwrap());
    }
}
