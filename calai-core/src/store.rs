//! The store context object.
//!
//! A [`LocalStore`] wires every component over one adapter. Build one per
//! process (or per test) and hand clones of its components to callers; there
//! are no global instances.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::cache::TtlCache;
use crate::clock::{Clock, SystemClock};
use crate::codec::Backend;
use crate::diagnostics::Diagnostics;
use crate::error::StoreResult;
use crate::kv::KvAdapter;
use crate::meals::MealRepository;
use crate::models::{Meal, NutritionGoals, Profile};
use crate::profile::{ProfileStore, SettingsMap};
use crate::queue::SyncQueue;

/// Snapshot of the user's data.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportData {
    pub exported_at: DateTime<Utc>,
    pub meals: Vec<Meal>,
    pub profile: Option<Profile>,
    pub nutrition_goals: Option<NutritionGoals>,
    pub settings: SettingsMap,
}

#[derive(Clone)]
pub struct LocalStore {
    backend: Arc<Backend>,
    meals: MealRepository,
    profile: ProfileStore,
    queue: SyncQueue,
    cache: TtlCache,
}

impl LocalStore {
    pub fn new(adapter: Arc<dyn KvAdapter>) -> Self {
        Self::with_clock(adapter, Arc::new(SystemClock))
    }

    pub fn with_clock(adapter: Arc<dyn KvAdapter>, clock: Arc<dyn Clock>) -> Self {
        let backend = Arc::new(Backend::new(adapter, clock));
        let queue = SyncQueue::new(backend.clone());
        Self {
            meals: MealRepository::new(backend.clone(), queue.clone()),
            profile: ProfileStore::new(backend.clone(), queue.clone()),
            cache: TtlCache::new(backend.clone()),
            queue,
            backend,
        }
    }

    pub fn meals(&self) -> &MealRepository {
        &self.meals
    }

    pub fn profile(&self) -> &ProfileStore {
        &self.profile
    }

    pub fn queue(&self) -> &SyncQueue {
        &self.queue
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    /// Values discarded as unreadable since this store was built.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.backend.diagnostics
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.backend.clock.now()
    }

    /// Removes every key this store owns and nothing else.
    ///
    /// All collection locks are held for the duration, so no write interleaves
    /// with the wipe. A failure part way through leaves the remaining keys in
    /// place and is returned.
    pub async fn clear_all_data(&self) -> StoreResult<()> {
        let _guards = self.backend.locks.lock_all().await;

        self.meals.clear_locked().await?;
        self.profile.clear_locked().await?;
        let cache_entries = self.cache.clear_locked().await?;
        self.queue.clear_locked().await?;

        tracing::info!(cache_entries, "cleared all local data");
        Ok(())
    }

    /// Reads every user-facing collection.
    ///
    /// Each collection is read on its own, so a write landing mid-export may
    /// show up in one part and not another.
    pub async fn export_data(&self) -> StoreResult<ExportData> {
        let data = ExportData {
            exported_at: self.now(),
            meals: self.meals.list(None).await?,
            profile: self.profile.get_profile().await?,
            nutrition_goals: self.profile.get_nutrition_goals().await?,
            settings: self.profile.get_settings().await?,
        };
        tracing::info!(meals = data.meals.len(), "exported local data");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::{KvError, StoreError};
    use crate::kv::{FileAdapter, KvAdapter, MemoryAdapter};
    use crate::models::{FoodItem, NewMeal};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn setup() -> (LocalStore, Arc<MemoryAdapter>) {
        let adapter = Arc::new(MemoryAdapter::new());
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
        ));
        (LocalStore::with_clock(adapter.clone(), clock), adapter)
    }

    async fn populate(store: &LocalStore) {
        let eaten_at = Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap();
        store
            .meals()
            .save(NewMeal::new(eaten_at).with_food(FoodItem::new("Oats", 200.0, 6.0, 20.0, 6.0)))
            .await
            .unwrap();
        store
            .profile()
            .save_profile(&Profile::new("Ana", "ana@example.com"))
            .await
            .unwrap();
        store
            .profile()
            .save_nutrition_goals(&NutritionGoals::default())
            .await
            .unwrap();
        store.profile().save_setting("units", "metric").await.unwrap();
        store
            .cache()
            .set("foods", &vec!["apple"], Duration::hours(1))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_clear_all_data_keeps_foreign_keys() {
        let (store, adapter) = setup();
        populate(&store).await;
        adapter.set("sentinel", b"keep me").await.unwrap();

        store.clear_all_data().await.unwrap();

        assert_eq!(
            adapter.list_keys("").await.unwrap(),
            vec!["sentinel".to_string()]
        );
        assert_eq!(
            adapter.get("sentinel").await.unwrap(),
            Some(b"keep me".to_vec())
        );
        assert!(store.meals().list(None).await.unwrap().is_empty());
        assert!(store.queue().is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_clear_all_data_on_empty_store() {
        let (store, adapter) = setup();
        store.clear_all_data().await.unwrap();
        assert!(adapter.is_empty());
    }

    #[tokio::test]
    async fn test_export_data() {
        let (store, _) = setup();
        populate(&store).await;

        let export = store.export_data().await.unwrap();
        assert_eq!(export.exported_at, store.now());
        assert_eq!(export.meals.len(), 1);
        assert_eq!(export.profile.unwrap().name, "Ana");
        assert_eq!(export.nutrition_goals, Some(NutritionGoals::default()));
        assert_eq!(export.settings["units"], "metric");

        let json = serde_json::to_value(
            &store.export_data().await.unwrap(),
        )
        .unwrap();
        assert!(json.get("meals").unwrap().is_array());
    }

    #[tokio::test]
    async fn test_export_of_empty_store() {
        let (store, _) = setup();
        let export = store.export_data().await.unwrap();
        assert!(export.meals.is_empty());
        assert_eq!(export.profile, None);
        assert!(export.settings.is_empty());
    }

    #[tokio::test]
    async fn test_corrupt_meals_surface_in_diagnostics() {
        let (store, adapter) = setup();
        adapter.set("meals", b"{\"truncated\": ").await.unwrap();

        assert!(store.meals().list(None).await.unwrap().is_empty());
        let events = store.diagnostics().corruption_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].key, "meals");

        // The next save replaces the unreadable value
        store
            .meals()
            .save(NewMeal::new(store.now()))
            .await
            .unwrap();
        assert_eq!(store.meals().list(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_file_backed_store_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();

        let id = {
            let store = LocalStore::new(Arc::new(FileAdapter::new(temp_dir.path().to_path_buf())));
            store
                .meals()
                .save(NewMeal::new(Utc::now()).with_notes("persisted"))
                .await
                .unwrap()
        };

        let store = LocalStore::new(Arc::new(FileAdapter::new(temp_dir.path().to_path_buf())));
        let meal = store.meals().get(&id).await.unwrap();
        assert_eq!(meal.notes.as_deref(), Some("persisted"));
        assert_eq!(store.queue().len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_clear_all_data_failure_is_returned_and_retryable() {
        let (store, adapter) = setup();
        populate(&store).await;

        adapter.set_read_only("settings", true);
        assert!(matches!(
            store.clear_all_data().await,
            Err(StoreError::Kv(KvError::Unavailable(_)))
        ));
        // Stopped at the failing key: the queue is untouched
        assert!(store.meals().list(None).await.unwrap().is_empty());
        assert!(adapter.get("settings").await.unwrap().is_some());
        assert!(!store.queue().is_empty().await.unwrap());

        adapter.set_read_only("settings", false);
        store.clear_all_data().await.unwrap();
        assert!(adapter.is_empty());
    }

    #[tokio::test]
    async fn test_clear_all_data_with_unavailable_adapter() {
        let (store, adapter) = setup();
        populate(&store).await;

        adapter.set_available(false);
        assert!(store.clear_all_data().await.is_err());

        adapter.set_available(true);
        assert_eq!(store.meals().list(None).await.unwrap().len(), 1);
    }
}
