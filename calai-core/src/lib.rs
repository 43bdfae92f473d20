//! Calai Core Library
//!
//! Local-first storage for the calai nutrition tracker: meals, profile,
//! goals and settings kept in a key/value store, plus an outbound queue of
//! changes waiting to be synced.

pub mod aggregation;
pub mod cache;
pub mod clock;
mod codec;
pub mod collection;
pub mod diagnostics;
pub mod error;
pub mod kv;
pub mod meals;
pub mod models;
pub mod profile;
pub mod queue;
pub mod store;

pub use aggregation::{DailyTotals, GoalProgress, MacroProgress, NutritionTotals};
pub use cache::{CacheEntry, TtlCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{decode, encode};
pub use diagnostics::{CorruptionEvent, Diagnostics};
pub use error::{KvError, StoreError, StoreResult};
pub use kv::{FileAdapter, KvAdapter, MemoryAdapter};
pub use meals::MealRepository;
pub use models::{
    FoodItem, Meal, MealUpdate, NewMeal, NutritionGoals, Preferences, Profile, SyncItemKind,
    SyncQueueItem,
};
pub use profile::{ProfileStore, SettingsMap};
pub use queue::SyncQueue;
pub use store::{ExportData, LocalStore};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
