//! Meal repository.
//!
//! All meals live in one JSON array under the `meals` key, most recently
//! inserted first. The adapter can only replace that array as a whole, so
//! every mutation is a read-modify-write performed while holding the `meals`
//! collection lock. Mutations of unsynced data are recorded in the
//! [`SyncQueue`] before the lock is released; if that enqueue fails the
//! collection write is rolled back.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::aggregation::{self, DailyTotals, GoalProgress, NutritionTotals};
use crate::codec::Backend;
use crate::collection::Collection;
use crate::error::{StoreError, StoreResult};
use crate::models::{FoodItem, Meal, MealUpdate, NewMeal, NutritionGoals, SyncItemKind};
use crate::queue::SyncQueue;

const KEY: &str = Collection::Meals.key();

#[derive(Serialize)]
struct UpdatePayload<'a> {
    id: &'a str,
    updates: &'a MealUpdate,
}

#[derive(Serialize)]
struct DeletePayload<'a> {
    id: &'a str,
}

fn validate_foods(foods: &[FoodItem]) -> StoreResult<()> {
    foods
        .iter()
        .try_for_each(FoodItem::validate)
        .map_err(StoreError::Invalid)
}

#[derive(Clone)]
pub struct MealRepository {
    backend: Arc<Backend>,
    queue: SyncQueue,
}

impl MealRepository {
    pub(crate) fn new(backend: Arc<Backend>, queue: SyncQueue) -> Self {
        Self { backend, queue }
    }

    async fn load(&self) -> StoreResult<Vec<Meal>> {
        self.backend.read_or_default(KEY).await
    }

    /// Stores a new meal and returns its id.
    ///
    /// The meal is placed first in the collection. Unless it is already
    /// marked synced, a `meal` item carrying the full record is enqueued.
    pub async fn save(&self, new: NewMeal) -> StoreResult<String> {
        validate_foods(&new.foods)?;

        let _guard = self.backend.locks.lock(Collection::Meals).await;
        let mut meals = self.load().await?;

        let meal = Meal::from_new(new, Uuid::new_v4().to_string(), self.backend.clock.now());
        meals.insert(0, meal.clone());
        if meal.synced {
            self.backend.write(KEY, &meals).await?;
        } else {
            self.backend
                .write_then(KEY, &meals, self.queue.enqueue(SyncItemKind::Meal, &meal))
                .await?;
        }

        tracing::debug!(id = %meal.id, foods = meal.foods.len(), "saved meal");
        Ok(meal.id)
    }

    /// Lists meals, most recently inserted first.
    pub async fn list(&self, limit: Option<usize>) -> StoreResult<Vec<Meal>> {
        let mut meals = self.load().await?;
        if let Some(limit) = limit {
            meals.truncate(limit);
        }
        Ok(meals)
    }

    pub async fn get(&self, id: &str) -> StoreResult<Meal> {
        self.load()
            .await?
            .into_iter()
            .find(|meal| meal.id == id)
            .ok_or_else(|| StoreError::not_found("meal", id))
    }

    /// Merges `updates` into the meal and returns the merged record.
    ///
    /// Fails with `NotFound` without writing anything if `id` is unknown.
    pub async fn update(&self, id: &str, updates: MealUpdate) -> StoreResult<Meal> {
        if let Some(foods) = &updates.foods {
            validate_foods(foods)?;
        }

        let _guard = self.backend.locks.lock(Collection::Meals).await;
        let mut meals = self.load().await?;

        let meal = meals
            .iter_mut()
            .find(|meal| meal.id == id)
            .ok_or_else(|| StoreError::not_found("meal", id))?;
        meal.apply(&updates);
        let merged = meal.clone();

        let payload = UpdatePayload {
            id,
            updates: &updates,
        };
        self.backend
            .write_then(KEY, &meals, self.queue.enqueue(SyncItemKind::MealUpdate, &payload))
            .await?;

        tracing::debug!(id, "updated meal");
        Ok(merged)
    }

    /// Removes a meal. Fails with `NotFound` if `id` is unknown.
    pub async fn delete(&self, id: &str) -> StoreResult<()> {
        let _guard = self.backend.locks.lock(Collection::Meals).await;
        let mut meals = self.load().await?;

        let before = meals.len();
        meals.retain(|meal| meal.id != id);
        if meals.len() == before {
            return Err(StoreError::not_found("meal", id));
        }

        let payload = DeletePayload { id };
        self.backend
            .write_then(KEY, &meals, self.queue.enqueue(SyncItemKind::MealDelete, &payload))
            .await?;

        tracing::debug!(id, "deleted meal");
        Ok(())
    }

    /// Flags a meal as accepted by the server. Nothing is enqueued.
    pub async fn mark_synced(&self, id: &str) -> StoreResult<()> {
        let _guard = self.backend.locks.lock(Collection::Meals).await;
        let mut meals = self.load().await?;

        let meal = meals
            .iter_mut()
            .find(|meal| meal.id == id)
            .ok_or_else(|| StoreError::not_found("meal", id))?;
        if meal.synced {
            return Ok(());
        }
        meal.synced = true;

        self.backend.write(KEY, &meals).await
    }

    /// Enqueues a `meal` item for every unsynced meal that has none pending.
    ///
    /// Covers meals whose queue entry was lost, e.g. when both the enqueue
    /// and the rollback of a save failed. Returns how many were enqueued.
    pub async fn requeue_unsynced(&self) -> StoreResult<usize> {
        let _guard = self.backend.locks.lock(Collection::Meals).await;
        let meals = self.load().await?;
        let pending = self.queue.peek_all().await?;

        let mut requeued = 0;
        for meal in meals.iter().rev().filter(|meal| !meal.synced) {
            let queued = pending.iter().any(|item| {
                item.kind == SyncItemKind::Meal && item.payload["id"] == meal.id.as_str()
            });
            if queued {
                continue;
            }
            self.queue.enqueue(SyncItemKind::Meal, meal).await?;
            requeued += 1;
        }

        if requeued > 0 {
            tracing::warn!(requeued, "re-enqueued unsynced meals missing from the sync queue");
        }
        Ok(requeued)
    }

    pub async fn unsynced(&self) -> StoreResult<Vec<Meal>> {
        let mut meals = self.load().await?;
        meals.retain(|meal| !meal.synced);
        Ok(meals)
    }

    /// Meals eaten in `[start, end)`, in collection order.
    pub async fn query_by_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> StoreResult<Vec<Meal>> {
        let mut meals = self.load().await?;
        meals.retain(|meal| meal.eaten_at >= start && meal.eaten_at < end);
        Ok(meals)
    }

    /// Totals for the UTC calendar day `date`.
    pub async fn aggregate_nutrition(&self, date: NaiveDate) -> StoreResult<NutritionTotals> {
        self.aggregate_nutrition_in(date, &Utc).await
    }

    /// Totals for the calendar day `date` in `tz`.
    pub async fn aggregate_nutrition_in<Tz: TimeZone>(
        &self,
        date: NaiveDate,
        tz: &Tz,
    ) -> StoreResult<NutritionTotals> {
        let (start, end) = aggregation::day_bounds(date, tz);
        let meals = self.query_by_range(start, end).await?;
        Ok(aggregation::sum_nutrition(&meals))
    }

    /// Totals for each day in `from..=to` in `tz`.
    pub async fn daily_totals<Tz: TimeZone>(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        tz: &Tz,
    ) -> StoreResult<Vec<DailyTotals>> {
        let (start, _) = aggregation::day_bounds(from, tz);
        let (_, end) = aggregation::day_bounds(to, tz);
        let meals = self.query_by_range(start, end).await?;
        Ok(aggregation::daily_totals(&meals, from, to, tz))
    }

    /// Consumption on `date` in `tz` measured against `goals`.
    pub async fn goal_progress<Tz: TimeZone>(
        &self,
        date: NaiveDate,
        tz: &Tz,
        goals: &NutritionGoals,
    ) -> StoreResult<GoalProgress> {
        let totals = self.aggregate_nutrition_in(date, tz).await?;
        Ok(aggregation::goal_progress(&totals, goals))
    }

    /// Removes the collection; the caller holds the `Meals` lock.
    pub(crate) async fn clear_locked(&self) -> StoreResult<()> {
        self.backend.adapter.remove(KEY).await?;
        Ok(())
    }
}
