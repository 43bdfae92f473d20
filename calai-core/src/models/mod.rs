mod meal;
mod profile;
mod sync_item;

pub use meal::{FoodItem, Meal, MealUpdate, NewMeal};
pub use profile::{NutritionGoals, Preferences, Profile};
pub use sync_item::{SyncItemKind, SyncQueueItem};
