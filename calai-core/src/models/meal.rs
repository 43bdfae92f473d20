use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One recognized food within a meal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodItem {
    pub name: String,
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    /// Recognition confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portion_size: Option<String>,
}

impl FoodItem {
    pub fn new(name: impl Into<String>, calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            name: name.into(),
            calories,
            protein,
            carbs,
            fat,
            confidence: 1.0,
            portion_size: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_portion_size(mut self, portion_size: impl Into<String>) -> Self {
        self.portion_size = Some(portion_size.into());
        self
    }

    /// Checks that macros are finite and non-negative and that confidence is
    /// within `[0, 1]`.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("calories", self.calories),
            ("protein", self.protein),
            ("carbs", self.carbs),
            ("fat", self.fat),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} of '{}' must be >= 0, got {}", field, self.name, value));
            }
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(format!(
                "confidence of '{}' must be within [0, 1], got {}",
                self.name, self.confidence
            ));
        }
        Ok(())
    }
}

/// A logged meal as stored in the `meals` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meal {
    pub id: String,
    pub foods: Vec<FoodItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// When the user says the meal was eaten.
    pub eaten_at: DateTime<Utc>,
    #[serde(default)]
    pub synced: bool,
    /// When the meal was written to the store.
    pub created_at: DateTime<Utc>,
}

impl Meal {
    /// Builds the stored record from caller input.
    pub fn from_new(new: NewMeal, id: String, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            foods: new.foods,
            image_uri: new.image_uri,
            notes: new.notes,
            eaten_at: new.eaten_at,
            synced: new.synced,
            created_at,
        }
    }

    /// Applies every field present in `update`.
    pub fn apply(&mut self, update: &MealUpdate) {
        if let Some(foods) = &update.foods {
            self.foods = foods.clone();
        }
        if let Some(image_uri) = &update.image_uri {
            self.image_uri = image_uri.clone();
        }
        if let Some(notes) = &update.notes {
            self.notes = notes.clone();
        }
        if let Some(eaten_at) = update.eaten_at {
            self.eaten_at = eaten_at;
        }
        if let Some(synced) = update.synced {
            self.synced = synced;
        }
    }

    pub fn total_calories(&self) -> f64 {
        self.foods.iter().map(|f| f.calories).sum()
    }
}

impl fmt::Display for Meal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Meal: {}", self.eaten_at.format("%Y-%m-%d %H:%M"))?;
        writeln!(f, "{}", "=".repeat(30))?;

        for food in &self.foods {
            write!(
                f,
                "  - {} ({:.0} kcal, P {:.1}g / C {:.1}g / F {:.1}g)",
                food.name, food.calories, food.protein, food.carbs, food.fat
            )?;
            if let Some(portion) = &food.portion_size {
                write!(f, " [{}]", portion)?;
            }
            writeln!(f)?;
        }

        if let Some(notes) = &self.notes {
            writeln!(f, "\nNotes: {}", notes)?;
        }

        write!(f, "ID: {}{}", self.id, if self.synced { "" } else { " (pending sync)" })
    }
}

/// Caller input for a new meal: a [`Meal`] without `id` or `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMeal {
    pub foods: Vec<FoodItem>,
    #[serde(default)]
    pub image_uri: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub eaten_at: DateTime<Utc>,
    #[serde(default)]
    pub synced: bool,
}

impl NewMeal {
    pub fn new(eaten_at: DateTime<Utc>) -> Self {
        Self {
            foods: Vec::new(),
            image_uri: None,
            notes: None,
            eaten_at,
            synced: false,
        }
    }

    pub fn with_foods(mut self, foods: Vec<FoodItem>) -> Self {
        self.foods = foods;
        self
    }

    pub fn with_food(mut self, food: FoodItem) -> Self {
        self.foods.push(food);
        self
    }

    pub fn with_image_uri(mut self, image_uri: impl Into<String>) -> Self {
        self.image_uri = Some(image_uri.into());
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Marks the meal as already known to the server, so saving it does not
    /// enqueue a sync item.
    pub fn already_synced(mut self) -> Self {
        self.synced = true;
        self
    }
}

/// Partial update of a meal. Absent fields are left untouched.
///
/// `image_uri` and `notes` can also be cleared: `Some(None)` removes the
/// value and travels as an explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MealUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foods: Option<Vec<FoodItem>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
    pub image_uri: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "nullable")]
    pub notes: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eaten_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced: Option<bool>,
}

impl MealUpdate {
    pub fn notes(notes: impl Into<String>) -> Self {
        Self {
            notes: Some(Some(notes.into())),
            ..Self::default()
        }
    }

    pub fn clear_notes() -> Self {
        Self {
            notes: Some(None),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Field that tells "absent" from "null": a missing field is `None`, an
/// explicit `null` is `Some(None)`.
mod nullable {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_meal() -> Meal {
        let eaten_at = Utc.with_ymd_and_hms(2025, 1, 15, 12, 30, 0).unwrap();
        let new = NewMeal::new(eaten_at)
            .with_food(FoodItem::new("Salad", 150.0, 5.0, 15.0, 5.0).with_portion_size("1 bowl"))
            .with_notes("Lunch");
        Meal::from_new(new, "m1".to_string(), eaten_at)
    }

    #[test]
    fn test_food_item_validate() {
        assert!(FoodItem::new("Rice", 200.0, 4.0, 44.0, 0.5).validate().is_ok());
        assert!(FoodItem::new("Rice", -1.0, 4.0, 44.0, 0.5).validate().is_err());
        assert!(FoodItem::new("Rice", f64::NAN, 4.0, 44.0, 0.5)
            .validate()
            .is_err());
        assert!(FoodItem::new("Rice", 200.0, 4.0, 44.0, 0.5)
            .with_confidence(1.2)
            .validate()
            .is_err());
    }

    #[test]
    fn test_apply_only_touches_present_fields() {
        let mut meal = sample_meal();
        let before = meal.clone();

        meal.apply(&MealUpdate::notes("Dinner instead"));

        assert_eq!(meal.notes, Some("Dinner instead".to_string()));
        assert_eq!(meal.foods, before.foods);
        assert_eq!(meal.eaten_at, before.eaten_at);
        assert_eq!(meal.synced, before.synced);
        assert_eq!(meal.created_at, before.created_at);
    }

    #[test]
    fn test_update_serializes_only_present_fields() {
        let json = serde_json::to_value(MealUpdate::notes("x")).unwrap();
        assert_eq!(json, serde_json::json!({ "notes": "x" }));
        assert!(MealUpdate::default().is_empty());
    }

    #[test]
    fn test_clear_notes_travels_as_null() {
        let json = serde_json::to_value(MealUpdate::clear_notes()).unwrap();
        assert_eq!(json, serde_json::json!({ "notes": null }));

        let update: MealUpdate = serde_json::from_value(json).unwrap();
        assert_eq!(update, MealUpdate::clear_notes());
        assert!(!update.is_empty());

        let absent: MealUpdate = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.notes, None);
    }

    #[test]
    fn test_apply_clears_notes_and_image() {
        let mut meal = sample_meal();
        meal.image_uri = Some("file:///photos/1.jpg".to_string());

        meal.apply(&MealUpdate {
            image_uri: Some(None),
            ..MealUpdate::clear_notes()
        });

        assert_eq!(meal.notes, None);
        assert_eq!(meal.image_uri, None);
        assert_eq!(meal.foods, sample_meal().foods);
    }

    #[test]
    fn test_meal_display() {
        let output = format!("{}", sample_meal());
        assert!(output.contains("2025-01-15 12:30"));
        assert!(output.contains("Salad"));
        assert!(output.contains("[1 bowl]"));
        assert!(output.contains("pending sync"));
    }

    #[test]
    fn test_meal_reads_missing_optional_fields() {
        let json = r#"{
            "id": "m1",
            "foods": [],
            "eaten_at": "2025-01-15T12:30:00Z",
            "created_at": "2025-01-15T12:31:00Z"
        }"#;
        let meal: Meal = serde_json::from_str(json).unwrap();
        assert!(!meal.synced);
        assert!(meal.notes.is_none());
    }
}
