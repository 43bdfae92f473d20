use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What a queued mutation describes. Unknown tags written by newer clients
/// are kept as `Other` so they survive a round trip through the queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SyncItemKind {
    Meal,
    MealUpdate,
    MealDelete,
    Profile,
    NutritionGoals,
    Settings,
    Other(String),
}

impl SyncItemKind {
    pub fn as_str(&self) -> &str {
        match self {
            SyncItemKind::Meal => "meal",
            SyncItemKind::MealUpdate => "meal_update",
            SyncItemKind::MealDelete => "meal_delete",
            SyncItemKind::Profile => "profile",
            SyncItemKind::NutritionGoals => "nutrition_goals",
            SyncItemKind::Settings => "settings",
            SyncItemKind::Other(tag) => tag,
        }
    }
}

impl fmt::Display for SyncItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err("Sync item type must not be empty".to_string());
        }
        Ok(SyncItemKind::from(s.to_string()))
    }
}

impl From<String> for SyncItemKind {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "meal" => SyncItemKind::Meal,
            "meal_update" => SyncItemKind::MealUpdate,
            "meal_delete" => SyncItemKind::MealDelete,
            "profile" => SyncItemKind::Profile,
            "nutrition_goals" => SyncItemKind::NutritionGoals,
            "settings" => SyncItemKind::Settings,
            _ => SyncItemKind::Other(tag),
        }
    }
}

impl From<SyncItemKind> for String {
    fn from(kind: SyncItemKind) -> Self {
        match kind {
            SyncItemKind::Other(tag) => tag,
            known => known.as_str().to_string(),
        }
    }
}

/// A pending mutation awaiting remote application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SyncItemKind,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub retries: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        assert_eq!(SyncItemKind::Meal.to_string(), "meal");
        assert_eq!(SyncItemKind::MealUpdate.to_string(), "meal_update");
        assert_eq!(SyncItemKind::MealDelete.to_string(), "meal_delete");
        assert_eq!(SyncItemKind::NutritionGoals.to_string(), "nutrition_goals");
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!(
            SyncItemKind::from_str("meal_delete").unwrap(),
            SyncItemKind::MealDelete
        );
        assert_eq!(
            SyncItemKind::from_str("water_log").unwrap(),
            SyncItemKind::Other("water_log".to_string())
        );
        assert!(SyncItemKind::from_str("").is_err());
    }

    #[test]
    fn test_item_serializes_kind_as_type() {
        let item = SyncQueueItem {
            id: "q1".to_string(),
            kind: SyncItemKind::MealUpdate,
            payload: serde_json::json!({ "id": "m1" }),
            created_at: "2025-01-15T12:00:00Z".parse().unwrap(),
            retries: 0,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["type"], "meal_update");
        assert_eq!(json["retries"], 0);
    }

    #[test]
    fn test_unknown_kind_survives_roundtrip() {
        let json = r#"{
            "id": "q1",
            "type": "water_log",
            "payload": {},
            "created_at": "2025-01-15T12:00:00Z"
        }"#;
        let item: SyncQueueItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.kind, SyncItemKind::Other("water_log".to_string()));
        assert_eq!(item.retries, 0);
        assert_eq!(serde_json::to_value(&item).unwrap()["type"], "water_log");
    }
}
