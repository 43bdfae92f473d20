use serde::{Deserialize, Serialize};
use std::fmt;

/// Daily targets. Macro targets are percentages of `daily_calories`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionGoals {
    pub daily_calories: f64,
    pub protein_percent: f64,
    pub carbs_percent: f64,
    pub fat_percent: f64,
}

impl Default for NutritionGoals {
    fn default() -> Self {
        Self {
            daily_calories: 2000.0,
            protein_percent: 30.0,
            carbs_percent: 40.0,
            fat_percent: 30.0,
        }
    }
}

impl NutritionGoals {
    pub fn protein_grams(&self) -> f64 {
        self.daily_calories * self.protein_percent / 100.0 / 4.0
    }

    pub fn carbs_grams(&self) -> f64 {
        self.daily_calories * self.carbs_percent / 100.0 / 4.0
    }

    pub fn fat_grams(&self) -> f64 {
        self.daily_calories * self.fat_percent / 100.0 / 9.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diet_type: Option<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub notifications_enabled: bool,
}

/// The single user profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub goals: NutritionGoals,
    #[serde(default)]
    pub preferences: Preferences,
}

impl Profile {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            goals: NutritionGoals::default(),
            preferences: Preferences::default(),
        }
    }

    pub fn with_goals(mut self, goals: NutritionGoals) -> Self {
        self.goals = goals;
        self
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} <{}>", self.name, self.email)?;
        writeln!(
            f,
            "Goals: {:.0} kcal (P {:.0}% / C {:.0}% / F {:.0}%)",
            self.goals.daily_calories,
            self.goals.protein_percent,
            self.goals.carbs_percent,
            self.goals.fat_percent
        )?;
        if let Some(diet) = &self.preferences.diet_type {
            writeln!(f, "Diet: {}", diet)?;
        }
        if !self.preferences.allergies.is_empty() {
            writeln!(f, "Allergies: {}", self.preferences.allergies.join(", "))?;
        }
        write!(
            f,
            "Notifications: {}",
            if self.preferences.notifications_enabled {
                "on"
            } else {
                "off"
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_goal_grams() {
        let goals = NutritionGoals::default();
        assert_eq!(goals.protein_grams(), 150.0);
        assert_eq!(goals.carbs_grams(), 200.0);
        assert!((goals.fat_grams() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_profile_defaults_missing_sections() {
        let profile: Profile =
            serde_json::from_str(r#"{"name": "Ana", "email": "ana@example.com"}"#).unwrap();
        assert_eq!(profile.goals, NutritionGoals::default());
        assert!(profile.preferences.allergies.is_empty());
    }

    #[test]
    fn test_profile_display() {
        let mut profile = Profile::new("Ana", "ana@example.com");
        profile.preferences.allergies = vec!["peanuts".to_string()];
        let output = format!("{}", profile);
        assert!(output.contains("Ana <ana@example.com>"));
        assert!(output.contains("2000 kcal"));
        assert!(output.contains("peanuts"));
    }
}
