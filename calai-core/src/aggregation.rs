//! Nutrition totals computed from meals.
//!
//! Everything here is a pure function of its inputs; the repository supplies
//! the meals.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::models::{Meal, NutritionGoals};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NutritionTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    pub meal_count: usize,
}

impl NutritionTotals {
    pub fn add_meal(&mut self, meal: &Meal) {
        for food in &meal.foods {
            self.calories += food.calories;
            self.protein += food.protein;
            self.carbs += food.carbs;
            self.fat += food.fat;
        }
        self.meal_count += 1;
    }
}

/// Sums the foods of every meal.
pub fn sum_nutrition<'a>(meals: impl IntoIterator<Item = &'a Meal>) -> NutritionTotals {
    let mut totals = NutritionTotals::default();
    for meal in meals {
        totals.add_meal(meal);
    }
    totals
}

/// Returns `[start, end)` of `date` in `tz`, as UTC instants.
///
/// A day is midnight to the next midnight, so days around DST changes are 23
/// or 25 hours long.
pub fn day_bounds<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let next = date.succ_opt().unwrap_or(date);
    (start_of_day(date, tz), start_of_day(next, tz))
}

fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(chrono::NaiveTime::MIN);
    // Zones that skip midnight on a DST change start the day an hour later
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyTotals {
    pub date: NaiveDate,
    pub totals: NutritionTotals,
}

/// Totals per calendar day in `tz` for every day in `from..=to`, including
/// days without meals. Meals outside the range are ignored.
pub fn daily_totals<Tz: TimeZone>(
    meals: &[Meal],
    from: NaiveDate,
    to: NaiveDate,
    tz: &Tz,
) -> Vec<DailyTotals> {
    let mut by_day: BTreeMap<NaiveDate, NutritionTotals> = from
        .iter_days()
        .take_while(|day| *day <= to)
        .map(|day| (day, NutritionTotals::default()))
        .collect();

    for meal in meals {
        let day = meal.eaten_at.with_timezone(tz).date_naive();
        if let Some(totals) = by_day.get_mut(&day) {
            totals.add_meal(meal);
        }
    }

    by_day
        .into_iter()
        .map(|(date, totals)| DailyTotals { date, totals })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacroProgress {
    pub consumed: f64,
    pub target: f64,
}

impl MacroProgress {
    /// Share of the target consumed, in percent. Zero targets report zero.
    pub fn percent(&self) -> f64 {
        if self.target <= 0.0 {
            0.0
        } else {
            self.consumed / self.target * 100.0
        }
    }

    pub fn remaining(&self) -> f64 {
        (self.target - self.consumed).max(0.0)
    }
}

/// Consumption against daily goals. Calories are kcal, macros grams.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalProgress {
    pub calories: MacroProgress,
    pub protein: MacroProgress,
    pub carbs: MacroProgress,
    pub fat: MacroProgress,
}

pub fn goal_progress(totals: &NutritionTotals, goals: &NutritionGoals) -> GoalProgress {
    GoalProgress {
        calories: MacroProgress {
            consumed: totals.calories,
            target: goals.daily_calories,
        },
        protein: MacroProgress {
            consumed: totals.protein,
            target: goals.protein_grams(),
        },
        carbs: MacroProgress {
            consumed: totals.carbs,
            target: goals.carbs_grams(),
        },
        fat: MacroProgress {
            consumed: totals.fat,
            target: goals.fat_grams(),
        },
    }
}
