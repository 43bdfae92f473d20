use calai_core::{
    DailyTotals, FoodItem, GoalProgress, LocalStore, Meal, MealUpdate, NewMeal, NutritionTotals,
};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Subcommand};

use super::{parse_date, OutputFormat};

#[derive(Args)]
pub struct MealCommand {
    #[command(subcommand)]
    pub command: MealSubcommand,
}

#[derive(Subcommand)]
pub enum MealSubcommand {
    /// Log a meal
    Log {
        /// Food as NAME:CALORIES:PROTEIN:CARBS:FAT[:PORTION] (can be repeated)
        #[arg(long = "food", value_name = "FOOD")]
        foods: Vec<String>,

        /// When the meal was eaten (RFC 3339, "YYYY-MM-DD HH:MM" local, or
        /// YYYY-MM-DD); defaults to now
        #[arg(long)]
        at: Option<String>,

        /// Notes for the meal
        #[arg(long)]
        notes: Option<String>,

        /// URI of a photo of the meal
        #[arg(long)]
        image: Option<String>,
    },

    /// List logged meals, most recent first
    List {
        /// Maximum number of meals to show
        #[arg(long, short)]
        limit: Option<usize>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a meal
    Show {
        /// Meal ID
        id: String,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Change fields of a meal
    Edit {
        /// Meal ID
        id: String,

        /// Replace the foods (can be repeated)
        #[arg(long = "food", value_name = "FOOD")]
        foods: Vec<String>,

        /// New time eaten
        #[arg(long)]
        at: Option<String>,

        /// New notes
        #[arg(long, conflicts_with = "clear_notes")]
        notes: Option<String>,

        /// Remove the notes
        #[arg(long)]
        clear_notes: bool,

        /// New photo URI
        #[arg(long, conflicts_with = "clear_image")]
        image: Option<String>,

        /// Remove the photo
        #[arg(long)]
        clear_image: bool,
    },

    /// Delete a meal
    Delete {
        /// Meal ID
        id: String,
    },

    /// List meals eaten between two dates (inclusive, local time)
    Range {
        /// Start date (YYYY-MM-DD), defaults to 6 days before --to
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show nutrition totals for a day against your goals
    Summary {
        /// Date (YYYY-MM-DD), defaults to today
        #[arg(long, short)]
        date: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Show daily totals for the seven days ending on a date
    Week {
        /// Last day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        to: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl MealCommand {
    pub async fn run(&self, store: &LocalStore) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            MealSubcommand::Log {
                foods,
                at,
                notes,
                image,
            } => {
                let eaten_at = match at {
                    Some(at) => parse_eaten_at(at)?,
                    None => Utc::now(),
                };
                let mut new = NewMeal::new(eaten_at).with_foods(parse_foods(foods)?);
                if let Some(notes) = notes {
                    new = new.with_notes(notes);
                }
                if let Some(image) = image {
                    new = new.with_image_uri(image);
                }

                let id = store.meals().save(new).await?;
                let meal = store.meals().get(&id).await?;
                println!("Logged meal:");
                println!();
                println!("{}", meal);
                Ok(())
            }
            MealSubcommand::List { limit, format } => {
                let meals = store.meals().list(*limit).await?;
                print_meals(&meals, format, "No meals logged yet.")
            }
            MealSubcommand::Show { id, format } => {
                let meal = store.meals().get(id).await?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&meal)?),
                    OutputFormat::Text => println!("{}", meal),
                }
                Ok(())
            }
            MealSubcommand::Edit {
                id,
                foods,
                at,
                notes,
                clear_notes,
                image,
                clear_image,
            } => {
                let updates = MealUpdate {
                    foods: if foods.is_empty() {
                        None
                    } else {
                        Some(parse_foods(foods)?)
                    },
                    eaten_at: at.as_deref().map(parse_eaten_at).transpose()?,
                    notes: edit_field(notes, *clear_notes),
                    image_uri: edit_field(image, *clear_image),
                    synced: None,
                };
                if updates.is_empty() {
                    return Err("Nothing to change. Pass --food, --at, --notes, --image or a --clear-* flag.".into());
                }

                let meal = store.meals().update(id, updates).await?;
                println!("Updated meal:");
                println!();
                println!("{}", meal);
                Ok(())
            }
            MealSubcommand::Delete { id } => {
                store.meals().delete(id).await?;
                println!("Deleted meal {}", id);
                Ok(())
            }
            MealSubcommand::Range { from, to, format } => {
                let to_date = match to {
                    Some(d) => parse_date(d)?,
                    None => Local::now().date_naive(),
                };
                let from_date = match from {
                    Some(d) => parse_date(d)?,
                    None => to_date - chrono::Duration::days(6),
                };
                if from_date > to_date {
                    return Err(format!("--from {} is after --to {}", from_date, to_date).into());
                }

                let (start, _) = calai_core::aggregation::day_bounds(from_date, &Local);
                let (_, end) = calai_core::aggregation::day_bounds(to_date, &Local);
                let meals = store.meals().query_by_range(start, end).await?;
                print_meals(
                    &meals,
                    format,
                    &format!("No meals found for {} to {}", from_date, to_date),
                )
            }
            MealSubcommand::Summary { date, format } => {
                let date = match date {
                    Some(d) => parse_date(d)?,
                    None => Local::now().date_naive(),
                };
                let totals = store.meals().aggregate_nutrition_in(date, &Local).await?;
                let goals = store.profile().effective_goals().await?;
                let progress = calai_core::aggregation::goal_progress(&totals, &goals);

                match format {
                    OutputFormat::Json => {
                        let summary = serde_json::json!({
                            "date": date,
                            "totals": totals,
                            "progress": progress,
                        });
                        println!("{}", serde_json::to_string_pretty(&summary)?);
                    }
                    OutputFormat::Text => print_summary(date, &totals, &progress),
                }
                Ok(())
            }
            MealSubcommand::Week { to, format } => {
                let to_date = match to {
                    Some(d) => parse_date(d)?,
                    None => Local::now().date_naive(),
                };
                let from_date = to_date - chrono::Duration::days(6);
                let days = store
                    .meals()
                    .daily_totals(from_date, to_date, &Local)
                    .await?;

                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&days)?),
                    OutputFormat::Text => print_week(&days),
                }
                Ok(())
            }
        }
    }
}

/// Parses NAME:CALORIES:PROTEIN:CARBS:FAT[:PORTION].
fn parse_food(arg: &str) -> Result<FoodItem, String> {
    let parts: Vec<&str> = arg.splitn(6, ':').map(str::trim).collect();
    if parts.len() < 5 || parts[0].is_empty() {
        return Err(format!(
            "Invalid food '{}'. Use NAME:CALORIES:PROTEIN:CARBS:FAT[:PORTION].",
            arg
        ));
    }

    let number = |index: usize, field: &str| -> Result<f64, String> {
        parts[index]
            .parse::<f64>()
            .map_err(|_| format!("Invalid {} '{}' in food '{}'", field, parts[index], arg))
    };

    let mut food = FoodItem::new(
        parts[0],
        number(1, "calories")?,
        number(2, "protein")?,
        number(3, "carbs")?,
        number(4, "fat")?,
    );
    if let Some(portion) = parts.get(5).filter(|p| !p.is_empty()) {
        food = food.with_portion_size(*portion);
    }
    Ok(food)
}

fn parse_foods(args: &[String]) -> Result<Vec<FoodItem>, String> {
    args.iter().map(|arg| parse_food(arg)).collect()
}

/// Maps `--x value` / `--clear-x` onto a clearable update field.
fn edit_field(value: &Option<String>, clear: bool) -> Option<Option<String>> {
    if clear {
        Some(None)
    } else {
        value.clone().map(Some)
    }
}

/// Parses an RFC 3339 timestamp, or a local "YYYY-MM-DD HH:MM" / YYYY-MM-DD.
fn parse_eaten_at(value: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(12, 0, 0))
        })
        .ok_or_else(|| {
            format!(
                "Invalid time '{}'. Use RFC 3339, \"YYYY-MM-DD HH:MM\" or YYYY-MM-DD.",
                value
            )
        })?;

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| format!("Time '{}' does not exist in the local time zone", value))
}

fn print_meals(
    meals: &[Meal],
    format: &OutputFormat,
    empty_message: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(meals)?),
        OutputFormat::Text => {
            if meals.is_empty() {
                println!("{}", empty_message);
                return Ok(());
            }

            println!(
                "{:<36}  {:<16}  {:>6}  {:<5}  NOTES",
                "ID", "EATEN", "KCAL", "SYNC"
            );
            println!("{}", "-".repeat(80));
            for meal in meals {
                println!(
                    "{:<36}  {:<16}  {:>6.0}  {:<5}  {}",
                    meal.id,
                    meal.eaten_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d %H:%M")
                        .to_string(),
                    meal.total_calories(),
                    if meal.synced { "yes" } else { "no" },
                    meal.notes.as_deref().unwrap_or("")
                );
            }
            println!("\nTotal: {} meal(s)", meals.len());
        }
    }
    Ok(())
}

/// "Calories: 650 | Protein: 25g | Carbs: 80g | Fat: 28g"
fn format_totals(totals: &NutritionTotals) -> String {
    format!(
        "Calories: {:.0} | Protein: {:.0}g | Carbs: {:.0}g | Fat: {:.0}g",
        totals.calories, totals.protein, totals.carbs, totals.fat
    )
}

fn print_summary(date: NaiveDate, totals: &NutritionTotals, progress: &GoalProgress) {
    println!("{}", date);
    println!("{}", "-".repeat(60));
    println!("{} meal(s)", totals.meal_count);
    println!("{}", format_totals(totals));
    println!();

    let rows = [
        ("Calories", "kcal", &progress.calories),
        ("Protein", "g", &progress.protein),
        ("Carbs", "g", &progress.carbs),
        ("Fat", "g", &progress.fat),
    ];
    for (name, unit, row) in rows {
        println!(
            "  {:<9} {:>6.0} / {:<6.0}{:<5} {:>4.0}%  ({:.0}{} left)",
            name,
            row.consumed,
            row.target,
            unit,
            row.percent(),
            row.remaining(),
            unit
        );
    }
}

fn print_week(days: &[DailyTotals]) {
    for day in days {
        println!(
            "{}  {:>2} meal(s)  {}",
            day.date.format("%a %Y-%m-%d"),
            day.totals.meal_count,
            format_totals(&day.totals)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_food() {
        let food = parse_food("Oatmeal:150:5:27:3").unwrap();
        assert_eq!(food.name, "Oatmeal");
        assert_eq!(food.calories, 150.0);
        assert_eq!(food.fat, 3.0);
        assert_eq!(food.portion_size, None);
    }

    #[test]
    fn test_parse_food_with_portion() {
        let food = parse_food("Rice : 200 : 4 : 44 : 0.5 : 1 cup").unwrap();
        assert_eq!(food.name, "Rice");
        assert_eq!(food.portion_size, Some("1 cup".to_string()));
    }

    #[test]
    fn test_parse_food_errors() {
        assert!(parse_food("Oatmeal:150").is_err());
        assert!(parse_food(":150:5:27:3").is_err());
        let err = parse_food("Oatmeal:lots:5:27:3").unwrap_err();
        assert!(err.contains("calories"));
    }

    #[test]
    fn test_parse_eaten_at_rfc3339() {
        let at = parse_eaten_at("2025-01-15T12:30:00+02:00").unwrap();
        assert_eq!(at, Utc.with_ymd_and_hms(2025, 1, 15, 10, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_eaten_at_local_forms() {
        let at = parse_eaten_at("2025-01-15 08:15").unwrap();
        assert_eq!(
            at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
            "2025-01-15 08:15"
        );
        let noon = parse_eaten_at("2025-01-15").unwrap();
        assert_eq!(noon.with_timezone(&Local).format("%H:%M").to_string(), "12:00");
        assert!(parse_eaten_at("yesterday").is_err());
    }

    #[test]
    fn test_edit_field() {
        assert_eq!(edit_field(&None, false), None);
        assert_eq!(edit_field(&Some("x".to_string()), false), Some(Some("x".to_string())));
        assert_eq!(edit_field(&None, true), Some(None));
    }

    #[test]
    fn test_format_totals() {
        let totals = NutritionTotals {
            calories: 650.4,
            protein: 25.0,
            carbs: 80.0,
            fat: 28.0,
            meal_count: 1,
        };
        assert_eq!(
            format_totals(&totals),
            "Calories: 650 | Protein: 25g | Carbs: 80g | Fat: 28g"
        );
    }
}
