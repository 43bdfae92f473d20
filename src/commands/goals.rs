use calai_core::{LocalStore, NutritionGoals};
use clap::{Args, Subcommand};

use super::OutputFormat;

#[derive(Args)]
pub struct GoalsCommand {
    #[command(subcommand)]
    pub command: GoalsSubcommand,
}

#[derive(Subcommand)]
pub enum GoalsSubcommand {
    /// Show daily nutrition goals
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Change daily nutrition goals
    Set {
        /// Daily calories (kcal)
        #[arg(long)]
        calories: Option<f64>,

        /// Share of calories from protein (percent)
        #[arg(long)]
        protein: Option<f64>,

        /// Share of calories from carbs (percent)
        #[arg(long)]
        carbs: Option<f64>,

        /// Share of calories from fat (percent)
        #[arg(long)]
        fat: Option<f64>,
    },
}

impl GoalsCommand {
    pub async fn run(&self, store: &LocalStore) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            GoalsSubcommand::Show { format } => {
                let goals = store.profile().effective_goals().await?;
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&goals)?),
                    OutputFormat::Text => print_goals(&goals),
                }
                Ok(())
            }
            GoalsSubcommand::Set {
                calories,
                protein,
                carbs,
                fat,
            } => {
                let mut goals = store.profile().effective_goals().await?;
                if let Some(calories) = calories {
                    goals.daily_calories = *calories;
                }
                if let Some(protein) = protein {
                    goals.protein_percent = *protein;
                }
                if let Some(carbs) = carbs {
                    goals.carbs_percent = *carbs;
                }
                if let Some(fat) = fat {
                    goals.fat_percent = *fat;
                }
                validate_goals(&goals)?;

                store.profile().save_nutrition_goals(&goals).await?;
                println!("Saved goals:");
                println!();
                print_goals(&goals);

                let share = goals.protein_percent + goals.carbs_percent + goals.fat_percent;
                if (share - 100.0).abs() > 0.5 {
                    println!();
                    println!("Note: macro shares add up to {:.0}%, not 100%", share);
                }
                Ok(())
            }
        }
    }
}

fn validate_goals(goals: &NutritionGoals) -> Result<(), String> {
    let fields = [
        ("calories", goals.daily_calories),
        ("protein", goals.protein_percent),
        ("carbs", goals.carbs_percent),
        ("fat", goals.fat_percent),
    ];
    for (name, value) in fields {
        if !value.is_finite() || value < 0.0 {
            return Err(format!("--{} must be a non-negative number", name));
        }
    }
    Ok(())
}

fn print_goals(goals: &NutritionGoals) {
    println!("Calories: {:.0} kcal", goals.daily_calories);
    println!(
        "Protein:  {:.0}% ({:.0}g)",
        goals.protein_percent,
        goals.protein_grams()
    );
    println!(
        "Carbs:    {:.0}% ({:.0}g)",
        goals.carbs_percent,
        goals.carbs_grams()
    );
    println!("Fat:      {:.0}% ({:.0}g)", goals.fat_percent, goals.fat_grams());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_goals() {
        assert!(validate_goals(&NutritionGoals::default()).is_ok());

        let negative = NutritionGoals {
            fat_percent: -5.0,
            ..NutritionGoals::default()
        };
        assert_eq!(
            validate_goals(&negative).unwrap_err(),
            "--fat must be a non-negative number"
        );
    }
}
