use calai_core::{LocalStore, Profile};
use clap::{Args, Subcommand};

use super::OutputFormat;

#[derive(Args)]
pub struct ProfileCommand {
    #[command(subcommand)]
    pub command: ProfileSubcommand,
}

#[derive(Subcommand)]
pub enum ProfileSubcommand {
    /// Show the profile
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Create or change the profile
    Set {
        /// Display name (required for a new profile)
        #[arg(long)]
        name: Option<String>,

        /// Email address (required for a new profile)
        #[arg(long)]
        email: Option<String>,

        /// Diet type (e.g., vegetarian)
        #[arg(long)]
        diet: Option<String>,

        /// Allergy (can be repeated, replaces the current list)
        #[arg(long = "allergy", value_name = "ALLERGY")]
        allergies: Vec<String>,

        /// Enable or disable notifications
        #[arg(long)]
        notifications: Option<bool>,
    },
}

impl ProfileCommand {
    pub async fn run(&self, store: &LocalStore) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ProfileSubcommand::Show { format } => {
                let Some(profile) = store.profile().get_profile().await? else {
                    println!("No profile yet. Create one with: calai profile set --name NAME --email EMAIL");
                    return Ok(());
                };
                match format {
                    OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&profile)?),
                    OutputFormat::Text => println!("{}", profile),
                }
                Ok(())
            }
            ProfileSubcommand::Set {
                name,
                email,
                diet,
                allergies,
                notifications,
            } => {
                let mut profile = match store.profile().get_profile().await? {
                    Some(profile) => profile,
                    None => {
                        let name = name
                            .as_ref()
                            .ok_or("--name is required for a new profile")?;
                        let email = email
                            .as_ref()
                            .ok_or("--email is required for a new profile")?;
                        Profile::new(name, email)
                    }
                };

                if let Some(name) = name {
                    profile.name = name.clone();
                }
                if let Some(email) = email {
                    profile.email = email.clone();
                }
                if let Some(diet) = diet {
                    profile.preferences.diet_type = Some(diet.clone());
                }
                if !allergies.is_empty() {
                    profile.preferences.allergies = allergies.clone();
                }
                if let Some(enabled) = notifications {
                    profile.preferences.notifications_enabled = *enabled;
                }

                store.profile().save_profile(&profile).await?;
                println!("Saved profile:");
                println!();
                println!("{}", profile);
                Ok(())
            }
        }
    }
}
