mod cache;
mod config_cmd;
mod data;
mod goals;
mod meal;
mod profile;
mod settings;
mod sync_cmd;

pub use cache::CacheCommand;
pub use config_cmd::ConfigCommand;
pub use data::DataCommand;
pub use goals::GoalsCommand;
pub use meal::MealCommand;
pub use profile::ProfileCommand;
pub use settings::SettingsCommand;
pub use sync_cmd::SyncCommand;

use chrono::NaiveDate;
use clap::ValueEnum;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Parses a YYYY-MM-DD date argument.
pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("Invalid date format '{}'. Use YYYY-MM-DD.", value))
}
