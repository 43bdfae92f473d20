use calai_core::LocalStore;
use clap::{Args, Subcommand};
use serde_json::Value;

use super::OutputFormat;

#[derive(Args)]
pub struct SettingsCommand {
    #[command(subcommand)]
    pub command: SettingsSubcommand,
}

#[derive(Subcommand)]
pub enum SettingsSubcommand {
    /// Print one setting
    Get {
        /// Setting name
        key: String,

        /// Value to print when the setting is unset
        #[arg(long)]
        default: Option<String>,
    },

    /// Set one setting
    Set {
        /// Setting name
        key: String,

        /// Value; parsed as JSON when possible, otherwise stored as text
        value: String,
    },

    /// List all settings
    List {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl SettingsCommand {
    pub async fn run(&self, store: &LocalStore) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            SettingsSubcommand::Get { key, default } => {
                let fallback = default.as_deref().map(parse_value).unwrap_or(Value::Null);
                let value: Value = store.profile().get_setting(key, fallback).await?;
                if value.is_null() {
                    return Err(format!("Setting not found: {}", key).into());
                }
                println!("{}", display_value(&value));
                Ok(())
            }
            SettingsSubcommand::Set { key, value } => {
                let value = parse_value(value);
                store.profile().save_setting(key, &value).await?;
                println!("{} = {}", key, display_value(&value));
                Ok(())
            }
            SettingsSubcommand::List { format } => {
                let settings = store.profile().get_settings().await?;
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&settings)?)
                    }
                    OutputFormat::Text => {
                        if settings.is_empty() {
                            println!("No settings stored.");
                        }
                        for (key, value) in &settings {
                            println!("{} = {}", key, display_value(value));
                        }
                    }
                }
                Ok(())
            }
        }
    }
}

/// `true`, `42` or `{"a":1}` become JSON values; anything else is a string.
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Strings print bare, everything else as JSON.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
