use clap::{Args, Subcommand};

use super::OutputFormat;
use crate::config::Config;

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

impl ConfigCommand {
    pub fn run(&self, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&redacted(config))?);
                    }
                    OutputFormat::Text => {
                        println!("Configuration");
                        println!("=============\n");

                        if let Some(path) = &config.config_file {
                            println!("Config file: {}", path.display());
                        } else {
                            println!(
                                "Config file: {} (not found)",
                                Config::default_config_path().display()
                            );
                        }
                        println!();

                        println!("data_dir: {}", config.data_dir.value.display());
                        println!("  source: {}", config.data_dir.source);
                        println!();

                        println!("cache_ttl_secs: {}", config.cache_ttl_secs.value);
                        println!("  source: {}", config.cache_ttl_secs.source);
                        println!();

                        println!(
                            "sync.server_url: {}",
                            config.sync.server_url.as_deref().unwrap_or("(not set)")
                        );
                        println!(
                            "sync.api_key: {}",
                            if config.sync.api_key.is_some() {
                                "(set)"
                            } else {
                                "(not set)"
                            }
                        );
                        println!("sync.batch_size: {}", config.sync.batch_size);
                    }
                }
                Ok(())
            }
        }
    }
}

/// Copy of `config` with the API key masked.
fn redacted(config: &Config) -> Config {
    let mut config = config.clone();
    if config.sync.api_key.is_some() {
        config.sync.api_key = Some("********".to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_redacted_masks_api_key() {
        let temp_dir = tempdir().unwrap();
        let mut config = Config::load(Some(temp_dir.path().join("none.yaml"))).unwrap();
        config.sync.api_key = Some("secret".to_string());

        let json = serde_json::to_string(&redacted(&config)).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("********"));
    }
}
