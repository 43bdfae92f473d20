use calai_core::LocalStore;
use clap::{Args, Subcommand};

use crate::config::Config;

#[derive(Args)]
pub struct CacheCommand {
    #[command(subcommand)]
    pub command: CacheSubcommand,
}

#[derive(Subcommand)]
pub enum CacheSubcommand {
    /// Print a cached value if it has not expired
    Get {
        /// Cache key
        key: String,
    },

    /// Cache a JSON value
    Set {
        /// Cache key
        key: String,

        /// JSON value
        value: String,

        /// Lifetime in seconds (defaults to cache_ttl_secs from config)
        #[arg(long)]
        ttl: Option<u64>,
    },

    /// Remove one entry
    Remove {
        /// Cache key
        key: String,
    },

    /// Remove expired entries
    Sweep,

    /// Remove every cache entry
    Clear,
}

impl CacheCommand {
    pub async fn run(
        &self,
        store: &LocalStore,
        config: &Config,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            CacheSubcommand::Get { key } => {
                match store.cache().get::<serde_json::Value>(key).await? {
                    Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                    None => println!("No cached value for '{}'", key),
                }
                Ok(())
            }
            CacheSubcommand::Set { key, value, ttl } => {
                let value: serde_json::Value = serde_json::from_str(value)
                    .map_err(|e| format!("Value is not valid JSON: {}", e))?;
                let secs = ttl.unwrap_or(config.cache_ttl_secs.value);
                let lifetime = i64::try_from(secs)
                    .ok()
                    .and_then(chrono::Duration::try_seconds)
                    .ok_or_else(|| format!("TTL too large: {}", secs))?;

                store.cache().set(key, &value, lifetime).await?;
                println!("Cached '{}' for {}s", key, secs);
                Ok(())
            }
            CacheSubcommand::Remove { key } => {
                store.cache().remove(key).await?;
                println!("Removed '{}' from the cache", key);
                Ok(())
            }
            CacheSubcommand::Sweep => {
                let removed = store.cache().sweep().await?;
                println!("Removed {} expired entr{}", removed, plural_y(removed));
                Ok(())
            }
            CacheSubcommand::Clear => {
                let removed = store.cache().clear().await?;
                println!("Removed {} cache entr{}", removed, plural_y(removed));
                Ok(())
            }
        }
    }
}

fn plural_y(count: usize) -> &'static str {
    if count == 1 {
        "y"
    } else {
        "ies"
    }
}
