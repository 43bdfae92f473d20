//! Sync CLI commands for pushing queued changes to the server.

use calai_core::{LocalStore, StoreError};
use clap::{Args, Subcommand};

use super::OutputFormat;
use crate::config::Config;
use crate::sync::{push, HttpTransport, TransportError};

/// Push local changes to the sync server
#[derive(Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: SyncSubcommand,
}

#[derive(Subcommand)]
enum SyncSubcommand {
    /// Show sync configuration and pending changes
    Status,

    /// List pending changes, oldest first
    Queue {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Send pending changes to the server
    Push {
        /// Maximum number of changes to send (defaults to sync.batch_size)
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Drop every pending change without sending it
    Clear {
        /// Confirm that unsent changes will be lost
        #[arg(long)]
        force: bool,
    },
}

impl SyncCommand {
    pub async fn run(&self, store: &LocalStore, config: &Config) -> Result<(), SyncCommandError> {
        match &self.command {
            SyncSubcommand::Status => self.status(store, config).await,
            SyncSubcommand::Queue { format } => self.queue(store, format).await,
            SyncSubcommand::Push { limit } => {
                let transport = HttpTransport::from_config(&config.sync)?;
                let limit = limit.unwrap_or(config.sync.batch_size);

                println!("Pushing changes to server...");
                let report = push(store, &transport, limit).await?;

                println!();
                if report.requeued > 0 {
                    println!("  ↻ re-queued {} unsynced meal(s)", report.requeued);
                }
                println!("  ✓ sent {} change(s)", report.sent);
                if let Some(failed) = &report.failed {
                    println!(
                        "  ✗ {} {} - {} (attempt {})",
                        failed.kind, failed.id, failed.error, failed.retries
                    );
                }
                println!();
                println!("{} change(s) still pending.", report.remaining);
                Ok(())
            }
            SyncSubcommand::Clear { force } => {
                if !force {
                    return Err(SyncCommandError::NotConfirmed);
                }
                store.queue().clear().await?;
                println!("Cleared pending changes.");
                Ok(())
            }
        }
    }

    async fn status(&self, store: &LocalStore, config: &Config) -> Result<(), SyncCommandError> {
        println!("Sync Configuration");
        println!("==================");
        println!();

        match (&config.sync.server_url, config.sync.is_configured()) {
            (Some(url), true) => {
                println!("Server:     {}", url);
                println!("Batch size: {}", config.sync.batch_size);
            }
            _ => {
                println!("Status: Not configured");
                println!();
                println!("To enable sync, add to your config file:");
                println!();
                println!("  sync:");
                println!("    server_url: \"https://sync.example.com\"");
                println!("    api_key: \"...\"");
                println!();
                println!("Or set environment variables:");
                println!("  CALAI_SYNC_URL, CALAI_SYNC_API_KEY");
            }
        }
        println!();

        let items = store.queue().peek_all().await?;
        let unsynced = store.meals().unsynced().await?;
        println!("Pending changes: {}", items.len());
        println!("Unsynced meals:  {}", unsynced.len());
        if let Some(oldest) = items.first() {
            println!("Oldest change:   {} ({})", oldest.created_at.to_rfc3339(), oldest.kind);
        }

        let corrupted = store.diagnostics().corruption_count();
        if corrupted > 0 {
            println!();
            println!("Warning: {} unreadable value(s) were discarded", corrupted);
        }
        Ok(())
    }

    async fn queue(&self, store: &LocalStore, format: &OutputFormat) -> Result<(), SyncCommandError> {
        let items = store.queue().peek_all().await?;
        match format {
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&items)
                    .map_err(|e| SyncCommandError::Output(e.to_string()))?;
                println!("{}", json);
            }
            OutputFormat::Text => {
                if items.is_empty() {
                    println!("No pending changes.");
                    return Ok(());
                }
                for item in &items {
                    println!(
                        "{}  {:<16} {}  retries: {}",
                        item.created_at.format("%Y-%m-%d %H:%M:%S"),
                        item.kind.as_str(),
                        item.id,
                        item.retries
                    );
                }
                println!("\nTotal: {} change(s)", items.len());
            }
        }
        Ok(())
    }
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    Transport(TransportError),
    Store(StoreError),
    Output(String),
    NotConfirmed,
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::Transport(e) => write!(f, "{}", e),
            SyncCommandError::Store(e) => write!(f, "Store error: {}", e),
            SyncCommandError::Output(e) => write!(f, "Output error: {}", e),
            SyncCommandError::NotConfirmed => write!(
                f,
                "Refusing to drop pending changes without --force"
            ),
        }
    }
}

impl std::error::Error for SyncCommandError {}

impl From<TransportError> for SyncCommandError {
    fn from(e: TransportError) -> Self {
        SyncCommandError::Transport(e)
    }
}

impl From<StoreError> for SyncCommandError {
    fn from(e: StoreError) -> Self {
        SyncCommandError::Store(e)
    }
}
