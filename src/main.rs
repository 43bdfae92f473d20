use calai_core::{FileAdapter, LocalStore};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod sync;

use commands::{
    CacheCommand, ConfigCommand, DataCommand, GoalsCommand, MealCommand, ProfileCommand,
    SettingsCommand, SyncCommand,
};
use config::Config;

#[derive(Parser)]
#[command(name = "calai")]
#[command(version)]
#[command(about = "Offline-first calorie and nutrition tracker", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log and review meals
    Meal(MealCommand),

    /// Manage your profile
    Profile(ProfileCommand),

    /// Manage daily nutrition goals
    Goals(GoalsCommand),

    /// Read and change app settings
    Settings(SettingsCommand),

    /// Manage cached server data
    Cache(CacheCommand),

    /// Push local changes to the server
    Sync(SyncCommand),

    /// Export or delete local data
    Data(DataCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calai=info,calai_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(cli.config)?;

    let Some(command) = cli.command else {
        println!("Use --help to see available commands");
        return Ok(());
    };

    if let Commands::Config(cmd) = &command {
        return cmd.run(&config);
    }

    let store = open_store(&config).await?;
    match command {
        Commands::Meal(cmd) => cmd.run(&store).await?,
        Commands::Profile(cmd) => cmd.run(&store).await?,
        Commands::Goals(cmd) => cmd.run(&store).await?,
        Commands::Settings(cmd) => cmd.run(&store).await?,
        Commands::Cache(cmd) => cmd.run(&store, &config).await?,
        Commands::Sync(cmd) => cmd.run(&store, &config).await?,
        Commands::Data(cmd) => cmd.run(&store).await?,
        Commands::Config(_) => {}
    }

    Ok(())
}

/// Opens the file-backed store under the configured data directory.
async fn open_store(config: &Config) -> Result<LocalStore, std::io::Error> {
    let adapter = FileAdapter::new(config.data_dir.value.clone());
    tokio::fs::create_dir_all(adapter.data_dir()).await?;
    tracing::debug!(data_dir = %adapter.data_dir().display(), "opening local store");
    Ok(LocalStore::new(Arc::new(adapter)))
}
