use calai_core::LocalStore;
use clap::{Args, Subcommand};
use std::path::PathBuf;

#[derive(Args)]
pub struct DataCommand {
    #[command(subcommand)]
    pub command: DataSubcommand,
}

#[derive(Subcommand)]
pub enum DataSubcommand {
    /// Export meals, profile, goals and settings as JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Delete all local data, including unsent changes
    Clear {
        /// Confirm that all local data will be lost
        #[arg(long)]
        force: bool,
    },
}

impl DataCommand {
    pub async fn run(&self, store: &LocalStore) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            DataSubcommand::Export { output } => {
                let export = store.export_data().await?;
                let json = serde_json::to_string_pretty(&export)?;
                match output {
                    Some(path) => {
                        tokio::fs::write(path, json)
                            .await
                            .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))?;
                        println!(
                            "Exported {} meal(s) to {}",
                            export.meals.len(),
                            path.display()
                        );
                    }
                    None => println!("{}", json),
                }
                Ok(())
            }
            DataSubcommand::Clear { force } => {
                if !force {
                    return Err("Refusing to delete all local data without --force".into());
                }
                let pending = store.queue().len().await?;
                store.clear_all_data().await?;
                println!("Deleted all local data.");
                if pending > 0 {
                    println!("{} unsent change(s) were discarded.", pending);
                }
                Ok(())
            }
        }
    }
}
