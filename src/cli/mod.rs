//! Command line interface.

pub mod config;
pub mod run;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "comitia", about = "Channel governance engine", version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine over the console adapter
    Run {
        /// Path to the config file
        #[arg(long)]
        config: Option<String>,

        /// Override the database path from the config
        #[arg(long)]
        db_path: Option<String>,
    },
    /// Write a default config file
    Init {
        /// Path to write the config file to
        #[arg(long)]
        config: Option<String>,
    },
}

pub async fn execute(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Run { config, db_path } => run::execute(config, db_path).await,
        Commands::Init { config } => {
            let path = config
                .map(std::path::PathBuf::from)
                .unwrap_or_else(config::default_config_path);
            if path.exists() {
                return Err(format!("config already exists at {}", path.display()).into());
            }
            config::ComitiaConfig::create_default(&path)?;
            println!("Created {}", path.display());
            Ok(())
        }
    }
}
