//! Run the governance engine.

use super::config::{default_config_path, ComitiaConfig};
use comitia::chat::ConsoleChat;
use comitia::directory::LoggingDirectory;
use comitia::governance::{now_unix, Engine, EngineConfig};
use comitia::persistence::Store;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Start the engine over the console chat adapter.
///
/// Configuration comes from `--config` if given, otherwise from the default
/// path, where a default file is generated on first run. The database path
/// from the config can be overridden with `--db-path`.
///
/// Startup order matters: the store is opened and recovery runs (closing
/// overdue elections and expiring overdue effects) before the first inbound
/// event is read.
pub async fn execute(
    config_path: Option<String>,
    db_path: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path);

    let config = if config_path.exists() {
        ComitiaConfig::load(&config_path)?
    } else {
        eprintln!("No config file found, creating {}", config_path.display());
        ComitiaConfig::create_default(&config_path)?
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let db_path = db_path.map(PathBuf::from).unwrap_or(config.storage.db_path.clone());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    tracing::info!(channel = %config.channel.name, db = %db_path.display(), "starting comitia");

    let store = Store::open(&db_path).await?;
    let chat = ConsoleChat::new(&config.channel.console_nick);
    let engine_config = EngineConfig {
        announce_vote_changes: config.governance.announce_vote_changes,
        retry_secs: config.governance.retry_secs,
    };
    let mut engine = Engine::new(chat, LoggingDirectory, store, engine_config).await?;

    engine.recover(now_unix()).await?;
    engine.run().await?;
    Ok(())
}
