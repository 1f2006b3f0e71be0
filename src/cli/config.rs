//! Comitia configuration file handling.
//!
//! Operator settings only: where the database lives, how chatty the logs
//! are, which nick the console surface uses, and the vote-change
//! announcement toggle. Ballot policy (quorums, thresholds, durations) is
//! part of the governance contract and lives in code, not here.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default log level
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComitiaConfig {
    /// Channel and console settings
    #[serde(default)]
    pub channel: ChannelConfig,

    /// Storage settings
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Governance toggles
    #[serde(default)]
    pub governance: GovernanceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel name, used in log output.
    #[serde(default = "default_channel")]
    pub name: String,

    /// Nick the console adapter attributes stdin lines to.
    #[serde(default = "default_nick")]
    pub console_nick: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceConfig {
    /// Announce channel-wide when a member flips an existing vote.
    #[serde(default)]
    pub announce_vote_changes: bool,

    /// Delay before retrying a failed close or expiry write, in seconds.
    #[serde(default = "default_retry_secs")]
    pub retry_secs: u64,
}

fn default_channel() -> String {
    "#channel".to_string()
}

fn default_nick() -> String {
    "operator".to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_retry_secs() -> u64 {
    30
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: default_channel(),
            console_nick: default_nick(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            announce_vote_changes: false,
            retry_secs: default_retry_secs(),
        }
    }
}

/// Default data directory, `~/.local/share/comitia` or the platform
/// equivalent.
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("comitia")
}

pub fn default_config_path() -> PathBuf {
    default_data_dir().join("config.toml")
}

impl ComitiaConfig {
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            channel: ChannelConfig::default(),
            storage: StorageConfig { db_path },
            logging: LoggingConfig::default(),
            governance: GovernanceConfig::default(),
        }
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: ComitiaConfig = toml::from_str(&contents)
            .map_err(|e| format!("Failed to parse config file '{}': {}", path.display(), e))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize config: {}", e))?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        fs::write(path, contents)
            .map_err(|e| format!("Failed to write config file '{}': {}", path.display(), e))?;

        Ok(())
    }

    /// Write a default config (and data directory) if none exists yet.
    pub fn create_default(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let config = Self::new(default_data_dir().join("comitia.db"));
        config.save(path)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = ComitiaConfig::new(PathBuf::from("/tmp/test.db"));
        config.governance.announce_vote_changes = true;
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: ComitiaConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.storage.db_path, PathBuf::from("/tmp/test.db"));
        assert!(parsed.governance.announce_vote_changes);
        assert_eq!(parsed.logging.level, "info");
    }

    #[test]
    fn minimal_config_fills_defaults() {
        let parsed: ComitiaConfig =
            toml::from_str("[storage]\ndb_path = \"votes.db\"\n").unwrap();
        assert_eq!(parsed.channel.console_nick, "operator");
        assert_eq!(parsed.governance.retry_secs, 30);
        assert!(!parsed.governance.announce_vote_changes);
    }
}
