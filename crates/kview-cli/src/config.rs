//! CLI configuration loading.

use std::path::Path;

use anyhow::{Context, Result};
use kview_reader::{KafkaConfig, ReaderConfig};
use serde::{Deserialize, Serialize};

/// Environment variable naming the Kafka bootstrap servers
pub const ENV_BOOTSTRAP_SERVERS: &str = "KVIEW_BOOTSTRAP_SERVERS";

/// Environment variable overriding the record channel capacity
pub const ENV_CHANNEL_CAPACITY: &str = "KVIEW_CHANNEL_CAPACITY";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KviewConfig {
    /// Read engine settings
    pub reader: ReaderConfig,

    /// Kafka connection settings
    pub kafka: KafkaConfig,
}

impl KviewConfig {
    /// Parse a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(servers) = lookup(ENV_BOOTSTRAP_SERVERS) {
            self.kafka.bootstrap_servers = servers;
        }

        if let Some(capacity) = lookup(ENV_CHANNEL_CAPACITY) {
            self.reader.channel_capacity = capacity
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", ENV_CHANNEL_CAPACITY, capacity))?;
        }

        Ok(())
    }
}

/// Load configuration: defaults, then the optional file, then the
/// environment. Command-line flags are applied by the caller.
pub fn load_config(path: Option<&Path>) -> Result<KviewConfig> {
    let mut config = match path {
        Some(path) => KviewConfig::from_file(path)?,
        None => KviewConfig::default(),
    };

    config.apply_env(|name| std::env::var(name).ok())?;
    Ok(config)
}
