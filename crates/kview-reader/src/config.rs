//! Reader and Kafka client configuration.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Capacity of the shared record channel. Workers wait for room once it
    /// is full.
    pub channel_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 256,
        }
    }
}

impl ReaderConfig {
    pub fn validate(&self) -> Result<()> {
        if self.channel_capacity == 0 {
            return Err(ReaderError::Configuration(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Kafka client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Comma separated `host:port` list
    pub bootstrap_servers: String,

    /// Client id reported to the brokers
    pub client_id: String,

    /// Timeout for watermark lookups in milliseconds
    pub fetch_timeout_ms: u64,

    /// Extra librdkafka properties, applied last
    pub properties: BTreeMap<String, String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            client_id: "kview".to_string(),
            fetch_timeout_ms: 10_000,
            properties: BTreeMap::new(),
        }
    }
}

impl KafkaConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_servers.trim().is_empty() {
            return Err(ReaderError::Configuration(
                "bootstrap_servers is empty".to_string(),
            ));
        }
        Ok(())
    }
}
