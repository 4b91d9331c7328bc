//! Log backends the CLI can read from.

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use kview_common::PartitionId;
#[cfg(feature = "kafka")]
use kview_reader::KafkaLogClient;
use kview_reader::{InMemoryLogClient, LogClient};

use crate::config::KviewConfig;
use crate::fixture::Fixture;

pub enum Backend {
    /// Topic snapshot loaded from a file
    Fixture(InMemoryLogClient),
    #[cfg(feature = "kafka")]
    Kafka(Arc<KafkaLogClient>),
}

impl Backend {
    /// Pick the fixture when one is given, otherwise connect to Kafka.
    pub async fn connect(fixture: Option<&Path>, config: &KviewConfig) -> Result<Self> {
        if let Some(path) = fixture {
            let client = Fixture::from_file(path)?.into_client().await?;
            return Ok(Backend::Fixture(client));
        }
        Self::kafka(config)
    }

    #[cfg(feature = "kafka")]
    fn kafka(config: &KviewConfig) -> Result<Self> {
        let client = KafkaLogClient::new(config.kafka.clone())?;
        Ok(Backend::Kafka(Arc::new(client)))
    }

    #[cfg(not(feature = "kafka"))]
    fn kafka(_config: &KviewConfig) -> Result<Self> {
        bail!("kview was built without Kafka support; pass --fixture or rebuild with --features kafka")
    }

    pub fn client(&self) -> Arc<dyn LogClient> {
        match self {
            Backend::Fixture(client) => Arc::new(client.clone()),
            #[cfg(feature = "kafka")]
            Backend::Kafka(client) => Arc::clone(client) as Arc<dyn LogClient>,
        }
    }

    /// Resolve the partitions to read: the requested ones, or every
    /// partition of the topic.
    pub async fn partitions(
        &self,
        topic: &str,
        requested: &[PartitionId],
    ) -> Result<Vec<PartitionId>> {
        if !requested.is_empty() {
            return Ok(requested.to_vec());
        }

        let count = match self {
            Backend::Fixture(client) => client.partition_count(topic).await?,
            #[cfg(feature = "kafka")]
            Backend::Kafka(client) => client.partition_count(topic).await?,
        };
        if count <= 0 {
            bail!("Topic {} has no partitions", topic);
        }
        Ok((0..count).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_partitions_when_none_requested() {
        let client = InMemoryLogClient::new();
        client.create_topic("orders", 3).await.unwrap();
        let backend = Backend::Fixture(client);

        assert_eq!(backend.partitions("orders", &[]).await.unwrap(), vec![0, 1, 2]);
        assert_eq!(backend.partitions("orders", &[2]).await.unwrap(), vec![2]);
        assert!(backend.partitions("missing", &[]).await.is_err());
    }
}
