//! Kafka-backed [`LogClient`] built on rdkafka.
//!
//! Watermark lookups go through one shared `BaseConsumer`. Every cursor gets
//! its own `StreamConsumer` with a manual single-partition assignment, so no
//! consumer-group offsets are ever committed.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use kview_common::{Error, Offset, PartitionId, Result};
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::topic_partition_list::TopicPartitionList;
use tracing::{debug, warn};

use crate::client::{LogClient, RawRecord, RecordCursor};
use crate::config::KafkaConfig;

fn network(e: KafkaError) -> Error {
    Error::Network(e.to_string())
}

/// LogClient talking to a Kafka cluster.
pub struct KafkaLogClient {
    config: KafkaConfig,
    metadata: Arc<BaseConsumer>,
}

impl KafkaLogClient {
    pub fn new(config: KafkaConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| Error::Configuration(e.to_string()))?;

        let metadata: BaseConsumer = client_config(&config, &format!("{}-metadata", config.client_id))
            .create()
            .map_err(network)?;

        debug!(brokers = %config.bootstrap_servers, "Created Kafka metadata client");
        Ok(Self {
            config,
            metadata: Arc::new(metadata),
        })
    }

    pub fn config(&self) -> &KafkaConfig {
        &self.config
    }

    /// Number of partitions of `topic` according to cluster metadata.
    pub async fn partition_count(&self, topic: &str) -> Result<PartitionId> {
        let consumer = Arc::clone(&self.metadata);
        let name = topic.to_string();
        let timeout = self.config.fetch_timeout();

        let count = tokio::task::spawn_blocking(move || {
            let metadata = consumer.fetch_metadata(Some(name.as_str()), timeout)?;
            Ok::<_, KafkaError>(
                metadata
                    .topics()
                    .iter()
                    .find(|t| t.name() == name)
                    .map(|t| t.partitions().len()),
            )
        })
        .await
        .map_err(|e| Error::Internal(format!("Metadata lookup task failed: {}", e)))?
        .map_err(network)?;

        match count {
            Some(count) if count > 0 => Ok(count as PartitionId),
            _ => Err(Error::NotFound(format!("Topic {} not found", topic))),
        }
    }

    /// Low and high watermark of a partition. The high watermark is the
    /// offset the next produced record will get.
    async fn watermarks(&self, topic: &str, partition: PartitionId) -> Result<(Offset, Offset)> {
        let consumer = Arc::clone(&self.metadata);
        let topic = topic.to_string();
        let timeout = self.config.fetch_timeout();

        tokio::task::spawn_blocking(move || consumer.fetch_watermarks(&topic, partition, timeout))
            .await
            .map_err(|e| Error::Internal(format!("Watermark lookup task failed: {}", e)))?
            .map_err(network)
    }
}

fn client_config(config: &KafkaConfig, group_id: &str) -> ClientConfig {
    let mut client = ClientConfig::new();
    client
        .set("bootstrap.servers", &config.bootstrap_servers)
        .set("client.id", &config.client_id)
        .set("group.id", group_id)
        .set("enable.auto.commit", "false");
    for (key, value) in &config.properties {
        client.set(key, value);
    }
    client
}

fn unique_group_id(client_id: &str, topic: &str, partition: PartitionId) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{}-{}-{}-{}", client_id, topic, partition, nanos)
}

#[async_trait]
impl LogClient for KafkaLogClient {
    async fn fetch_oldest_offset(&self, topic: &str, partition: PartitionId) -> Result<Offset> {
        self.watermarks(topic, partition).await.map(|(low, _)| low)
    }

    async fn fetch_first_available_offset(
        &self,
        topic: &str,
        partition: PartitionId,
    ) -> Result<Offset> {
        self.watermarks(topic, partition).await.map(|(_, high)| high)
    }

    async fn open_cursor(
        &self,
        topic: &str,
        partition: PartitionId,
        start: Offset,
        follow: bool,
    ) -> Result<Box<dyn RecordCursor>> {
        let group_id = unique_group_id(&self.config.client_id, topic, partition);
        let consumer: StreamConsumer = client_config(&self.config, &group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", if follow { "false" } else { "true" })
            .create()
            .map_err(network)?;

        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset(topic, partition, rdkafka::Offset::Offset(start))
            .map_err(network)?;
        consumer.assign(&tpl).map_err(network)?;

        debug!(topic, partition, start, follow, "Assigned Kafka cursor");
        Ok(Box::new(KafkaCursor {
            consumer,
            topic: topic.to_string(),
            partition,
            follow,
        }))
    }
}

struct KafkaCursor {
    consumer: StreamConsumer,
    topic: String,
    partition: PartitionId,
    follow: bool,
}

/// A cursor that is not following ends at the partition EOF event.
fn is_end_of_partition(e: &KafkaError, follow: bool) -> bool {
    !follow && matches!(e, KafkaError::PartitionEOF(_))
}

fn to_raw(message: &BorrowedMessage<'_>) -> RawRecord {
    let headers = message
        .headers()
        .map(|headers| {
            (0..headers.count())
                .map(|i| {
                    let header = headers.get(i);
                    (
                        header.key.to_string(),
                        header.value.map(Bytes::copy_from_slice).unwrap_or_default(),
                    )
                })
                .collect()
        })
        .unwrap_or_default();

    RawRecord {
        key: message.key().map(Bytes::copy_from_slice),
        value: message.payload().map(Bytes::copy_from_slice),
        partition: message.partition(),
        offset: message.offset(),
        timestamp: message.timestamp().to_millis(),
        headers,
    }
}

#[async_trait]
impl RecordCursor for KafkaCursor {
    async fn next(&mut self) -> Option<Result<RawRecord>> {
        match self.consumer.recv().await {
            Ok(message) => Some(Ok(to_raw(&message))),
            Err(e) if is_end_of_partition(&e, self.follow) => None,
            Err(e) => Some(Err(network(e))),
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.consumer.unassign() {
            warn!(
                topic = %self.topic,
                partition = self.partition,
                error = %e,
                "Failed to release Kafka assignment"
            );
        }
    }
}
