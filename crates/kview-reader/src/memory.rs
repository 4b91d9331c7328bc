//! In-memory implementation of LogClient for testing and offline snapshots

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use kview_common::{Error, Offset, PartitionId, Result, Timestamp, TopicPartition};
use tokio::sync::{watch, RwLock};

use crate::client::{LogClient, RawRecord, RecordCursor};

struct PartitionLog {
    /// Smallest retained offset
    oldest: Offset,
    /// Retained records; `records[i].offset == oldest + i`
    records: Vec<RawRecord>,
    /// Publishes the first available offset after every append
    watermark: watch::Sender<Offset>,
}

impl PartitionLog {
    fn new() -> Self {
        let (watermark, _) = watch::channel(0);
        Self {
            oldest: 0,
            records: Vec::new(),
            watermark,
        }
    }

    fn first_available(&self) -> Offset {
        self.oldest + self.records.len() as Offset
    }

    fn get(&self, offset: Offset) -> Option<&RawRecord> {
        let index = usize::try_from(offset - self.oldest).ok()?;
        self.records.get(index)
    }
}

#[derive(Default)]
struct Faults {
    offsets: HashSet<TopicPartition>,
    open: HashSet<TopicPartition>,
    stream_after: HashMap<TopicPartition, usize>,
}

type Topics = Arc<RwLock<HashMap<String, Vec<PartitionLog>>>>;

/// In-memory log with fault injection.
///
/// Clones share the same data, so a test can keep appending through one
/// clone while a reader consumes through another.
#[derive(Clone, Default)]
pub struct InMemoryLogClient {
    topics: Topics,
    faults: Arc<RwLock<Faults>>,
}

impl InMemoryLogClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a topic with `partitions` empty partitions.
    pub async fn create_topic(&self, topic: &str, partitions: PartitionId) -> Result<()> {
        if partitions <= 0 {
            return Err(Error::InvalidInput(format!(
                "Topic {} needs at least one partition",
                topic
            )));
        }

        let mut topics = self.topics.write().await;
        if topics.contains_key(topic) {
            return Err(Error::InvalidInput(format!("Topic {} already exists", topic)));
        }
        topics.insert(
            topic.to_string(),
            (0..partitions).map(|_| PartitionLog::new()).collect(),
        );
        Ok(())
    }

    pub async fn partition_count(&self, topic: &str) -> Result<PartitionId> {
        let topics = self.topics.read().await;
        topics
            .get(topic)
            .map(|partitions| partitions.len() as PartitionId)
            .ok_or_else(|| Error::NotFound(format!("Topic {} not found", topic)))
    }

    /// Append a record and return its offset.
    pub async fn append(
        &self,
        topic: &str,
        partition: PartitionId,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
    ) -> Result<Offset> {
        self.append_record(
            topic,
            partition,
            Some(key.into()),
            Some(value.into()),
            Vec::new(),
            None,
        )
        .await
    }

    /// Append a record with headers and return its offset.
    pub async fn append_with_headers(
        &self,
        topic: &str,
        partition: PartitionId,
        key: impl Into<Bytes>,
        value: impl Into<Bytes>,
        headers: Vec<(String, Bytes)>,
    ) -> Result<Offset> {
        self.append_record(
            topic,
            partition,
            Some(key.into()),
            Some(value.into()),
            headers,
            None,
        )
        .await
    }

    /// Append a fully specified record. A missing timestamp is stamped with
    /// the current time.
    pub async fn append_record(
        &self,
        topic: &str,
        partition: PartitionId,
        key: Option<Bytes>,
        value: Option<Bytes>,
        headers: Vec<(String, Bytes)>,
        timestamp: Option<Timestamp>,
    ) -> Result<Offset> {
        let mut topics = self.topics.write().await;
        let log = partition_mut(&mut topics, topic, partition)?;

        let offset = log.first_available();
        log.records.push(RawRecord {
            key,
            value,
            partition,
            offset,
            timestamp: Some(timestamp.unwrap_or_else(|| Utc::now().timestamp_millis())),
            headers,
        });
        log.watermark.send_replace(log.first_available());
        Ok(offset)
    }

    /// Move the log start of an empty partition, so the next append gets
    /// `offset`.
    pub async fn start_at(&self, topic: &str, partition: PartitionId, offset: Offset) -> Result<()> {
        if offset < 0 {
            return Err(Error::InvalidInput(format!("Negative start offset {}", offset)));
        }

        let mut topics = self.topics.write().await;
        let log = partition_mut(&mut topics, topic, partition)?;
        if !log.records.is_empty() {
            return Err(Error::InvalidInput(format!(
                "Partition {}-{} already holds records",
                topic, partition
            )));
        }
        log.oldest = offset;
        log.watermark.send_replace(offset);
        Ok(())
    }

    /// Drop every record below `offset`, as retention would.
    pub async fn truncate_before(
        &self,
        topic: &str,
        partition: PartitionId,
        offset: Offset,
    ) -> Result<()> {
        let mut topics = self.topics.write().await;
        let log = partition_mut(&mut topics, topic, partition)?;

        let target = offset.min(log.first_available());
        if target > log.oldest {
            let drop_count = (target - log.oldest) as usize;
            log.records.drain(..drop_count);
            log.oldest = target;
        }
        Ok(())
    }

    /// Make offset lookups for the partition fail.
    pub async fn fail_offsets(&self, topic: &str, partition: PartitionId) {
        let mut faults = self.faults.write().await;
        faults.offsets.insert(TopicPartition::new(topic, partition));
    }

    /// Make opening a cursor on the partition fail.
    pub async fn fail_open(&self, topic: &str, partition: PartitionId) {
        let mut faults = self.faults.write().await;
        faults.open.insert(TopicPartition::new(topic, partition));
    }

    /// Make cursors on the partition fail after delivering `records` records.
    pub async fn fail_stream_after(&self, topic: &str, partition: PartitionId, records: usize) {
        let mut faults = self.faults.write().await;
        faults
            .stream_after
            .insert(TopicPartition::new(topic, partition), records);
    }

    async fn check_offsets_fault(&self, topic: &str, partition: PartitionId) -> Result<()> {
        let faults = self.faults.read().await;
        if faults.offsets.contains(&TopicPartition::new(topic, partition)) {
            return Err(Error::Network(format!(
                "Offset lookup for {}-{} failed",
                topic, partition
            )));
        }
        Ok(())
    }

    async fn offsets_of(&self, topic: &str, partition: PartitionId) -> Result<(Offset, Offset)> {
        self.check_offsets_fault(topic, partition).await?;
        let topics = self.topics.read().await;
        let log = partition_ref(&topics, topic, partition)?;
        Ok((log.oldest, log.first_available()))
    }
}

fn partition_ref<'a>(
    topics: &'a HashMap<String, Vec<PartitionLog>>,
    topic: &str,
    partition: PartitionId,
) -> Result<&'a PartitionLog> {
    topics
        .get(topic)
        .ok_or_else(|| Error::NotFound(format!("Topic {} not found", topic)))?
        .get(usize::try_from(partition).unwrap_or(usize::MAX))
        .ok_or_else(|| Error::NotFound(format!("Partition {}-{} not found", topic, partition)))
}

fn partition_mut<'a>(
    topics: &'a mut HashMap<String, Vec<PartitionLog>>,
    topic: &str,
    partition: PartitionId,
) -> Result<&'a mut PartitionLog> {
    topics
        .get_mut(topic)
        .ok_or_else(|| Error::NotFound(format!("Topic {} not found", topic)))?
        .get_mut(usize::try_from(partition).unwrap_or(usize::MAX))
        .ok_or_else(|| Error::NotFound(format!("Partition {}-{} not found", topic, partition)))
}

#[async_trait]
impl LogClient for InMemoryLogClient {
    async fn fetch_oldest_offset(&self, topic: &str, partition: PartitionId) -> Result<Offset> {
        self.offsets_of(topic, partition).await.map(|(oldest, _)| oldest)
    }

    async fn fetch_first_available_offset(
        &self,
        topic: &str,
        partition: PartitionId,
    ) -> Result<Offset> {
        self.offsets_of(topic, partition)
            .await
            .map(|(_, first_available)| first_available)
    }

    async fn open_cursor(
        &self,
        topic: &str,
        partition: PartitionId,
        start: Offset,
        follow: bool,
    ) -> Result<Box<dyn RecordCursor>> {
        let tp = TopicPartition::new(topic, partition);
        let fail_after = {
            let faults = self.faults.read().await;
            if faults.open.contains(&tp) {
                return Err(Error::Network(format!("Failed to open cursor on {}", tp)));
            }
            faults.stream_after.get(&tp).copied()
        };

        let watermark = {
            let topics = self.topics.read().await;
            partition_ref(&topics, topic, partition)?.watermark.subscribe()
        };

        Ok(Box::new(InMemoryCursor {
            topics: Arc::clone(&self.topics),
            tp,
            position: start,
            follow,
            watermark,
            fail_after,
            delivered: 0,
            closed: false,
        }))
    }
}

/// Cursor over one in-memory partition. A following cursor waits for
/// appends once it has caught up.
struct InMemoryCursor {
    topics: Topics,
    tp: TopicPartition,
    position: Offset,
    follow: bool,
    watermark: watch::Receiver<Offset>,
    fail_after: Option<usize>,
    delivered: usize,
    closed: bool,
}

#[async_trait]
impl RecordCursor for InMemoryCursor {
    async fn next(&mut self) -> Option<Result<RawRecord>> {
        loop {
            if self.closed {
                return None;
            }
            if self.fail_after == Some(self.delivered) {
                self.closed = true;
                return Some(Err(Error::Network(format!(
                    "Connection to leader of {} lost",
                    self.tp
                ))));
            }

            {
                let topics = self.topics.read().await;
                let log = match partition_ref(&topics, &self.tp.topic, self.tp.partition) {
                    Ok(log) => log,
                    Err(e) => return Some(Err(e)),
                };

                // Records below the retained range are gone; resume at the oldest
                if self.position < log.oldest {
                    self.position = log.oldest;
                }
                if let Some(record) = log.get(self.position) {
                    self.position += 1;
                    self.delivered += 1;
                    return Some(Ok(record.clone()));
                }
                if !self.follow {
                    return None;
                }
            }

            if self.watermark.changed().await.is_err() {
                return None;
            }
        }
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_assigns_sequential_offsets() {
        let client = InMemoryLogClient::new();
        client.create_topic("orders", 2).await.unwrap();

        assert_eq!(client.append("orders", 0, "a", "1").await.unwrap(), 0);
        assert_eq!(client.append("orders", 0, "b", "2").await.unwrap(), 1);
        assert_eq!(client.append("orders", 1, "c", "3").await.unwrap(), 0);

        assert_eq!(client.fetch_oldest_offset("orders", 0).await.unwrap(), 0);
        assert_eq!(client.fetch_first_available_offset("orders", 0).await.unwrap(), 2);
        assert_eq!(client.partition_count("orders").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_truncate_moves_oldest() {
        let client = InMemoryLogClient::new();
        client.create_topic("orders", 1).await.unwrap();
        for i in 0..10 {
            client.append("orders", 0, "k", format!("v{}", i)).await.unwrap();
        }
        client.truncate_before("orders", 0, 4).await.unwrap();

        assert_eq!(client.fetch_oldest_offset("orders", 0).await.unwrap(), 4);
        assert_eq!(client.fetch_first_available_offset("orders", 0).await.unwrap(), 10);

        // Opening below the retained range starts at the oldest record
        let mut cursor = client.open_cursor("orders", 0, 0, false).await.unwrap();
        let first = cursor.next().await.unwrap().unwrap();
        assert_eq!(first.offset, 4);
        assert_eq!(first.value.as_deref(), Some(&b"v4"[..]));
    }

    #[tokio::test]
    async fn test_start_at_only_on_empty_partition() {
        let client = InMemoryLogClient::new();
        client.create_topic("orders", 1).await.unwrap();
        client.start_at("orders", 0, 100).await.unwrap();
        assert_eq!(client.append("orders", 0, "k", "v").await.unwrap(), 100);
        assert_eq!(client.fetch_oldest_offset("orders", 0).await.unwrap(), 100);
        assert!(client.start_at("orders", 0, 5).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_topic_rejected() {
        let client = InMemoryLogClient::new();
        client.create_topic("orders", 1).await.unwrap();
        assert!(client.create_topic("orders", 1).await.is_err());
        assert!(client.create_topic("empty", 0).await.is_err());
    }

    #[tokio::test]
    async fn test_unknown_partition_is_not_found() {
        let client = InMemoryLogClient::new();
        client.create_topic("orders", 1).await.unwrap();
        let err = client.fetch_oldest_offset("orders", 3).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        let err = client.fetch_oldest_offset("missing", 0).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cursor_waits_for_appends() {
        let client = InMemoryLogClient::new();
        client.create_topic("events", 1).await.unwrap();
        let mut cursor = client.open_cursor("events", 0, 0, true).await.unwrap();

        let writer = client.clone();
        let producer = tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            writer.append("events", 0, "k", "late").await.unwrap();
        });

        let record = cursor.next().await.unwrap().unwrap();
        assert_eq!(record.offset, 0);
        assert_eq!(record.value.as_deref(), Some(&b"late"[..]));
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn test_non_following_cursor_stops_at_end() {
        let client = InMemoryLogClient::new();
        client.create_topic("orders", 1).await.unwrap();
        client.append("orders", 0, "k", "a").await.unwrap();
        client.append("orders", 0, "k", "b").await.unwrap();

        let mut cursor = client.open_cursor("orders", 0, 1, false).await.unwrap();
        assert_eq!(cursor.next().await.unwrap().unwrap().offset, 1);
        assert!(cursor.next().await.is_none());

        let mut empty = client.open_cursor("orders", 0, 2, false).await.unwrap();
        assert!(empty.next().await.is_none());
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let client = InMemoryLogClient::new();
        client.create_topic("orders", 1).await.unwrap();
        for _ in 0..3 {
            client.append("orders", 0, "k", "v").await.unwrap();
        }

        client.fail_stream_after("orders", 0, 2).await;
        let mut cursor = client.open_cursor("orders", 0, 0, false).await.unwrap();
        assert!(cursor.next().await.unwrap().is_ok());
        assert!(cursor.next().await.unwrap().is_ok());
        assert!(cursor.next().await.unwrap().is_err());
        assert!(cursor.next().await.is_none());

        client.fail_open("orders", 0).await;
        assert!(client.open_cursor("orders", 0, 0, false).await.is_err());

        client.fail_offsets("orders", 0).await;
        assert!(client.fetch_oldest_offset("orders", 0).await.is_err());
    }
}
