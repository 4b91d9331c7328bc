//! Topic snapshots loaded from JSON into an in-memory log.
//!
//! ```json
//! {
//!   "topics": [
//!     {
//!       "name": "orders",
//!       "partitions": [
//!         { "first_offset": 40, "records": [
//!           { "key": "k1", "value": "{\"id\":1}", "headers": { "trace": "abc" } }
//!         ] },
//!         { "records": [] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use bytes::Bytes;
use kview_common::{Offset, Timestamp};
use kview_reader::InMemoryLogClient;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Fixture {
    pub topics: Vec<TopicFixture>,
}

#[derive(Debug, Deserialize)]
pub struct TopicFixture {
    pub name: String,
    pub partitions: Vec<PartitionFixture>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PartitionFixture {
    /// Offset of the first record; earlier offsets count as expired
    pub first_offset: Offset,
    pub records: Vec<RecordFixture>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RecordFixture {
    pub key: Option<String>,
    /// `null` stores a tombstone
    pub value: Option<String>,
    /// Milliseconds since the epoch; defaults to load time
    pub timestamp: Option<Timestamp>,
    pub headers: BTreeMap<String, String>,
}

impl Fixture {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_json(&contents).with_context(|| format!("Invalid fixture {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Build an in-memory log holding every topic of the snapshot.
    pub async fn into_client(self) -> Result<InMemoryLogClient> {
        let client = InMemoryLogClient::new();

        for topic in self.topics {
            let partition_count = i32::try_from(topic.partitions.len())
                .with_context(|| format!("Too many partitions in topic {}", topic.name))?;
            client.create_topic(&topic.name, partition_count).await?;

            for (index, partition) in topic.partitions.into_iter().enumerate() {
                let partition_id = index as i32;
                client
                    .start_at(&topic.name, partition_id, partition.first_offset)
                    .await?;

                for record in partition.records {
                    let headers = record
                        .headers
                        .into_iter()
                        .map(|(name, value)| (name, Bytes::from(value)))
                        .collect();
                    client
                        .append_record(
                            &topic.name,
                            partition_id,
                            record.key.map(Bytes::from),
                            record.value.map(Bytes::from),
                            headers,
                            record.timestamp,
                        )
                        .await?;
                }
            }
        }

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kview_reader::LogClient;
    use std::io::Write;

    const SNAPSHOT: &str = r#"{
        "topics": [
            {
                "name": "orders",
                "partitions": [
                    { "first_offset": 40, "records": [
                        { "key": "k1", "value": "one", "timestamp": 1700000000000 },
                        { "key": "k2", "value": null, "headers": { "trace": "abc" } }
                    ] },
                    {}
                ]
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_snapshot_offsets() {
        let client = Fixture::from_json(SNAPSHOT).unwrap().into_client().await.unwrap();

        assert_eq!(client.partition_count("orders").await.unwrap(), 2);
        assert_eq!(client.fetch_oldest_offset("orders", 0).await.unwrap(), 40);
        assert_eq!(client.fetch_first_available_offset("orders", 0).await.unwrap(), 42);
        assert_eq!(client.fetch_oldest_offset("orders", 1).await.unwrap(), 0);
        assert_eq!(client.fetch_first_available_offset("orders", 1).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_records() {
        let client = Fixture::from_json(SNAPSHOT).unwrap().into_client().await.unwrap();
        let mut cursor = client.open_cursor("orders", 0, 40, false).await.unwrap();

        let first = cursor.next().await.unwrap().unwrap();
        assert_eq!(first.offset, 40);
        assert_eq!(first.timestamp, Some(1_700_000_000_000));
        assert_eq!(first.value.as_deref(), Some(&b"one"[..]));

        let second = cursor.next().await.unwrap().unwrap();
        assert_eq!(second.value, None);
        assert_eq!(second.headers, vec![("trace".to_string(), Bytes::from("abc"))]);
    }

    #[test]
    fn test_fixture_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", SNAPSHOT).unwrap();
        let fixture = Fixture::from_file(file.path()).unwrap();
        assert_eq!(fixture.topics[0].name, "orders");
        assert_eq!(fixture.topics[0].partitions.len(), 2);
    }

    #[test]
    fn test_invalid_fixture() {
        assert!(Fixture::from_json(r#"{"topics": [{"partitions": []}]}"#).is_err());
    }
}
