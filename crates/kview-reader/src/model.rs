//! Read requests and decoded records.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use kview_common::{Offset, PartitionId};
use serde::{Deserialize, Serialize};

use crate::error::{ReaderError, Result};
use crate::header::HeaderValue;

/// Where in each partition a read starts and whether it ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReadMode {
    /// Oldest retained records first
    Beginning,
    /// The newest records of each partition
    MostRecent,
    /// Only records written after the read starts; no upper bound
    Live,
}

impl ReadMode {
    /// Bounded modes stop at a planned end offset.
    pub fn is_bounded(self) -> bool {
        !matches!(self, ReadMode::Live)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReadMode::Beginning => "beginning",
            ReadMode::MostRecent => "most-recent",
            ReadMode::Live => "live",
        }
    }
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadMode {
    type Err = ReaderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "beginning" | "oldest" | "earliest" => Ok(ReadMode::Beginning),
            "most-recent" | "most_recent" | "newest" | "latest" => Ok(ReadMode::MostRecent),
            "live" | "tail" => Ok(ReadMode::Live),
            other => Err(ReaderError::InvalidRequest(format!(
                "unknown read mode '{}', expected beginning, most-recent or live",
                other
            ))),
        }
    }
}

/// How the key term of a [`Filter`] is applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyMode {
    /// Key is not filtered; the value term applies instead
    #[default]
    None,
    Contains,
    StartsWith,
}

/// Optional record predicate.
///
/// Key and value filtering are exclusive: when `key_mode` is set the value
/// term is ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub key_mode: KeyMode,
    #[serde(default)]
    pub key_term: String,
    #[serde(default)]
    pub value_term: String,
}

impl Filter {
    pub fn key_contains(term: impl Into<String>) -> Self {
        Self {
            key_mode: KeyMode::Contains,
            key_term: term.into(),
            value_term: String::new(),
        }
    }

    pub fn key_starts_with(term: impl Into<String>) -> Self {
        Self {
            key_mode: KeyMode::StartsWith,
            key_term: term.into(),
            value_term: String::new(),
        }
    }

    pub fn value_contains(term: impl Into<String>) -> Self {
        Self {
            key_mode: KeyMode::None,
            key_term: String::new(),
            value_term: term.into(),
        }
    }
}

/// Input to a single read. Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadRequest {
    pub topic: String,
    pub partitions: BTreeSet<PartitionId>,
    pub mode: ReadMode,
    /// Total records across all partitions. In live mode this caps the
    /// lifetime of the stream; a live limit of 0 means no cap.
    pub limit: u64,
    #[serde(default)]
    pub filter: Option<Filter>,
}

impl ReadRequest {
    pub fn new(
        topic: impl Into<String>,
        partitions: impl IntoIterator<Item = PartitionId>,
        mode: ReadMode,
        limit: u64,
    ) -> Self {
        Self {
            topic: topic.into(),
            partitions: partitions.into_iter().collect(),
            mode,
            limit,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    /// The emission cap enforced across workers, `None` for an uncapped
    /// live tail.
    pub fn effective_limit(&self) -> Option<u64> {
        match self.mode {
            ReadMode::Live if self.limit == 0 => None,
            _ => Some(self.limit),
        }
    }

    /// Reject requests that cannot be planned.
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(ReaderError::InvalidRequest("topic name is empty".to_string()));
        }
        if self.partitions.is_empty() {
            return Err(ReaderError::InvalidRequest(format!(
                "no partitions requested for topic '{}'",
                self.topic
            )));
        }
        if let Some(negative) = self.partitions.iter().find(|p| **p < 0) {
            return Err(ReaderError::InvalidRequest(format!(
                "invalid partition index {} for topic '{}'",
                negative, self.topic
            )));
        }
        Ok(())
    }
}

/// A decoded record ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsumerRecord {
    pub key: String,
    /// Decoded value, or a decode-error placeholder
    pub value: String,
    pub partition: PartitionId,
    pub offset: Offset,
    pub timestamp: Option<DateTime<Utc>>,
    pub headers: Vec<(String, HeaderValue)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_mode_round_trips_through_str() {
        for mode in [ReadMode::Beginning, ReadMode::MostRecent, ReadMode::Live] {
            assert_eq!(mode.as_str().parse::<ReadMode>().unwrap(), mode);
        }
        assert_eq!("LATEST".parse::<ReadMode>().unwrap(), ReadMode::MostRecent);
        assert!("sideways".parse::<ReadMode>().is_err());
    }

    #[test]
    fn test_partitions_are_deduplicated() {
        let request = ReadRequest::new("orders", [2, 0, 2, 1], ReadMode::Beginning, 10);
        assert_eq!(request.partition_count(), 3);
        assert_eq!(request.partitions.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_validate_rejects_bad_requests() {
        let empty_topic = ReadRequest::new(" ", [0], ReadMode::Beginning, 10);
        assert!(matches!(empty_topic.validate(), Err(ReaderError::InvalidRequest(_))));

        let no_partitions = ReadRequest::new("orders", [], ReadMode::Beginning, 10);
        assert!(matches!(no_partitions.validate(), Err(ReaderError::InvalidRequest(_))));

        let negative = ReadRequest::new("orders", [0, -1], ReadMode::Live, 10);
        assert!(matches!(negative.validate(), Err(ReaderError::InvalidRequest(_))));

        let ok = ReadRequest::new("orders", [0, 1], ReadMode::MostRecent, 10);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_effective_limit() {
        assert_eq!(ReadRequest::new("t", [0], ReadMode::Beginning, 0).effective_limit(), Some(0));
        assert_eq!(ReadRequest::new("t", [0], ReadMode::Live, 0).effective_limit(), None);
        assert_eq!(ReadRequest::new("t", [0], ReadMode::Live, 5).effective_limit(), Some(5));
    }

    #[test]
    fn test_filter_deserializes_with_defaults() {
        let filter: Filter = serde_json::from_str(r#"{"key_mode":"starts-with","key_term":"user-"}"#).unwrap();
        assert_eq!(filter, Filter::key_starts_with("user-"));
    }
}
