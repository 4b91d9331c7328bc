//! Error types for topic reads.

use std::fmt;

use kview_common::PartitionId;
use thiserror::Error;

/// Result type alias for reader operations.
pub type Result<T> = std::result::Result<T, ReaderError>;

/// Errors that abort a read before any record is produced.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// The request itself is malformed
    #[error("Invalid read request: {0}")]
    InvalidRequest(String),

    /// Resolving the offset range of one partition failed. No worker is
    /// started when this is returned.
    #[error("Failed to fetch offsets for {topic}-{partition}: {source}")]
    OffsetFetch {
        topic: String,
        partition: PartitionId,
        #[source]
        source: kview_common::Error,
    },

    /// Reader configuration is unusable
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Stage of a partition worker at which a read error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadPhase {
    /// Opening the cursor at the planned start offset
    Open,
    /// Pulling records from an open cursor
    Stream,
}

impl fmt::Display for ReadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadPhase::Open => f.write_str("open"),
            ReadPhase::Stream => f.write_str("stream"),
        }
    }
}

/// A partition-scoped failure, delivered on the handle's error channel.
///
/// Only the worker for `partition` stops; the rest of the read continues.
#[derive(Error, Debug)]
#[error("partition {partition} {phase} failed: {source}")]
pub struct PartitionReadError {
    pub partition: PartitionId,
    pub phase: ReadPhase,
    #[source]
    pub source: kview_common::Error,
}

impl PartitionReadError {
    pub fn new(partition: PartitionId, phase: ReadPhase, source: kview_common::Error) -> Self {
        Self {
            partition,
            phase,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offset_fetch_message_names_partition() {
        let err = ReaderError::OffsetFetch {
            topic: "orders".to_string(),
            partition: 4,
            source: kview_common::Error::Network("connection refused".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Failed to fetch offsets for orders-4: Network error: connection refused"
        );
    }

    #[test]
    fn test_partition_read_error_display() {
        let err = PartitionReadError::new(
            2,
            ReadPhase::Open,
            kview_common::Error::NotFound("leader".to_string()),
        );
        assert_eq!(err.to_string(), "partition 2 open failed: Not found: leader");
    }
}
