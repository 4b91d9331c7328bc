//! Common types and utilities shared across kview components.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{Offset, PartitionId, Timestamp, TopicPartition};

/// Re-export commonly used external types
pub use bytes::Bytes;
pub use chrono::{DateTime, Utc};
