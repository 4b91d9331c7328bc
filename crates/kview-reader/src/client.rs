//! Log Client abstraction consumed by the reader.

use async_trait::async_trait;
use bytes::Bytes;
use kview_common::{Offset, PartitionId, Result, Timestamp};

/// A record as yielded by a cursor, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub key: Option<Bytes>,
    pub value: Option<Bytes>,
    pub partition: PartitionId,
    pub offset: Offset,
    /// Milliseconds since epoch, when the broker reports one
    pub timestamp: Option<Timestamp>,
    pub headers: Vec<(String, Bytes)>,
}

/// Sequential reader over one partition.
///
/// `next` must be cancel-safe: the worker drops an in-flight `next` future
/// when the read is cancelled, and a dropped call must not lose a record
/// that a later call would have returned.
#[async_trait]
pub trait RecordCursor: Send {
    /// Next record in offset order, `None` once the cursor is exhausted or
    /// closed. A following cursor waits for new records at the end of the
    /// partition; any other cursor returns `None` there.
    async fn next(&mut self) -> Option<Result<RawRecord>>;

    /// Release broker-side resources. Called exactly once by the worker on
    /// every exit path.
    async fn close(&mut self);
}

/// Access to the partitioned log.
#[async_trait]
pub trait LogClient: Send + Sync {
    /// Smallest offset still retained by the partition.
    async fn fetch_oldest_offset(&self, topic: &str, partition: PartitionId) -> Result<Offset>;

    /// Offset the next written record will receive.
    async fn fetch_first_available_offset(
        &self,
        topic: &str,
        partition: PartitionId,
    ) -> Result<Offset>;

    /// Open a cursor yielding records from `start` onwards. With `follow`
    /// set the cursor keeps waiting for records written after it caught up.
    async fn open_cursor(
        &self,
        topic: &str,
        partition: PartitionId,
        start: Offset,
        follow: bool,
    ) -> Result<Box<dyn RecordCursor>>;
}
