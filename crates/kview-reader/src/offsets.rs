//! Per-partition offset resolution.

use std::collections::{BTreeMap, BTreeSet};

use futures::future::try_join_all;
use kview_common::{Offset, PartitionId};
use serde::Serialize;
use tracing::debug;

use crate::client::LogClient;
use crate::error::{ReaderError, Result};

/// Retained range of one partition at resolution time.
///
/// Offsets may move before the partition is read; the reader accepts that
/// staleness and does not re-validate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PartitionOffsets {
    /// Smallest retained offset
    pub oldest: Offset,
    /// Offset of the next record to be written
    pub first_available: Offset,
}

impl PartitionOffsets {
    pub fn new(oldest: Offset, first_available: Offset) -> Self {
        Self {
            oldest,
            first_available,
        }
    }

    /// Offset of the newest existing record; `oldest - 1` when empty.
    pub fn newest(&self) -> Offset {
        self.first_available - 1
    }

    pub fn is_empty(&self) -> bool {
        self.first_available == self.oldest
    }

    pub fn record_count(&self) -> u64 {
        (self.first_available - self.oldest).max(0) as u64
    }
}

/// Fetch the offset range of every partition concurrently.
///
/// Fails as a whole when any single lookup fails; a partial map is never
/// returned.
pub async fn resolve_offsets(
    client: &dyn LogClient,
    topic: &str,
    partitions: &BTreeSet<PartitionId>,
) -> Result<BTreeMap<PartitionId, PartitionOffsets>> {
    let fetches = partitions.iter().map(|&partition| async move {
        let offset_error = |source: kview_common::Error| ReaderError::OffsetFetch {
            topic: topic.to_string(),
            partition,
            source,
        };

        let (oldest, first_available) = tokio::try_join!(
            client.fetch_oldest_offset(topic, partition),
            client.fetch_first_available_offset(topic, partition),
        )
        .map_err(offset_error)?;

        if first_available < oldest {
            return Err(offset_error(kview_common::Error::InvalidInput(format!(
                "first available offset {} is below oldest offset {}",
                first_available, oldest
            ))));
        }

        debug!(topic, partition, oldest, first_available, "Resolved partition offsets");
        Ok((partition, PartitionOffsets::new(oldest, first_available)))
    });

    let resolved = try_join_all(fetches).await?;
    Ok(resolved.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newest_and_count() {
        let offsets = PartitionOffsets::new(1, 291);
        assert_eq!(offsets.newest(), 290);
        assert_eq!(offsets.record_count(), 290);
        assert!(!offsets.is_empty());
    }

    #[test]
    fn test_empty_partition() {
        let offsets = PartitionOffsets::new(40, 40);
        assert!(offsets.is_empty());
        assert_eq!(offsets.newest(), 39);
        assert_eq!(offsets.record_count(), 0);
    }
}
