//! Show the retained offset range of each partition.

use std::collections::BTreeSet;

use anyhow::Result;
use kview_common::PartitionId;
use kview_reader::{PartitionOffsets, TopicReader};
use serde::Serialize;
use tabled::Tabled;

use crate::backend::Backend;
use crate::{output, OutputFormat};

/// Show the offset range of each partition
#[derive(Debug, clap::Args)]
pub struct OffsetsCommand {
    /// Topic name
    topic: String,

    /// Partitions to inspect, comma separated (default: all)
    #[arg(short, long, value_delimiter = ',')]
    partitions: Vec<PartitionId>,
}

#[derive(Debug, Serialize, Tabled)]
struct OffsetsRow {
    #[tabled(rename = "PARTITION")]
    partition: PartitionId,
    #[tabled(rename = "OLDEST")]
    oldest: i64,
    #[tabled(rename = "NEWEST")]
    #[serde(skip_serializing_if = "Option::is_none")]
    #[tabled(display_with = "display_newest")]
    newest: Option<i64>,
    #[tabled(rename = "NEXT")]
    first_available: i64,
    #[tabled(rename = "RECORDS")]
    records: u64,
}

fn display_newest(newest: &Option<i64>) -> String {
    newest.map_or_else(|| "-".to_string(), |n| n.to_string())
}

impl OffsetsRow {
    fn new(partition: PartitionId, offsets: &PartitionOffsets) -> Self {
        Self {
            partition,
            oldest: offsets.oldest,
            newest: (!offsets.is_empty()).then(|| offsets.newest()),
            first_available: offsets.first_available,
            records: offsets.record_count(),
        }
    }
}

impl OffsetsCommand {
    pub async fn execute(&self, backend: &Backend, format: OutputFormat) -> Result<()> {
        let partitions: BTreeSet<PartitionId> = backend
            .partitions(&self.topic, &self.partitions)
            .await?
            .into_iter()
            .collect();

        let reader = TopicReader::new(backend.client());
        let offsets = reader.offsets(&self.topic, &partitions).await?;

        let rows: Vec<OffsetsRow> = offsets
            .iter()
            .map(|(&partition, o)| OffsetsRow::new(partition, o))
            .collect();

        match format {
            OutputFormat::Table => {
                let total: u64 = rows.iter().map(|r| r.records).sum();
                output::print_table(rows);
                output::print_info(&format!(
                    "Topic '{}' retains {} records",
                    self.topic, total
                ));
            }
            OutputFormat::Json => println!("{}", output::format_output(&rows, format)?),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_for_empty_partition() {
        let row = OffsetsRow::new(3, &PartitionOffsets::new(12, 12));
        assert_eq!(row.newest, None);
        assert_eq!(row.records, 0);
        assert_eq!(display_newest(&row.newest), "-");
    }

    #[test]
    fn test_row_for_populated_partition() {
        let row = OffsetsRow::new(0, &PartitionOffsets::new(1, 291));
        assert_eq!(row.newest, Some(290));
        assert_eq!(row.records, 290);
        assert_eq!(row.first_available, 291);
    }
}
