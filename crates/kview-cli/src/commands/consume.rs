//! Read records from a topic.

use anyhow::Result;
use kview_common::PartitionId;
use kview_reader::{
    ConsumerRecord, DecoderKind, Filter, ReadEvent, ReadHandle, ReadMode, ReadOutcome,
    ReadRequest, ReadSummary, TopicReader,
};
use tabled::Tabled;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::config::KviewConfig;
use crate::{output, OutputFormat};

const VALUE_WIDTH: usize = 80;

/// Read records from a topic
#[derive(Debug, clap::Args)]
pub struct ConsumeCommand {
    /// Topic name
    topic: String,

    /// Partitions to read, comma separated (default: all)
    #[arg(short, long, value_delimiter = ',')]
    partitions: Vec<PartitionId>,

    /// Where to read: beginning, most-recent or live
    #[arg(short, long, default_value = "beginning")]
    mode: ReadMode,

    /// Total records across all partitions (0 with live mode: no limit)
    #[arg(short, long, default_value_t = 50)]
    limit: u64,

    /// Only records whose key contains this text
    #[arg(long, conflicts_with_all = ["key_prefix", "value_contains"])]
    key_contains: Option<String>,

    /// Only records whose key starts with this text
    #[arg(long, conflicts_with = "value_contains")]
    key_prefix: Option<String>,

    /// Only records whose value contains this text
    #[arg(long)]
    value_contains: Option<String>,

    /// Value decoder: utf8, json or lossy
    #[arg(short, long, default_value = "utf8")]
    decoder: DecoderKind,

    /// Capacity of the record channel
    #[arg(long)]
    channel_capacity: Option<usize>,

    /// Show record headers in table output
    #[arg(long)]
    headers: bool,
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "PARTITION")]
    partition: PartitionId,
    #[tabled(rename = "OFFSET")]
    offset: i64,
    #[tabled(rename = "TIMESTAMP")]
    timestamp: String,
    #[tabled(rename = "KEY")]
    key: String,
    #[tabled(rename = "VALUE")]
    value: String,
}

#[derive(Tabled)]
struct RecordWithHeadersRow {
    #[tabled(inline)]
    record: RecordRow,
    #[tabled(rename = "HEADERS")]
    headers: String,
}

impl From<&ConsumerRecord> for RecordRow {
    fn from(record: &ConsumerRecord) -> Self {
        Self {
            partition: record.partition,
            offset: record.offset,
            timestamp: record
                .timestamp
                .map(|ts| ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
                .unwrap_or_else(|| "-".to_string()),
            key: output::truncate(&record.key, VALUE_WIDTH / 2),
            value: output::truncate(&record.value, VALUE_WIDTH),
        }
    }
}

fn format_headers(record: &ConsumerRecord) -> String {
    record
        .headers
        .iter()
        .map(|(name, value)| format!("{}={}", name, value.render()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ConsumeCommand {
    fn filter(&self) -> Option<Filter> {
        if let Some(term) = &self.key_contains {
            Some(Filter::key_contains(term.clone()))
        } else if let Some(term) = &self.key_prefix {
            Some(Filter::key_starts_with(term.clone()))
        } else {
            self.value_contains
                .as_ref()
                .map(|term| Filter::value_contains(term.clone()))
        }
    }

    pub async fn execute(
        &self,
        backend: &Backend,
        config: &KviewConfig,
        format: OutputFormat,
    ) -> Result<()> {
        let mut reader_config = config.reader.clone();
        if let Some(capacity) = self.channel_capacity {
            reader_config.channel_capacity = capacity;
        }

        let partitions = backend.partitions(&self.topic, &self.partitions).await?;
        let mut request = ReadRequest::new(&self.topic, partitions, self.mode, self.limit);
        if let Some(filter) = self.filter() {
            request = request.with_filter(filter);
        }

        let reader = TopicReader::new(backend.client())
            .with_decoder(self.decoder.build())
            .with_config(reader_config);

        let shutdown = CancellationToken::new();
        let on_ctrl_c = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_ctrl_c.cancel();
            }
        });

        let mut handle = match reader.read_with_cancellation(request, &shutdown).await? {
            ReadOutcome::EmptyTopic => {
                output::print_info(&format!(
                    "Topic '{}' has no records to read in {} mode",
                    self.topic, self.mode
                ));
                return Ok(());
            }
            ReadOutcome::Stream(handle) => handle,
        };

        let (records, _) = collect(&mut handle, format).await?;

        let summary = handle.finish().await;

        if matches!(format, OutputFormat::Table) {
            if self.headers {
                output::print_table(
                    records
                        .iter()
                        .map(|r| RecordWithHeadersRow {
                            record: RecordRow::from(r),
                            headers: format_headers(r),
                        })
                        .collect(),
                );
            } else {
                output::print_table(records.iter().map(RecordRow::from).collect());
            }
        }

        if shutdown.is_cancelled() {
            output::print_info("Read interrupted");
        }
        report_summary(&summary);
        Ok(())
    }
}

/// Drain a read, printing warnings as partition errors arrive. JSON output
/// is printed per record; table output is returned for printing at the end.
/// Also returns the number of partition errors seen.
async fn collect(
    handle: &mut ReadHandle,
    format: OutputFormat,
) -> Result<(Vec<ConsumerRecord>, usize)> {
    let mut records = Vec::new();
    let mut errors = 0;

    while let Some(event) = handle.next_event().await {
        match event {
            ReadEvent::Record(record) => match format {
                OutputFormat::Json => println!("{}", output::format_output(&record, format)?),
                OutputFormat::Table => records.push(record),
            },
            ReadEvent::Error(error) => {
                errors += 1;
                output::print_warning(&error.to_string());
            }
        }
    }

    Ok((records, errors))
}

fn report_summary(summary: &ReadSummary) {
    let failed = summary.failed_partitions();
    let message = format!(
        "Read {} records from {} partitions",
        summary.emitted,
        summary.partitions.len()
    );

    if failed.is_empty() {
        output::print_success(&message);
    } else {
        let failed: Vec<String> = failed.iter().map(|p| p.to_string()).collect();
        output::print_warning(&format!("{} ({} failed: {})", message, failed.len(), failed.join(", ")));
    }
}
