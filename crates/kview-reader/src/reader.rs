//! Entry point tying resolution, planning and workers together.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use kview_common::PartitionId;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::aggregator::{self, ReadHandle};
use crate::client::LogClient;
use crate::config::ReaderConfig;
use crate::decoder::{Utf8Decoder, ValueDecoder};
use crate::error::Result;
use crate::limit::LimitCounter;
use crate::model::ReadRequest;
use crate::offsets::{resolve_offsets, PartitionOffsets};
use crate::planner::{is_readable, plan, ReadingPlan};
use crate::worker::PartitionWorker;

/// Result of starting a read.
pub enum ReadOutcome {
    /// Workers are running; drain the handle
    Stream(ReadHandle),
    /// No requested partition has anything to read. No worker was started.
    EmptyTopic,
}

impl ReadOutcome {
    pub fn is_empty_topic(&self) -> bool {
        matches!(self, ReadOutcome::EmptyTopic)
    }

    pub fn into_handle(self) -> Option<ReadHandle> {
        match self {
            ReadOutcome::Stream(handle) => Some(handle),
            ReadOutcome::EmptyTopic => None,
        }
    }
}

/// Reads topics through a [`LogClient`].
///
/// The reader holds no per-read state and can serve any number of
/// concurrent reads.
#[derive(Clone)]
pub struct TopicReader {
    client: Arc<dyn LogClient>,
    decoder: Arc<dyn ValueDecoder>,
    config: ReaderConfig,
}

impl TopicReader {
    /// Create a reader decoding values as UTF-8 with default configuration
    pub fn new(client: Arc<dyn LogClient>) -> Self {
        Self {
            client,
            decoder: Arc::new(Utf8Decoder),
            config: ReaderConfig::default(),
        }
    }

    pub fn with_decoder(mut self, decoder: Arc<dyn ValueDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn with_config(mut self, config: ReaderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Resolve the retained offset range of each partition.
    pub async fn offsets(
        &self,
        topic: &str,
        partitions: &BTreeSet<PartitionId>,
    ) -> Result<BTreeMap<PartitionId, PartitionOffsets>> {
        resolve_offsets(self.client.as_ref(), topic, partitions).await
    }

    /// Start a read. Returns once workers are spawned, before any record is
    /// delivered.
    pub async fn read(&self, request: ReadRequest) -> Result<ReadOutcome> {
        self.read_with_cancellation(request, &CancellationToken::new())
            .await
    }

    /// Start a read that is also cancelled when `parent` is.
    pub async fn read_with_cancellation(
        &self,
        request: ReadRequest,
        parent: &CancellationToken,
    ) -> Result<ReadOutcome> {
        request.validate()?;
        self.config.validate()?;

        info!(
            topic = %request.topic,
            partitions = request.partition_count(),
            mode = %request.mode,
            limit = request.limit,
            filtered = request.filter.is_some(),
            "Starting topic read"
        );

        let offsets = resolve_offsets(self.client.as_ref(), &request.topic, &request.partitions).await?;

        if !offsets.values().any(|o| is_readable(request.mode, o)) {
            info!(topic = %request.topic, "Topic has nothing to read");
            return Ok(ReadOutcome::EmptyTopic);
        }

        let partition_count = request.partition_count();
        let plans: BTreeMap<PartitionId, ReadingPlan> = offsets
            .iter()
            .map(|(&partition, o)| (partition, plan(request.mode, request.limit, partition_count, o)))
            .collect();

        for (partition, plan) in &plans {
            debug!(
                topic = %request.topic,
                partition,
                start = plan.start,
                end = plan.end_offset(),
                "Planned partition range"
            );
        }

        let cancel = parent.child_token();
        let counter = Arc::new(LimitCounter::new(request.effective_limit()));
        let (record_tx, record_rx) = mpsc::channel(self.config.channel_capacity);
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        let topic: Arc<str> = Arc::from(request.topic.as_str());
        let filter = request.filter.map(Arc::new);

        let workers: Vec<PartitionWorker> = plans
            .iter()
            .map(|(&partition, &plan)| PartitionWorker {
                topic: Arc::clone(&topic),
                partition,
                plan,
                client: Arc::clone(&self.client),
                decoder: Arc::clone(&self.decoder),
                filter: filter.clone(),
                counter: Arc::clone(&counter),
                records: record_tx.clone(),
                errors: error_tx.clone(),
                cancel: cancel.clone(),
            })
            .collect();

        // Workers hold the only senders from here on
        drop(record_tx);
        drop(error_tx);

        let summary = aggregator::spawn(workers, Arc::clone(&counter), cancel.clone());

        Ok(ReadOutcome::Stream(ReadHandle::new(
            record_rx, error_rx, cancel, summary, counter, plans,
        )))
    }
}
