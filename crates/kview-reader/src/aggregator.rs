//! Fan-in of partition workers and the caller-facing stream handle.
//!
//! Workers own every sender of the record channel, so the channel closes
//! exactly once, when the last worker exits. The aggregator task joins all
//! worker tasks and turns their reports into a [`ReadSummary`].

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{FuturesUnordered, Stream, StreamExt};
use futures::FutureExt;
use kview_common::PartitionId;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{info, warn};

use crate::error::PartitionReadError;
use crate::limit::LimitCounter;
use crate::model::ConsumerRecord;
use crate::planner::ReadingPlan;
use crate::worker::{PartitionWorker, WorkerOutcome, WorkerReport};

/// Final accounting of a read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReadSummary {
    /// Records delivered across all partitions
    pub emitted: u64,
    /// One report per requested partition, ordered by partition
    pub partitions: Vec<WorkerReport>,
}

impl ReadSummary {
    pub fn failed_partitions(&self) -> Vec<PartitionId> {
        self.partitions
            .iter()
            .filter(|r| r.outcome.is_failure())
            .map(|r| r.partition)
            .collect()
    }

    pub fn outcome_of(&self, partition: PartitionId) -> Option<WorkerOutcome> {
        self.partitions
            .iter()
            .find(|r| r.partition == partition)
            .map(|r| r.outcome)
    }
}

/// Spawn one task per worker plus the joining aggregator task.
pub(crate) fn spawn(
    workers: Vec<PartitionWorker>,
    counter: Arc<LimitCounter>,
    cancel: CancellationToken,
) -> JoinHandle<ReadSummary> {
    let mut running = FuturesUnordered::new();
    for worker in workers {
        let partition = worker.partition;
        let plan = worker.plan;
        let task = tokio::spawn(worker.run());
        running.push(task.map(move |joined| (partition, plan, joined)));
    }

    tokio::spawn(async move {
        let mut reports = BTreeMap::new();

        while let Some((partition, plan, joined)) = running.next().await {
            let report = match joined {
                Ok(report) => report,
                Err(e) => {
                    warn!(partition, error = %e, "Partition worker panicked, cancelling read");
                    cancel.cancel();
                    WorkerReport {
                        partition,
                        plan,
                        outcome: WorkerOutcome::Panicked,
                        emitted: 0,
                    }
                }
            };
            reports.insert(partition, report);
        }

        let summary = ReadSummary {
            emitted: counter.emitted(),
            partitions: reports.into_values().collect(),
        };
        info!(
            emitted = summary.emitted,
            partitions = summary.partitions.len(),
            failed = summary.failed_partitions().len(),
            "Topic read finished"
        );
        summary
    })
}

/// Either a record or a partition error, in arrival order.
#[derive(Debug)]
pub enum ReadEvent {
    Record(ConsumerRecord),
    Error(PartitionReadError),
}

/// Handle to a running read.
///
/// Records arrive in arrival order across partitions and in offset order
/// within a partition. Partition errors arrive separately and do not end
/// the stream. Dropping the handle cancels the read.
pub struct ReadHandle {
    records: mpsc::Receiver<ConsumerRecord>,
    errors: mpsc::UnboundedReceiver<PartitionReadError>,
    cancel: CancellationToken,
    guard: DropGuard,
    summary: JoinHandle<ReadSummary>,
    counter: Arc<LimitCounter>,
    plans: BTreeMap<PartitionId, ReadingPlan>,
}

impl ReadHandle {
    pub(crate) fn new(
        records: mpsc::Receiver<ConsumerRecord>,
        errors: mpsc::UnboundedReceiver<PartitionReadError>,
        cancel: CancellationToken,
        summary: JoinHandle<ReadSummary>,
        counter: Arc<LimitCounter>,
        plans: BTreeMap<PartitionId, ReadingPlan>,
    ) -> Self {
        Self {
            records,
            errors,
            guard: cancel.clone().drop_guard(),
            cancel,
            summary,
            counter,
            plans,
        }
    }

    /// Next record, or `None` once every worker has finished.
    pub async fn next_record(&mut self) -> Option<ConsumerRecord> {
        self.records.recv().await
    }

    /// Next record or partition error, `None` once every worker has
    /// finished and both channels are drained.
    ///
    /// Queued errors are returned before records. Cancel-safe.
    pub async fn next_event(&mut self) -> Option<ReadEvent> {
        tokio::select! {
            biased;
            Some(error) = self.errors.recv() => Some(ReadEvent::Error(error)),
            record = self.records.recv() => match record {
                Some(record) => Some(ReadEvent::Record(record)),
                None => self.errors.try_recv().ok().map(ReadEvent::Error),
            },
        }
    }

    /// A partition error if one is queued. Never blocks.
    pub fn try_next_error(&mut self) -> Option<PartitionReadError> {
        self.errors.try_recv().ok()
    }

    /// Wait for the next partition error, `None` once every worker has
    /// finished.
    pub async fn next_error(&mut self) -> Option<PartitionReadError> {
        self.errors.recv().await
    }

    /// Stop every worker. Records already queued remain readable.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Records delivered so far.
    pub fn emitted(&self) -> u64 {
        self.counter.emitted()
    }

    pub fn plans(&self) -> &BTreeMap<PartitionId, ReadingPlan> {
        &self.plans
    }

    /// Stop the read and wait for every worker to reach a terminal state.
    ///
    /// Workers that already finished keep their outcome; anything still
    /// running ends as cancelled. Undelivered records are discarded.
    pub async fn finish(self) -> ReadSummary {
        let ReadHandle {
            records,
            errors,
            cancel,
            guard,
            summary,
            counter,
            ..
        } = self;

        cancel.cancel();
        drop(records);
        drop(errors);

        let summary = match summary.await {
            Ok(summary) => summary,
            Err(e) => {
                warn!(error = %e, "Read aggregator failed");
                ReadSummary {
                    emitted: counter.emitted(),
                    partitions: Vec::new(),
                }
            }
        };
        drop(guard);
        summary
    }

    /// Consume the handle as a stream of records. Partition errors are
    /// dropped; dropping the stream cancels the read.
    pub fn into_stream(self) -> impl Stream<Item = ConsumerRecord> + Send {
        futures::stream::unfold(self, |mut handle| async move {
            let record = handle.next_record().await?;
            Some((record, handle))
        })
    }
}
