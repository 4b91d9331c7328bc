//! Partition worker: one task per requested partition.
//!
//! ```text
//! Opening -> Streaming -> Completed | LimitReached | Cancelled | Errored
//! ```
//!
//! Each record takes two waits. The worker first races the cursor's next
//! record against the cancellation token (biased towards cancellation),
//! and, for records that pass the filter, races reserving a channel slot
//! against the token. The limit is claimed only once a slot is held, so a
//! cancelled worker stops within one record's processing time.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use kview_common::PartitionId;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::{LogClient, RawRecord, RecordCursor};
use crate::decoder::{decode_or_placeholder, ValueDecoder};
use crate::error::{PartitionReadError, ReadPhase};
use crate::filter::matches;
use crate::header::HeaderValue;
use crate::limit::{Claim, LimitCounter};
use crate::model::{ConsumerRecord, Filter};
use crate::planner::ReadingPlan;

/// Terminal state of a partition worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkerOutcome {
    /// Delivered through the planned end offset, or the cursor ran dry
    Completed,
    /// The global limit was reached
    LimitReached,
    /// Stopped by cancellation before finishing
    Cancelled,
    /// Opening or reading the cursor failed
    Errored,
    /// The worker task panicked
    Panicked,
}

impl WorkerOutcome {
    pub fn is_failure(self) -> bool {
        matches!(self, WorkerOutcome::Errored | WorkerOutcome::Panicked)
    }
}

/// What one worker did, collected by the aggregator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerReport {
    pub partition: PartitionId,
    pub plan: ReadingPlan,
    pub outcome: WorkerOutcome,
    /// Records this worker delivered
    pub emitted: u64,
}

/// Everything a worker needs, moved into its task.
pub(crate) struct PartitionWorker {
    pub topic: Arc<str>,
    pub partition: PartitionId,
    pub plan: ReadingPlan,
    pub client: Arc<dyn LogClient>,
    pub decoder: Arc<dyn ValueDecoder>,
    pub filter: Option<Arc<Filter>>,
    pub counter: Arc<LimitCounter>,
    pub records: mpsc::Sender<ConsumerRecord>,
    pub errors: mpsc::UnboundedSender<PartitionReadError>,
    pub cancel: CancellationToken,
}

impl PartitionWorker {
    pub async fn run(self) -> WorkerReport {
        let mut emitted = 0;
        let outcome = self.execute(&mut emitted).await;

        debug!(
            topic = %self.topic,
            partition = self.partition,
            outcome = ?outcome,
            emitted,
            "Partition worker finished"
        );

        WorkerReport {
            partition: self.partition,
            plan: self.plan,
            outcome,
            emitted,
        }
    }

    async fn execute(&self, emitted: &mut u64) -> WorkerOutcome {
        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return WorkerOutcome::Cancelled,
            opened = self.client.open_cursor(
                &self.topic,
                self.partition,
                self.plan.start,
                !self.plan.is_bounded(),
            ) => opened,
        };

        let mut cursor = match opened {
            Ok(cursor) => cursor,
            Err(e) => {
                self.report(ReadPhase::Open, e);
                return WorkerOutcome::Errored;
            }
        };

        debug!(
            topic = %self.topic,
            partition = self.partition,
            start = self.plan.start,
            end = self.plan.end_offset(),
            "Partition cursor opened"
        );

        let outcome = if self.plan.is_empty() {
            WorkerOutcome::Completed
        } else {
            self.stream(cursor.as_mut(), emitted).await
        };

        cursor.close().await;
        outcome
    }

    async fn stream(&self, cursor: &mut dyn RecordCursor, emitted: &mut u64) -> WorkerOutcome {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return WorkerOutcome::Cancelled,
                next = cursor.next() => next,
            };

            let raw = match next {
                None => return WorkerOutcome::Completed,
                Some(Err(e)) => {
                    self.report(ReadPhase::Stream, e);
                    return WorkerOutcome::Errored;
                }
                Some(Ok(raw)) => raw,
            };

            // Offset gaps (compaction) can step past the end without hitting it
            if self.plan.end.is_some_and(|end| raw.offset > end) {
                return WorkerOutcome::Completed;
            }
            let at_end = self.plan.end == Some(raw.offset);

            let record = self.decode(raw);
            if matches(&record.key, &record.value, self.filter.as_deref()) {
                let permit = tokio::select! {
                    biased;
                    _ = self.cancel.cancelled() => return WorkerOutcome::Cancelled,
                    permit = self.records.reserve() => match permit {
                        Ok(permit) => permit,
                        // Receiver dropped: nobody is listening any more
                        Err(_) => return WorkerOutcome::Cancelled,
                    },
                };

                match self.counter.try_claim() {
                    Claim::Refused => return WorkerOutcome::LimitReached,
                    Claim::Granted { reached_limit } => {
                        permit.send(record);
                        *emitted += 1;
                        if reached_limit {
                            debug!(
                                topic = %self.topic,
                                partition = self.partition,
                                "Read limit reached, cancelling sibling workers"
                            );
                            self.cancel.cancel();
                            return WorkerOutcome::LimitReached;
                        }
                    }
                }
            }

            if at_end {
                return WorkerOutcome::Completed;
            }
        }
    }

    fn decode(&self, raw: RawRecord) -> ConsumerRecord {
        let key = raw
            .key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default();
        let value = decode_or_placeholder(self.decoder.as_ref(), raw.value.as_deref());
        let timestamp = raw
            .timestamp
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single());
        let headers = raw
            .headers
            .into_iter()
            .map(|(name, value)| (name, HeaderValue::new(value)))
            .collect();

        ConsumerRecord {
            key,
            value,
            partition: raw.partition,
            offset: raw.offset,
            timestamp,
            headers,
        }
    }

    fn report(&self, phase: ReadPhase, source: kview_common::Error) {
        warn!(
            topic = %self.topic,
            partition = self.partition,
            phase = %phase,
            error = %source,
            transient = source.is_transient(),
            "Partition read failed"
        );
        // A dropped receiver means the caller stopped listening for errors
        let _ = self
            .errors
            .send(PartitionReadError::new(self.partition, phase, source));
    }
}
