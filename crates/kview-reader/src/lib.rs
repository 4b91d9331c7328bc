//! Concurrent reader for partitioned, append-only topics.
//!
//! A read resolves the retained offset range of every requested partition,
//! plans an inclusive range per partition from the read mode and the global
//! limit, then starts one worker task per partition. Workers decode,
//! filter and push records onto a shared channel; a join barrier closes that
//! channel once every worker has finished.
//!
//! # Read modes
//!
//! - [`ReadMode::Beginning`]: the oldest retained records, `limit / partitions`
//!   per partition.
//! - [`ReadMode::MostRecent`]: the newest records, same split.
//! - [`ReadMode::Live`]: only records written after the read starts, until
//!   cancelled or the limit is reached.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use kview_reader::{InMemoryLogClient, ReadMode, ReadOutcome, ReadRequest, TopicReader};
//!
//! let client = InMemoryLogClient::new();
//! client.create_topic("orders", 3).await?;
//! client.append("orders", 0, "k1", "hello").await?;
//!
//! let reader = TopicReader::new(Arc::new(client));
//! let request = ReadRequest::new("orders", [0, 1, 2], ReadMode::Beginning, 50);
//!
//! match reader.read(request).await? {
//!     ReadOutcome::EmptyTopic => println!("nothing to read"),
//!     ReadOutcome::Stream(mut handle) => {
//!         while let Some(record) = handle.next_record().await {
//!             println!("{}@{}: {}", record.partition, record.offset, record.value);
//!         }
//!         let summary = handle.finish().await;
//!         println!("{} records", summary.emitted);
//!     }
//! }
//! ```

pub mod aggregator;
pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod filter;
pub mod header;
#[cfg(feature = "kafka")]
pub mod kafka;
pub mod limit;
pub mod memory;
pub mod model;
pub mod offsets;
pub mod planner;
pub mod reader;
pub mod worker;

pub use aggregator::{ReadEvent, ReadHandle, ReadSummary};
pub use client::{LogClient, RawRecord, RecordCursor};
pub use config::{KafkaConfig, ReaderConfig};
pub use decoder::{DecodeError, DecoderKind, JsonDecoder, LossyDecoder, Utf8Decoder, ValueDecoder};
pub use error::{PartitionReadError, ReadPhase, ReaderError, Result};
pub use filter::matches;
pub use header::HeaderValue;
#[cfg(feature = "kafka")]
pub use kafka::KafkaLogClient;
pub use memory::InMemoryLogClient;
pub use model::{ConsumerRecord, Filter, KeyMode, ReadMode, ReadRequest};
pub use offsets::{resolve_offsets, PartitionOffsets};
pub use planner::{is_readable, plan, ReadingPlan};
pub use reader::{ReadOutcome, TopicReader};
pub use worker::{WorkerOutcome, WorkerReport};
