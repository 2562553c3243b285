//! Port Interfaces
//!
//! Contracts between the study pipeline and the outside world, following
//! the Hexagonal Architecture pattern. Infrastructure adapters implement
//! these; services only ever see the traits.
//!
//! ## Driven Ports (Outbound)
//!
//! - [`TickStore`]: hour-bucketed historical raw records
//! - [`ResultSink`]: receives per-event results and summaries
//!
//! ## Driver Ports (Inbound)
//!
//! - [`EventSource`]: live push of decoded events or raw records
//! - [`RecordDecoder`]: turns a raw record into an [`Event`]

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::market::{Event, MICROS_PER_HOUR, Timestamp};
use crate::domain::studies::{StudyOutput, StudySummary};

// =============================================================================
// Raw records
// =============================================================================

/// An undecoded wire record in one of the two carriers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawRecord {
    /// JSON text.
    Json(String),
    /// `MessagePack` bytes.
    MsgPack(Vec<u8>),
}

/// Decodes raw records into events.
pub trait RecordDecoder: Send + Sync {
    /// Decode failure.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Decode one record.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed.
    fn decode(&self, record: &RawRecord) -> Result<Event, Self::Error>;
}

// =============================================================================
// Storage
// =============================================================================

/// Hour-granularity storage bucket (hours since the Unix epoch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HourBucket(i64);

impl HourBucket {
    /// Bucket containing `timestamp`.
    #[must_use]
    pub const fn containing(timestamp: Timestamp) -> Self {
        Self(timestamp.as_micros().div_euclid(MICROS_PER_HOUR))
    }

    /// Bucket from its index.
    #[must_use]
    pub const fn from_index(index: i64) -> Self {
        Self(index)
    }

    /// Hours since the Unix epoch.
    #[must_use]
    pub const fn index(&self) -> i64 {
        self.0
    }

    /// First instant of the bucket.
    #[must_use]
    pub const fn start(&self) -> Timestamp {
        Timestamp::from_micros(self.0.saturating_mul(MICROS_PER_HOUR))
    }

    /// Buckets touched by the half-open range `[start, end)`, oldest first.
    pub fn covering(start: Timestamp, end: Timestamp) -> impl Iterator<Item = Self> {
        let first = Self::containing(start).0;
        let last = if end > start {
            Self::containing(end.saturating_sub_micros(1)).0
        } else {
            first - 1
        };
        (first..=last).map(Self)
    }

    /// `YYYYMMDDHH` label used in storage paths.
    #[must_use]
    pub fn label(&self) -> String {
        self.start().as_datetime().format("%Y%m%d%H").to_string()
    }
}

impl fmt::Display for HourBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Tick store failures.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error reading or writing a bucket.
    #[error("IO error on {path}: {source}")]
    Io {
        /// File involved.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Record could not be serialized for storage.
    #[error("encode error: {0}")]
    Encode(String),
}

/// Hour-bucketed historical tick storage.
#[cfg_attr(test, mockall::automock)]
pub trait TickStore: Send + Sync {
    /// Raw records of one bucket, in storage order. A bucket with no data is
    /// empty, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket exists but cannot be read.
    fn load_bucket(
        &self,
        instrument_id: i64,
        bucket: HourBucket,
    ) -> Result<Vec<RawRecord>, StoreError>;

    /// Name of this store.
    fn name(&self) -> &'static str;
}

// =============================================================================
// Live sources
// =============================================================================

/// What an event source delivers.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceMessage {
    /// An already decoded event.
    Event(Event),
    /// A raw record to decode.
    Raw(RawRecord),
    /// The source finished normally.
    EndOfStream,
    /// The transport dropped.
    Disconnected {
        /// Transport-provided reason.
        reason: String,
    },
}

/// Live push source of ticks.
#[async_trait]
pub trait EventSource: Send {
    /// Wait for the next message. After `EndOfStream` or `Disconnected` the
    /// source is finished.
    async fn next_message(&mut self) -> SourceMessage;

    /// Name of this source.
    fn name(&self) -> &'static str;
}

// =============================================================================
// Result sinks
// =============================================================================

/// Receives study results.
pub trait ResultSink: Send {
    /// One per emitted result, in processing order.
    fn publish(&mut self, output: &StudyOutput);

    /// Summary snapshot, typically at the end of a run.
    fn publish_summary(&mut self, _summary: &StudySummary) {}
}
