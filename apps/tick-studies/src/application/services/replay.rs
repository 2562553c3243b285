//! Historical replay through the study engine.
//!
//! [`ReplayMerger`] pulls hour buckets from a [`TickStore`] one at a time,
//! decodes them, and yields events strictly ordered by event timestamp with
//! ties broken by storage order. It feeds the same [`StudyEngine`] a live
//! run would use, so identical event sequences give identical results.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{HourBucket, RecordDecoder, ResultSink, StoreError, TickStore};
use crate::domain::market::{Event, Timestamp};
use crate::domain::studies::{Disposition, StudyEngine};
use crate::infrastructure::metrics::{self, Origin};

// =============================================================================
// Errors and types
// =============================================================================

/// Replay errors.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Tick store failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Range is empty or inverted.
    #[error("invalid replay range: start {start} >= end {end}")]
    InvalidRange {
        /// Requested start.
        start: Timestamp,
        /// Requested end.
        end: Timestamp,
    },
}

/// Instrument and half-open time range `[start, end)` to replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplayRange {
    /// Instrument whose buckets are read.
    pub instrument_id: i64,
    /// Inclusive start.
    pub start: Timestamp,
    /// Exclusive end.
    pub end: Timestamp,
}

impl ReplayRange {
    /// Validated range.
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::InvalidRange`] unless `start < end`.
    pub fn new(instrument_id: i64, start: Timestamp, end: Timestamp) -> Result<Self, ReplayError> {
        if start >= end {
            return Err(ReplayError::InvalidRange { start, end });
        }
        Ok(Self {
            instrument_id,
            start,
            end,
        })
    }

    /// Whether `timestamp` falls inside the range.
    #[must_use]
    pub fn contains(&self, timestamp: Timestamp) -> bool {
        self.start <= timestamp && timestamp < self.end
    }
}

/// Progress tracking for replay.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplayProgress {
    /// Buckets the range spans.
    pub buckets_total: u64,
    /// Buckets read so far.
    pub buckets_loaded: u64,
    /// Records read from the store.
    pub records_read: u64,
    /// Records that failed to decode.
    pub malformed: u64,
    /// Decoded events outside the range.
    pub out_of_range: u64,
    /// Events handed out.
    pub events_emitted: u64,
    /// Timestamp of the last event handed out.
    pub current_timestamp: Option<Timestamp>,
    /// Fraction of buckets read (0.0 to 1.0).
    pub progress_pct: f64,
    /// Elapsed wall time (seconds).
    pub elapsed_seconds: f64,
    /// Processing rate (events per second).
    pub events_per_second: f64,
}

/// How a replay run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayOutcome {
    /// Every event in the range was processed.
    Completed,
    /// The cancellation token fired between events.
    Cancelled,
}

/// Heap entry; min-heap on `(timestamp, sequence)`.
#[derive(Debug)]
struct QueuedEvent {
    timestamp: Timestamp,
    sequence: u64,
    event: Event,
}

impl PartialEq for QueuedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.timestamp == other.timestamp && self.sequence == other.sequence
    }
}

impl Eq for QueuedEvent {}

impl PartialOrd for QueuedEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed so BinaryHeap pops the earliest event first.
        (other.timestamp, other.sequence).cmp(&(self.timestamp, self.sequence))
    }
}

// =============================================================================
// Merger
// =============================================================================

/// Ordered, bucket-at-a-time reader of historical ticks.
pub struct ReplayMerger<D> {
    store: Arc<dyn TickStore>,
    decoder: D,
    range: ReplayRange,
    pending: VecDeque<HourBucket>,
    queue: BinaryHeap<QueuedEvent>,
    sequence: u64,
    progress: ReplayProgress,
    started: Instant,
    initialized: bool,
    error: Option<ReplayError>,
}

impl<D> std::fmt::Debug for ReplayMerger<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplayMerger")
            .field("store", &self.store.name())
            .field("range", &self.range)
            .field("pending_buckets", &self.pending.len())
            .field("queued", &self.queue.len())
            .field("progress", &self.progress)
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

impl<D: RecordDecoder> ReplayMerger<D> {
    /// Create a merger over `range`.
    pub fn new(store: Arc<dyn TickStore>, decoder: D, range: ReplayRange) -> Self {
        Self {
            store,
            decoder,
            range,
            pending: VecDeque::new(),
            queue: BinaryHeap::new(),
            sequence: 0,
            progress: ReplayProgress::default(),
            started: Instant::now(),
            initialized: false,
            error: None,
        }
    }

    /// Plan the buckets to read. Idempotent.
    pub fn initialize(&mut self) {
        if self.initialized {
            return;
        }

        self.pending = HourBucket::covering(self.range.start, self.range.end).collect();
        self.progress.buckets_total = self.pending.len() as u64;
        self.started = Instant::now();
        self.initialized = true;

        info!(
            store = self.store.name(),
            instrument_id = self.range.instrument_id,
            start = %self.range.start,
            end = %self.range.end,
            buckets = self.progress.buckets_total,
            "Initializing replay"
        );
    }

    /// Current progress.
    #[must_use]
    pub const fn progress(&self) -> &ReplayProgress {
        &self.progress
    }

    /// Range being replayed.
    #[must_use]
    pub const fn range(&self) -> &ReplayRange {
        &self.range
    }

    /// Error that stopped iteration, if any.
    pub fn take_error(&mut self) -> Option<ReplayError> {
        self.error.take()
    }

    /// Next event in order, loading buckets as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if a bucket cannot be read.
    pub fn next_event(&mut self) -> Result<Option<Event>, ReplayError> {
        self.initialize();

        loop {
            if let Some(queued) = self.queue.pop() {
                self.progress.events_emitted += 1;
                self.progress.current_timestamp = Some(queued.timestamp);
                self.update_rates();
                return Ok(Some(queued.event));
            }

            let Some(bucket) = self.pending.pop_front() else {
                return Ok(None);
            };
            self.load(bucket)?;
        }
    }

    fn load(&mut self, bucket: HourBucket) -> Result<(), ReplayError> {
        let started = Instant::now();
        let records = self.store.load_bucket(self.range.instrument_id, bucket)?;
        metrics::record_bucket_load(self.store.name(), started.elapsed());

        let mut accepted = 0usize;
        for record in &records {
            self.progress.records_read += 1;
            match self.decoder.decode(record) {
                Ok(event) if self.range.contains(event.timestamp()) => {
                    self.sequence += 1;
                    self.queue.push(QueuedEvent {
                        timestamp: event.timestamp(),
                        sequence: self.sequence,
                        event,
                    });
                    accepted += 1;
                }
                Ok(_) => self.progress.out_of_range += 1,
                Err(e) => {
                    self.progress.malformed += 1;
                    metrics::record_malformed(Origin::Replay);
                    warn!(bucket = %bucket, error = %e, "Skipping malformed record");
                }
            }
        }

        self.progress.buckets_loaded += 1;
        debug!(
            bucket = %bucket,
            records = records.len(),
            accepted,
            "Loaded bucket"
        );
        Ok(())
    }

    #[allow(clippy::cast_precision_loss)]
    fn update_rates(&mut self) {
        let elapsed = self.started.elapsed().as_secs_f64();
        self.progress.elapsed_seconds = elapsed;
        if elapsed > 0.0 {
            self.progress.events_per_second = self.progress.events_emitted as f64 / elapsed;
        }
        if self.progress.buckets_total > 0 {
            self.progress.progress_pct =
                self.progress.buckets_loaded as f64 / self.progress.buckets_total as f64;
        }
    }

    /// Start over from the beginning of the range.
    pub fn reset(&mut self) {
        self.pending.clear();
        self.queue.clear();
        self.sequence = 0;
        self.progress = ReplayProgress::default();
        self.initialized = false;
        self.error = None;
        self.initialize();
    }

    /// Drive `engine` with every event in the range, publishing results to
    /// `sink`. Cancellation is checked between events, so the engine never
    /// sees a partially applied event.
    ///
    /// # Errors
    ///
    /// Returns an error if a bucket cannot be read. Events processed before
    /// the failure stay applied.
    pub fn run<K: ResultSink + ?Sized>(
        &mut self,
        engine: &mut StudyEngine,
        sink: &mut K,
        cancel: &CancellationToken,
    ) -> Result<ReplayOutcome, ReplayError> {
        let mut reported_malformed = self.progress.malformed;
        let study = engine.kind();

        let outcome = loop {
            if cancel.is_cancelled() {
                info!(
                    events = self.progress.events_emitted,
                    "Replay cancelled"
                );
                break ReplayOutcome::Cancelled;
            }

            let next = self.next_event();
            if self.progress.malformed > reported_malformed {
                engine.record_malformed(self.progress.malformed - reported_malformed);
                reported_malformed = self.progress.malformed;
            }

            let Some(event) = next? else {
                break ReplayOutcome::Completed;
            };

            let disposition = engine.apply(&event);
            metrics::record_disposition(study, &event, &disposition);
            match &disposition {
                Disposition::Emitted(output) => sink.publish(output),
                Disposition::Discarded(reason) => {
                    debug!(reason = reason.as_str(), timestamp = %event.timestamp(), "Event discarded");
                }
                Disposition::Absorbed => {}
            }
        };

        info!(
            outcome = ?outcome,
            events = self.progress.events_emitted,
            malformed = self.progress.malformed,
            out_of_range = self.progress.out_of_range,
            "Replay finished"
        );
        sink.publish_summary(&engine.get_summary());
        Ok(outcome)
    }
}

impl<D: RecordDecoder> Iterator for ReplayMerger<D> {
    type Item = Event;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_event() {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Replay stopped");
                self.error = Some(e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use mockall::predicate::eq;

    use super::*;
    use crate::application::ports::{MockTickStore, RawRecord};
    use crate::domain::market::{EventHeader, MICROS_PER_HOUR, Trade, TradeKind};
    use crate::domain::studies::{StudyConfig, StudyOutput, VwapConfig};
    use crate::infrastructure::storage::InMemoryTickStore;
    use crate::infrastructure::wire::WireCodec;

    const CID: i64 = 265_598;
    const HOUR0: i64 = 475_142 * MICROS_PER_HOUR;

    fn trade(ts_us: i64, price: f64) -> Event {
        Event::Trade(Trade {
            header: EventHeader {
                timestamp: Timestamp::from_micros(ts_us),
                received_at: Timestamp::from_micros(ts_us),
                instrument_id: CID,
                request_id: 1,
            },
            kind: TradeKind::Last,
            price,
            size: 10.0,
            exchange: None,
            conditions: vec![],
            past_limit: false,
            unreported: false,
        })
    }

    fn range(start: i64, end: i64) -> ReplayRange {
        ReplayRange::new(CID, Timestamp::from_micros(start), Timestamp::from_micros(end)).unwrap()
    }

    #[derive(Default)]
    struct Collect(Vec<StudyOutput>, usize);

    impl ResultSink for Collect {
        fn publish(&mut self, output: &StudyOutput) {
            self.0.push(output.clone());
        }

        fn publish_summary(&mut self, _summary: &crate::domain::studies::StudySummary) {
            self.1 += 1;
        }
    }

    #[test]
    fn rejects_empty_range() {
        let t = Timestamp::from_micros(5);
        assert!(matches!(
            ReplayRange::new(CID, t, t),
            Err(ReplayError::InvalidRange { .. })
        ));
    }

    #[test]
    fn orders_by_timestamp_then_storage_order() {
        let store = InMemoryTickStore::new();
        // Stored out of order inside the bucket, with a timestamp tie.
        let events = [
            trade(HOUR0 + 30, 3.0),
            trade(HOUR0 + 10, 1.0),
            trade(HOUR0 + 30, 4.0),
            trade(HOUR0 + 20, 2.0),
        ];
        store.insert_events(events.iter()).unwrap();

        let merger = ReplayMerger::new(
            Arc::new(store),
            WireCodec::new(),
            range(HOUR0, HOUR0 + MICROS_PER_HOUR),
        );
        let prices: Vec<f64> = merger
            .map(|e| match e {
                Event::Trade(t) => t.price,
                Event::Quote(_) => f64::NAN,
            })
            .collect();

        assert_eq!(prices, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn range_is_half_open_across_buckets() {
        let store = InMemoryTickStore::new();
        let events = [
            trade(HOUR0 - 1, 0.0),
            trade(HOUR0, 1.0),
            trade(HOUR0 + MICROS_PER_HOUR + 5, 2.0),
            trade(HOUR0 + 2 * MICROS_PER_HOUR, 3.0),
        ];
        store.insert_events(events.iter()).unwrap();

        let mut merger = ReplayMerger::new(
            Arc::new(store),
            WireCodec::new(),
            range(HOUR0 - 1, HOUR0 + 2 * MICROS_PER_HOUR),
        );
        let replayed: Vec<Event> = merger.by_ref().collect();

        assert_eq!(replayed, events[..3].to_vec());
        let progress = merger.progress();
        assert_eq!(progress.buckets_total, 3);
        assert_eq!(progress.buckets_loaded, 3);
        assert_eq!(progress.events_emitted, 3);
        assert!((progress.progress_pct - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn malformed_records_are_skipped_and_counted() {
        let mut store = MockTickStore::new();
        let good = WireCodec::new().encode_json(&trade(HOUR0 + 1, 100.0)).unwrap();
        store
            .expect_load_bucket()
            .with(eq(CID), eq(HourBucket::containing(Timestamp::from_micros(HOUR0))))
            .times(1)
            .returning(move |_, _| {
                Ok(vec![
                    RawRecord::Json("{broken".to_string()),
                    RawRecord::Json(good.clone()),
                    RawRecord::Json(r#"{"ts":1,"st":1,"cid":1,"tt":"??","rid":1}"#.to_string()),
                ])
            });
        store.expect_name().return_const("mock");

        let mut merger = ReplayMerger::new(
            Arc::new(store),
            WireCodec::new(),
            range(HOUR0, HOUR0 + MICROS_PER_HOUR),
        );
        let mut engine = StudyEngine::new(StudyConfig::vwap(VwapConfig::default())).unwrap();
        let mut sink = Collect::default();

        let outcome = merger
            .run(&mut engine, &mut sink, &CancellationToken::new())
            .unwrap();

        assert_eq!(outcome, ReplayOutcome::Completed);
        assert_eq!(sink.0.len(), 1);
        assert_eq!(sink.1, 1);
        assert_eq!(merger.progress().malformed, 2);
        assert_eq!(engine.counters().malformed_messages, 2);
    }

    #[test]
    fn store_failure_stops_iteration_with_error() {
        let mut store = MockTickStore::new();
        store.expect_load_bucket().returning(|_, _| {
            Err(StoreError::Io {
                path: "x".to_string(),
                source: std::io::Error::other("disk gone"),
            })
        });
        store.expect_name().return_const("mock");

        let mut merger = ReplayMerger::new(
            Arc::new(store),
            WireCodec::new(),
            range(HOUR0, HOUR0 + MICROS_PER_HOUR),
        );

        assert!(merger.next().is_none());
        assert!(matches!(merger.take_error(), Some(ReplayError::Store(_))));
    }

    #[test]
    fn cancelled_run_applies_nothing() {
        let store = InMemoryTickStore::new();
        store.insert_events([trade(HOUR0 + 1, 100.0)].iter()).unwrap();
        let mut merger = ReplayMerger::new(
            Arc::new(store),
            WireCodec::new(),
            range(HOUR0, HOUR0 + MICROS_PER_HOUR),
        );
        let mut engine = StudyEngine::new(StudyConfig::vwap(VwapConfig::default())).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = merger
            .run(&mut engine, &mut Collect::default(), &cancel)
            .unwrap();

        assert_eq!(outcome, ReplayOutcome::Cancelled);
        assert_eq!(engine.counters().events_processed, 0);
    }

    #[test]
    fn reset_replays_from_the_start() {
        let store = InMemoryTickStore::new();
        store
            .insert_events([trade(HOUR0 + 1, 1.0), trade(HOUR0 + 2, 2.0)].iter())
            .unwrap();
        let mut merger = ReplayMerger::new(
            Arc::new(store),
            WireCodec::new(),
            range(HOUR0, HOUR0 + MICROS_PER_HOUR),
        );

        assert_eq!(merger.by_ref().count(), 2);
        merger.reset();
        assert_eq!(merger.progress().events_emitted, 0);
        assert_eq!(merger.count(), 2);
    }
}
