//! Live processing of a push source through the study engine.
//!
//! A producer task drains the [`EventSource`] into a bounded
//! [`IngestQueue`]; the caller's task pops, decodes raw records and applies
//! them to the [`StudyEngine`] one at a time. End of stream and disconnects
//! travel beside the queue, so backpressure never discards them.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::ports::{
    EventSource, RawRecord, RecordDecoder, ResultSink, SourceMessage,
};
use crate::application::services::ingest::{
    BackpressurePolicy, DEFAULT_CAPACITY, IngestQueue, PushOutcome,
};
use crate::domain::market::Event;
use crate::domain::studies::{Disposition, StudyEngine};
use crate::infrastructure::metrics::{self, Origin};

/// Queue settings for a live run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Maximum queued ticks.
    pub capacity: usize,
    /// Behavior when the queue is full.
    pub backpressure: BackpressurePolicy,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            backpressure: BackpressurePolicy::Block,
        }
    }
}

/// How a live run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveOutcome {
    /// Source reported end of stream.
    EndOfStream,
    /// Source transport dropped.
    Disconnected(String),
    /// The cancellation token fired.
    Cancelled,
}

/// Queued tick.
#[derive(Debug)]
enum Tick {
    Decoded(Event),
    Raw(RawRecord),
}

/// Drives one engine from one live source.
pub struct LiveRunner<S, D> {
    source: S,
    decoder: D,
    config: IngestConfig,
}

impl<S: EventSource, D> std::fmt::Debug for LiveRunner<S, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveRunner")
            .field("source", &self.source.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<S, D> LiveRunner<S, D>
where
    S: EventSource + 'static,
    D: RecordDecoder,
{
    /// Create a runner.
    pub const fn new(source: S, decoder: D, config: IngestConfig) -> Self {
        Self {
            source,
            decoder,
            config,
        }
    }

    /// Process the source until it ends, disconnects or `cancel` fires.
    /// Cancellation is observed between events; queued ticks that were not
    /// yet applied are discarded.
    pub async fn run<K: ResultSink + ?Sized>(
        self,
        engine: &mut StudyEngine,
        sink: &mut K,
        cancel: &CancellationToken,
    ) -> LiveOutcome {
        let Self {
            source,
            decoder,
            config,
        } = self;
        let source_name = source.name();
        let queue = Arc::new(IngestQueue::new(config.capacity, config.backpressure));
        let terminal = Arc::new(Mutex::new(None));

        info!(
            source = source_name,
            capacity = config.capacity,
            backpressure = ?config.backpressure,
            study = engine.kind().as_str(),
            "Starting live processing"
        );

        let producer = tokio::spawn(produce(
            source,
            Arc::clone(&queue),
            Arc::clone(&terminal),
            cancel.child_token(),
        ));

        let study = engine.kind();
        let outcome = loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => break LiveOutcome::Cancelled,
                tick = queue.pop() => tick,
            };

            transfer_dropped(&queue, engine);
            metrics::set_queue_depth(queue.len());

            let Some(tick) = next else {
                break terminal
                    .lock()
                    .take()
                    .unwrap_or(LiveOutcome::EndOfStream);
            };

            let event = match tick {
                Tick::Decoded(event) => event,
                Tick::Raw(record) => match decoder.decode(&record) {
                    Ok(event) => event,
                    Err(e) => {
                        warn!(source = source_name, error = %e, "Skipping malformed record");
                        metrics::record_malformed(Origin::Live);
                        engine.record_malformed(1);
                        continue;
                    }
                },
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

        queue.close();
        producer.abort();
        transfer_dropped(&queue, engine);

        match &outcome {
            LiveOutcome::Disconnected(reason) => {
                warn!(source = source_name, reason = %reason, "Live source disconnected");
            }
            other => info!(source = source_name, outcome = ?other, "Live processing finished"),
        }
        sink.publish_summary(&engine.get_summary());
        outcome
    }
}

fn transfer_dropped(queue: &IngestQueue<Tick>, engine: &mut StudyEngine) {
    let dropped = queue.take_dropped();
    if dropped > 0 {
        warn!(dropped, "Ingest queue full, oldest ticks dropped");
        metrics::record_dropped(dropped);
        engine.record_dropped(dropped);
    }
}

async fn produce<S: EventSource>(
    mut source: S,
    queue: Arc<IngestQueue<Tick>>,
    terminal: Arc<Mutex<Option<LiveOutcome>>>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            message = source.next_message() => message,
        };

        let tick = match message {
            SourceMessage::Event(event) => Tick::Decoded(event),
            SourceMessage::Raw(record) => Tick::Raw(record),
            SourceMessage::EndOfStream => {
                *terminal.lock() = Some(LiveOutcome::EndOfStream);
                break;
            }
            SourceMessage::Disconnected { reason } => {
                *terminal.lock() = Some(LiveOutcome::Disconnected(reason));
                break;
            }
        };

        match queue.push(tick).await {
            Ok(PushOutcome::Enqueued | PushOutcome::DroppedOldest) => {}
            Err(_) => break,
        }
    }
    queue.close();
}
