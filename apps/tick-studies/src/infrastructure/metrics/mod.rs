//! Prometheus Metrics Module
//!
//! Exposes pipeline metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Events**: ticks applied by the study engine, by study and event type
//! - **Discards**: ticks not applied (out of order, missing quote, foreign)
//! - **Ingest**: malformed records, backpressure drops, queue depth
//! - **Replay**: bucket load latency
//!
//! # Integration
//!
//! The binary installs the recorder with its own HTTP listener when a
//! metrics port is configured. Without a recorder every call is a no-op.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::domain::market::Event;
use crate::domain::studies::{Disposition, StudyKind};

// =============================================================================
// Recorder Installation
// =============================================================================

static INSTALLED: OnceLock<SocketAddr> = OnceLock::new();

/// Install the Prometheus recorder and serve `/metrics` on `port`.
///
/// Must be called from inside a Tokio runtime. Calling it again is a no-op
/// that returns the address bound first.
///
/// # Errors
///
/// Returns an error if the recorder or listener cannot be installed.
pub fn init_metrics(port: u16) -> Result<SocketAddr, BuildError> {
    if let Some(addr) = INSTALLED.get() {
        return Ok(*addr);
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    register_metrics();

    Ok(*INSTALLED.get_or_init(|| addr))
}

/// Address the exporter listens on, if installed.
#[must_use]
pub fn metrics_address() -> Option<SocketAddr> {
    INSTALLED.get().copied()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "tick_studies_events_processed_total",
        "Ticks applied by the study engine"
    );
    describe_counter!(
        "tick_studies_events_discarded_total",
        "Ticks not applied, by reason"
    );
    describe_counter!(
        "tick_studies_results_emitted_total",
        "Study results produced"
    );
    describe_counter!(
        "tick_studies_malformed_messages_total",
        "Wire records that failed to decode"
    );
    describe_counter!(
        "tick_studies_events_dropped_total",
        "Ticks dropped by ingest backpressure"
    );
    describe_gauge!(
        "tick_studies_ingest_queue_depth",
        "Ticks buffered between the live source and the engine"
    );
    describe_histogram!(
        "tick_studies_bucket_load_seconds",
        "Time to load one hour bucket from the tick store"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Metric labels for event types.
#[derive(Debug, Clone, Copy)]
pub enum EventType {
    /// Quote update.
    Quote,
    /// Trade print.
    Trade,
}

impl EventType {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Trade => "trade",
        }
    }
}

impl From<&Event> for EventType {
    fn from(event: &Event) -> Self {
        match event {
            Event::Quote(_) => Self::Quote,
            Event::Trade(_) => Self::Trade,
        }
    }
}

/// Metric labels for where ticks come from.
#[derive(Debug, Clone, Copy)]
pub enum Origin {
    /// Historical replay.
    Replay,
    /// Live source.
    Live,
}

impl Origin {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Replay => "replay",
            Self::Live => "live",
        }
    }
}

/// Record what the engine did with one event.
pub fn record_disposition(study: StudyKind, event: &Event, disposition: &Disposition) {
    let event_type = EventType::from(event);
    match disposition {
        Disposition::Emitted(_) => {
            counter!(
                "tick_studies_events_processed_total",
                "study" => study.as_str(),
                "event_type" => event_type.as_str()
            )
            .increment(1);
            counter!(
                "tick_studies_results_emitted_total",
                "study" => study.as_str()
            )
            .increment(1);
        }
        Disposition::Absorbed => {
            counter!(
                "tick_studies_events_processed_total",
                "study" => study.as_str(),
                "event_type" => event_type.as_str()
            )
            .increment(1);
        }
        Disposition::Discarded(reason) => {
            counter!(
                "tick_studies_events_discarded_total",
                "study" => study.as_str(),
                "reason" => reason.as_str()
            )
            .increment(1);
        }
    }
}

/// Record a record that failed to decode.
pub fn record_malformed(origin: Origin) {
    counter!(
        "tick_studies_malformed_messages_total",
        "origin" => origin.as_str()
    )
    .increment(1);
}

/// Record ticks dropped by backpressure.
pub fn record_dropped(count: u64) {
    counter!("tick_studies_events_dropped_total").increment(count);
}

/// Update the ingest queue depth.
#[allow(clippy::cast_precision_loss)]
pub fn set_queue_depth(depth: usize) {
    gauge!("tick_studies_ingest_queue_depth").set(depth as f64);
}

/// Record how long one bucket took to load.
pub fn record_bucket_load(store: &'static str, duration: Duration) {
    histogram!(
        "tick_studies_bucket_load_seconds",
        "store" => store
    )
    .record(duration.as_secs_f64());
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_as_str() {
        assert_eq!(EventType::Quote.as_str(), "quote");
        assert_eq!(EventType::Trade.as_str(), "trade");
    }

    #[test]
    fn origin_as_str() {
        assert_eq!(Origin::Replay.as_str(), "replay");
        assert_eq!(Origin::Live.as_str(), "live");
    }

    #[test]
    fn recording_without_recorder_is_a_noop() {
        record_malformed(Origin::Live);
        record_dropped(3);
        set_queue_depth(7);
        record_bucket_load("memory", Duration::from_millis(2));
        assert!(metrics_address().is_none());
    }
}
