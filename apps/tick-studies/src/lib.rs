#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Tick Studies - Rolling Microstructure Statistics
//!
//! Computes order-flow delta, VWAP with volatility bands, and Bollinger bands
//! over a stream of quote and trade ticks. The same engine is driven either
//! by a live push source or by an ordered replay of stored ticks, and both
//! paths produce identical results for identical event sequences.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Deterministic computation, no I/O
//!   - `market`: Quotes, trades, timestamps
//!   - `window`: Time- and count-bounded sample buffer
//!   - `aggregate`: Welford and windowed mean / variance
//!   - `studies`: Delta, VWAP, Bollinger and the `StudyEngine`
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Tick stores, event sources, decoders, result sinks
//!   - `services`: Replay merger, ingest queue, live runner
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `wire`: Compact and legacy tick records over JSON / `MessagePack`
//!   - `storage`: In-memory and JSON-lines tick stores
//!   - `source`, `sink`: Live source and result sink adapters
//!   - `config`, `telemetry`, `metrics`: Process-level concerns
//!
//! # Data Flow
//!
//! ```text
//! TickStore ──► ReplayMerger ──┐
//!                              ├──► StudyEngine ──► ResultSink
//! EventSource ─► IngestQueue ──┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Tick model, windows, estimators and studies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

/// Construction-time errors.
pub mod error;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::aggregate::{RollingAggregate, WelfordAggregate, WindowedAggregate};
pub use domain::market::{Event, EventHeader, Quote, Sample, Timestamp, Trade, TradeKind};
pub use domain::studies::{
    BollingerConfig, DeltaConfig, NeutralPolicy, ProcessingCounters, Readiness, StudyConfig,
    StudyEngine, StudyKind, StudyOutput, StudySummary, StudyValue, VwapConfig,
};
pub use domain::window::{OrderingPolicy, TimeWindow, WindowError};
pub use error::ConfigurationError;

// Ports and services
pub use application::ports::{
    EventSource, HourBucket, RawRecord, RecordDecoder, ResultSink, SourceMessage, StoreError,
    TickStore,
};
pub use application::services::{
    BackpressurePolicy, IngestConfig, IngestQueue, LiveOutcome, LiveRunner, ReplayError,
    ReplayMerger, ReplayOutcome, ReplayProgress, ReplayRange,
};

// Adapters
pub use infrastructure::config::{AppConfig, ConfigError, RunMode};
pub use infrastructure::sink::{TracingSink, VecSink};
pub use infrastructure::source::{LineSource, StreamSource};
pub use infrastructure::storage::{InMemoryTickStore, JsonLinesTickStore};
pub use infrastructure::wire::{CodecError, RequestIdDeriver, RequestIdWidth, WireCodec};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
