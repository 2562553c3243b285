//! Application Layer - Use cases and port definitions.
//!
//! Ports describe what the pipeline needs from the outside (tick stores,
//! live sources, result sinks). Services drive a
//! [`StudyEngine`](crate::domain::studies::StudyEngine) from either a
//! historical replay or a live source through those ports.

/// Port interfaces for stores, sources, decoders and sinks.
pub mod ports;

/// Replay, live ingest and live runner services.
pub mod services;
