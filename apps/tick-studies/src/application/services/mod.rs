//! Application Services
//!
//! Services that drive the study engine from its two inputs.
//!
//! - `ReplayMerger`: ordered historical replay from a tick store
//! - `LiveRunner`: live push source through a bounded ingest queue

pub mod ingest;
pub mod live;
pub mod replay;

pub use ingest::{BackpressurePolicy, IngestQueue, PushOutcome, QueueClosed};
pub use live::{IngestConfig, LiveOutcome, LiveRunner};
pub use replay::{ReplayError, ReplayMerger, ReplayOutcome, ReplayProgress, ReplayRange};
