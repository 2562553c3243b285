//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer, plus the process-level concerns of the
//! binary.

/// Environment-driven configuration.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Result sink adapters.
pub mod sink;

/// Live event source adapters.
pub mod source;

/// Hour-bucketed tick stores.
pub mod storage;

/// Logging and OpenTelemetry tracing integration.
pub mod telemetry;

/// Tick wire format (JSON and `MessagePack`).
pub mod wire;
