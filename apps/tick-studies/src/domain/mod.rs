//! Domain Layer - Tick model, windows, estimators and studies.
//!
//! This layer has no I/O. Everything here is synchronous and deterministic:
//! the same event sequence always produces the same results, which is what
//! lets replay and live runs agree.

/// Tick event model (quotes, trades, timestamps).
pub mod market;

/// Time- and count-bounded sample buffer.
pub mod window;

/// Incremental mean / variance estimators.
pub mod aggregate;

/// Delta, VWAP and Bollinger studies plus the study engine.
pub mod studies;
