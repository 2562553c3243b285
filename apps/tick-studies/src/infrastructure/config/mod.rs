//! Configuration Module
//!
//! Environment-driven configuration for the `tick-studies` binary.

mod settings;

pub use settings::{AppConfig, ConfigError, DEFAULT_METRICS_PORT, DEFAULT_STORE_DIR, RunMode};
