//! Application Settings
//!
//! Settings for the `tick-studies` binary, loaded from environment variables.

use std::path::PathBuf;

use crate::application::services::{BackpressurePolicy, IngestConfig, ReplayRange};
use crate::domain::market::Timestamp;
use crate::domain::studies::{NeutralPolicy, StudyConfig, StudyKind, StudyParams};
use crate::domain::window::OrderingPolicy;

const MODE: &str = "TICK_STUDIES_MODE";
const STUDY: &str = "TICK_STUDIES_STUDY";
const WINDOW_SECS: &str = "TICK_STUDIES_WINDOW_SECS";
const MAX_SAMPLES: &str = "TICK_STUDIES_MAX_SAMPLES";
const BAND_K: &str = "TICK_STUDIES_BAND_K";
const MIN_SAMPLES: &str = "TICK_STUDIES_MIN_SAMPLES";
const ANNUALIZATION: &str = "TICK_STUDIES_ANNUALIZATION";
const NEUTRAL_POLICY: &str = "TICK_STUDIES_NEUTRAL_POLICY";
const TOLERANCE_US: &str = "TICK_STUDIES_OUT_OF_ORDER_TOLERANCE_US";
const INSTRUMENT_ID: &str = "TICK_STUDIES_INSTRUMENT_ID";
const STORE_DIR: &str = "TICK_STUDIES_STORE_DIR";
const REPLAY_START: &str = "TICK_STUDIES_REPLAY_START";
const REPLAY_END: &str = "TICK_STUDIES_REPLAY_END";
const BUFFER_CAPACITY: &str = "TICK_STUDIES_BUFFER_CAPACITY";
const BACKPRESSURE: &str = "TICK_STUDIES_BACKPRESSURE";
const METRICS_PORT: &str = "TICK_STUDIES_METRICS_PORT";

/// Default tick store directory.
pub const DEFAULT_STORE_DIR: &str = "data/ticks";

/// Default Prometheus port.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// What the binary feeds into the study.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Replay a range of the tick store.
    Replay(ReplayRange),
    /// Process wire records read line by line from stdin.
    Live(IngestConfig),
}

impl RunMode {
    /// Mode name as accepted by `TICK_STUDIES_MODE`.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Replay(_) => "replay",
            Self::Live(_) => "live",
        }
    }
}

/// Complete binary configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Study selection and parameters.
    pub study: StudyConfig,
    /// Instrument the study tracks.
    pub instrument_id: i64,
    /// Root of the JSON-lines tick store.
    pub store_dir: PathBuf,
    /// Replay range or live queue settings.
    pub mode: RunMode,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl AppConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required environment variables are missing or
    /// cannot be interpreted.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// Unparsable numeric values fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if required keys are missing or cannot be
    /// interpreted.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Lookup(lookup);

        let instrument_id: i64 = env.required(INSTRUMENT_ID)?.parse().map_err(|_| {
            ConfigError::invalid(INSTRUMENT_ID, env.get(INSTRUMENT_ID), "expected an integer")
        })?;
        let mode_name = env.get(MODE).map(|m| m.to_ascii_lowercase());
        let mode = match mode_name.as_deref() {
            None | Some("replay") => RunMode::Replay(replay_range(instrument_id, &env)?),
            Some("live") => RunMode::Live(ingest_config(&env)?),
            Some(other) => {
                return Err(ConfigError::invalid(
                    MODE,
                    Some(other.to_string()),
                    "expected replay or live",
                ));
            }
        };

        let kind = match env.get(STUDY) {
            Some(s) => StudyKind::from_str_case_insensitive(&s).ok_or_else(|| {
                ConfigError::invalid(STUDY, Some(s.clone()), "expected delta, vwap or bollinger")
            })?,
            None => StudyKind::Delta,
        };

        let ordering = env
            .parsed::<i64>(TOLERANCE_US)
            .map_or(OrderingPolicy::Reject, |tolerance_us| OrderingPolicy::Tolerate {
                tolerance_us,
            });

        let study = StudyConfig::new(study_params(kind, &env))
            .for_instrument(instrument_id)
            .with_ordering(ordering);

        Ok(Self {
            study,
            instrument_id,
            store_dir: env
                .get(STORE_DIR)
                .map_or_else(|| PathBuf::from(DEFAULT_STORE_DIR), PathBuf::from),
            mode,
            metrics_port: env.parsed_or(METRICS_PORT, DEFAULT_METRICS_PORT),
        })
    }
}

fn replay_range<F: Fn(&str) -> Option<String>>(
    instrument_id: i64,
    env: &Lookup<F>,
) -> Result<ReplayRange, ConfigError> {
    let start = env.timestamp(REPLAY_START)?;
    let end = env.timestamp(REPLAY_END)?;
    ReplayRange::new(instrument_id, start, end)
        .map_err(|e| ConfigError::invalid(REPLAY_END, env.get(REPLAY_END), &e.to_string()))
}

fn ingest_config<F: Fn(&str) -> Option<String>>(
    env: &Lookup<F>,
) -> Result<IngestConfig, ConfigError> {
    let backpressure = match env.get(BACKPRESSURE) {
        Some(s) => BackpressurePolicy::from_str_case_insensitive(&s).ok_or_else(|| {
            ConfigError::invalid(BACKPRESSURE, Some(s.clone()), "expected block or drop_oldest")
        })?,
        None => BackpressurePolicy::default(),
    };
    Ok(IngestConfig {
        capacity: env.parsed_or(BUFFER_CAPACITY, IngestConfig::default().capacity),
        backpressure,
    })
}

fn study_params<F: Fn(&str) -> Option<String>>(kind: StudyKind, env: &Lookup<F>) -> StudyParams {
    let mut params = StudyParams::defaults_for(kind);
    match &mut params {
        StudyParams::Delta(c) => {
            c.window_secs = env.parsed_or(WINDOW_SECS, c.window_secs);
            c.max_points = env.parsed_or(MAX_SAMPLES, c.max_points);
            if let Some(s) = env.get(NEUTRAL_POLICY) {
                c.neutral_policy = NeutralPolicy::from_str_case_insensitive(&s);
            }
        }
        StudyParams::Vwap(c) => {
            c.window_secs = env.parsed_or(WINDOW_SECS, c.window_secs);
            c.max_samples = env.parsed_or(MAX_SAMPLES, c.max_samples);
            c.band_multiplier = env.parsed_or(BAND_K, c.band_multiplier);
            c.annualization_factor = env.parsed_or(ANNUALIZATION, c.annualization_factor);
        }
        StudyParams::Bollinger(c) => {
            c.window_secs = env.parsed_or(WINDOW_SECS, c.window_secs);
            c.max_samples = env.parsed_or(MAX_SAMPLES, c.max_samples);
            c.band_multiplier = env.parsed_or(BAND_K, c.band_multiplier);
            c.min_samples = env.parsed_or(MIN_SAMPLES, c.min_samples);
        }
    }
    params
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Environment variable cannot be interpreted.
    #[error("invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
        /// What was expected.
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: Option<String>, reason: &str) -> Self {
        Self::InvalidValue {
            key: key.to_string(),
            value: value.unwrap_or_default(),
            reason: reason.to_string(),
        }
    }
}

struct Lookup<F>(F);

impl<F: Fn(&str) -> Option<String>> Lookup<F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key).map(|v| v.trim().to_string())
    }

    fn required(&self, key: &str) -> Result<String, ConfigError> {
        let value = self
            .get(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
        if value.is_empty() {
            return Err(ConfigError::EmptyValue(key.to_string()));
        }
        Ok(value)
    }

    fn parsed<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.get(key).and_then(|v| v.parse().ok())
    }

    fn parsed_or<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.parsed(key).unwrap_or(default)
    }

    fn timestamp(&self, key: &str) -> Result<Timestamp, ConfigError> {
        let value = self.required(key)?;
        Timestamp::parse(&value)
            .map_err(|e| ConfigError::invalid(key, Some(value.clone()), &e.to_string()))
    }
}
