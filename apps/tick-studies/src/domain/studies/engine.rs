//! Study engine: one study plus stream bookkeeping.

use super::config::{StudyConfig, StudyKind};
use super::{ProcessingCounters, Rejection, Study, StudyOutput, StudySummary};
use crate::domain::market::{Event, Timestamp};
use crate::error::ConfigurationError;

/// Why an event was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// Tick for an instrument other than the configured one.
    ForeignInstrument,
    /// Tick older than the ordering policy allows.
    OutOfOrder,
    /// Trade before any quote.
    MissingQuote,
}

impl DiscardReason {
    /// Label used in logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ForeignInstrument => "foreign_instrument",
            Self::OutOfOrder => "out_of_order",
            Self::MissingQuote => "missing_quote",
        }
    }
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq)]
pub enum Disposition {
    /// Applied and produced a result.
    Emitted(StudyOutput),
    /// Applied without producing a result (e.g. a quote in a trade study).
    Absorbed,
    /// Not applied; state unchanged apart from counters.
    Discarded(DiscardReason),
}

impl Disposition {
    /// The result, if one was produced.
    #[must_use]
    pub fn into_output(self) -> Option<StudyOutput> {
        match self {
            Self::Emitted(output) => Some(output),
            Self::Absorbed | Self::Discarded(_) => None,
        }
    }
}

/// Holds one active study and feeds it ordered events.
///
/// Processing is synchronous: an event is either applied completely or not
/// at all, so replay and live runners that deliver the same event sequence
/// observe identical results.
#[derive(Debug, Clone)]
pub struct StudyEngine {
    config: StudyConfig,
    study: Study,
    last_timestamp: Option<Timestamp>,
    counters: ProcessingCounters,
}

impl StudyEngine {
    /// Build an engine for a validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] if any parameter is invalid.
    pub fn new(config: StudyConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        let study = Study::from_params(&config.params, config.ordering);
        Ok(Self {
            config,
            study,
            last_timestamp: None,
            counters: ProcessingCounters::default(),
        })
    }

    /// Feed one event; returns the result it produced, if any.
    pub fn process(&mut self, event: &Event) -> Option<StudyOutput> {
        self.apply(event).into_output()
    }

    /// Feed one event and report what happened to it.
    pub fn apply(&mut self, event: &Event) -> Disposition {
        if let Some(wanted) = self.config.instrument_id
            && event.instrument_id() != wanted
        {
            self.counters.foreign_instrument += 1;
            return Disposition::Discarded(DiscardReason::ForeignInstrument);
        }

        let timestamp = event.timestamp();
        if let Some(newest) = self.last_timestamp
            && !self.config.ordering.admits(newest, timestamp)
        {
            self.counters.out_of_order += 1;
            return Disposition::Discarded(DiscardReason::OutOfOrder);
        }

        let value = match self.study.apply(event) {
            Ok(value) => value,
            Err(Rejection::MissingQuote) => {
                self.counters.missing_quotes += 1;
                return Disposition::Discarded(DiscardReason::MissingQuote);
            }
            Err(Rejection::Window(_)) => {
                self.counters.out_of_order += 1;
                return Disposition::Discarded(DiscardReason::OutOfOrder);
            }
        };

        self.last_timestamp = Some(self.last_timestamp.map_or(timestamp, |t| t.max(timestamp)));
        self.counters.events_processed += 1;
        match event {
            Event::Quote(_) => self.counters.quotes += 1,
            Event::Trade(_) => self.counters.trades += 1,
        }

        value.map_or(Disposition::Absorbed, |value| {
            Disposition::Emitted(StudyOutput {
                timestamp,
                instrument_id: event.instrument_id(),
                sequence: self.counters.events_processed,
                value,
            })
        })
    }

    /// Count records that failed to decode upstream.
    pub fn record_malformed(&mut self, count: u64) {
        self.counters.malformed_messages += count;
    }

    /// Count ticks dropped by ingest backpressure.
    pub fn record_dropped(&mut self, count: u64) {
        self.counters.dropped += count;
    }

    /// Snapshot of the study and its counters.
    #[must_use]
    pub fn get_summary(&self) -> StudySummary {
        StudySummary {
            study: self.config.kind(),
            instrument_id: self.config.instrument_id,
            last_timestamp: self.last_timestamp,
            counters: self.counters,
            detail: self.study.summary(),
        }
    }

    /// Return to the freshly constructed state.
    pub fn reset(&mut self) {
        self.study.reset();
        self.last_timestamp = None;
        self.counters = ProcessingCounters::default();
    }

    /// Active study.
    #[must_use]
    pub const fn kind(&self) -> StudyKind {
        self.config.kind()
    }

    /// Configuration the engine was built from.
    #[must_use]
    pub const fn config(&self) -> &StudyConfig {
        &self.config
    }

    /// Stream counters so far.
    #[must_use]
    pub const fn counters(&self) -> &ProcessingCounters {
        &self.counters
    }
}
