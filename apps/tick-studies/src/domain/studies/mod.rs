//! Microstructure studies computed over the tick stream.
//!
//! Each study consumes [`Event`]s in stream order and emits at most one
//! [`StudyValue`] per event. [`StudyEngine`] wraps one study with ordering,
//! instrument filtering and processing counters.

mod bollinger;
mod config;
mod delta;
mod engine;
mod vwap;

use serde::Serialize;

pub use bollinger::{BollingerStudy, BollingerSummary, BollingerValue};
pub use config::{
    BollingerConfig, DeltaConfig, NeutralPolicy, StudyConfig, StudyKind, StudyParams, VwapConfig,
};
pub use delta::{DeltaPoint, DeltaStudy, DeltaSummary, TradeSide};
pub use engine::{DiscardReason, Disposition, StudyEngine};
pub use vwap::{VwapStudy, VwapSummary, VwapValue};

use crate::domain::market::{Event, Timestamp};
use crate::domain::window::{OrderingPolicy, WindowError};

/// Whether a study has enough data to report its full result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Readiness {
    /// All fields are populated.
    Ready,
    /// Some fields are withheld until more data arrives.
    InsufficientData,
}

/// Centre line with symmetric upper and lower bands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bands {
    /// Centre line.
    pub middle: f64,
    /// Centre plus the band offset.
    pub upper: f64,
    /// Centre minus the band offset.
    pub lower: f64,
}

impl Bands {
    /// Bands `middle ± multiplier·width`.
    #[must_use]
    pub fn around(middle: f64, width: f64, multiplier: f64) -> Self {
        let offset = multiplier * width;
        Self {
            middle,
            upper: middle + offset,
            lower: middle - offset,
        }
    }

    /// Position of `price` within the bands (0 at lower, 1 at upper).
    /// NaN when the bands have collapsed.
    #[must_use]
    pub fn percent_b(&self, price: f64) -> f64 {
        let width = self.upper - self.lower;
        if width == 0.0 {
            return f64::NAN;
        }
        (price - self.lower) / width
    }
}

/// Per-event result of one study.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "study", rename_all = "snake_case")]
pub enum StudyValue {
    /// Delta point for a classified trade.
    Delta(DeltaPoint),
    /// VWAP and volatility bands after a trade.
    Vwap(VwapValue),
    /// Moving average and bands after a trade.
    Bollinger(BollingerValue),
}

/// Result emitted for one processed event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudyOutput {
    /// Timestamp of the event that produced the result.
    pub timestamp: Timestamp,
    /// Instrument of the event.
    pub instrument_id: i64,
    /// Position of the event in the processed stream (1-based).
    pub sequence: u64,
    /// Study result.
    pub value: StudyValue,
}

/// Stream-level counters kept by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ProcessingCounters {
    /// Events accepted and applied.
    pub events_processed: u64,
    /// Quotes applied.
    pub quotes: u64,
    /// Trades applied.
    pub trades: u64,
    /// Wire records that failed to decode.
    pub malformed_messages: u64,
    /// Trades discarded because no quote had been seen.
    pub missing_quotes: u64,
    /// Ticks discarded by the ordering policy.
    pub out_of_order: u64,
    /// Ticks for a different instrument than configured.
    pub foreign_instrument: u64,
    /// Ticks dropped by ingest backpressure.
    pub dropped: u64,
}

/// Study-specific part of a summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "study", rename_all = "snake_case")]
pub enum SummaryDetail {
    /// Delta window summary.
    Delta(DeltaSummary),
    /// VWAP summary.
    Vwap(VwapSummary),
    /// Bollinger summary.
    Bollinger(BollingerSummary),
}

/// Snapshot of an engine's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudySummary {
    /// Study that produced the summary.
    pub study: StudyKind,
    /// Instrument filter, if configured.
    pub instrument_id: Option<i64>,
    /// Timestamp of the newest applied event.
    pub last_timestamp: Option<Timestamp>,
    /// Stream counters.
    pub counters: ProcessingCounters,
    /// Study-specific values.
    pub detail: SummaryDetail,
}

/// Why a study declined an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rejection {
    /// Trade arrived before any quote.
    MissingQuote,
    /// A study window refused the sample.
    Window(WindowError),
}

impl From<WindowError> for Rejection {
    fn from(err: WindowError) -> Self {
        Self::Window(err)
    }
}

/// One of the supported studies.
#[derive(Debug, Clone)]
pub(crate) enum Study {
    Delta(DeltaStudy),
    Vwap(VwapStudy),
    Bollinger(BollingerStudy),
}

impl Study {
    pub(crate) fn from_params(params: &StudyParams, ordering: OrderingPolicy) -> Self {
        match params {
            StudyParams::Delta(c) => Self::Delta(DeltaStudy::new(c, ordering)),
            StudyParams::Vwap(c) => Self::Vwap(VwapStudy::new(c, ordering)),
            StudyParams::Bollinger(c) => Self::Bollinger(BollingerStudy::new(c, ordering)),
        }
    }

    pub(crate) fn apply(&mut self, event: &Event) -> Result<Option<StudyValue>, Rejection> {
        match (self, event) {
            (Self::Delta(s), Event::Quote(q)) => {
                s.on_quote(q);
                Ok(None)
            }
            (Self::Delta(s), Event::Trade(t)) => s.on_trade(t).map(|p| Some(StudyValue::Delta(p))),
            (Self::Vwap(s), Event::Trade(t)) => s.on_trade(t).map(|v| Some(StudyValue::Vwap(v))),
            (Self::Bollinger(s), Event::Trade(t)) => {
                s.on_trade(t).map(|v| Some(StudyValue::Bollinger(v)))
            }
            (Self::Vwap(_) | Self::Bollinger(_), Event::Quote(_)) => Ok(None),
        }
    }

    pub(crate) fn summary(&self) -> SummaryDetail {
        match self {
            Self::Delta(s) => SummaryDetail::Delta(s.summary()),
            Self::Vwap(s) => SummaryDetail::Vwap(s.summary()),
            Self::Bollinger(s) => SummaryDetail::Bollinger(s.summary()),
        }
    }

    pub(crate) fn reset(&mut self) {
        match self {
            Self::Delta(s) => s.reset(),
            Self::Vwap(s) => s.reset(),
            Self::Bollinger(s) => s.reset(),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_and_percent_b() {
        let bands = Bands::around(100.0, 2.0, 1.5);
        assert!((bands.upper - 103.0).abs() < 1e-12);
        assert!((bands.lower - 97.0).abs() < 1e-12);
        assert!((bands.percent_b(103.0) - 1.0).abs() < 1e-12);
        assert!((bands.percent_b(97.0)).abs() < 1e-12);
        assert!((bands.percent_b(100.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn collapsed_bands_have_undefined_percent_b() {
        let bands = Bands::around(100.0, 0.0, 2.0);
        assert!(bands.percent_b(100.0).is_nan());
    }
}
