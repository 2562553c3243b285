//! Result sink adapters.

use tracing::{debug, info, warn};

use crate::application::ports::ResultSink;
use crate::domain::studies::{StudyOutput, StudySummary};

/// Collects everything published, in order.
#[derive(Debug, Default, Clone)]
pub struct VecSink {
    /// Per-event results.
    pub outputs: Vec<StudyOutput>,
    /// Summaries.
    pub summaries: Vec<StudySummary>,
}

impl VecSink {
    /// Empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent summary.
    #[must_use]
    pub fn last_summary(&self) -> Option<&StudySummary> {
        self.summaries.last()
    }
}

impl ResultSink for VecSink {
    fn publish(&mut self, output: &StudyOutput) {
        self.outputs.push(output.clone());
    }

    fn publish_summary(&mut self, summary: &StudySummary) {
        self.summaries.push(summary.clone());
    }
}

/// Logs results as JSON through `tracing`.
///
/// Per-event results go out at debug level, summaries at info.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ResultSink for TracingSink {
    fn publish(&mut self, output: &StudyOutput) {
        match serde_json::to_string(output) {
            Ok(json) => debug!(
                sequence = output.sequence,
                timestamp = %output.timestamp,
                result = %json,
                "Study result"
            ),
            Err(e) => warn!(sequence = output.sequence, error = %e, "Failed to serialize result"),
        }
    }

    fn publish_summary(&mut self, summary: &StudySummary) {
        match serde_json::to_string(summary) {
            Ok(json) => info!(
                study = summary.study.as_str(),
                events = summary.counters.events_processed,
                summary = %json,
                "Study summary"
            ),
            Err(e) => warn!(error = %e, "Failed to serialize summary"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::{Event, EventHeader, Timestamp, Trade, TradeKind};
    use crate::domain::studies::{StudyConfig, StudyEngine, VwapConfig};

    fn trade(ts: i64) -> Event {
        Event::Trade(Trade {
            header: EventHeader {
                timestamp: Timestamp::from_micros(ts),
                received_at: Timestamp::from_micros(ts),
                instrument_id: 1,
                request_id: 1,
            },
            kind: TradeKind::Last,
            price: 50.0,
            size: 2.0,
            exchange: None,
            conditions: vec![],
            past_limit: false,
            unreported: false,
        })
    }

    #[test]
    fn vec_sink_keeps_order() {
        let mut engine = StudyEngine::new(StudyConfig::vwap(VwapConfig::default())).unwrap();
        let mut sink = VecSink::new();
        for ts in [1, 2, 3] {
            if let Some(output) = engine.process(&trade(ts)) {
                sink.publish(&output);
            }
        }
        sink.publish_summary(&engine.get_summary());

        let sequences: Vec<u64> = sink.outputs.iter().map(|o| o.sequence).collect();
        assert_eq!(sequences, vec![1, 2, 3]);
        assert_eq!(sink.last_summary().unwrap().counters.trades, 3);
    }

    #[test]
    fn tracing_sink_logs_without_subscriber() {
        let mut engine = StudyEngine::new(StudyConfig::vwap(VwapConfig::default())).unwrap();
        let output = engine.process(&trade(1)).unwrap();
        let mut sink = TracingSink;

        sink.publish(&output);
        sink.publish_summary(&engine.get_summary());
    }
}
