//! Internal tick event model.
//!
//! Both wire shapes decode into [`Event`]; nothing downstream of the codec
//! knows which shape a tick arrived in.

use serde::{Deserialize, Serialize};

use super::timestamp::Timestamp;

/// Fields shared by every tick regardless of kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    /// Exchange event time.
    pub timestamp: Timestamp,
    /// Time the tick was received by the collecting system.
    pub received_at: Timestamp,
    /// Instrument (contract) identifier.
    pub instrument_id: i64,
    /// Hash-derived identifier of the subscription that produced the tick.
    pub request_id: i64,
}

/// Top-of-book quote.
///
/// Each side is optional: a one-sided quote carries `None` for the missing
/// side rather than a zero price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Common tick header.
    pub header: EventHeader,
    /// Best bid price.
    pub bid_price: Option<f64>,
    /// Size at the best bid.
    pub bid_size: Option<f64>,
    /// Best ask price.
    pub ask_price: Option<f64>,
    /// Size at the best ask.
    pub ask_size: Option<f64>,
    /// Bid is below the session low.
    pub bid_past_low: bool,
    /// Ask is above the session high.
    pub ask_past_high: bool,
}

impl Quote {
    /// Event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> Timestamp {
        self.header.timestamp
    }

    /// Bid/ask spread when both sides are present.
    #[must_use]
    pub fn spread(&self) -> Option<f64> {
        Some(self.ask_price? - self.bid_price?)
    }

    /// Mid price when both sides are present.
    #[must_use]
    pub fn mid_price(&self) -> Option<f64> {
        Some((self.bid_price? + self.ask_price?) / 2.0)
    }
}

/// Which trade feed a trade was reported on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    /// Regular last-sale feed.
    Last,
    /// Every print, including odd lots and unreportable trades.
    AllLast,
}

/// Executed trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Common tick header.
    pub header: EventHeader,
    /// Feed the trade was reported on.
    pub kind: TradeKind,
    /// Execution price.
    pub price: f64,
    /// Executed size.
    pub size: f64,
    /// Reporting exchange, if tagged.
    pub exchange: Option<String>,
    /// Sale condition codes.
    pub conditions: Vec<String>,
    /// Price is outside the limit band.
    pub past_limit: bool,
    /// Trade is flagged unreported.
    pub unreported: bool,
}

impl Trade {
    /// Event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> Timestamp {
        self.header.timestamp
    }

    /// Reduce to the `(timestamp, price, volume)` form held in windows.
    #[must_use]
    pub const fn sample(&self) -> Sample {
        Sample {
            timestamp: self.header.timestamp,
            price: self.price,
            volume: self.size,
        }
    }
}

/// A decoded tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Quote update.
    Quote(Quote),
    /// Trade print.
    Trade(Trade),
}

impl Event {
    /// Shared header of the tick.
    #[must_use]
    pub const fn header(&self) -> &EventHeader {
        match self {
            Self::Quote(q) => &q.header,
            Self::Trade(t) => &t.header,
        }
    }

    /// Event timestamp.
    #[must_use]
    pub const fn timestamp(&self) -> Timestamp {
        self.header().timestamp
    }

    /// Instrument identifier.
    #[must_use]
    pub const fn instrument_id(&self) -> i64 {
        self.header().instrument_id
    }
}

/// `(timestamp, price, volume)` sample stored in a time window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sample time.
    pub timestamp: Timestamp,
    /// Price.
    pub price: f64,
    /// Volume.
    pub volume: f64,
}

impl Sample {
    /// Create a new sample.
    #[must_use]
    pub const fn new(timestamp: Timestamp, price: f64, volume: f64) -> Self {
        Self {
            timestamp,
            price,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(ts: i64) -> EventHeader {
        EventHeader {
            timestamp: Timestamp::from_micros(ts),
            received_at: Timestamp::from_micros(ts + 5),
            instrument_id: 265_598,
            request_id: 7,
        }
    }

    #[test]
    fn quote_spread_requires_both_sides() {
        let mut quote = Quote {
            header: header(1),
            bid_price: Some(175.25),
            bid_size: Some(300.0),
            ask_price: Some(175.26),
            ask_size: Some(200.0),
            bid_past_low: false,
            ask_past_high: false,
        };
        assert!((quote.spread().unwrap() - 0.01).abs() < 1e-9);
        assert!((quote.mid_price().unwrap() - 175.255).abs() < 1e-9);

        quote.ask_price = None;
        assert!(quote.spread().is_none());
        assert!(quote.mid_price().is_none());
    }

    #[test]
    fn trade_reduces_to_sample() {
        let trade = Trade {
            header: header(42),
            kind: TradeKind::Last,
            price: 100.5,
            size: 300.0,
            exchange: Some("ISLAND".to_string()),
            conditions: vec![],
            past_limit: false,
            unreported: false,
        };
        let sample = trade.sample();
        assert_eq!(sample.timestamp, Timestamp::from_micros(42));
        assert!((sample.price - 100.5).abs() < f64::EPSILON);
        assert!((sample.volume - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn event_header_access() {
        let event = Event::Trade(Trade {
            header: header(9),
            kind: TradeKind::AllLast,
            price: 1.0,
            size: 1.0,
            exchange: None,
            conditions: vec![],
            past_limit: false,
            unreported: true,
        });
        assert_eq!(event.timestamp(), Timestamp::from_micros(9));
        assert_eq!(event.instrument_id(), 265_598);
    }
}
