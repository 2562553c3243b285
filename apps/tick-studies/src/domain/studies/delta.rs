//! Buy/sell pressure delta.
//!
//! Trades are classified against the most recent quote: a print at or
//! through the ask is buyer initiated, a print at or through the bid is
//! seller initiated, anything strictly inside the spread is neutral.
//! Per-trade deltas accumulate into a session-cumulative delta, and a
//! rolling window of delta points backs the buy/sell summary.

use serde::Serialize;

use super::config::{DeltaConfig, NeutralPolicy};
use super::Rejection;
use crate::domain::market::{Quote, Timestamp, Trade};
use crate::domain::window::{OrderingPolicy, TimeWindow, Timestamped};

// ============================================================================
// Types
// ============================================================================

/// Trade aggressor side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeSide {
    /// Buyer initiated (lifted the offer).
    Buy,
    /// Seller initiated (hit the bid).
    Sell,
    /// Printed inside the spread.
    Neutral,
}

/// One classified trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeltaPoint {
    /// Trade time.
    pub timestamp: Timestamp,
    /// Trade price.
    pub price: f64,
    /// Trade size.
    pub size: f64,
    /// Classified side.
    pub side: TradeSide,
    /// Volume attributed to buyers.
    pub buy_volume: f64,
    /// Volume attributed to sellers.
    pub sell_volume: f64,
    /// Signed delta of this trade (`buy_volume - sell_volume`).
    pub delta: f64,
    /// Session-cumulative delta including this trade.
    pub cumulative_delta: f64,
}

impl DeltaPoint {
    /// Volume attributed to neither side.
    #[must_use]
    pub fn unattributed_volume(&self) -> f64 {
        (self.size - self.buy_volume - self.sell_volume).max(0.0)
    }
}

impl Timestamped for DeltaPoint {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// Buy/sell totals over the summary window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DeltaSummary {
    /// Buyer-initiated volume in the window.
    pub buy_volume: f64,
    /// Seller-initiated volume in the window.
    pub sell_volume: f64,
    /// Inside-spread volume attributed to neither side.
    pub neutral_volume: f64,
    /// `buy_volume - sell_volume`.
    pub net_delta: f64,
    /// `buy_volume / sell_volume`, 0.0 when there is no sell volume.
    pub buy_sell_ratio: f64,
    /// Session-cumulative delta.
    pub cumulative_delta: f64,
    /// Delta points held in the window.
    pub points_in_window: usize,
    /// Trades classified this session.
    pub trade_count: u64,
}

// ============================================================================
// Study
// ============================================================================

/// Delta study state.
#[derive(Debug, Clone)]
pub struct DeltaStudy {
    neutral_policy: NeutralPolicy,
    current_quote: Option<Quote>,
    cumulative_delta: f64,
    trade_count: u64,
    points: TimeWindow<DeltaPoint>,
    buy_volume: f64,
    sell_volume: f64,
    neutral_volume: f64,
}

impl DeltaStudy {
    /// Create a delta study.
    #[must_use]
    pub fn new(config: &DeltaConfig, ordering: OrderingPolicy) -> Self {
        Self {
            neutral_policy: config.neutral_policy,
            current_quote: None,
            cumulative_delta: 0.0,
            trade_count: 0,
            points: TimeWindow::from_secs(config.window_secs, config.max_points)
                .with_ordering(ordering),
            buy_volume: 0.0,
            sell_volume: 0.0,
            neutral_volume: 0.0,
        }
    }

    /// Replace the current quote. A quote older than the current one is
    /// ignored, so a tolerated late quote never overrides a newer book.
    pub fn on_quote(&mut self, quote: &Quote) {
        if self
            .current_quote
            .as_ref()
            .is_some_and(|current| quote.timestamp() < current.timestamp())
        {
            return;
        }
        self.current_quote = Some(quote.clone());
    }

    /// Classify a trade and fold it into the cumulative delta.
    pub(crate) fn on_trade(&mut self, trade: &Trade) -> Result<DeltaPoint, Rejection> {
        let quote = self.current_quote.as_ref().ok_or(Rejection::MissingQuote)?;

        let (side, buy_volume, sell_volume) = classify(
            trade.price,
            trade.size,
            quote.bid_price,
            quote.ask_price,
            self.neutral_policy,
        );
        let delta = buy_volume - sell_volume;
        let point = DeltaPoint {
            timestamp: trade.timestamp(),
            price: trade.price,
            size: trade.size,
            side,
            buy_volume,
            sell_volume,
            delta,
            cumulative_delta: self.cumulative_delta + delta,
        };

        // Window admission is the only fallible step; commit after it.
        let evicted = self.points.push(point)?;
        self.cumulative_delta = point.cumulative_delta;
        self.trade_count += 1;
        self.add_volumes(&point);
        for old in &evicted {
            self.remove_volumes(old);
        }

        Ok(point)
    }

    /// Snapshot of the window totals.
    #[must_use]
    pub fn summary(&self) -> DeltaSummary {
        let buy_sell_ratio = if self.sell_volume > 0.0 {
            self.buy_volume / self.sell_volume
        } else {
            0.0
        };
        DeltaSummary {
            buy_volume: self.buy_volume,
            sell_volume: self.sell_volume,
            neutral_volume: self.neutral_volume,
            net_delta: self.buy_volume - self.sell_volume,
            buy_sell_ratio,
            cumulative_delta: self.cumulative_delta,
            points_in_window: self.points.len(),
            trade_count: self.trade_count,
        }
    }

    /// Session-cumulative delta.
    #[must_use]
    pub const fn cumulative_delta(&self) -> f64 {
        self.cumulative_delta
    }

    /// Forget the quote, the cumulative delta and the window.
    pub fn reset(&mut self) {
        self.current_quote = None;
        self.cumulative_delta = 0.0;
        self.trade_count = 0;
        self.points.clear();
        self.buy_volume = 0.0;
        self.sell_volume = 0.0;
        self.neutral_volume = 0.0;
    }

    fn add_volumes(&mut self, point: &DeltaPoint) {
        self.buy_volume += point.buy_volume;
        self.sell_volume += point.sell_volume;
        self.neutral_volume += point.unattributed_volume();
    }

    fn remove_volumes(&mut self, point: &DeltaPoint) {
        self.buy_volume = (self.buy_volume - point.buy_volume).max(0.0);
        self.sell_volume = (self.sell_volume - point.sell_volume).max(0.0);
        self.neutral_volume = (self.neutral_volume - point.unattributed_volume()).max(0.0);
    }
}

/// Attribute `size` to buyers and sellers given the prevailing quote.
fn classify(
    price: f64,
    size: f64,
    bid: Option<f64>,
    ask: Option<f64>,
    policy: NeutralPolicy,
) -> (TradeSide, f64, f64) {
    if ask.is_some_and(|a| price >= a) {
        return (TradeSide::Buy, size, 0.0);
    }
    if bid.is_some_and(|b| price <= b) {
        return (TradeSide::Sell, 0.0, size);
    }

    match (policy, bid, ask) {
        (NeutralPolicy::Split, Some(b), Some(a)) if a > b => {
            let fraction = (price - b) / (a - b);
            let buy = size * fraction;
            (TradeSide::Neutral, buy, size - buy)
        }
        _ => (TradeSide::Neutral, 0.0, 0.0),
    }
}
