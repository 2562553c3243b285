//! Volume-weighted average price with realized-volatility bands.

use serde::Serialize;

use super::config::VwapConfig;
use super::{Bands, Readiness, Rejection};
use crate::domain::aggregate::{RollingAggregate, WelfordAggregate};
use crate::domain::market::{Sample, Timestamp, Trade};
use crate::domain::window::{OrderingPolicy, TimeWindow};

/// VWAP result after one trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VwapValue {
    /// Trade price.
    pub price: f64,
    /// Current VWAP (0.0 while no volume has traded).
    pub vwap: f64,
    /// Annualized realized volatility of log returns, once one return exists.
    pub realized_volatility: Option<f64>,
    /// `vwap ± k·realized_volatility`, once volatility is known.
    pub bands: Option<Bands>,
    /// Whether bands are available.
    pub readiness: Readiness,
}

/// VWAP state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VwapSummary {
    /// Current VWAP.
    pub vwap: f64,
    /// Volume behind the VWAP.
    pub total_volume: f64,
    /// Trades folded in this session.
    pub trade_count: u64,
    /// Most recent trade price.
    pub last_price: Option<f64>,
    /// Annualized realized volatility.
    pub realized_volatility: Option<f64>,
    /// Volatility bands.
    pub bands: Option<Bands>,
    /// Log returns observed.
    pub return_count: usize,
    /// Samples behind a windowed VWAP (0 in session mode).
    pub samples_in_window: usize,
}

/// VWAP study state.
///
/// Session mode keeps cumulative `Σ(p·v)` and `Σ(v)`. Windowed mode keeps the
/// same sums over a [`TimeWindow`] and subtracts whatever the window evicts.
/// A tolerated late trade adds to the sums but never to the return series,
/// which always follows the newest price.
#[derive(Debug, Clone)]
pub struct VwapStudy {
    band_multiplier: f64,
    annualization_factor: f64,
    window: Option<TimeWindow<Sample>>,
    price_volume: f64,
    volume: f64,
    trade_count: u64,
    last_price: Option<f64>,
    last_trade_at: Option<Timestamp>,
    returns: WelfordAggregate,
}

impl VwapStudy {
    /// Create a VWAP study.
    #[must_use]
    pub fn new(config: &VwapConfig, ordering: OrderingPolicy) -> Self {
        let window = (config.window_secs > 0).then(|| {
            TimeWindow::from_secs(config.window_secs, config.max_samples).with_ordering(ordering)
        });
        Self {
            band_multiplier: config.band_multiplier,
            annualization_factor: config.annualization_factor,
            window,
            price_volume: 0.0,
            volume: 0.0,
            trade_count: 0,
            last_price: None,
            last_trade_at: None,
            returns: WelfordAggregate::new(),
        }
    }

    pub(crate) fn on_trade(&mut self, trade: &Trade) -> Result<VwapValue, Rejection> {
        let evicted = match self.window.as_mut() {
            Some(window) => window.push(trade.sample())?,
            None => Vec::new(),
        };

        self.price_volume += trade.price * trade.size;
        self.volume += trade.size;
        for old in &evicted {
            self.price_volume -= old.price * old.volume;
            self.volume -= old.volume;
        }
        if self.window.as_ref().is_some_and(|w| w.len() == 1) {
            // Only the new trade remains; drop accumulated rounding.
            self.price_volume = trade.price * trade.size;
            self.volume = trade.size;
        }

        let late = self.last_trade_at.is_some_and(|at| trade.timestamp() < at);
        if !late {
            if let Some(previous) = self.last_price
                && previous > 0.0
                && trade.price > 0.0
            {
                self.returns.update((trade.price / previous).ln());
            }
            self.last_price = Some(trade.price);
            self.last_trade_at = Some(trade.timestamp());
        }
        self.trade_count += 1;

        let vwap = self.vwap();
        let realized_volatility = self.realized_volatility();
        let bands = self.bands(vwap, realized_volatility);
        let readiness = if bands.is_some() {
            Readiness::Ready
        } else {
            Readiness::InsufficientData
        };

        Ok(VwapValue {
            price: trade.price,
            vwap,
            realized_volatility,
            bands,
            readiness,
        })
    }

    /// Current VWAP (0.0 with no volume).
    #[must_use]
    pub fn vwap(&self) -> f64 {
        if self.volume > 0.0 {
            self.price_volume / self.volume
        } else {
            0.0
        }
    }

    /// `sqrt(population_variance(log returns) × annualization)`.
    #[must_use]
    pub fn realized_volatility(&self) -> Option<f64> {
        (self.returns.count() > 0).then(|| {
            (self.returns.population_variance() * self.annualization_factor).sqrt()
        })
    }

    fn bands(&self, vwap: f64, volatility: Option<f64>) -> Option<Bands> {
        if self.volume <= 0.0 {
            return None;
        }
        volatility.map(|v| Bands::around(vwap, v, self.band_multiplier))
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn summary(&self) -> VwapSummary {
        let vwap = self.vwap();
        let realized_volatility = self.realized_volatility();
        VwapSummary {
            vwap,
            total_volume: self.volume,
            trade_count: self.trade_count,
            last_price: self.last_price,
            realized_volatility,
            bands: self.bands(vwap, realized_volatility),
            return_count: self.returns.count(),
            samples_in_window: self.window.as_ref().map_or(0, TimeWindow::len),
        }
    }

    /// Forget all trades.
    pub fn reset(&mut self) {
        if let Some(window) = self.window.as_mut() {
            window.clear();
        }
        self.price_volume = 0.0;
        self.volume = 0.0;
        self.trade_count = 0;
        self.last_price = None;
        self.last_trade_at = None;
        self.returns.reset();
    }
}
