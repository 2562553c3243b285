//! Bollinger bands over a sliding time window.

use serde::Serialize;

use super::config::BollingerConfig;
use super::{Bands, Readiness, Rejection};
use crate::domain::aggregate::{RollingAggregate, WindowedAggregate};
use crate::domain::market::{Sample, Trade};
use crate::domain::window::{OrderingPolicy, TimeWindow};

/// Bollinger result after one trade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerValue {
    /// Trade price.
    pub price: f64,
    /// Samples in the window.
    pub sample_count: usize,
    /// `sma ± k·σ`, once the window holds enough samples.
    pub bands: Option<Bands>,
    /// Population standard deviation of the window.
    pub std_dev: Option<f64>,
    /// Position of the price within the bands (NaN when they collapse).
    pub percent_b: Option<f64>,
    /// Whether bands are available.
    pub readiness: Readiness,
}

/// Bollinger state snapshot.
pub type BollingerSummary = BollingerValue;

/// Bollinger study state.
#[derive(Debug, Clone)]
pub struct BollingerStudy {
    band_multiplier: f64,
    min_samples: usize,
    window: TimeWindow<Sample>,
    aggregate: WindowedAggregate,
    last_price: Option<f64>,
}

impl BollingerStudy {
    /// Create a Bollinger study.
    #[must_use]
    pub fn new(config: &BollingerConfig, ordering: OrderingPolicy) -> Self {
        Self {
            band_multiplier: config.band_multiplier,
            min_samples: config.min_samples,
            window: TimeWindow::from_secs(config.window_secs, config.max_samples)
                .with_ordering(ordering),
            aggregate: WindowedAggregate::new(),
            last_price: None,
        }
    }

    pub(crate) fn on_trade(&mut self, trade: &Trade) -> Result<BollingerValue, Rejection> {
        let evicted = self.window.push(trade.sample())?;
        self.aggregate.update(trade.price);
        for old in &evicted {
            self.aggregate.remove(old.price);
        }
        self.last_price = Some(trade.price);
        Ok(self.value_at(trade.price))
    }

    fn value_at(&self, price: f64) -> BollingerValue {
        let sample_count = self.aggregate.count();
        if sample_count < self.min_samples {
            return BollingerValue {
                price,
                sample_count,
                bands: None,
                std_dev: None,
                percent_b: None,
                readiness: Readiness::InsufficientData,
            };
        }

        let std_dev = self.aggregate.population_std_dev();
        let bands = Bands::around(self.aggregate.mean(), std_dev, self.band_multiplier);
        BollingerValue {
            price,
            sample_count,
            bands: Some(bands),
            std_dev: Some(std_dev),
            percent_b: Some(bands.percent_b(price)),
            readiness: Readiness::Ready,
        }
    }

    /// Snapshot at the most recent trade price.
    #[must_use]
    pub fn summary(&self) -> BollingerSummary {
        self.value_at(self.last_price.unwrap_or(f64::NAN))
    }

    /// Forget all samples.
    pub fn reset(&mut self) {
        self.window.clear();
        self.aggregate.reset();
        self.last_price = None;
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::trade;
    use super::*;
    use crate::domain::market::MICROS_PER_SECOND;

    fn study(min_samples: usize, k: f64) -> BollingerStudy {
        BollingerStudy::new(
            &BollingerConfig {
                window_secs: 0,
                max_samples: 100,
                band_multiplier: k,
                min_samples,
            },
            OrderingPolicy::Reject,
        )
    }

    #[test]
    fn bands_around_simple_moving_average() {
        let mut s = study(1, 2.0);
        let prices = [100.0, 101.0, 99.0, 102.0, 98.0, 103.0, 97.0, 104.0];
        let mut last = None;
        for (i, p) in prices.iter().enumerate() {
            last = Some(s.on_trade(&trade(i as i64, *p, 1.0)).unwrap());
        }
        let value = last.unwrap();
        let bands = value.bands.unwrap();

        let mean = 100.5;
        let var = prices.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / 8.0;
        assert!((bands.middle - mean).abs() < 1e-9);
        assert!((bands.upper - (mean + 2.0 * var.sqrt())).abs() < 1e-9);
        assert!((bands.lower - (mean - 2.0 * var.sqrt())).abs() < 1e-9);
        assert!(bands.upper > bands.middle && bands.middle > bands.lower);
        assert_eq!(value.readiness, Readiness::Ready);
    }

    #[test]
    fn withholds_bands_below_min_samples() {
        let mut s = study(3, 1.0);
        assert!(s.on_trade(&trade(1, 100.0, 1.0)).unwrap().bands.is_none());
        let value = s.on_trade(&trade(2, 101.0, 1.0)).unwrap();
        assert_eq!(value.readiness, Readiness::InsufficientData);
        assert_eq!(value.sample_count, 2);
        assert!(s.on_trade(&trade(3, 102.0, 1.0)).unwrap().bands.is_some());
    }

    #[test]
    fn flat_prices_give_undefined_percent_b() {
        let mut s = study(2, 1.0);
        s.on_trade(&trade(1, 100.0, 1.0)).unwrap();
        let value = s.on_trade(&trade(2, 100.0, 1.0)).unwrap();

        assert_eq!(value.std_dev, Some(0.0));
        assert!(value.percent_b.unwrap().is_nan());
    }

    #[test]
    fn expired_prices_leave_the_average() {
        let mut s = BollingerStudy::new(
            &BollingerConfig {
                window_secs: 10,
                max_samples: 100,
                band_multiplier: 1.0,
                min_samples: 1,
            },
            OrderingPolicy::Reject,
        );
        s.on_trade(&trade(0, 50.0, 1.0)).unwrap();
        s.on_trade(&trade(5 * MICROS_PER_SECOND, 100.0, 1.0)).unwrap();
        let value = s
            .on_trade(&trade(12 * MICROS_PER_SECOND, 102.0, 1.0))
            .unwrap();

        assert_eq!(value.sample_count, 2);
        assert!((value.bands.unwrap().middle - 101.0).abs() < 1e-9);
    }

    #[test]
    fn count_bound_slides_the_window() {
        let mut s = BollingerStudy::new(
            &BollingerConfig {
                window_secs: 0,
                max_samples: 2,
                band_multiplier: 1.0,
                min_samples: 2,
            },
            OrderingPolicy::Reject,
        );
        for (i, p) in [10.0, 20.0, 30.0].iter().enumerate() {
            s.on_trade(&trade(i as i64, *p, 1.0)).unwrap();
        }
        let summary = s.summary();
        assert_eq!(summary.sample_count, 2);
        assert!((summary.bands.unwrap().middle - 25.0).abs() < 1e-9);
        assert!((summary.std_dev.unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn reset_empties_the_window() {
        let mut s = study(1, 1.0);
        s.on_trade(&trade(1, 100.0, 1.0)).unwrap();
        s.reset();
        let summary = s.summary();
        assert_eq!(summary.sample_count, 0);
        assert!(summary.bands.is_none());
    }
}
