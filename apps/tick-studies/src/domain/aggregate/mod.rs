//! Incremental mean / variance estimators.
//!
//! Two flavours share the [`RollingAggregate`] interface:
//!
//! - [`WelfordAggregate`]: append-only, Welford's update of `(n, mean, M2)`.
//!   Numerically stable, but cannot safely forget a value.
//! - [`WindowedAggregate`]: running `sum` and `sum_of_squares` that follow a
//!   [`TimeWindow`](crate::domain::window::TimeWindow). Evicted values are
//!   subtracted and the moments recomputed on demand. `n` is bounded by the
//!   window's `max_size`, which keeps the cancellation error small.

use serde::{Deserialize, Serialize};

/// Common interface of the incremental estimators.
pub trait RollingAggregate {
    /// Fold a value in.
    fn update(&mut self, value: f64);

    /// Number of values currently aggregated.
    fn count(&self) -> usize;

    /// Arithmetic mean (0.0 when empty).
    fn mean(&self) -> f64;

    /// Variance dividing by `n` (0.0 when empty).
    fn population_variance(&self) -> f64;

    /// Variance dividing by `n - 1` (0.0 when `n < 2`).
    fn sample_variance(&self) -> f64;

    /// Forget everything.
    fn reset(&mut self);

    /// Square root of the population variance.
    fn population_std_dev(&self) -> f64 {
        self.population_variance().sqrt()
    }
}

/// Snapshot of an aggregate's running state.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct AggregateState {
    /// Number of values.
    pub count: usize,
    /// Running sum.
    pub sum: f64,
    /// Running sum of squares.
    pub sum_of_squares: f64,
    /// Running mean.
    pub mean: f64,
}

/// Append-only Welford accumulator.
#[derive(Debug, Clone, Default)]
pub struct WelfordAggregate {
    n: usize,
    mean: f64,
    m2: f64,
    sum: f64,
    sum_of_squares: f64,
}

impl WelfordAggregate {
    /// Create an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current running state.
    #[must_use]
    pub const fn state(&self) -> AggregateState {
        AggregateState {
            count: self.n,
            sum: self.sum,
            sum_of_squares: self.sum_of_squares,
            mean: self.mean,
        }
    }
}

impl RollingAggregate for WelfordAggregate {
    fn update(&mut self, value: f64) {
        self.n += 1;
        let delta = value - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
        self.sum += value;
        self.sum_of_squares += value * value;
    }

    fn count(&self) -> usize {
        self.n
    }

    fn mean(&self) -> f64 {
        self.mean
    }

    fn population_variance(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        (self.m2 / self.n as f64).max(0.0)
    }

    fn sample_variance(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        (self.m2 / (self.n - 1) as f64).max(0.0)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Sum / sum-of-squares aggregate that supports removal.
#[derive(Debug, Clone, Default)]
pub struct WindowedAggregate {
    n: usize,
    sum: f64,
    sum_of_squares: f64,
}

impl WindowedAggregate {
    /// Create an empty aggregate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subtract a value that left the window.
    pub fn remove(&mut self, value: f64) {
        if self.n == 0 {
            return;
        }
        self.n -= 1;
        if self.n == 0 {
            // Re-anchor so drift cannot survive an emptied window.
            self.sum = 0.0;
            self.sum_of_squares = 0.0;
        } else {
            self.sum -= value;
            self.sum_of_squares -= value * value;
        }
    }

    /// Current running state.
    #[must_use]
    pub fn state(&self) -> AggregateState {
        AggregateState {
            count: self.n,
            sum: self.sum,
            sum_of_squares: self.sum_of_squares,
            mean: self.mean(),
        }
    }
}

impl RollingAggregate for WindowedAggregate {
    fn update(&mut self, value: f64) {
        self.n += 1;
        self.sum += value;
        self.sum_of_squares += value * value;
    }

    fn count(&self) -> usize {
        self.n
    }

    fn mean(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        self.sum / self.n as f64
    }

    fn population_variance(&self) -> f64 {
        if self.n == 0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_of_squares / self.n as f64 - mean * mean).max(0.0)
    }

    fn sample_variance(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        let n = self.n as f64;
        self.population_variance() * n / (n - 1.0)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn two_pass(values: &[f64]) -> (f64, f64) {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        (mean, var)
    }

    #[test]
    fn welford_empty_is_zero() {
        let agg = WelfordAggregate::new();
        assert_eq!(agg.count(), 0);
        assert_eq!(agg.mean(), 0.0);
        assert_eq!(agg.population_variance(), 0.0);
        assert_eq!(agg.sample_variance(), 0.0);
    }

    #[test]
    fn welford_single_value_sample_variance_is_zero() {
        let mut agg = WelfordAggregate::new();
        agg.update(42.0);
        assert_eq!(agg.mean(), 42.0);
        assert_eq!(agg.population_variance(), 0.0);
        assert_eq!(agg.sample_variance(), 0.0);
    }

    #[test]
    fn welford_known_values() {
        let mut agg = WelfordAggregate::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            agg.update(v);
        }
        assert!((agg.mean() - 5.0).abs() < 1e-12);
        assert!((agg.population_variance() - 4.0).abs() < 1e-12);
        assert!((agg.sample_variance() - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(agg.state().count, 8);
        assert!((agg.state().sum - 40.0).abs() < 1e-12);
    }

    #[test]
    fn welford_is_stable_with_large_offset() {
        let mut agg = WelfordAggregate::new();
        for v in [1e9 + 4.0, 1e9 + 7.0, 1e9 + 13.0, 1e9 + 16.0] {
            agg.update(v);
        }
        assert!((agg.population_variance() - 22.5).abs() < 1e-6);
    }

    #[test]
    fn welford_reset_clears_state() {
        let mut agg = WelfordAggregate::new();
        agg.update(1.0);
        agg.update(3.0);
        agg.reset();
        assert_eq!(agg.count(), 0);
        assert_eq!(agg.state(), AggregateState::default());
    }

    #[test]
    fn windowed_remove_matches_recompute() {
        let mut agg = WindowedAggregate::new();
        for v in [100.0, 101.0, 99.0, 102.0] {
            agg.update(v);
        }
        agg.remove(100.0);

        let (mean, var) = two_pass(&[101.0, 99.0, 102.0]);
        assert_eq!(agg.count(), 3);
        assert!((agg.mean() - mean).abs() < 1e-9);
        assert!((agg.population_variance() - var).abs() < 1e-9);
    }

    #[test]
    fn windowed_emptied_window_resets_sums() {
        let mut agg = WindowedAggregate::new();
        agg.update(0.1);
        agg.update(0.2);
        agg.remove(0.1);
        agg.remove(0.2);
        assert_eq!(agg.state(), AggregateState::default());
        agg.remove(5.0);
        assert_eq!(agg.count(), 0);
    }

    #[test]
    fn windowed_sample_variance_uses_n_minus_one() {
        let mut agg = WindowedAggregate::new();
        for v in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            agg.update(v);
        }
        assert!((agg.sample_variance() - 32.0 / 7.0).abs() < 1e-9);
    }

    proptest! {
        #[test]
        fn welford_matches_two_pass(values in prop::collection::vec(-1e6f64..1e6, 1..300)) {
            let mut agg = WelfordAggregate::new();
            for v in &values {
                agg.update(*v);
            }
            let (mean, var) = two_pass(&values);
            let scale = values.iter().fold(1.0f64, |m, v| m.max(v.abs()));
            prop_assert!((agg.mean() - mean).abs() <= 1e-9 * scale);
            prop_assert!((agg.population_variance() - var).abs() <= 1e-9 * scale * scale);
        }

        #[test]
        fn windowed_tracks_sliding_two_pass(
            values in prop::collection::vec(50.0f64..150.0, 2..200),
            width in 1usize..30,
        ) {
            let mut agg = WindowedAggregate::new();
            for (i, v) in values.iter().enumerate() {
                agg.update(*v);
                if i >= width {
                    agg.remove(values[i - width]);
                }
                let start = i.saturating_sub(width - 1);
                let (mean, var) = two_pass(&values[start..=i]);
                prop_assert!((agg.mean() - mean).abs() < 1e-6);
                prop_assert!((agg.population_variance() - var).abs() < 1e-4);
            }
        }
    }
}
