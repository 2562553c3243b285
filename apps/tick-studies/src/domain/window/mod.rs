//! Time-bounded, size-bounded ordered sample buffer.
//!
//! A [`TimeWindow`] keeps its contents ordered oldest-first and enforces two
//! bounds on every push:
//!
//! 1. Age: anything older than `newest - window` is evicted before the new
//!    item is appended. A window of zero seconds is a session window with no
//!    age bound.
//! 2. Count: after appending, the oldest items are evicted until the window
//!    holds at most `max_size` items.
//!
//! Evicted items are handed back to the caller so running aggregates can
//! subtract them.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::market::{MICROS_PER_SECOND, Sample, Timestamp};

/// Default maximum number of items held by a window.
pub const DEFAULT_MAX_SIZE: usize = 10_000;

/// Items that can be stored in a [`TimeWindow`].
pub trait Timestamped {
    /// Time used for ordering and age eviction.
    fn timestamp(&self) -> Timestamp;
}

impl Timestamped for Sample {
    fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

/// How a window (or engine) treats an item older than the newest one seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum OrderingPolicy {
    /// Reject anything strictly older than the newest item.
    #[default]
    Reject,
    /// Admit items up to `tolerance_us` older than the newest item; they are
    /// inserted at their ordered position. Latest-value state such as the
    /// current quote or last trade price still follows the newest item.
    Tolerate {
        /// Maximum lateness in microseconds.
        tolerance_us: i64,
    },
}

impl OrderingPolicy {
    /// Whether an item at `timestamp` may follow one at `newest`.
    #[must_use]
    pub const fn admits(&self, newest: Timestamp, timestamp: Timestamp) -> bool {
        let lateness = newest.micros_since(timestamp);
        match self {
            Self::Reject => lateness <= 0,
            Self::Tolerate { tolerance_us } => lateness <= *tolerance_us,
        }
    }
}

/// Window admission errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WindowError {
    /// Item is older than the ordering policy allows.
    #[error("out-of-order item at {timestamp}, newest is {newest}")]
    OutOfOrder {
        /// Timestamp of the rejected item.
        timestamp: Timestamp,
        /// Newest timestamp currently held.
        newest: Timestamp,
    },

    /// Item was admitted by the ordering policy but is already outside the
    /// age bound.
    #[error("item at {timestamp} is older than window cutoff {cutoff}")]
    Expired {
        /// Timestamp of the rejected item.
        timestamp: Timestamp,
        /// Oldest timestamp the window retains.
        cutoff: Timestamp,
    },
}

/// Ordered buffer bounded by age and count.
#[derive(Debug, Clone)]
pub struct TimeWindow<T = Sample> {
    items: VecDeque<T>,
    window_us: i64,
    max_size: usize,
    ordering: OrderingPolicy,
}

impl<T: Timestamped> TimeWindow<T> {
    /// Create a window keeping `window` of history and at most `max_size`
    /// items. A zero `window` disables age eviction.
    #[must_use]
    pub fn new(window: Duration, max_size: usize) -> Self {
        let window_us = i64::try_from(window.as_micros()).unwrap_or(i64::MAX);
        Self {
            items: VecDeque::with_capacity(max_size.clamp(1, 1024)),
            window_us,
            max_size: max_size.max(1),
            ordering: OrderingPolicy::Reject,
        }
    }

    /// Create a window from whole seconds.
    #[must_use]
    pub fn from_secs(window_seconds: u64, max_size: usize) -> Self {
        Self::new(Duration::from_secs(window_seconds), max_size)
    }

    /// Set the ordering policy.
    #[must_use]
    pub const fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    /// Admit an item, returning everything evicted by the push (oldest first).
    ///
    /// # Errors
    ///
    /// Returns [`WindowError`] if the item violates the ordering policy or is
    /// already older than the age cutoff. The window is unchanged on error.
    pub fn push(&mut self, item: T) -> Result<Vec<T>, WindowError> {
        let timestamp = item.timestamp();
        let newest = match self.newest() {
            Some(newest) if !self.ordering.admits(newest, timestamp) => {
                return Err(WindowError::OutOfOrder { timestamp, newest });
            }
            Some(newest) => newest.max(timestamp),
            None => timestamp,
        };

        let mut evicted = Vec::new();

        if self.is_bounded_by_age() {
            let cutoff = newest.saturating_sub_micros(self.window_us);
            if timestamp < cutoff {
                return Err(WindowError::Expired { timestamp, cutoff });
            }
            while self.items.front().is_some_and(|f| f.timestamp() < cutoff) {
                if let Some(front) = self.items.pop_front() {
                    evicted.push(front);
                }
            }
        }

        if self.newest().is_none_or(|n| timestamp >= n) {
            self.items.push_back(item);
        } else {
            let at = self.items.partition_point(|s| s.timestamp() <= timestamp);
            self.items.insert(at, item);
        }

        while self.items.len() > self.max_size {
            if let Some(front) = self.items.pop_front() {
                evicted.push(front);
            }
        }

        Ok(evicted)
    }

    /// Items oldest first.
    pub fn samples(&self) -> impl DoubleEndedIterator<Item = &T> + ExactSizeIterator {
        self.items.iter()
    }

    /// Most recent item.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    /// Timestamp of the most recent item.
    #[must_use]
    pub fn newest(&self) -> Option<Timestamp> {
        self.items.back().map(Timestamped::timestamp)
    }

    /// Timestamp of the oldest item.
    #[must_use]
    pub fn oldest(&self) -> Option<Timestamp> {
        self.items.front().map(Timestamped::timestamp)
    }

    /// Whether the window holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of items held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Configured history length in whole seconds (0 = session).
    #[must_use]
    pub const fn window_seconds(&self) -> i64 {
        self.window_us / MICROS_PER_SECOND
    }

    /// Configured count bound.
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Whether age eviction applies.
    #[must_use]
    pub const fn is_bounded_by_age(&self) -> bool {
        self.window_us > 0
    }
}

impl TimeWindow<Sample> {
    /// Admit a `(timestamp, price, volume)` sample.
    ///
    /// # Errors
    ///
    /// See [`TimeWindow::push`].
    pub fn add(
        &mut self,
        timestamp: Timestamp,
        price: f64,
        volume: f64,
    ) -> Result<Vec<Sample>, WindowError> {
        self.push(Sample::new(timestamp, price, volume))
    }
}
