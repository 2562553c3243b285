//! Bounded ingest queue between a live source and the engine.
//!
//! The source side pushes, the engine side pops. When the queue is full the
//! [`BackpressurePolicy`] decides between waiting for room and discarding
//! the oldest queued item. Discards are counted so they can be surfaced in
//! the engine counters instead of disappearing silently.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;

/// Default queue capacity.
pub const DEFAULT_CAPACITY: usize = 10_000;

/// What to do when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// Producer waits for room. Nothing is lost.
    #[default]
    Block,
    /// Oldest queued item is discarded to make room.
    DropOldest,
}

impl BackpressurePolicy {
    /// Parse from a string (case-insensitive).
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "block" => Some(Self::Block),
            "drop_oldest" | "drop-oldest" | "drop" => Some(Self::DropOldest),
            _ => None,
        }
    }
}

/// Push into a closed queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("ingest queue closed")]
pub struct QueueClosed;

/// Result of a successful push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Item queued without loss.
    Enqueued,
    /// Item queued after discarding the oldest one.
    DroppedOldest,
}

#[derive(Debug)]
struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

/// Bounded multi-producer queue with async push and pop.
#[derive(Debug)]
pub struct IngestQueue<T> {
    state: Mutex<QueueState<T>>,
    capacity: usize,
    policy: BackpressurePolicy,
    not_empty: Notify,
    not_full: Notify,
    dropped: AtomicU64,
}

impl<T> IngestQueue<T> {
    /// Create a queue. A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize, policy: BackpressurePolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
                closed: false,
            }),
            capacity,
            policy,
            not_empty: Notify::new(),
            not_full: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Push an item, applying the backpressure policy when full.
    ///
    /// # Errors
    ///
    /// Returns [`QueueClosed`] if the queue was closed.
    pub async fn push(&self, item: T) -> Result<PushOutcome, QueueClosed> {
        let mut item = Some(item);
        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if state.closed {
                    return Err(QueueClosed);
                }
                if state.items.len() < self.capacity {
                    state.items.extend(item.take());
                    drop(state);
                    self.not_empty.notify_one();
                    return Ok(PushOutcome::Enqueued);
                }
                if self.policy == BackpressurePolicy::DropOldest {
                    state.items.pop_front();
                    state.items.extend(item.take());
                    drop(state);
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    self.not_empty.notify_one();
                    return Ok(PushOutcome::DroppedOldest);
                }
            }

            notified.await;
        }
    }

    /// Pop the oldest item, waiting if empty. Returns `None` once the queue
    /// is closed and drained.
    pub async fn pop(&self) -> Option<T> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.state.lock();
                if let Some(item) = state.items.pop_front() {
                    drop(state);
                    self.not_full.notify_one();
                    return Some(item);
                }
                if state.closed {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Stop accepting items. Queued items can still be popped.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_empty.notify_waiters();
        self.not_full.notify_waiters();
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Items currently queued.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    /// Whether nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    /// Maximum queued items.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Configured policy.
    #[must_use]
    pub const fn policy(&self) -> BackpressurePolicy {
        self.policy
    }

    /// Total items discarded since creation.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Items discarded since the previous call.
    pub fn take_dropped(&self) -> u64 {
        self.dropped.swap(0, Ordering::Relaxed)
    }
}
