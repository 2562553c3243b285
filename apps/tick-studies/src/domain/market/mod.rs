//! Market event model: timestamps, quotes, trades and window samples.

mod events;
mod timestamp;

pub use events::{Event, EventHeader, Quote, Sample, Trade, TradeKind};
pub use timestamp::{MICROS_PER_HOUR, MICROS_PER_SECOND, Timestamp};
