//! Construction-time error handling.
//!
//! Per-message problems (malformed wire records, trades without a quote,
//! out-of-order ticks) never surface as `Err` from the processing path; they
//! are counted in [`ProcessingCounters`](crate::domain::studies::ProcessingCounters)
//! and the stream continues. Only invalid study parameters are fatal, and
//! they are reported before the first event is processed.

use thiserror::Error;

/// Invalid study parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// A window must be allowed to hold at least one item.
    #[error("{study}: max window size must be at least 1")]
    ZeroMaxSize {
        /// Study being configured.
        study: &'static str,
    },

    /// Band multipliers must be finite and positive.
    #[error("{study}: band multiplier must be finite and > 0, got {value}")]
    InvalidMultiplier {
        /// Study being configured.
        study: &'static str,
        /// Rejected value.
        value: f64,
    },

    /// Minimum sample count must be reachable inside the window.
    #[error("bollinger: min_samples {min_samples} must be in 1..={max_samples}")]
    InvalidMinSamples {
        /// Rejected minimum.
        min_samples: usize,
        /// Window count bound.
        max_samples: usize,
    },

    /// Annualization factor must be finite and positive.
    #[error("vwap: annualization factor must be finite and > 0, got {0}")]
    InvalidAnnualization(f64),

    /// Ordering tolerance cannot be negative.
    #[error("ordering tolerance must be >= 0 microseconds, got {0}")]
    NegativeTolerance(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_parameter() {
        let err = ConfigurationError::InvalidMultiplier {
            study: "bollinger",
            value: -1.0,
        };
        assert_eq!(
            err.to_string(),
            "bollinger: band multiplier must be finite and > 0, got -1"
        );

        let err = ConfigurationError::InvalidMinSamples {
            min_samples: 30,
            max_samples: 20,
        };
        assert!(err.to_string().contains("1..=20"));
    }
}
