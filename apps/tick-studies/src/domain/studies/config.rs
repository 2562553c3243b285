//! Study configuration and validation.

use serde::{Deserialize, Serialize};

use crate::domain::window::{DEFAULT_MAX_SIZE, OrderingPolicy};
use crate::error::ConfigurationError;

/// Which study an engine runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyKind {
    /// Buy/sell pressure delta.
    Delta,
    /// Volume-weighted average price with volatility bands.
    Vwap,
    /// Moving average with standard-deviation bands.
    Bollinger,
}

impl StudyKind {
    /// Parse a study name, case-insensitively.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "delta" => Some(Self::Delta),
            "vwap" => Some(Self::Vwap),
            "bollinger" | "bb" => Some(Self::Bollinger),
            _ => None,
        }
    }

    /// Lowercase name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Delta => "delta",
            Self::Vwap => "vwap",
            Self::Bollinger => "bollinger",
        }
    }
}

/// How trades printed strictly inside the spread contribute to delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeutralPolicy {
    /// Inside-spread trades contribute zero delta.
    #[default]
    Zero,
    /// Inside-spread trades are split between buy and sell volume in
    /// proportion to where they printed inside the spread.
    Split,
}

impl NeutralPolicy {
    /// Parse a policy name, case-insensitively. Unknown names map to `Zero`.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "split" | "proportional" => Self::Split,
            _ => Self::Zero,
        }
    }
}

/// Delta study parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeltaConfig {
    /// Summary window in seconds (0 = whole session).
    pub window_secs: u64,
    /// Maximum delta points held in the summary window.
    pub max_points: usize,
    /// Treatment of inside-spread trades.
    pub neutral_policy: NeutralPolicy,
}

impl Default for DeltaConfig {
    fn default() -> Self {
        Self {
            window_secs: 300,
            max_points: DEFAULT_MAX_SIZE,
            neutral_policy: NeutralPolicy::Zero,
        }
    }
}

/// VWAP study parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VwapConfig {
    /// VWAP window in seconds (0 = cumulative session VWAP).
    pub window_secs: u64,
    /// Maximum samples held when windowed.
    pub max_samples: usize,
    /// Band width in units of realized volatility.
    pub band_multiplier: f64,
    /// Factor applied to the per-trade log-return variance.
    pub annualization_factor: f64,
}

impl Default for VwapConfig {
    fn default() -> Self {
        Self {
            window_secs: 0,
            max_samples: DEFAULT_MAX_SIZE,
            band_multiplier: 3.0,
            annualization_factor: 252.0,
        }
    }
}

/// Bollinger study parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerConfig {
    /// Moving-average window in seconds (0 = count-bounded only).
    pub window_secs: u64,
    /// Maximum samples held in the window.
    pub max_samples: usize,
    /// Band width in standard deviations.
    pub band_multiplier: f64,
    /// Samples required before bands are reported.
    pub min_samples: usize,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            window_secs: 60,
            max_samples: DEFAULT_MAX_SIZE,
            band_multiplier: 1.0,
            min_samples: 20,
        }
    }
}

/// Study variant with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "study", rename_all = "snake_case")]
pub enum StudyParams {
    /// Delta study.
    Delta(DeltaConfig),
    /// VWAP study.
    Vwap(VwapConfig),
    /// Bollinger study.
    Bollinger(BollingerConfig),
}

impl StudyParams {
    /// Which study these parameters configure.
    #[must_use]
    pub const fn kind(&self) -> StudyKind {
        match self {
            Self::Delta(_) => StudyKind::Delta,
            Self::Vwap(_) => StudyKind::Vwap,
            Self::Bollinger(_) => StudyKind::Bollinger,
        }
    }

    /// Default parameters for a study kind.
    #[must_use]
    pub fn defaults_for(kind: StudyKind) -> Self {
        match kind {
            StudyKind::Delta => Self::Delta(DeltaConfig::default()),
            StudyKind::Vwap => Self::Vwap(VwapConfig::default()),
            StudyKind::Bollinger => Self::Bollinger(BollingerConfig::default()),
        }
    }
}

/// Complete configuration of one study engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Only ticks for this instrument are processed when set.
    #[serde(default)]
    pub instrument_id: Option<i64>,
    /// Treatment of ticks older than the newest one processed.
    #[serde(default)]
    pub ordering: OrderingPolicy,
    /// Study variant and parameters.
    #[serde(flatten)]
    pub params: StudyParams,
}

impl StudyConfig {
    /// Configuration for a study with the given parameters.
    #[must_use]
    pub const fn new(params: StudyParams) -> Self {
        Self {
            instrument_id: None,
            ordering: OrderingPolicy::Reject,
            params,
        }
    }

    /// Delta study configuration.
    #[must_use]
    pub const fn delta(config: DeltaConfig) -> Self {
        Self::new(StudyParams::Delta(config))
    }

    /// VWAP study configuration.
    #[must_use]
    pub const fn vwap(config: VwapConfig) -> Self {
        Self::new(StudyParams::Vwap(config))
    }

    /// Bollinger study configuration.
    #[must_use]
    pub const fn bollinger(config: BollingerConfig) -> Self {
        Self::new(StudyParams::Bollinger(config))
    }

    /// Restrict processing to one instrument.
    #[must_use]
    pub const fn for_instrument(mut self, instrument_id: i64) -> Self {
        self.instrument_id = Some(instrument_id);
        self
    }

    /// Set the ordering policy.
    #[must_use]
    pub const fn with_ordering(mut self, ordering: OrderingPolicy) -> Self {
        self.ordering = ordering;
        self
    }

    /// Which study this configures.
    #[must_use]
    pub const fn kind(&self) -> StudyKind {
        self.params.kind()
    }

    /// Check every parameter.
    ///
    /// # Errors
    ///
    /// Returns the first invalid parameter found.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if let OrderingPolicy::Tolerate { tolerance_us } = self.ordering
            && tolerance_us < 0
        {
            return Err(ConfigurationError::NegativeTolerance(tolerance_us));
        }

        match &self.params {
            StudyParams::Delta(c) => {
                if c.max_points == 0 {
                    return Err(ConfigurationError::ZeroMaxSize { study: "delta" });
                }
            }
            StudyParams::Vwap(c) => {
                if c.max_samples == 0 {
                    return Err(ConfigurationError::ZeroMaxSize { study: "vwap" });
                }
                check_multiplier("vwap", c.band_multiplier)?;
                if !c.annualization_factor.is_finite() || c.annualization_factor <= 0.0 {
                    return Err(ConfigurationError::InvalidAnnualization(
                        c.annualization_factor,
                    ));
                }
            }
            StudyParams::Bollinger(c) => {
                if c.max_samples == 0 {
                    return Err(ConfigurationError::ZeroMaxSize { study: "bollinger" });
                }
                check_multiplier("bollinger", c.band_multiplier)?;
                if c.min_samples == 0 || c.min_samples > c.max_samples {
                    return Err(ConfigurationError::InvalidMinSamples {
                        min_samples: c.min_samples,
                        max_samples: c.max_samples,
                    });
                }
            }
        }

        Ok(())
    }
}

fn check_multiplier(study: &'static str, value: f64) -> Result<(), ConfigurationError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidMultiplier { study, value })
    }
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        for kind in [StudyKind::Delta, StudyKind::Vwap, StudyKind::Bollinger] {
            let config = StudyConfig::new(StudyParams::defaults_for(kind));
            assert!(config.validate().is_ok(), "{kind:?}");
            assert_eq!(config.kind(), kind);
        }
    }

    #[test]
    fn default_band_multipliers() {
        assert!((VwapConfig::default().band_multiplier - 3.0).abs() < f64::EPSILON);
        assert!((BollingerConfig::default().band_multiplier - 1.0).abs() < f64::EPSILON);
    }

    #[test_case(0.0 ; "zero")]
    #[test_case(-2.0 ; "negative")]
    #[test_case(f64::NAN ; "nan")]
    #[test_case(f64::INFINITY ; "infinite")]
    fn rejects_bad_band_multiplier(k: f64) {
        let config = StudyConfig::bollinger(BollingerConfig {
            band_multiplier: k,
            ..Default::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidMultiplier { .. })
        ));
    }

    #[test]
    fn rejects_unreachable_min_samples() {
        let config = StudyConfig::bollinger(BollingerConfig {
            max_samples: 10,
            min_samples: 11,
            ..Default::default()
        });
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::InvalidMinSamples {
                min_samples: 11,
                max_samples: 10
            })
        );
    }

    #[test]
    fn rejects_zero_window_size() {
        let config = StudyConfig::delta(DeltaConfig {
            max_points: 0,
            ..Default::default()
        });
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::ZeroMaxSize { study: "delta" })
        );
    }

    #[test]
    fn rejects_bad_annualization() {
        let config = StudyConfig::vwap(VwapConfig {
            annualization_factor: 0.0,
            ..Default::default()
        });
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidAnnualization(_))
        ));
    }

    #[test]
    fn rejects_negative_tolerance() {
        let config = StudyConfig::delta(DeltaConfig::default())
            .with_ordering(OrderingPolicy::Tolerate { tolerance_us: -1 });
        assert_eq!(
            config.validate(),
            Err(ConfigurationError::NegativeTolerance(-1))
        );
    }

    #[test]
    fn deserializes_tagged_config() {
        let json = r#"{"study":"bollinger","window_secs":30,"min_samples":5,"instrument_id":42}"#;
        let config: StudyConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.instrument_id, Some(42));
        assert_eq!(config.ordering, OrderingPolicy::Reject);
        match config.params {
            StudyParams::Bollinger(c) => {
                assert_eq!(c.window_secs, 30);
                assert_eq!(c.min_samples, 5);
                assert!((c.band_multiplier - 1.0).abs() < f64::EPSILON);
            }
            other => panic!("expected bollinger, got {other:?}"),
        }
    }

    #[test]
    fn study_kind_parsing() {
        assert_eq!(
            StudyKind::from_str_case_insensitive("VWAP"),
            Some(StudyKind::Vwap)
        );
        assert_eq!(
            StudyKind::from_str_case_insensitive("bb"),
            Some(StudyKind::Bollinger)
        );
        assert_eq!(StudyKind::from_str_case_insensitive("macd"), None);
        assert_eq!(
            NeutralPolicy::from_str_case_insensitive("SPLIT"),
            NeutralPolicy::Split
        );
    }
}
