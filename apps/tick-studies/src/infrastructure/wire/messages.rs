//! Wire Message Types
//!
//! The two on-wire shapes a tick can arrive in. Both decode into the same
//! [`Event`](crate::domain::market::Event); the shape is forgotten right
//! after decoding.
//!
//! # Compact (flat) shape
//!
//! ```json
//! {"ts":1710511200000000,"st":1710511200000250,"cid":265598,"tt":"l","rid":42,"p":175.26,"s":100.0}
//! ```
//!
//! | key | meaning | encoding |
//! |---|---|---|
//! | `ts` | event timestamp | int64 epoch microseconds |
//! | `st` | receipt timestamp | int64 epoch microseconds |
//! | `cid` | instrument id | int |
//! | `tt` | tick type (`ba`, `l`, `al`) | string |
//! | `rid` | request id | int |
//! | `bp`/`bs`/`ap`/`as` | bid/ask price/size | double, only when present |
//! | `p`/`s` | trade price/size | double, only when present |
//! | `x`, `c` | exchange, condition codes | only when present |
//! | `bpl`, `aph`, `pl`, `u` | derived flags | omitted when false |
//!
//! # Legacy (verbose) shape
//!
//! ```json
//! {"metadata":{"timestamp":"2024-03-15T14:00:00Z","system_timestamp":"...",
//!   "contract_id":265598,"tick_type":"last","request_id":42},
//!  "data":{"price":175.26,"size":100.0}}
//! ```

use serde::{Deserialize, Serialize};

// =============================================================================
// Tick type tags
// =============================================================================

/// Compact tag for a bid/ask quote.
pub const TAG_BID_ASK: &str = "ba";
/// Compact tag for a last-sale trade.
pub const TAG_LAST: &str = "l";
/// Compact tag for an all-last trade.
pub const TAG_ALL_LAST: &str = "al";

/// Keys that must be present in a compact record.
pub const COMPACT_REQUIRED: [&str; 5] = ["ts", "st", "cid", "tt", "rid"];

/// Keys that must be present in a legacy `metadata` object.
pub const LEGACY_REQUIRED: [&str; 5] = [
    "timestamp",
    "system_timestamp",
    "contract_id",
    "tick_type",
    "request_id",
];

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_false(value: &bool) -> bool {
    !*value
}

// =============================================================================
// Compact shape
// =============================================================================

/// Flat record with short keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactMessage {
    /// Event timestamp (epoch microseconds).
    #[serde(rename = "ts")]
    pub timestamp: i64,

    /// Receipt timestamp (epoch microseconds).
    #[serde(rename = "st")]
    pub system_timestamp: i64,

    /// Instrument id.
    #[serde(rename = "cid")]
    pub contract_id: i64,

    /// Tick type tag.
    #[serde(rename = "tt")]
    pub tick_type: String,

    /// Request id.
    #[serde(rename = "rid")]
    pub request_id: i64,

    /// Bid price.
    #[serde(rename = "bp", default, skip_serializing_if = "Option::is_none")]
    pub bid_price: Option<f64>,

    /// Bid size.
    #[serde(rename = "bs", default, skip_serializing_if = "Option::is_none")]
    pub bid_size: Option<f64>,

    /// Ask price.
    #[serde(rename = "ap", default, skip_serializing_if = "Option::is_none")]
    pub ask_price: Option<f64>,

    /// Ask size.
    #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
    pub ask_size: Option<f64>,

    /// Trade price.
    #[serde(rename = "p", default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    /// Trade size.
    #[serde(rename = "s", default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,

    /// Exchange.
    #[serde(rename = "x", default, skip_serializing_if = "Option::is_none")]
    pub exchange: Option<String>,

    /// Condition codes.
    #[serde(rename = "c", default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<String>,

    /// Bid below session low.
    #[serde(rename = "bpl", default, skip_serializing_if = "is_false")]
    pub bid_past_low: bool,

    /// Ask above session high.
    #[serde(rename = "aph", default, skip_serializing_if = "is_false")]
    pub ask_past_high: bool,

    /// Outside limit band.
    #[serde(rename = "pl", default, skip_serializing_if = "is_false")]
    pub past_limit: bool,

    /// Unreported trade.
    #[serde(rename = "u", default, skip_serializing_if = "is_false")]
    pub unreported: bool,
}

// =============================================================================
// Legacy shape
// =============================================================================

/// Legacy timestamp: RFC 3339 text, integer epoch microseconds, or
/// fractional epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LegacyTimestamp {
    /// Epoch microseconds.
    Micros(i64),
    /// Epoch seconds with a fractional part.
    Seconds(f64),
    /// RFC 3339 text.
    Text(String),
}

/// Envelope metadata of a legacy record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyMetadata {
    /// Event timestamp.
    pub timestamp: LegacyTimestamp,
    /// Receipt timestamp.
    pub system_timestamp: LegacyTimestamp,
    /// Instrument id.
    pub contract_id: i64,
    /// Verbose tick type (`bid_ask`, `last`, `all_last`).
    pub tick_type: String,
    /// Request id.
    pub request_id: i64,
}

/// Payload of a legacy record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyData {
    /// Bid price.
    pub bid_price: Option<f64>,
    /// Bid size.
    pub bid_size: Option<f64>,
    /// Ask price.
    pub ask_price: Option<f64>,
    /// Ask size.
    pub ask_size: Option<f64>,
    /// Trade price.
    pub price: Option<f64>,
    /// Trade size.
    pub size: Option<f64>,
    /// Exchange.
    pub exchange: Option<String>,
    /// Condition codes.
    pub conditions: Vec<String>,
    /// Derived flags.
    pub attributes: LegacyAttributes,
}

/// Derived boolean flags of a legacy record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyAttributes {
    /// Bid below session low.
    pub bid_past_low: bool,
    /// Ask above session high.
    pub ask_past_high: bool,
    /// Outside limit band.
    pub past_limit: bool,
    /// Unreported trade.
    pub unreported: bool,
}

/// Verbose record with a metadata/data envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyMessage {
    /// Envelope metadata.
    pub metadata: LegacyMetadata,
    /// Payload.
    #[serde(default)]
    pub data: LegacyData,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compact_omits_absent_and_false_fields() {
        let msg = CompactMessage {
            timestamp: 1,
            system_timestamp: 2,
            contract_id: 3,
            tick_type: TAG_LAST.to_string(),
            request_id: 4,
            bid_price: None,
            bid_size: None,
            ask_price: None,
            ask_size: None,
            price: Some(0.0),
            size: Some(10.0),
            exchange: None,
            conditions: vec![],
            bid_past_low: false,
            ask_past_high: false,
            past_limit: false,
            unreported: true,
        };

        let json = serde_json::to_string(&msg).unwrap();

        assert_eq!(
            json,
            r#"{"ts":1,"st":2,"cid":3,"tt":"l","rid":4,"p":0.0,"s":10.0,"u":true}"#
        );
    }

    #[test]
    fn legacy_timestamp_variants() {
        let micros: LegacyTimestamp = serde_json::from_str("1710511200000000").unwrap();
        assert_eq!(micros, LegacyTimestamp::Micros(1_710_511_200_000_000));

        let secs: LegacyTimestamp = serde_json::from_str("1710511200.5").unwrap();
        assert_eq!(secs, LegacyTimestamp::Seconds(1_710_511_200.5));

        let text: LegacyTimestamp = serde_json::from_str(r#""2024-03-15T14:00:00Z""#).unwrap();
        assert!(matches!(text, LegacyTimestamp::Text(_)));
    }
}
