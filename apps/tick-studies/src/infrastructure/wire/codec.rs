//! Wire Codec Module
//!
//! Decodes both wire shapes from either carrier into [`Event`] and encodes
//! events back out in the compact shape only.
//!
//! - **JSON carrier**: one record per text line.
//! - **`MessagePack` carrier**: one map per record, string keys.
//!
//! Shape detection is structural: a record with both `metadata` and `data`
//! keys is legacy, a record with a `tt` key is compact, anything else is
//! malformed. Every decode failure is a malformed message; callers count it
//! and move on.

use serde_json::{Map, Value};

use super::messages::{
    COMPACT_REQUIRED, CompactMessage, LEGACY_REQUIRED, LegacyMessage, LegacyTimestamp, TAG_ALL_LAST,
    TAG_BID_ASK, TAG_LAST,
};
use crate::application::ports::{RawRecord, RecordDecoder};
use crate::domain::market::{Event, EventHeader, Quote, Timestamp, Trade, TradeKind};

/// Codec errors. All decode variants mean the record is malformed.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// `MessagePack` encoding failed.
    #[error("`MessagePack` encode error: {0}")]
    MsgPackEncode(#[from] rmp_serde::encode::Error),

    /// `MessagePack` bytes could not be read.
    #[error("`MessagePack` decode error: {0}")]
    MsgPackDecode(#[from] rmpv::decode::Error),

    /// `MessagePack` value could not be mapped onto a record.
    #[error("`MessagePack` value error: {0}")]
    MsgPackValue(#[from] rmpv::ext::Error),

    /// A required field is absent.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Tick type tag is not one we know.
    #[error("unknown tick type: {0}")]
    UnknownTickType(String),

    /// Record matches neither wire shape.
    #[error("invalid message shape: {0}")]
    InvalidShape(String),

    /// Timestamp could not be interpreted.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
}

/// Which wire shape a record uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireShape {
    /// Verbose metadata/data envelope.
    Legacy,
    /// Flat short-key record.
    Compact,
}

impl WireShape {
    /// Detect the shape from a record's top-level keys.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidShape`] if the keys match neither shape.
    pub fn sniff(map: &Map<String, Value>) -> Result<Self, CodecError> {
        if map.contains_key("metadata") {
            Ok(Self::Legacy)
        } else if map.contains_key("tt") {
            Ok(Self::Compact)
        } else {
            let keys: Vec<&str> = map.keys().map(String::as_str).take(8).collect();
            Err(CodecError::InvalidShape(format!("unrecognised keys {keys:?}")))
        }
    }
}

/// Two-shape, two-carrier tick codec.
#[derive(Debug, Default, Clone, Copy)]
pub struct WireCodec;

impl WireCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a raw record in either carrier.
    ///
    /// # Errors
    ///
    /// Returns an error if the record is malformed.
    pub fn decode(&self, record: &RawRecord) -> Result<Event, CodecError> {
        match record {
            RawRecord::Json(text) => self.decode_json(text),
            RawRecord::MsgPack(bytes) => self.decode_msgpack(bytes),
        }
    }

    /// Decode one JSON text record.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not a JSON object of either shape.
    pub fn decode_json(&self, text: &str) -> Result<Event, CodecError> {
        let value: Value = serde_json::from_str(text.trim())?;
        self.decode_value(value)
    }

    /// Decode one `MessagePack` record.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a map of either shape.
    pub fn decode_msgpack(&self, data: &[u8]) -> Result<Event, CodecError> {
        let mut cursor = std::io::Cursor::new(data);
        let raw = rmpv::decode::read_value(&mut cursor)?;
        if !raw.is_map() {
            return Err(CodecError::InvalidShape(
                "expected a MessagePack map".to_string(),
            ));
        }
        let value: Value = rmpv::ext::from_value(raw)?;
        self.decode_value(value)
    }

    fn decode_value(&self, value: Value) -> Result<Event, CodecError> {
        let Value::Object(map) = value else {
            return Err(CodecError::InvalidShape("expected an object".to_string()));
        };

        match WireShape::sniff(&map)? {
            WireShape::Compact => {
                require(&map, &COMPACT_REQUIRED)?;
                let msg: CompactMessage = serde_json::from_value(Value::Object(map))?;
                from_compact(msg)
            }
            WireShape::Legacy => {
                match map.get("metadata") {
                    Some(Value::Object(meta)) => require(meta, &LEGACY_REQUIRED)?,
                    _ => {
                        return Err(CodecError::InvalidShape(
                            "legacy metadata is not an object".to_string(),
                        ));
                    }
                }
                let msg: LegacyMessage = serde_json::from_value(Value::Object(map))?;
                from_legacy(msg)
            }
        }
    }

    /// Compact record for an event.
    #[must_use]
    pub fn to_compact(&self, event: &Event) -> CompactMessage {
        let header = event.header();
        let mut msg = CompactMessage {
            timestamp: header.timestamp.as_micros(),
            system_timestamp: header.received_at.as_micros(),
            contract_id: header.instrument_id,
            tick_type: String::new(),
            request_id: header.request_id,
            bid_price: None,
            bid_size: None,
            ask_price: None,
            ask_size: None,
            price: None,
            size: None,
            exchange: None,
            conditions: Vec::new(),
            bid_past_low: false,
            ask_past_high: false,
            past_limit: false,
            unreported: false,
        };

        match event {
            Event::Quote(q) => {
                msg.tick_type = TAG_BID_ASK.to_string();
                msg.bid_price = q.bid_price;
                msg.bid_size = q.bid_size;
                msg.ask_price = q.ask_price;
                msg.ask_size = q.ask_size;
                msg.bid_past_low = q.bid_past_low;
                msg.ask_past_high = q.ask_past_high;
            }
            Event::Trade(t) => {
                msg.tick_type = match t.kind {
                    TradeKind::Last => TAG_LAST,
                    TradeKind::AllLast => TAG_ALL_LAST,
                }
                .to_string();
                msg.price = Some(t.price);
                msg.size = Some(t.size);
                msg.exchange.clone_from(&t.exchange);
                msg.conditions.clone_from(&t.conditions);
                msg.past_limit = t.past_limit;
                msg.unreported = t.unreported;
            }
        }

        msg
    }

    /// Encode an event as a compact JSON record.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode_json(&self, event: &Event) -> Result<String, CodecError> {
        Ok(serde_json::to_string(&self.to_compact(event))?)
    }

    /// Encode an event as a compact `MessagePack` map.
    ///
    /// # Errors
    ///
    /// Returns an error if `MessagePack` serialization fails.
    pub fn encode_msgpack(&self, event: &Event) -> Result<Vec<u8>, CodecError> {
        Ok(rmp_serde::to_vec_named(&self.to_compact(event))?)
    }
}

impl RecordDecoder for WireCodec {
    type Error = CodecError;

    fn decode(&self, record: &RawRecord) -> Result<Event, CodecError> {
        Self::decode(self, record)
    }
}

fn require(map: &Map<String, Value>, keys: &[&'static str]) -> Result<(), CodecError> {
    match keys.iter().find(|k| !map.contains_key(**k)) {
        Some(missing) => Err(CodecError::MissingField(missing)),
        None => Ok(()),
    }
}

fn from_compact(msg: CompactMessage) -> Result<Event, CodecError> {
    let header = EventHeader {
        timestamp: Timestamp::from_micros(msg.timestamp),
        received_at: Timestamp::from_micros(msg.system_timestamp),
        instrument_id: msg.contract_id,
        request_id: msg.request_id,
    };

    let kind = match msg.tick_type.as_str() {
        TAG_BID_ASK => {
            return Ok(Event::Quote(Quote {
                header,
                bid_price: msg.bid_price,
                bid_size: msg.bid_size,
                ask_price: msg.ask_price,
                ask_size: msg.ask_size,
                bid_past_low: msg.bid_past_low,
                ask_past_high: msg.ask_past_high,
            }));
        }
        TAG_LAST => TradeKind::Last,
        TAG_ALL_LAST => TradeKind::AllLast,
        other => return Err(CodecError::UnknownTickType(other.to_string())),
    };

    Ok(Event::Trade(Trade {
        header,
        kind,
        price: msg.price.ok_or(CodecError::MissingField("p"))?,
        size: msg.size.ok_or(CodecError::MissingField("s"))?,
        exchange: msg.exchange,
        conditions: msg.conditions,
        past_limit: msg.past_limit,
        unreported: msg.unreported,
    }))
}

fn from_legacy(msg: LegacyMessage) -> Result<Event, CodecError> {
    let meta = msg.metadata;
    let data = msg.data;
    let header = EventHeader {
        timestamp: legacy_timestamp(&meta.timestamp)?,
        received_at: legacy_timestamp(&meta.system_timestamp)?,
        instrument_id: meta.contract_id,
        request_id: meta.request_id,
    };

    let kind = match meta.tick_type.to_ascii_lowercase().as_str() {
        "bid_ask" | "bidask" => {
            return Ok(Event::Quote(Quote {
                header,
                bid_price: data.bid_price,
                bid_size: data.bid_size,
                ask_price: data.ask_price,
                ask_size: data.ask_size,
                bid_past_low: data.attributes.bid_past_low,
                ask_past_high: data.attributes.ask_past_high,
            }));
        }
        "last" => TradeKind::Last,
        "all_last" | "alllast" => TradeKind::AllLast,
        _ => return Err(CodecError::UnknownTickType(meta.tick_type)),
    };

    Ok(Event::Trade(Trade {
        header,
        kind,
        price: data.price.ok_or(CodecError::MissingField("price"))?,
        size: data.size.ok_or(CodecError::MissingField("size"))?,
        exchange: data.exchange,
        conditions: data.conditions,
        past_limit: data.attributes.past_limit,
        unreported: data.attributes.unreported,
    }))
}

fn legacy_timestamp(value: &LegacyTimestamp) -> Result<Timestamp, CodecError> {
    match value {
        LegacyTimestamp::Micros(micros) => Ok(Timestamp::from_micros(*micros)),
        LegacyTimestamp::Seconds(secs) if secs.is_finite() => Ok(Timestamp::from_secs_f64(*secs)),
        LegacyTimestamp::Seconds(secs) => Err(CodecError::InvalidTimestamp(secs.to_string())),
        LegacyTimestamp::Text(text) => {
            Timestamp::parse(text).map_err(|e| CodecError::InvalidTimestamp(format!("{text}: {e}")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPACT_TRADE: &str =
        r#"{"ts":1710511200000000,"st":1710511200000250,"cid":265598,"tt":"l","rid":42,"p":175.26,"s":100.0,"x":"ISLAND"}"#;

    const LEGACY_TRADE: &str = r#"{
        "metadata": {
            "timestamp": "2024-03-15T14:00:00Z",
            "system_timestamp": 1710511200000250,
            "contract_id": 265598,
            "tick_type": "last",
            "request_id": 42
        },
        "data": {"price": 175.26, "size": 100.0, "exchange": "ISLAND"}
    }"#;

    #[test]
    fn sniffs_shapes() {
        let compact: Value = serde_json::from_str(COMPACT_TRADE).unwrap();
        let legacy: Value = serde_json::from_str(LEGACY_TRADE).unwrap();
        assert_eq!(
            WireShape::sniff(compact.as_object().unwrap()).unwrap(),
            WireShape::Compact
        );
        assert_eq!(
            WireShape::sniff(legacy.as_object().unwrap()).unwrap(),
            WireShape::Legacy
        );
    }

    #[test]
    fn decodes_compact_trade() {
        let event = WireCodec::new().decode_json(COMPACT_TRADE).unwrap();

        let Event::Trade(trade) = event else {
            panic!("expected trade");
        };
        assert_eq!(trade.kind, TradeKind::Last);
        assert_eq!(trade.header.instrument_id, 265_598);
        assert_eq!(trade.header.request_id, 42);
        assert_eq!(trade.header.timestamp.as_micros(), 1_710_511_200_000_000);
        assert_eq!(trade.header.received_at.as_micros(), 1_710_511_200_000_250);
        assert_eq!(trade.exchange.as_deref(), Some("ISLAND"));
        assert!(!trade.unreported);
    }

    #[test]
    fn legacy_and_compact_decode_to_same_event() {
        let codec = WireCodec::new();
        assert_eq!(
            codec.decode_json(LEGACY_TRADE).unwrap(),
            codec.decode_json(COMPACT_TRADE).unwrap()
        );
    }

    #[test]
    fn absent_quote_side_is_not_zero() {
        let json = r#"{"ts":1,"st":1,"cid":7,"tt":"ba","rid":1,"bp":0.0,"bs":5.0}"#;
        let Event::Quote(quote) = WireCodec::new().decode_json(json).unwrap() else {
            panic!("expected quote");
        };
        assert_eq!(quote.bid_price, Some(0.0));
        assert_eq!(quote.ask_price, None);
        assert_eq!(quote.ask_size, None);
    }

    #[test]
    fn compact_reencodes_identically() {
        let codec = WireCodec::new();
        let json = r#"{"ts":5,"st":6,"cid":7,"tt":"ba","rid":8,"bp":99.5,"bs":3.0,"ap":99.75,"as":4.0,"aph":true}"#;

        let event = codec.decode_json(json).unwrap();
        let reencoded = codec.encode_json(&event).unwrap();

        let original: Value = serde_json::from_str(json).unwrap();
        let round: Value = serde_json::from_str(&reencoded).unwrap();
        assert_eq!(original, round);
    }

    #[test]
    fn msgpack_carrier_decodes_like_json() {
        let codec = WireCodec::new();
        let event = codec.decode_json(COMPACT_TRADE).unwrap();

        let bytes = codec.encode_msgpack(&event).unwrap();

        assert_eq!(codec.decode_msgpack(&bytes).unwrap(), event);
        assert_eq!(codec.decode(&RawRecord::MsgPack(bytes)).unwrap(), event);
    }

    #[test]
    fn msgpack_legacy_envelope_is_sniffed() {
        let legacy: Value = serde_json::from_str(LEGACY_TRADE).unwrap();
        let bytes = rmp_serde::to_vec_named(&legacy).unwrap();

        let codec = WireCodec::new();
        assert_eq!(
            codec.decode_msgpack(&bytes).unwrap(),
            codec.decode_json(COMPACT_TRADE).unwrap()
        );
    }

    #[test]
    fn legacy_quote_without_data_envelope_decodes_empty() {
        let json = r#"{"metadata":{"timestamp":1,"system_timestamp":2,"contract_id":7,
            "tick_type":"bid_ask","request_id":3}}"#;

        let Event::Quote(quote) = WireCodec::new().decode_json(json).unwrap() else {
            panic!("expected quote");
        };
        assert_eq!(quote.header.instrument_id, 7);
        assert_eq!(quote.bid_price, None);
        assert_eq!(quote.ask_price, None);
        assert!(!quote.bid_past_low);
    }

    #[test]
    fn legacy_trade_without_data_envelope_lacks_price() {
        let json = r#"{"metadata":{"timestamp":1,"system_timestamp":2,"contract_id":7,
            "tick_type":"last","request_id":3}}"#;
        assert!(matches!(
            WireCodec::new().decode_json(json),
            Err(CodecError::MissingField("price"))
        ));
    }

    #[test]
    fn legacy_fractional_seconds_timestamp() {
        let json = r#"{"metadata":{"timestamp":1710511200.5,"system_timestamp":1710511200.5,
            "contract_id":1,"tick_type":"all_last","request_id":1},"data":{"price":1.0,"size":2.0,
            "attributes":{"unreported":true}}}"#;
        let Event::Trade(trade) = WireCodec::new().decode_json(json).unwrap() else {
            panic!("expected trade");
        };
        assert_eq!(trade.kind, TradeKind::AllLast);
        assert_eq!(trade.header.timestamp.as_micros(), 1_710_511_200_500_000);
        assert!(trade.unreported);
    }

    #[test]
    fn unknown_tick_type_is_malformed() {
        let json = r#"{"ts":1,"st":1,"cid":7,"tt":"zz","rid":1}"#;
        assert!(matches!(
            WireCodec::new().decode_json(json),
            Err(CodecError::UnknownTickType(t)) if t == "zz"
        ));
    }

    #[test]
    fn missing_required_field_is_malformed() {
        let json = r#"{"ts":1,"cid":7,"tt":"l","rid":1,"p":1.0,"s":1.0}"#;
        assert!(matches!(
            WireCodec::new().decode_json(json),
            Err(CodecError::MissingField("st"))
        ));

        let legacy = r#"{"metadata":{"timestamp":1,"system_timestamp":1,"tick_type":"last","request_id":1},"data":{}}"#;
        assert!(matches!(
            WireCodec::new().decode_json(legacy),
            Err(CodecError::MissingField("contract_id"))
        ));
    }

    #[test]
    fn trade_without_price_is_malformed() {
        let json = r#"{"ts":1,"st":1,"cid":7,"tt":"l","rid":1,"s":1.0}"#;
        assert!(matches!(
            WireCodec::new().decode_json(json),
            Err(CodecError::MissingField("p"))
        ));
    }

    #[test]
    fn unrecognised_shape_and_garbage() {
        let codec = WireCodec::new();
        assert!(matches!(
            codec.decode_json(r#"{"foo":1}"#),
            Err(CodecError::InvalidShape(_))
        ));
        assert!(matches!(codec.decode_json("[1,2]"), Err(CodecError::InvalidShape(_))));
        assert!(matches!(codec.decode_json("{not json"), Err(CodecError::Json(_))));
        assert!(matches!(codec.decode_msgpack(&[]), Err(CodecError::MsgPackDecode(_))));
        assert!(matches!(codec.decode_msgpack(&[0x01]), Err(CodecError::InvalidShape(_))));
    }

    #[test]
    fn bad_legacy_timestamp_text() {
        let json = r#"{"metadata":{"timestamp":"yesterday","system_timestamp":1,"contract_id":1,
            "tick_type":"last","request_id":1},"data":{"price":1.0,"size":1.0}}"#;
        assert!(matches!(
            WireCodec::new().decode_json(json),
            Err(CodecError::InvalidTimestamp(_))
        ));
    }
}
