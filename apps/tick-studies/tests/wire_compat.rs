//! Wire Compatibility Integration Tests
//!
//! Stores written in the legacy nested format, the compact format, or a mix
//! of both (and of both carriers) replay to the same results.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use tick_studies::{
    DeltaConfig, Event, HourBucket, InMemoryTickStore, JsonLinesTickStore, RawRecord,
    ReplayMerger, ReplayRange, RequestIdDeriver, RequestIdWidth, StudyConfig, StudyEngine,
    StudyValue, Timestamp, VecSink, WireCodec,
};

const INSTRUMENT: i64 = 265_598;
const SESSION: &str = "2024-03-15";

fn rid(tick_type: &str) -> i64 {
    RequestIdDeriver::new(RequestIdWidth::Bits31).derive(INSTRUMENT, tick_type, SESSION)
}

fn legacy_quote(ts: &str, bid: f64, ask: f64) -> String {
    let rid = rid("ba");
    format!(
        r#"{{"metadata":{{"timestamp":"{ts}","system_timestamp":"{ts}","contract_id":{INSTRUMENT},"tick_type":"bid_ask","request_id":{rid}}},"data":{{"bid_price":{bid},"bid_size":100.0,"ask_price":{ask},"ask_size":100.0}}}}"#
    )
}

fn legacy_trade(ts: &str, price: f64, size: f64) -> String {
    let rid = rid("l");
    format!(
        r#"{{"metadata":{{"timestamp":"{ts}","system_timestamp":"{ts}","contract_id":{INSTRUMENT},"tick_type":"last","request_id":{rid}}},"data":{{"price":{price},"size":{size}}}}}"#
    )
}

fn range() -> ReplayRange {
    ReplayRange::new(
        INSTRUMENT,
        Timestamp::parse("2024-03-15T14:00:00Z").unwrap(),
        Timestamp::parse("2024-03-15T15:00:00Z").unwrap(),
    )
    .unwrap()
}

fn delta_run(store: Arc<dyn tick_studies::TickStore>) -> VecSink {
    let mut merger = ReplayMerger::new(store, WireCodec::new(), range());
    let mut engine = StudyEngine::new(StudyConfig::delta(DeltaConfig::default())).unwrap();
    let mut sink = VecSink::new();
    merger
        .run(&mut engine, &mut sink, &CancellationToken::new())
        .unwrap();
    sink
}

fn legacy_lines() -> Vec<String> {
    vec![
        legacy_quote("2024-03-15T14:00:00Z", 175.25, 175.26),
        legacy_trade("2024-03-15T14:00:01Z", 175.26, 100.0),
        legacy_trade("2024-03-15T14:00:02Z", 175.25, 40.0),
        legacy_trade("2024-03-15T14:00:03Z", 175.255, 10.0),
    ]
}

#[test]
fn legacy_store_replays_like_compact_store() {
    let codec = WireCodec::new();
    let bucket = HourBucket::containing(range().start);

    let legacy_dir = tempfile::tempdir().unwrap();
    let legacy_store = JsonLinesTickStore::new(legacy_dir.path());
    let path = legacy_store.bucket_path(INSTRUMENT, bucket);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, legacy_lines().join("\n")).unwrap();

    // Same ticks re-encoded compactly, alternating carriers.
    let compact_store = InMemoryTickStore::new();
    for (i, line) in legacy_lines().iter().enumerate() {
        let event = codec.decode_json(line).unwrap();
        let expected_rid = match &event {
            Event::Quote(_) => rid("ba"),
            Event::Trade(_) => rid("l"),
        };
        assert_eq!(event.header().request_id, expected_rid);
        let record = if i % 2 == 0 {
            RawRecord::Json(codec.encode_json(&event).unwrap())
        } else {
            RawRecord::MsgPack(codec.encode_msgpack(&event).unwrap())
        };
        compact_store.insert(INSTRUMENT, bucket, record);
    }

    let from_legacy = delta_run(Arc::new(legacy_store));
    let from_compact = delta_run(Arc::new(compact_store));

    assert_eq!(from_legacy.outputs, from_compact.outputs);
    assert_eq!(from_legacy.outputs.len(), 3);

    let deltas: Vec<f64> = from_legacy
        .outputs
        .iter()
        .map(|o| match &o.value {
            StudyValue::Delta(point) => point.delta,
            other => panic!("unexpected value {other:?}"),
        })
        .collect();
    assert_eq!(deltas, vec![100.0, -40.0, 0.0]);
}
