//! Tick store adapters.
//!
//! - [`InMemoryTickStore`]: buckets held in a map, for tests and embedding.
//! - [`JsonLinesTickStore`]: one JSON wire record per line under
//!   `<root>/<instrument_id>/<YYYYMMDDHH>.jsonl`.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::debug;

use crate::application::ports::{HourBucket, RawRecord, StoreError, TickStore};
use crate::domain::market::Event;
use crate::infrastructure::wire::WireCodec;

// =============================================================================
// In-memory store
// =============================================================================

/// Tick store backed by a map of buckets.
#[derive(Debug, Default)]
pub struct InMemoryTickStore {
    buckets: RwLock<HashMap<(i64, HourBucket), Vec<RawRecord>>>,
}

impl InMemoryTickStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw record to a bucket.
    pub fn insert(&self, instrument_id: i64, bucket: HourBucket, record: RawRecord) {
        self.buckets
            .write()
            .entry((instrument_id, bucket))
            .or_default()
            .push(record);
    }

    /// Encode events compactly (JSON carrier) into their buckets.
    ///
    /// # Errors
    ///
    /// Returns an error if an event cannot be encoded.
    pub fn insert_events<'a>(
        &self,
        events: impl IntoIterator<Item = &'a Event>,
    ) -> Result<(), StoreError> {
        let codec = WireCodec::new();
        for event in events {
            let json = codec
                .encode_json(event)
                .map_err(|e| StoreError::Encode(e.to_string()))?;
            self.insert(
                event.instrument_id(),
                HourBucket::containing(event.timestamp()),
                RawRecord::Json(json),
            );
        }
        Ok(())
    }
}

impl TickStore for InMemoryTickStore {
    fn load_bucket(
        &self,
        instrument_id: i64,
        bucket: HourBucket,
    ) -> Result<Vec<RawRecord>, StoreError> {
        Ok(self
            .buckets
            .read()
            .get(&(instrument_id, bucket))
            .cloned()
            .unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

// =============================================================================
// JSON-lines store
// =============================================================================

/// Directory of hour-bucketed JSON-lines files.
#[derive(Debug, Clone)]
pub struct JsonLinesTickStore {
    root: PathBuf,
    codec: WireCodec,
}

impl JsonLinesTickStore {
    /// Store rooted at `root`. The directory does not need to exist until
    /// the first append.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            codec: WireCodec::new(),
        }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of one bucket file.
    #[must_use]
    pub fn bucket_path(&self, instrument_id: i64, bucket: HourBucket) -> PathBuf {
        self.root
            .join(instrument_id.to_string())
            .join(format!("{}.jsonl", bucket.label()))
    }

    /// Append an event as a compact record to its bucket file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn append(&self, event: &Event) -> Result<(), StoreError> {
        let bucket = HourBucket::containing(event.timestamp());
        let path = self.bucket_path(event.instrument_id(), bucket);
        let line = self
            .codec
            .encode_json(event)
            .map_err(|e| StoreError::Encode(e.to_string()))?;

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|source| io_error(dir, source))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| io_error(&path, source))?;
        writeln!(file, "{line}").map_err(|source| io_error(&path, source))
    }
}

impl TickStore for JsonLinesTickStore {
    fn load_bucket(
        &self,
        instrument_id: i64,
        bucket: HourBucket,
    ) -> Result<Vec<RawRecord>, StoreError> {
        let path = self.bucket_path(instrument_id, bucket);
        let file = match fs::File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "Bucket file absent");
                return Ok(Vec::new());
            }
            Err(source) => return Err(io_error(&path, source)),
        };

        let mut records = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line.map_err(|source| io_error(&path, source))?;
            if !line.trim().is_empty() {
                records.push(RawRecord::Json(line));
            }
        }
        Ok(records)
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        source,
    }
}
