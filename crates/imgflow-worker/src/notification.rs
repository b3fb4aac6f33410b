//! Parsing of S3 event-notification payloads into [`ProcessingNotification`]s.
//!
//! Records are validated one at a time; a record that does not match the expected shape is
//! counted and logged, never passed on.

use imgflow_core::{EventKind, ProcessingNotification};
use percent_encoding::percent_decode_str;
use serde::Deserialize;

/// Body of an object-store notification delivery
#[derive(Debug, Default, Deserialize)]
pub struct S3EventPayload {
    /// Kept as raw JSON so one malformed record cannot reject its siblings
    #[serde(rename = "Records", default)]
    pub records: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct S3EventRecord {
    #[serde(rename = "eventName")]
    event_name: String,
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Debug, Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Debug, Deserialize)]
struct S3Object {
    key: String,
    #[serde(default)]
    sequencer: Option<String>,
}

/// Why a record was rejected
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("empty {0}")]
    Empty(&'static str),

    #[error("object key is not valid percent-encoded UTF-8")]
    InvalidKeyEncoding,

    #[error("unsafe object key: {0}")]
    UnsafeKey(String),
}

/// Valid notifications plus the number of records that were rejected
#[derive(Debug, Default)]
pub struct ParsedBatch {
    pub notifications: Vec<ProcessingNotification>,
    pub rejected: usize,
}

/// Object keys arrive form-encoded: `+` for space, `%XX` for everything else.
pub fn decode_object_key(raw: &str) -> Result<String, RecordError> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|key| key.into_owned())
        .map_err(|_| RecordError::InvalidKeyEncoding)
}

/// Validate a single raw record.
pub fn parse_record(value: serde_json::Value) -> Result<ProcessingNotification, RecordError> {
    let record: S3EventRecord = serde_json::from_value(value)?;

    let bucket = record.s3.bucket.name.trim().to_string();
    if bucket.is_empty() {
        return Err(RecordError::Empty("bucket name"));
    }

    let key = decode_object_key(&record.s3.object.key)?;
    if key.is_empty() {
        return Err(RecordError::Empty("object key"));
    }
    if key.starts_with('/') || key.split('/').any(|segment| segment == "..") {
        return Err(RecordError::UnsafeKey(key));
    }

    let sequence_token = record
        .s3
        .object
        .sequencer
        .filter(|token| !token.trim().is_empty());

    Ok(ProcessingNotification {
        bucket,
        key,
        event_kind: EventKind::from_event_name(&record.event_name),
        sequence_token,
    })
}

/// Validate every record of a delivery.
pub fn parse_payload(payload: S3EventPayload) -> ParsedBatch {
    let mut batch = ParsedBatch::default();

    for (index, value) in payload.records.into_iter().enumerate() {
        match parse_record(value) {
            Ok(notification) => batch.notifications.push(notification),
            Err(e) => {
                tracing::warn!(record_index = index, error = %e, "Rejected notification record");
                batch.rejected += 1;
            }
        }
    }

    batch
}
