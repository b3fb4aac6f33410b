use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Kind of storage event carried by a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum EventKind {
    /// `ObjectCreated:*` with the sub-kind (`Put`, `Post`, `Copy`, `CompleteMultipartUpload`)
    ObjectCreated(String),
    /// Any other event name, kept verbatim for logging
    Other(String),
}

impl EventKind {
    /// Classify an event name as emitted by S3 (`ObjectCreated:Put`) or by S3-compatible
    /// stores that prefix it (`s3:ObjectCreated:Put`).
    pub fn from_event_name(name: &str) -> Self {
        let trimmed = name.trim();
        let unprefixed = trimmed.strip_prefix("s3:").unwrap_or(trimmed);
        match unprefixed.strip_prefix("ObjectCreated:") {
            Some(sub) => EventKind::ObjectCreated(sub.to_string()),
            None => EventKind::Other(trimmed.to_string()),
        }
    }

    pub fn is_object_created(&self) -> bool {
        matches!(self, EventKind::ObjectCreated(_))
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            EventKind::ObjectCreated(sub) => write!(f, "ObjectCreated:{}", sub),
            EventKind::Other(name) => f.write_str(name),
        }
    }
}

/// A validated storage notification, delivered at-least-once
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessingNotification {
    pub bucket: String,
    pub key: String,
    pub event_kind: EventKind,
    /// Store-assigned ordering token (S3 `sequencer`), when present
    pub sequence_token: Option<String>,
}

impl ProcessingNotification {
    /// Identifier reported back to the delivering collaborator for redelivery
    pub fn item_identifier(&self) -> &str {
        self.sequence_token.as_deref().unwrap_or(&self.key)
    }
}
