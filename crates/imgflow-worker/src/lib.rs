//! Notification intake for imgflow: validates object-store event deliveries and dispatches
//! each created original to the image processor.

pub mod dispatcher;
pub mod notification;

pub use dispatcher::{
    BatchOutcome, DispatcherConfig, EventDispatcher, ObjectHandler, RejectedItem,
};
pub use notification::{parse_payload, parse_record, ParsedBatch, RecordError, S3EventPayload};
