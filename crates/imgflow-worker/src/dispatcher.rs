//! Event dispatcher: fans a notification batch out to the processor.
//!
//! Each object is an independent unit. Units run with bounded concurrency and a failing unit
//! never affects its siblings. Nothing is retried here; retryable failures are reported back
//! so the delivering side can redeliver just those records.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use imgflow_core::constants::DEFAULT_DISPATCH_CONCURRENCY;
use imgflow_core::{Config, PipelineError, ProcessingNotification};
use imgflow_processing::ImageProcessor;
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::notification::{parse_payload, S3EventPayload};

/// Work performed for one created object.
///
/// Implemented by [`ImageProcessor`]; the dispatcher only sees this seam.
#[async_trait]
pub trait ObjectHandler: Send + Sync {
    async fn handle(&self, bucket: &str, key: &str) -> Result<(), PipelineError>;
}

#[async_trait]
impl ObjectHandler for ImageProcessor {
    async fn handle(&self, bucket: &str, key: &str) -> Result<(), PipelineError> {
        self.process(bucket, key).await?.into_result().map(|_| ())
    }
}

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub origin_bucket: String,
    pub concurrency: usize,
}

impl DispatcherConfig {
    pub fn new(origin_bucket: impl Into<String>) -> Self {
        Self {
            origin_bucket: origin_bucket.into(),
            concurrency: DEFAULT_DISPATCH_CONCURRENCY,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            origin_bucket: config.origin_bucket().to_string(),
            concurrency: config.dispatch_concurrency(),
        }
    }
}

/// A record whose object failed in a way redelivery cannot fix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedItem {
    pub item_identifier: String,
    pub error_kind: &'static str,
}

/// Per-record tally of a batch.
///
/// Every delivered record lands in exactly one bucket: `processed`, `ignored` (not an
/// object creation on the origin bucket), `rejected` (invalid record, or a permanent
/// processing error that redelivery cannot fix) or `failures` (retryable).
///
/// Permanent processing errors are also listed in `rejected_items`. Records that fail
/// validation carry no usable identifier and only count towards `rejected`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchOutcome {
    pub processed: usize,
    pub ignored: usize,
    pub rejected: usize,
    pub rejected_items: Vec<RejectedItem>,
    /// Item identifiers (sequence token, else key) to redeliver
    pub failures: Vec<String>,
}

impl BatchOutcome {
    pub fn total(&self) -> usize {
        self.processed + self.ignored + self.rejected + self.failures.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// One object to process, with every record in the batch that referred to it
struct Unit {
    bucket: String,
    key: String,
    identifiers: Vec<String>,
}

pub struct EventDispatcher {
    handler: Arc<dyn ObjectHandler>,
    config: DispatcherConfig,
}

impl EventDispatcher {
    pub fn new(handler: Arc<dyn ObjectHandler>, config: DispatcherConfig) -> Self {
        tracing::info!(
            origin_bucket = %config.origin_bucket,
            concurrency = config.concurrency,
            "Event dispatcher initialized"
        );
        Self { handler, config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    /// Validate a raw delivery and dispatch its valid records.
    pub async fn handle_payload(&self, payload: S3EventPayload) -> BatchOutcome {
        let parsed = parse_payload(payload);
        let mut outcome = self.handle_batch(parsed.notifications).await;
        outcome.rejected += parsed.rejected;
        outcome
    }

    /// Process every object-created notification for the origin bucket.
    ///
    /// Records naming the same key are collapsed into one unit; its result applies to all
    /// of them.
    pub async fn handle_batch(&self, notifications: Vec<ProcessingNotification>) -> BatchOutcome {
        let start = Instant::now();
        let mut outcome = BatchOutcome::default();

        let mut units: Vec<Unit> = Vec::new();
        let mut by_key: HashMap<String, usize> = HashMap::new();

        for notification in notifications {
            if !notification.event_kind.is_object_created() {
                tracing::debug!(
                    key = %notification.key,
                    event = %notification.event_kind,
                    "Ignoring non-creation event"
                );
                outcome.ignored += 1;
                continue;
            }
            if notification.bucket != self.config.origin_bucket {
                tracing::debug!(
                    bucket = %notification.bucket,
                    key = %notification.key,
                    "Ignoring event for foreign bucket"
                );
                outcome.ignored += 1;
                continue;
            }

            let identifier = notification.item_identifier().to_string();
            match by_key.get(&notification.key) {
                Some(&index) => units[index].identifiers.push(identifier),
                None => {
                    by_key.insert(notification.key.clone(), units.len());
                    units.push(Unit {
                        bucket: notification.bucket,
                        key: notification.key,
                        identifiers: vec![identifier],
                    });
                }
            }
        }

        let results = self.run_units(&units).await;

        for (unit, result) in units.into_iter().zip(results) {
            match result {
                Ok(()) => outcome.processed += unit.identifiers.len(),
                Err(e) => {
                    tracing::error!(
                        bucket = %unit.bucket,
                        key = %unit.key,
                        error_kind = e.kind(),
                        retryable = e.is_retryable(),
                        error = %e,
                        "Object processing failed"
                    );
                    if e.is_retryable() {
                        outcome.failures.extend(unit.identifiers);
                    } else {
                        outcome.rejected += unit.identifiers.len();
                        outcome
                            .rejected_items
                            .extend(unit.identifiers.into_iter().map(|item_identifier| {
                                RejectedItem {
                                    item_identifier,
                                    error_kind: e.kind(),
                                }
                            }));
                    }
                }
            }
        }

        tracing::info!(
            processed = outcome.processed,
            ignored = outcome.ignored,
            rejected = outcome.rejected,
            failed = outcome.failures.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Notification batch handled"
        );

        outcome
    }

    /// Run units with at most `concurrency` in flight; results come back in unit order.
    async fn run_units(&self, units: &[Unit]) -> Vec<Result<(), PipelineError>> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let mut set = JoinSet::new();

        for (index, unit) in units.iter().enumerate() {
            let handler = self.handler.clone();
            let semaphore = semaphore.clone();
            let bucket = unit.bucket.clone();
            let key = unit.key.clone();

            set.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => handler.handle(&bucket, &key).await,
                    Err(_) => Err(PipelineError::StorageRead(
                        "dispatch pool closed".to_string(),
                    )),
                };
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<(), PipelineError>>> = vec![None; units.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "Dispatch unit panicked"),
            }
        }

        results
            .into_iter()
            .map(|result| {
                result.unwrap_or_else(|| {
                    Err(PipelineError::StorageWrite("processing did not complete".to_string()))
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgflow_core::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingHandler {
        calls: Mutex<Vec<String>>,
        errors: HashMap<String, PipelineError>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        delay: Duration,
    }

    #[async_trait]
    impl ObjectHandler for RecordingHandler {
        async fn handle(&self, _bucket: &str, key: &str) -> Result<(), PipelineError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(key.to_string());
            tokio::time::sleep(self.delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match self.errors.get(key) {
                Some(e) => Err(e.clone()),
                None => Ok(()),
            }
        }
    }

    fn created(bucket: &str, key: &str, token: &str) -> ProcessingNotification {
        ProcessingNotification {
            bucket: bucket.to_string(),
            key: key.to_string(),
            event_kind: EventKind::ObjectCreated("Put".to_string()),
            sequence_token: Some(token.to_string()),
        }
    }

    fn dispatcher(handler: Arc<RecordingHandler>, concurrency: usize) -> EventDispatcher {
        EventDispatcher::new(
            handler,
            DispatcherConfig {
                origin_bucket: "origin".to_string(),
                concurrency,
            },
        )
    }

    #[tokio::test]
    async fn test_filters_event_kind_and_bucket() {
        let handler = Arc::new(RecordingHandler::default());
        let d = dispatcher(handler.clone(), 4);

        let mut removed = created("origin", "u1/gone.jpg", "2");
        removed.event_kind = EventKind::from_event_name("ObjectRemoved:Delete");

        let outcome = d
            .handle_batch(vec![
                created("origin", "u1/a.jpg", "1"),
                removed,
                created("derived", "u1/a_thumb_150.jpg", "3"),
            ])
            .await;

        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.ignored, 2);
        assert_eq!(*handler.calls.lock().unwrap(), vec!["u1/a.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_duplicate_keys_processed_once() {
        let handler = Arc::new(RecordingHandler::default());
        let d = dispatcher(handler.clone(), 4);

        let outcome = d
            .handle_batch(vec![
                created("origin", "u1/a.jpg", "1"),
                created("origin", "u1/a.jpg", "2"),
                created("origin", "u1/b.jpg", "3"),
            ])
            .await;

        assert_eq!(outcome.processed, 3);
        assert_eq!(handler.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_isolated_and_classified() {
        let mut errors = HashMap::new();
        errors.insert(
            "u1/flaky.jpg".to_string(),
            PipelineError::StorageWrite("throttled".to_string()),
        );
        errors.insert(
            "u1/broken.jpg".to_string(),
            PipelineError::CorruptInput("bad header".to_string()),
        );
        let handler = Arc::new(RecordingHandler {
            errors,
            ..Default::default()
        });
        let d = dispatcher(handler, 2);

        let outcome = d
            .handle_batch(vec![
                created("origin", "u1/flaky.jpg", "seq-1"),
                created("origin", "u1/ok.jpg", "seq-2"),
                created("origin", "u1/broken.jpg", "seq-3"),
                created("origin", "u1/flaky.jpg", "seq-4"),
            ])
            .await;

        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(
            outcome.rejected_items,
            vec![RejectedItem {
                item_identifier: "seq-3".to_string(),
                error_kind: "CorruptInput",
            }]
        );
        assert_eq!(outcome.failures, vec!["seq-1".to_string(), "seq-4".to_string()]);
        assert_eq!(outcome.total(), 4);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let handler = Arc::new(RecordingHandler {
            delay: Duration::from_millis(20),
            ..Default::default()
        });
        let d = dispatcher(handler.clone(), 2);

        let batch = (0..8)
            .map(|i| created("origin", &format!("u1/{}.jpg", i), &i.to_string()))
            .collect();
        let outcome = d.handle_batch(batch).await;

        assert_eq!(outcome.processed, 8);
        assert!(handler.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_payload_rejections_are_counted() {
        let handler = Arc::new(RecordingHandler::default());
        let d = dispatcher(handler, 4);

        let payload: S3EventPayload = serde_json::from_value(serde_json::json!({
            "Records": [
                { "eventName": "ObjectCreated:Put",
                  "s3": { "bucket": { "name": "origin" }, "object": { "key": "u1/a.jpg" } } },
                { "eventName": "ObjectCreated:Put" }
            ]
        }))
        .unwrap();

        let outcome = d.handle_payload(payload).await;
        assert_eq!(outcome.processed, 1);
        assert_eq!(outcome.rejected, 1);
        assert!(outcome.rejected_items.is_empty());
        assert!(!outcome.has_failures());
    }
}
