use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use imgflow_worker::{BatchOutcome, S3EventPayload};
use serde::{Deserialize, Serialize};

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct BatchItemFailure {
    pub item_identifier: String,
}

/// Record that will not be redelivered, with the error that stopped it
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRecord {
    pub item_identifier: String,
    pub error_kind: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventBatchResponse {
    pub processed: usize,
    pub ignored: usize,
    pub rejected: usize,
    pub rejected_items: Vec<RejectedRecord>,
    pub batch_item_failures: Vec<BatchItemFailure>,
}

impl From<BatchOutcome> for EventBatchResponse {
    fn from(outcome: BatchOutcome) -> Self {
        Self {
            processed: outcome.processed,
            ignored: outcome.ignored,
            rejected: outcome.rejected,
            rejected_items: outcome
                .rejected_items
                .into_iter()
                .map(|item| RejectedRecord {
                    item_identifier: item.item_identifier,
                    error_kind: item.error_kind.to_string(),
                })
                .collect(),
            batch_item_failures: outcome
                .failures
                .into_iter()
                .map(|item_identifier| BatchItemFailure { item_identifier })
                .collect(),
        }
    }
}

/// Receive an object-created delivery and process it before answering.
///
/// Always 200 once the body parses; per-record failures travel in `batchItemFailures`.
#[tracing::instrument(skip(state, payload), fields(records = payload.records.len()))]
pub async fn object_created(
    State(state): State<Arc<AppState>>,
    ValidatedJson(payload): ValidatedJson<S3EventPayload>,
) -> Result<impl IntoResponse, HttpAppError> {
    let outcome = state.dispatcher.handle_payload(payload).await;
    Ok(Json(EventBatchResponse::from(outcome)))
}
