use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::{DateTime, Utc};
use imgflow_core::constants::PRIMARY_THUMBNAIL_WIDTH;
use imgflow_core::{UploadGrant, VariantKind};
use serde::{Deserialize, Serialize};

use crate::auth::OwnerIdentity;
use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    pub content_type: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Placeholder until the original has been processed
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct UploadMetadata {
    pub size: u64,
    pub dimensions: Dimensions,
    pub format: String,
}

impl Default for UploadMetadata {
    fn default() -> Self {
        Self {
            size: 0,
            dimensions: Dimensions {
                width: 0,
                height: 0,
            },
            format: "JPEG".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub upload_id: String,
    pub upload_url: String,
    pub url: String,
    pub thumbnail: String,
    pub expires_at: DateTime<Utc>,
    pub key: String,
    /// Variant name (`thumb_150`, `webp`, ...) to predicted URL
    pub variants: BTreeMap<String, String>,
    pub metadata: UploadMetadata,
}

impl From<UploadGrant> for UploadResponse {
    fn from(grant: UploadGrant) -> Self {
        let thumbnail = grant
            .thumbnail(PRIMARY_THUMBNAIL_WIDTH)
            .or_else(|| {
                grant
                    .predicted_artifacts
                    .iter()
                    .find(|p| matches!(p.kind, VariantKind::Thumbnail { .. }))
            })
            .map(|p| p.url.clone())
            .unwrap_or_else(|| grant.read_url.clone());

        let variants = grant
            .predicted_artifacts
            .iter()
            .map(|p| (p.kind.name(), p.url.clone()))
            .collect();

        Self {
            upload_id: grant.upload_id,
            upload_url: grant.write_credential,
            url: grant.read_url,
            thumbnail,
            expires_at: grant.expires_at,
            key: grant.object_key,
            variants,
            metadata: UploadMetadata::default(),
        }
    }
}

/// Issue a presigned URL for uploading one original directly to the origin store
#[tracing::instrument(
    skip(state, request),
    fields(owner_id = %owner.owner_id, content_type = %request.content_type)
)]
pub async fn request_upload(
    owner: OwnerIdentity,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<UploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let grant = state
        .authorizer
        .request_upload(Some(&owner), &request.content_type)
        .await?;

    Ok(Json(UploadResponse::from(grant)))
}
