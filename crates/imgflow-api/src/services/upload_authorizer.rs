//! Upload authorizer: issues direct-upload credentials for originals.
//!
//! Nothing is persisted. The presigned URL pins bucket, key, content type and expiry, and the
//! derived-artifact URLs are predicted with the same naming rule the processor uses.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use imgflow_core::constants::UPLOAD_KEY_SUFFIX_LEN;
use imgflow_core::naming::{artifact_kinds, derived_key};
use imgflow_core::{
    AppError, Config, ImageContentType, PipelineError, PredictedArtifact, UploadGrant,
    VariantKind, VariantSpec,
};
use imgflow_storage::Storage;
use rand::distr::Alphanumeric;
use rand::Rng;

use crate::auth::OwnerIdentity;
use crate::error::storage_error_to_app;

#[derive(Debug, Clone)]
pub struct UploadAuthorizerConfig {
    pub allowed_content_types: Vec<ImageContentType>,
    pub variants: Vec<VariantSpec>,
    pub credential_expiry: Duration,
}

impl UploadAuthorizerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            allowed_content_types: config.allowed_content_types().to_vec(),
            variants: config.thumbnail_sizes().to_vec(),
            credential_expiry: config.credential_expiry(),
        }
    }
}

pub struct UploadAuthorizer {
    origin: Arc<dyn Storage>,
    derived: Arc<dyn Storage>,
    config: UploadAuthorizerConfig,
}

/// Random `[A-Za-z0-9]` suffix
fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// `(upload_id, object_key)` for a new original: `{owner}/{millis}-{suffix}.{ext}`.
///
/// Uniqueness is probabilistic; a collision only means one upload overwrites another.
pub fn generate_object_key(
    owner_id: &str,
    content_type: ImageContentType,
    now: DateTime<Utc>,
) -> (String, String) {
    let upload_id = format!(
        "{}-{}",
        now.timestamp_millis(),
        random_suffix(UPLOAD_KEY_SUFFIX_LEN)
    );
    let key = format!("{}/{}.{}", owner_id, upload_id, content_type.extension());
    (upload_id, key)
}

impl UploadAuthorizer {
    pub fn new(
        origin: Arc<dyn Storage>,
        derived: Arc<dyn Storage>,
        config: UploadAuthorizerConfig,
    ) -> Self {
        Self {
            origin,
            derived,
            config,
        }
    }

    /// Predicted location of every artifact the processor derives from `object_key`
    pub fn predict_artifacts(&self, object_key: &str) -> Vec<PredictedArtifact> {
        artifact_kinds(&self.config.variants)
            .into_iter()
            .map(|kind| {
                let key = derived_key(object_key, &kind);
                let (width, height) = match kind {
                    VariantKind::Thumbnail { width, height } => (Some(width), Some(height)),
                    VariantKind::AlternateFormat => (None, None),
                };
                PredictedArtifact {
                    kind,
                    url: self.derived.public_url(&key),
                    key,
                    width,
                    height,
                }
            })
            .collect()
    }

    /// Issue a grant for `owner` to upload one original of `declared_content_type`.
    #[tracing::instrument(skip(self, owner), fields(owner_id))]
    pub async fn request_upload(
        &self,
        owner: Option<&OwnerIdentity>,
        declared_content_type: &str,
    ) -> Result<UploadGrant, AppError> {
        let owner = owner.ok_or_else(|| {
            PipelineError::Unauthenticated("No verified identity on request".to_string())
        })?;
        tracing::Span::current().record("owner_id", owner.owner_id.as_str());

        let content_type = ImageContentType::parse(declared_content_type)
            .filter(|ct| self.config.allowed_content_types.contains(ct))
            .ok_or_else(|| {
                PipelineError::UnsupportedContentType(declared_content_type.to_string())
            })?;

        let issued_at = Utc::now();
        let (upload_id, object_key) = generate_object_key(&owner.owner_id, content_type, issued_at);

        let write_credential = self
            .origin
            .presigned_put_url(
                &object_key,
                content_type.to_mime_type(),
                self.config.credential_expiry,
            )
            .await
            .map_err(storage_error_to_app)?;

        let expiry = chrono::Duration::from_std(self.config.credential_expiry)
            .map_err(|e| AppError::Internal(format!("Credential expiry out of range: {}", e)))?;

        let grant = UploadGrant {
            owner_id: owner.owner_id.clone(),
            upload_id,
            read_url: self.origin.public_url(&object_key),
            predicted_artifacts: self.predict_artifacts(&object_key),
            object_key,
            content_type,
            write_credential,
            issued_at,
            expires_at: issued_at + expiry,
        };

        tracing::info!(
            bucket = %self.origin.bucket(),
            key = %grant.object_key,
            content_type = %content_type,
            expires_at = %grant.expires_at,
            "Upload grant issued"
        );

        Ok(grant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgflow_core::ArtifactFormat;
    use imgflow_storage::MemoryStorage;
    use std::collections::HashSet;

    fn authorizer() -> UploadAuthorizer {
        let variants = ["150x150", "300x300", "600x400"]
            .iter()
            .map(|s| VariantSpec::parse(s, 85).unwrap())
            .collect();
        UploadAuthorizer::new(
            Arc::new(MemoryStorage::new("origin")),
            Arc::new(MemoryStorage::new("derived").with_base_url("https://cdn.example.com")),
            UploadAuthorizerConfig {
                allowed_content_types: vec![ImageContentType::Jpeg, ImageContentType::Png],
                variants,
                credential_expiry: Duration::from_secs(3600),
            },
        )
    }

    #[test]
    fn test_key_format() {
        let now = Utc::now();
        let (upload_id, key) = generate_object_key("u1", ImageContentType::Png, now);

        let (millis, suffix) = upload_id.split_once('-').unwrap();
        assert_eq!(millis, now.timestamp_millis().to_string());
        assert_eq!(suffix.len(), UPLOAD_KEY_SUFFIX_LEN);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(key, format!("u1/{}.png", upload_id));
    }

    #[test]
    fn test_keys_are_unique_over_ten_thousand_grants() {
        let now = Utc::now();
        let keys: HashSet<String> = (0..10_000)
            .map(|_| generate_object_key("u1", ImageContentType::Jpeg, now).1)
            .collect();
        assert_eq!(keys.len(), 10_000);
    }

    #[tokio::test]
    async fn test_missing_identity_is_unauthenticated() {
        let err = authorizer()
            .request_upload(None, "image/jpeg")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_disallowed_content_type() {
        let owner = OwnerIdentity::new("u1").unwrap();
        let a = authorizer();

        for ct in ["image/webp", "image/svg+xml", "application/pdf", ""] {
            let err = a.request_upload(Some(&owner), ct).await.unwrap_err();
            assert!(matches!(err, AppError::UnsupportedMediaType(_)), "{}", ct);
        }
    }

    #[tokio::test]
    async fn test_grant_contents() {
        let owner = OwnerIdentity::new("u1").unwrap();
        let grant = authorizer()
            .request_upload(Some(&owner), "image/jpeg")
            .await
            .unwrap();

        assert!(grant.object_key.starts_with("u1/"));
        assert!(grant.object_key.ends_with(".jpg"));
        assert_eq!(grant.expires_at - grant.issued_at, chrono::Duration::seconds(3600));
        assert!(grant.write_credential.contains("x-content-type=image%2Fjpeg"));
        assert!(grant.write_credential.contains("x-expires=3600"));

        let stem = grant.object_key.trim_end_matches(".jpg");
        let urls: Vec<&str> = grant
            .predicted_artifacts
            .iter()
            .map(|p| p.url.as_str())
            .collect();
        assert_eq!(
            urls,
            vec![
                format!("https://cdn.example.com/{}_thumb_150.jpg", stem),
                format!("https://cdn.example.com/{}_thumb_300.jpg", stem),
                format!("https://cdn.example.com/{}_thumb_600.jpg", stem),
                format!("https://cdn.example.com/{}.webp", stem),
            ]
        );
        assert_eq!(grant.thumbnail(300).unwrap().height, Some(300));
        assert_eq!(
            grant.predicted_artifacts[3].kind.format(),
            ArtifactFormat::WebP
        );
    }
}
