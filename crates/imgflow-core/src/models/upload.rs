use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};

use super::VariantKind;

/// Image types a client may declare when requesting an upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImageContentType {
    Jpeg,
    Png,
    WebP,
    Gif,
}

impl ImageContentType {
    /// Parse a declared MIME type. Parameters (`; charset=...`) and case are ignored.
    pub fn parse(s: &str) -> Option<Self> {
        let essence = s.split(';').next().unwrap_or("").trim().to_lowercase();
        match essence.as_str() {
            "image/jpeg" | "image/jpg" => Some(ImageContentType::Jpeg),
            "image/png" => Some(ImageContentType::Png),
            "image/webp" => Some(ImageContentType::WebP),
            "image/gif" => Some(ImageContentType::Gif),
            _ => None,
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            ImageContentType::Jpeg => "image/jpeg",
            ImageContentType::Png => "image/png",
            ImageContentType::WebP => "image/webp",
            ImageContentType::Gif => "image/gif",
        }
    }

    /// Canonical extension appended to generated object keys
    pub fn extension(self) -> &'static str {
        match self {
            ImageContentType::Jpeg => "jpg",
            ImageContentType::Png => "png",
            ImageContentType::WebP => "webp",
            ImageContentType::Gif => "gif",
        }
    }
}

impl Display for ImageContentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.to_mime_type())
    }
}

/// URL at which a derived artifact will appear once the pipeline has run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PredictedArtifact {
    pub kind: VariantKind,
    pub key: String,
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Capability to write one original directly into the origin store.
///
/// Never persisted; the write credential itself carries bucket, key, content type and
/// expiry, so the store enforces them without any session state on our side.
#[derive(Debug, Clone, Serialize)]
pub struct UploadGrant {
    pub owner_id: String,
    pub upload_id: String,
    pub object_key: String,
    pub content_type: ImageContentType,
    pub write_credential: String,
    pub read_url: String,
    pub predicted_artifacts: Vec<PredictedArtifact>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl UploadGrant {
    /// Predicted thumbnail with the given width, if configured
    pub fn thumbnail(&self, width: u32) -> Option<&PredictedArtifact> {
        self.predicted_artifacts.iter().find(|a| {
            matches!(a.kind, VariantKind::Thumbnail { width: w, .. } if w == width)
        })
    }
}
