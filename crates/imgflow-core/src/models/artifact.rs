use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Encoding of a derived artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactFormat {
    Jpeg,
    WebP,
}

impl ArtifactFormat {
    /// File extension used in derived keys
    pub fn extension(self) -> &'static str {
        match self {
            ArtifactFormat::Jpeg => "jpg",
            ArtifactFormat::WebP => "webp",
        }
    }

    pub fn to_mime_type(self) -> &'static str {
        match self {
            ArtifactFormat::Jpeg => "image/jpeg",
            ArtifactFormat::WebP => "image/webp",
        }
    }
}

impl Display for ArtifactFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            ArtifactFormat::Jpeg => write!(f, "JPEG"),
            ArtifactFormat::WebP => write!(f, "WEBP"),
        }
    }
}

/// One thumbnail box the pipeline renders for every original.
///
/// Thumbnails are always cover-center-cropped: the source is scaled until it covers the
/// box, then cropped symmetrically, so the output is exactly `width` x `height`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantSpec {
    pub width: u32,
    pub height: u32,
    pub format: ArtifactFormat,
    pub quality: u8,
}

impl VariantSpec {
    pub fn new(width: u32, height: u32, quality: u8) -> Self {
        Self {
            width,
            height,
            format: ArtifactFormat::Jpeg,
            quality,
        }
    }

    /// Parse a box from `WxH`, e.g. `600x400`.
    pub fn parse(s: &str, quality: u8) -> Result<Self, String> {
        let (w, h) = s
            .trim()
            .split_once('x')
            .ok_or_else(|| format!("Invalid thumbnail size '{}'. Expected: WxH", s))?;

        let width = w
            .parse::<u32>()
            .map_err(|_| format!("Invalid width: {}", w))?;
        let height = h
            .parse::<u32>()
            .map_err(|_| format!("Invalid height: {}", h))?;

        if width == 0 || height == 0 {
            return Err(format!("Thumbnail size must be non-zero: {}", s));
        }

        Ok(Self::new(width, height, quality))
    }

    pub fn kind(&self) -> VariantKind {
        VariantKind::Thumbnail {
            width: self.width,
            height: self.height,
        }
    }
}

/// What a derived artifact is, independent of which original it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VariantKind {
    /// Cover-cropped JPEG thumbnail
    Thumbnail { width: u32, height: u32 },
    /// Full-resolution WebP re-encode of the original
    AlternateFormat,
}

impl VariantKind {
    /// Stable short name, also used as the key in upload responses
    pub fn name(&self) -> String {
        match self {
            VariantKind::Thumbnail { width, .. } => format!("thumb_{}", width),
            VariantKind::AlternateFormat => "webp".to_string(),
        }
    }

    pub fn format(&self) -> ArtifactFormat {
        match self {
            VariantKind::Thumbnail { .. } => ArtifactFormat::Jpeg,
            VariantKind::AlternateFormat => ArtifactFormat::WebP,
        }
    }
}

impl Display for VariantKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            VariantKind::Thumbnail { width, height } => write!(f, "thumbnail {}x{}", width, height),
            VariantKind::AlternateFormat => write!(f, "alternate format"),
        }
    }
}

/// A derived artifact that has been written to the derived store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivedArtifact {
    pub source_key: String,
    pub kind: VariantKind,
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub format: ArtifactFormat,
    pub quality: u8,
    pub size_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variant_spec() {
        let spec = VariantSpec::parse("600x400", 85).unwrap();
        assert_eq!(spec.width, 600);
        assert_eq!(spec.height, 400);
        assert_eq!(spec.format, ArtifactFormat::Jpeg);
        assert_eq!(spec.quality, 85);

        assert!(VariantSpec::parse("600", 85).is_err());
        assert!(VariantSpec::parse("x400", 85).is_err());
        assert!(VariantSpec::parse("0x400", 85).is_err());
        assert!(VariantSpec::parse("axb", 85).is_err());
    }

    #[test]
    fn test_variant_names() {
        let kind = VariantSpec::new(150, 150, 85).kind();
        assert_eq!(kind.name(), "thumb_150");
        assert_eq!(kind.format(), ArtifactFormat::Jpeg);
        assert_eq!(VariantKind::AlternateFormat.name(), "webp");
        assert_eq!(VariantKind::AlternateFormat.format(), ArtifactFormat::WebP);
    }

    #[test]
    fn test_format_mime_types() {
        assert_eq!(ArtifactFormat::Jpeg.to_mime_type(), "image/jpeg");
        assert_eq!(ArtifactFormat::WebP.to_mime_type(), "image/webp");
        assert_eq!(ArtifactFormat::Jpeg.to_string(), "JPEG");
    }
}
