use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView};
use imgflow_core::{ArtifactFormat, PipelineError};

/// An encoded artifact body with the dimensions it was encoded at
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: ArtifactFormat,
}

/// Encoders for the two artifact formats
pub struct ImageCompressor;

impl ImageCompressor {
    /// Encode `img` as `format` at `quality` (1-100).
    pub fn encode(
        img: &DynamicImage,
        format: ArtifactFormat,
        quality: u8,
    ) -> Result<EncodedImage, PipelineError> {
        let (width, height) = img.dimensions();
        let data = match format {
            ArtifactFormat::Jpeg => Self::compress_jpeg(img, quality)?,
            ArtifactFormat::WebP => Self::compress_webp(img, quality)?,
        };

        Ok(EncodedImage {
            data,
            width,
            height,
            format,
        })
    }

    /// Compress to baseline JPEG. Alpha is dropped.
    fn compress_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, PipelineError> {
        let rgb_img = img.to_rgb8();
        let mut buffer = Vec::new();

        let encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb_img
            .write_with_encoder(encoder)
            .map_err(|e| PipelineError::CorruptInput(format!("JPEG encode failed: {}", e)))?;

        Ok(Bytes::from(buffer))
    }

    /// Compress to lossy WebP
    fn compress_webp(img: &DynamicImage, quality: u8) -> Result<Bytes, PipelineError> {
        let (width, height) = img.dimensions();

        // Convert to RGBA for WebP encoding
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(&rgba_img, width, height);
        let webp_data = encoder
            .encode_simple(false, quality.clamp(1, 100) as f32)
            .map_err(|e| PipelineError::CorruptInput(format!("WebP encode failed: {:?}", e)))?;

        Ok(Bytes::copy_from_slice(&webp_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn test_image() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(64, 48, |x, y| {
            Rgba([(x * 4) as u8, (y * 5) as u8, 128, 255])
        }))
    }

    #[test]
    fn test_jpeg_encode() {
        let encoded = ImageCompressor::encode(&test_image(), ArtifactFormat::Jpeg, 85).unwrap();
        assert_eq!((encoded.width, encoded.height), (64, 48));
        assert_eq!(
            image::guess_format(&encoded.data).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_webp_encode() {
        let encoded = ImageCompressor::encode(&test_image(), ArtifactFormat::WebP, 85).unwrap();
        assert_eq!(encoded.format, ArtifactFormat::WebP);
        assert_eq!(
            image::guess_format(&encoded.data).unwrap(),
            ImageFormat::WebP
        );
        let decoded = image::load_from_memory(&encoded.data).unwrap();
        assert_eq!(decoded.dimensions(), (64, 48));
    }

    #[test]
    fn test_lower_quality_is_smaller() {
        let img = test_image();
        let high = ImageCompressor::encode(&img, ArtifactFormat::Jpeg, 95).unwrap();
        let low = ImageCompressor::encode(&img, ArtifactFormat::Jpeg, 20).unwrap();
        assert!(low.data.len() < high.data.len());
    }
}
