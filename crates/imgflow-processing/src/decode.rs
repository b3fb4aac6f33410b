//! Decoding of originals.

use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use imgflow_core::PipelineError;
use std::io::Cursor;

/// Decode `data`, sniffing the format from its magic bytes, and rotate/flip it upright
/// according to its EXIF orientation.
///
/// The declared content type of the upload is not trusted; anything the decoder cannot read
/// is `CorruptInput`.
pub fn decode_upright(data: &[u8]) -> Result<DynamicImage, PipelineError> {
    let reader = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| PipelineError::CorruptInput(e.to_string()))?;

    if reader.format().is_none() {
        return Err(PipelineError::CorruptInput(
            "unrecognized image format".to_string(),
        ));
    }

    let mut decoder = reader
        .into_decoder()
        .map_err(|e| PipelineError::CorruptInput(e.to_string()))?;

    // A broken EXIF block is not worth failing the whole image over.
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|e| PipelineError::CorruptInput(e.to_string()))?;

    if orientation != Orientation::NoTransforms {
        tracing::debug!(orientation = ?orientation, "Applying EXIF orientation");
        img.apply_orientation(orientation);
    }

    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, ImageFormat, Rgb, RgbImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([1, 2, 3])));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn test_decode_png() {
        let img = decode_upright(&png_bytes(40, 30)).unwrap();
        assert_eq!(img.dimensions(), (40, 30));
    }

    #[test]
    fn test_garbage_is_corrupt_input() {
        let err = decode_upright(b"definitely not an image").unwrap_err();
        assert_eq!(err.kind(), "CorruptInput");
    }

    #[test]
    fn test_truncated_image_is_corrupt_input() {
        let data = png_bytes(40, 30);
        let err = decode_upright(&data[..data.len() / 2]).unwrap_err();
        assert!(matches!(err, PipelineError::CorruptInput(_)));
    }
}
