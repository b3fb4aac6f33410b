use image::{DynamicImage, GenericImageView};

/// Image resize operations
pub struct ImageResize;

impl ImageResize {
    /// Select appropriate filter type based on resize ratio
    pub fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> image::imageops::FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            image::imageops::FilterType::Triangle
        } else if max_ratio > 1.5 {
            image::imageops::FilterType::CatmullRom
        } else {
            image::imageops::FilterType::Lanczos3
        }
    }

    /// Centered region of a `width` x `height` source with the aspect ratio of the target box.
    ///
    /// Returns `(x, y, crop_width, crop_height)` in source pixels; never empty and never larger
    /// than the source.
    pub fn cover_region(
        width: u32,
        height: u32,
        target_width: u32,
        target_height: u32,
    ) -> (u32, u32, u32, u32) {
        let (w, h) = (width.max(1) as u64, height.max(1) as u64);
        let (tw, th) = (target_width.max(1) as u64, target_height.max(1) as u64);

        let (crop_width, crop_height) = if w * th > h * tw {
            // Source is wider than the box: keep full height
            let cw = ((h * tw + th / 2) / th).clamp(1, w);
            (cw as u32, height)
        } else {
            let ch = ((w * th + tw / 2) / tw).clamp(1, h);
            (width, ch as u32)
        };

        let x = width.saturating_sub(crop_width) / 2;
        let y = height.saturating_sub(crop_height) / 2;
        (x, y, crop_width, crop_height)
    }

    /// Cover-center-crop: cut the centered region matching the target aspect ratio out of the
    /// source, then resize it. The result is exactly `target_width` x `target_height` and no
    /// intermediate frame is larger than the source or the target.
    pub fn cover_crop(img: &DynamicImage, target_width: u32, target_height: u32) -> DynamicImage {
        let (width, height) = img.dimensions();
        let (x, y, crop_width, crop_height) =
            Self::cover_region(width, height, target_width, target_height);

        let region = if (crop_width, crop_height) == (width, height) {
            img.clone()
        } else {
            img.crop_imm(x, y, crop_width, crop_height)
        };

        if (crop_width, crop_height) == (target_width, target_height) {
            return region;
        }
        let filter = Self::select_filter(crop_width, crop_height, target_width, target_height);
        region.resize_exact(target_width, target_height, filter)
    }
}
