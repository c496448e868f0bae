//! Sampled detection of transparency in decoded images.

use image::{DynamicImage, GenericImageView};

/// Alpha values at or above this count as opaque (absorbs codec noise).
pub const OPAQUE_THRESHOLD: f32 = 0.98;

/// Upper bound on alpha values inspected per image.
pub const MAX_SAMPLES: usize = 1000;

/// Check an interleaved RGBA float buffer for transparency.
///
/// Only an evenly strided sample of at most [`MAX_SAMPLES`] alpha values is
/// inspected, so transparency confined to unsampled pixels goes unnoticed.
pub fn rgba_uses_transparency(pixels: &[f32]) -> bool {
    if pixels.is_empty() || pixels.len() % 4 != 0 {
        return false;
    }

    let alpha_count = pixels.len() / 4;
    let step = (alpha_count / MAX_SAMPLES).max(1);

    pixels
        .iter()
        .skip(3)
        .step_by(4)
        .step_by(step)
        .any(|&alpha| alpha < OPAQUE_THRESHOLD)
}

/// Whether `img` actually uses its alpha channel.
pub fn uses_transparency(name: &str, img: &DynamicImage) -> bool {
    if !img.color().has_alpha() {
        return false;
    }

    let (width, height) = img.dimensions();
    let pixel_count = width as usize * height as usize;
    if pixel_count == 0 {
        return false;
    }

    // Same stride as `rgba_uses_transparency`, reading only the sampled pixels.
    let step = (pixel_count / MAX_SAMPLES).max(1);
    let columns = width as usize;
    let used = (0..pixel_count).step_by(step).any(|i| {
        let (x, y) = ((i % columns) as u32, (i / columns) as u32);
        f32::from(img.get_pixel(x, y)[3]) / 255.0 < OPAQUE_THRESHOLD
    });
    if used {
        log::debug!("Alpha channel detected in '{name}'");
    }
    used
}

/// Decode `data` and check it for transparency; undecodable data counts as opaque.
pub fn encoded_uses_transparency(name: &str, data: &[u8]) -> bool {
    match image::load_from_memory(data) {
        Ok(img) => uses_transparency(name, &img),
        Err(e) => {
            log::warn!("Could not analyze alpha channel for '{name}': {e}");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn rgba(alphas: &[f32]) -> Vec<f32> {
        alphas.iter().flat_map(|&a| [0.5, 0.5, 0.5, a]).collect()
    }

    #[test]
    fn opaque_buffer_has_no_transparency() {
        assert!(!rgba_uses_transparency(&rgba(&[1.0; 64])));
        assert!(!rgba_uses_transparency(&rgba(&[0.98; 64])));
    }

    #[test]
    fn single_translucent_value_is_detected() {
        let mut alphas = vec![1.0; 64];
        alphas[17] = 0.97;
        assert!(rgba_uses_transparency(&rgba(&alphas)));
    }

    #[test]
    fn buffer_without_alpha_plane() {
        assert!(!rgba_uses_transparency(&[0.0, 0.0, 0.0]));
        assert!(!rgba_uses_transparency(&[]));
    }

    #[test]
    fn sampling_strides_over_large_buffers() {
        // 4000 pixels -> stride 4; index 2 is never sampled.
        let mut alphas = vec![1.0; 4000];
        alphas[2] = 0.0;
        assert!(!rgba_uses_transparency(&rgba(&alphas)));
        alphas[4] = 0.0;
        assert!(rgba_uses_transparency(&rgba(&alphas)));
    }

    #[test]
    fn rgb_image_is_opaque() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        assert!(!uses_transparency("rgb", &img));
    }

    #[test]
    fn rgba_image_with_holes() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([9, 9, 9, 0])));
        assert!(uses_transparency("holes", &img));
    }

    #[test]
    fn eight_bit_alpha_is_normalized_before_the_threshold() {
        let opaque = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 250])));
        assert!(!uses_transparency("nearly", &opaque));
        let translucent =
            DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([1, 2, 3, 249])));
        assert!(uses_transparency("translucent", &translucent));
    }

    #[test]
    fn image_sampling_uses_the_buffer_stride() {
        // 100x40 = 4000 pixels -> stride 4; pixel 2 is skipped, pixel 4 is read.
        let mut img = RgbaImage::from_pixel(100, 40, Rgba([0, 0, 0, 255]));
        img.put_pixel(2, 0, Rgba([0, 0, 0, 0]));
        assert!(!uses_transparency("skipped", &DynamicImage::ImageRgba8(img.clone())));
        img.put_pixel(4, 0, Rgba([0, 0, 0, 0]));
        assert!(uses_transparency("sampled", &DynamicImage::ImageRgba8(img)));
    }

    #[test]
    fn sixteen_bit_alpha_is_sampled() {
        let img = image::ImageBuffer::from_pixel(4, 4, Rgba([0u16, 0, 0, 1000]));
        assert!(uses_transparency("deep", &DynamicImage::ImageRgba16(img)));
    }

    #[test]
    fn undecodable_data_is_treated_as_opaque() {
        assert!(!encoded_uses_transparency("broken", b"\x89PNG garbage"));
    }
}
