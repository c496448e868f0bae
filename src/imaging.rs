use std::io::{Cursor, Write};

use image::{
    DynamicImage, ImageEncoder, ImageFormat,
    codecs::{jpeg::JpegEncoder, png::PngEncoder},
};

use crate::error::ImageError;

/// Result of writing an image out lossily and reading it back.
pub struct Reloaded {
    pub image: DynamicImage,
    /// The bytes as they were written, ready to embed.
    pub bytes: Vec<u8>,
}

/// Image primitives the transform pipeline relies on.
pub trait ImageBackend {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, ImageError>;

    fn resize(&self, img: &DynamicImage, width: u32, height: u32)
    -> Result<DynamicImage, ImageError>;

    fn encode_lossless(&self, img: &DynamicImage) -> Result<Vec<u8>, ImageError>;

    /// Save `img` lossily at `quality` to an external file and load it back,
    /// so the in-memory pixels carry the same artifacts as the exported bytes.
    fn save_and_reload(&self, img: &DynamicImage, quality: u8) -> Result<Reloaded, ImageError>;
}

/// `image` codecs with `fast_image_resize` scaling.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterBackend;

impl ImageBackend for RasterBackend {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, ImageError> {
        Ok(image::load_from_memory(data)?)
    }

    fn resize(
        &self,
        img: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, ImageError> {
        let src_img = fast_image_resize::images::Image::from_vec_u8(
            img.width(),
            img.height(),
            img.to_rgba8().into_raw(),
            fast_image_resize::PixelType::U8x4,
        )?;

        let mut dst_img =
            fast_image_resize::images::Image::new(width, height, fast_image_resize::PixelType::U8x4);

        let mut resizer = fast_image_resize::Resizer::new();
        resizer.resize(&src_img, &mut dst_img, None)?;

        let rgba = image::RgbaImage::from_raw(width, height, dst_img.buffer().to_vec())
            .ok_or_else(|| ImageError::Resize(format!("buffer does not fit {width}x{height}")))?;

        // Opaque sources stay without an alpha plane.
        let resized = DynamicImage::ImageRgba8(rgba);
        Ok(if img.color().has_alpha() {
            resized
        } else {
            DynamicImage::ImageRgb8(resized.to_rgb8())
        })
    }

    fn encode_lossless(&self, img: &DynamicImage) -> Result<Vec<u8>, ImageError> {
        png_bytes(img)
    }

    fn save_and_reload(&self, img: &DynamicImage, quality: u8) -> Result<Reloaded, ImageError> {
        let mut file = tempfile::Builder::new()
            .prefix("gltf_bulk_opt_")
            .suffix(".jpg")
            .tempfile()?;
        write_jpeg(img, quality, &mut file)?;
        file.flush()?;

        let bytes = std::fs::read(file.path())?;
        let image = image::load_from_memory_with_format(&bytes, ImageFormat::Jpeg)?;
        Ok(Reloaded { image, bytes })
    }
}

fn write_jpeg<W: Write>(img: &DynamicImage, quality: u8, mut buf: W) -> Result<(), ImageError> {
    // JPEG has no alpha plane.
    let rgb = img.to_rgb8();
    JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100)).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(())
}

fn write_png<W: Write>(img: &DynamicImage, mut buf: W) -> Result<(), ImageError> {
    let img = match img {
        DynamicImage::ImageLuma8(_)
        | DynamicImage::ImageLumaA8(_)
        | DynamicImage::ImageRgb8(_)
        | DynamicImage::ImageRgba8(_) => img.clone(),
        other if other.color().has_alpha() => DynamicImage::ImageRgba8(other.to_rgba8()),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };

    PngEncoder::new(&mut buf).write_image(
        img.as_bytes(),
        img.width(),
        img.height(),
        img.color().into(),
    )?;
    Ok(())
}

/// Encode `img` as PNG into memory.
pub fn png_bytes(img: &DynamicImage) -> Result<Vec<u8>, ImageError> {
    let mut buf = Cursor::new(Vec::new());
    write_png(img, &mut buf)?;
    Ok(buf.into_inner())
}
