//! Downscaling and re-encoding of a single texture.

use image::{DynamicImage, GenericImageView, ImageFormat};

use crate::config::DEFAULT_LOSSY_QUALITY;
use crate::decision::{Decision, Encoding};
use crate::error::ImageError;
use crate::imaging::ImageBackend;
use crate::scene::{Scene, TextureId};

/// Settings shared by every texture of a run.
#[derive(Debug, Clone, Copy)]
pub struct TransformSettings {
    /// Edge of the square every oversized texture is scaled to.
    pub target_resolution: u32,
    pub force_recompression: bool,
}

/// What happened to one texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureOutcome {
    /// Marked processed earlier in this scene; nothing was done.
    AlreadyProcessed,
    Transformed {
        resized: bool,
        reencoded: bool,
        /// `Some(false)` when re-embedding was needed and failed.
        reembedded: Option<bool>,
    },
}

/// Resize and re-encode texture `id` according to `decision`.
///
/// `image` is the already decoded texture when the caller has it. The
/// texture is marked processed whatever the outcome, so a texture shared by
/// several materials is only attempted once per scene.
pub fn transform_texture<B: ImageBackend + ?Sized>(
    scene: &mut Scene,
    id: TextureId,
    image: Option<DynamicImage>,
    decision: Decision,
    settings: &TransformSettings,
    backend: &B,
) -> Result<TextureOutcome, ImageError> {
    if scene.is_processed(id) {
        return Ok(TextureOutcome::AlreadyProcessed);
    }
    scene.mark_processed(id);

    let Some(texture) = scene.texture_mut(id) else {
        return Err(ImageError::EmptyPayload(format!("#{}", id.0)));
    };
    if texture.data.is_empty() {
        return Err(ImageError::EmptyPayload(texture.name.clone()));
    }

    let was_embedded = texture.embedded;
    let mut image = match image {
        Some(image) => image,
        None => backend.decode(&texture.data)?,
    };

    let target = settings.target_resolution;
    let (width, height) = image.dimensions();
    let resized = width > target || height > target;
    if resized {
        log::debug!(
            "Resizing '{}' from {width}x{height} to {target}x{target}",
            texture.name
        );
        image = backend.resize(&image, target, target)?;
    } else {
        log::debug!(
            "Image '{}' already at or below target resolution ({width}x{height})",
            texture.name
        );
    }

    let reencoded = match decision.encoding {
        Encoding::Lossy => {
            let needs_save = resized
                || settings.force_recompression
                || texture.format != Some(ImageFormat::Jpeg);
            if needs_save {
                let quality = decision.quality.unwrap_or(DEFAULT_LOSSY_QUALITY);
                log::debug!(
                    "Converting '{}' to JPEG format (quality: {quality}%)",
                    texture.name
                );
                let reloaded = backend.save_and_reload(&image, quality)?;
                image = reloaded.image;
                texture.data = reloaded.bytes;
                texture.format = Some(ImageFormat::Jpeg);
                // The texture now references the saved file until packed again.
                texture.embedded = false;
                texture.retarget_uri("jpg");
            }
            needs_save
        }
        Encoding::Lossless => {
            let retag = texture.format != Some(ImageFormat::Png);
            if resized || retag {
                texture.data = backend.encode_lossless(&image)?;
                texture.format = Some(ImageFormat::Png);
                if !texture.embedded {
                    texture.retarget_uri("png");
                }
            }
            log::debug!("Keeping '{}' as PNG format", texture.name);
            resized || retag
        }
    };

    let (width, height) = image.dimensions();
    texture.width = width;
    texture.height = height;

    let reembedded = if was_embedded && !texture.embedded {
        match texture.pack() {
            Ok(()) => {
                log::debug!("Re-packed texture '{}' for embedding", texture.name);
                Some(true)
            }
            Err(e) => {
                log::warn!("Could not re-pack texture '{}': {e}", texture.name);
                Some(false)
            }
        }
    } else {
        None
    };

    Ok(TextureOutcome::Transformed {
        resized,
        reencoded,
        reembedded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::{RasterBackend, png_bytes};
    use crate::scene::Texture;
    use image::{Rgba, RgbaImage};

    fn settings() -> TransformSettings {
        TransformSettings {
            target_resolution: 32,
            force_recompression: true,
        }
    }

    fn lossy() -> Decision {
        Decision {
            encoding: Encoding::Lossy,
            quality: Some(80),
        }
    }

    fn lossless() -> Decision {
        Decision {
            encoding: Encoding::Lossless,
            quality: None,
        }
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 100, 50, 255]));
        png_bytes(&DynamicImage::ImageRgba8(img)).unwrap()
    }

    fn scene_with(data: Vec<u8>) -> (Scene, TextureId) {
        let mut scene = Scene::default();
        let id = scene.add_texture(Texture::new("body_diffuse", data));
        (scene, id)
    }

    #[test]
    fn oversized_texture_becomes_exact_target_square() {
        let (mut scene, id) = scene_with(png(128, 64));
        let outcome =
            transform_texture(&mut scene, id, None, lossy(), &settings(), &RasterBackend).unwrap();
        assert_eq!(
            outcome,
            TextureOutcome::Transformed {
                resized: true,
                reencoded: true,
                reembedded: Some(true),
            }
        );
        let tex = scene.texture(id).unwrap();
        assert_eq!((tex.width, tex.height), (32, 32));
        assert_eq!(tex.format, Some(ImageFormat::Jpeg));
        assert!(tex.embedded);
        assert_eq!(image::guess_format(&tex.data).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn small_lossless_png_is_untouched() {
        let data = png(16, 8);
        let (mut scene, id) = scene_with(data.clone());
        let outcome =
            transform_texture(&mut scene, id, None, lossless(), &settings(), &RasterBackend)
                .unwrap();
        assert_eq!(
            outcome,
            TextureOutcome::Transformed {
                resized: false,
                reencoded: false,
                reembedded: None,
            }
        );
        let tex = scene.texture(id).unwrap();
        assert_eq!(tex.data, data);
        assert_eq!((tex.width, tex.height), (16, 8));
    }

    #[test]
    fn second_call_is_a_no_op() {
        let (mut scene, id) = scene_with(png(64, 64));
        transform_texture(&mut scene, id, None, lossy(), &settings(), &RasterBackend).unwrap();
        let after_first = scene.texture(id).unwrap().data.clone();
        let outcome =
            transform_texture(&mut scene, id, None, lossless(), &settings(), &RasterBackend)
                .unwrap();
        assert_eq!(outcome, TextureOutcome::AlreadyProcessed);
        assert_eq!(scene.texture(id).unwrap().data, after_first);
    }

    #[test]
    fn jpeg_is_not_resaved_without_force() {
        let (mut scene, id) = scene_with(png(8, 8));
        transform_texture(&mut scene, id, None, lossy(), &settings(), &RasterBackend).unwrap();
        let jpeg = scene.texture(id).unwrap().data.clone();

        let (mut scene, id) = scene_with(jpeg.clone());
        let relaxed = TransformSettings {
            force_recompression: false,
            ..settings()
        };
        let outcome =
            transform_texture(&mut scene, id, None, lossy(), &relaxed, &RasterBackend).unwrap();
        assert!(matches!(
            outcome,
            TextureOutcome::Transformed {
                reencoded: false,
                ..
            }
        ));
        assert_eq!(scene.texture(id).unwrap().data, jpeg);
    }

    #[test]
    fn external_texture_stays_external() {
        let (mut scene, id) = scene_with(png(64, 64));
        {
            let tex = scene.texture_mut(id).unwrap();
            tex.embedded = false;
            tex.uri = Some("textures/body_diffuse.png".into());
        }
        let outcome =
            transform_texture(&mut scene, id, None, lossy(), &settings(), &RasterBackend).unwrap();
        assert!(matches!(
            outcome,
            TextureOutcome::Transformed {
                reembedded: None,
                ..
            }
        ));
        let tex = scene.texture(id).unwrap();
        assert!(!tex.embedded);
        assert_eq!(tex.uri.as_deref(), Some("textures/body_diffuse.jpg"));
    }

    #[test]
    fn undecodable_texture_fails_but_is_marked() {
        let (mut scene, id) = scene_with(b"definitely not an image".to_vec());
        assert!(
            transform_texture(&mut scene, id, None, lossy(), &settings(), &RasterBackend).is_err()
        );
        assert!(scene.is_processed(id));
    }
}
