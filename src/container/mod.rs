//! glTF / GLB / VRM host backed by the `gltf` crate.
//!
//! The original JSON document is kept alongside the scene so that export can
//! rewrite it in place: image, texture, material and buffer view indices never
//! move, which keeps avatar extensions that refer to them by index valid.

mod export;
mod import;

use std::path::{Path, PathBuf};

use gltf::json;
use serde_json::Value;

use crate::classify::{AssetKind, ExportFormat};
use crate::error::HostError;
use crate::host::{Host, ImportMode};
use crate::scene::{InputKind, Scene};

pub(crate) const KHR_MATERIALS_SPECULAR: &str = "KHR_materials_specular";
pub(crate) const KHR_MATERIALS_SPECULAR_GLOSSINESS: &str = "KHR_materials_pbrSpecularGlossiness";
pub(crate) const KHR_MATERIALS_ANISOTROPY: &str = "KHR_materials_anisotropy";

/// Parsed source of the asset currently in the scene.
#[derive(Debug, Clone)]
pub struct GltfDocument {
    pub(crate) root: json::Root,
    /// Loaded bytes of every buffer, indexed like `root.buffers`.
    pub(crate) buffers: Vec<Vec<u8>>,
    pub(crate) base_dir: PathBuf,
}

impl GltfDocument {
    pub fn root(&self) -> &json::Root {
        &self.root
    }

    /// Bytes covered by buffer view `index`.
    pub(crate) fn view_bytes(&self, index: usize) -> Option<&[u8]> {
        let view = self.root.buffer_views.get(index)?;
        let buffer = self.buffers.get(view.buffer.value())?;
        let offset = match view.byte_offset {
            Some(o) => usize::try_from(o.0).ok()?,
            None => 0,
        };
        let length = usize::try_from(view.byte_length.0).ok()?;
        let end = offset.checked_add(length)?;
        buffer.get(offset..end)
    }
}

/// Host that reads and writes `.glb`, `.gltf` and `.vrm` files.
#[derive(Debug, Default, Clone, Copy)]
pub struct GltfHost;

impl Host for GltfHost {
    fn import(
        &mut self,
        path: &Path,
        kind: AssetKind,
        mode: ImportMode,
        scene: &mut Scene,
    ) -> Result<(), HostError> {
        let document = import::load(path, kind, mode)?;
        import::populate(scene, document);
        Ok(())
    }

    fn export(
        &mut self,
        scene: &Scene,
        path: &Path,
        format: ExportFormat,
    ) -> Result<(), HostError> {
        export::write(scene, path, format)
    }
}

/// Material texture references mapped onto principled inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TextureSlot {
    BaseColor,
    MetallicRoughness,
    Normal,
    Occlusion,
    Emissive,
    Specular,
    SpecularColor,
}

impl TextureSlot {
    pub(crate) const ALL: [TextureSlot; 7] = [
        TextureSlot::BaseColor,
        TextureSlot::MetallicRoughness,
        TextureSlot::Normal,
        TextureSlot::Occlusion,
        TextureSlot::Emissive,
        TextureSlot::Specular,
        TextureSlot::SpecularColor,
    ];

    pub(crate) fn node_name(self) -> &'static str {
        match self {
            TextureSlot::BaseColor => "Base Color Texture",
            TextureSlot::MetallicRoughness => "Metallic Roughness Texture",
            TextureSlot::Normal => "Normal Map Texture",
            TextureSlot::Occlusion => "Occlusion Texture",
            TextureSlot::Emissive => "Emissive Texture",
            TextureSlot::Specular => "Specular Texture",
            TextureSlot::SpecularColor => "Specular Color Texture",
        }
    }

    pub(crate) fn inputs(self) -> &'static [InputKind] {
        match self {
            TextureSlot::BaseColor => &[InputKind::BaseColor],
            TextureSlot::MetallicRoughness => &[InputKind::Metallic, InputKind::Roughness],
            TextureSlot::Normal => &[InputKind::Normal],
            TextureSlot::Occlusion => &[InputKind::Occlusion],
            TextureSlot::Emissive => &[InputKind::Emission],
            TextureSlot::Specular => &[InputKind::SpecularIorLevel],
            TextureSlot::SpecularColor => &[InputKind::SpecularTint],
        }
    }

    fn extension_key(self) -> Option<&'static str> {
        match self {
            TextureSlot::Specular => Some("specularTexture"),
            TextureSlot::SpecularColor => Some("specularColorTexture"),
            _ => None,
        }
    }

    /// Index into `root.textures` referenced by this slot.
    pub(crate) fn texture_index(self, material: &json::Material) -> Option<usize> {
        let pbr = &material.pbr_metallic_roughness;
        match self {
            TextureSlot::BaseColor => pbr.base_color_texture.as_ref().map(|i| i.index.value()),
            TextureSlot::MetallicRoughness => pbr
                .metallic_roughness_texture
                .as_ref()
                .map(|i| i.index.value()),
            TextureSlot::Normal => material.normal_texture.as_ref().map(|t| t.index.value()),
            TextureSlot::Occlusion => material.occlusion_texture.as_ref().map(|t| t.index.value()),
            TextureSlot::Emissive => material.emissive_texture.as_ref().map(|i| i.index.value()),
            TextureSlot::Specular | TextureSlot::SpecularColor => {
                let key = self.extension_key()?;
                let index = material_extension(material, KHR_MATERIALS_SPECULAR)?
                    .get(key)?
                    .get("index")?
                    .as_u64()?;
                Some(index as usize)
            }
        }
    }

    /// Drop the reference from `material`.
    pub(crate) fn clear(self, material: &mut json::Material) {
        match self {
            TextureSlot::BaseColor => material.pbr_metallic_roughness.base_color_texture = None,
            TextureSlot::MetallicRoughness => {
                material.pbr_metallic_roughness.metallic_roughness_texture = None
            }
            TextureSlot::Normal => material.normal_texture = None,
            TextureSlot::Occlusion => material.occlusion_texture = None,
            TextureSlot::Emissive => material.emissive_texture = None,
            TextureSlot::Specular | TextureSlot::SpecularColor => {
                let Some(key) = self.extension_key() else {
                    return;
                };
                if let Some(Value::Object(ext)) =
                    material_extension_mut(material, KHR_MATERIALS_SPECULAR)
                {
                    ext.remove(key);
                }
            }
        }
    }
}

pub(crate) fn material_extension<'a>(material: &'a json::Material, name: &str) -> Option<&'a Value> {
    material.extensions.as_ref()?.others.get(name)
}

pub(crate) fn material_extension_mut<'a>(
    material: &'a mut json::Material,
    name: &str,
) -> Option<&'a mut Value> {
    material.extensions.as_mut()?.others.get_mut(name)
}

pub(crate) fn remove_material_extension(material: &mut json::Material, name: &str) -> bool {
    let Some(extensions) = material.extensions.as_mut() else {
        return false;
    };
    extensions.others.remove(name).is_some()
}

pub(crate) fn set_material_extension(material: &mut json::Material, name: &str, value: Value) {
    material
        .extensions
        .get_or_insert_with(Default::default)
        .others
        .insert(name.to_string(), value);
}
