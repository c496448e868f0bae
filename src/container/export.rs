use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::{Component, Path};

use gltf::json::{self, Index, image::MimeType};
use serde_json::{Map, Value, json};
use tempfile::NamedTempFile;

use super::{
    KHR_MATERIALS_ANISOTROPY, KHR_MATERIALS_SPECULAR, KHR_MATERIALS_SPECULAR_GLOSSINESS,
    TextureSlot, material_extension, material_extension_mut, remove_material_extension,
    set_material_extension,
};
use crate::classify::ExportFormat;
use crate::error::HostError;
use crate::scene::{InputKind, Material, NodeKind, Scene, SocketValue, Texture};

/// Write `scene` to `path` in `format`.
///
/// Every file lands through a temporary sibling that is renamed into place;
/// for the separated form the `.gltf` document is moved last.
pub(super) fn write(scene: &Scene, path: &Path, format: ExportFormat) -> Result<(), HostError> {
    let document = scene.document.as_ref().ok_or(HostError::NoDocument)?;
    let mut root = document.root.clone();

    let out_dir = output_dir(path);
    fs::create_dir_all(out_dir)?;

    for (json_material, material) in root.materials.iter_mut().zip(&scene.materials) {
        apply_material(json_material, material);
    }
    sync_extension_lists(&mut root);

    let mut views = Vec::with_capacity(root.buffer_views.len());
    for index in 0..root.buffer_views.len() {
        let bytes = document
            .view_bytes(index)
            .ok_or_else(|| HostError::Buffer {
                index: root.buffer_views[index].buffer.value(),
                message: format!("buffer view {index} is out of range"),
            })?;
        views.push(bytes.to_vec());
    }

    let pack_all = format != ExportFormat::Separated;
    store_textures(&mut root, &mut views, &scene.textures, out_dir, pack_all)?;
    let blob = pack_views(&mut root, views);

    match format {
        ExportFormat::Binary | ExportFormat::Avatar => write_glb(&root, blob, path),
        ExportFormat::Separated => write_separated(&mut root, blob, path),
    }
}

fn output_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

fn scalar(value: Option<SocketValue>) -> Option<f32> {
    match value? {
        SocketValue::Scalar(s) => Some(s),
        SocketValue::Color([r, ..]) => Some(r),
    }
}

fn rgb(value: Option<SocketValue>) -> Option<[f32; 3]> {
    match value? {
        SocketValue::Scalar(s) => Some([s; 3]),
        SocketValue::Color([r, g, b, _]) => Some([r, g, b]),
    }
}

/// Mirror the shading graph of `material` back into its JSON form.
fn apply_material(json_material: &mut json::Material, material: &Material) {
    let Some(graph) = material.graph() else {
        return;
    };

    for slot in TextureSlot::ALL {
        let linked = slot.inputs().iter().any(|i| graph.is_input_linked(*i));
        if slot.texture_index(json_material).is_some() && !linked {
            log::debug!(
                "Dropping {} from material '{}'",
                slot.node_name(),
                material.name
            );
            slot.clear(json_material);
        }
    }

    let bsdf = graph.nodes().iter().find_map(|n| match &n.kind {
        NodeKind::Principled(p) => Some(p),
        _ => None,
    });
    if let Some(bsdf) = bsdf {
        let factor = scalar(bsdf.input(InputKind::SpecularIorLevel)).unwrap_or(1.0);
        let color = rgb(bsdf.input(InputKind::SpecularTint)).unwrap_or([1.0; 3]);
        write_specular(json_material, factor, color);
    }

    let has = |kind: &NodeKind| graph.nodes().iter().any(|n| &n.kind == kind);
    if !has(&NodeKind::Glossy) {
        remove_material_extension(json_material, KHR_MATERIALS_SPECULAR_GLOSSINESS);
    }
    if !has(&NodeKind::Anisotropic) {
        remove_material_extension(json_material, KHR_MATERIALS_ANISOTROPY);
    }
}

fn write_specular(material: &mut json::Material, factor: f32, color: [f32; 3]) {
    let mut ext = match material_extension_mut(material, KHR_MATERIALS_SPECULAR) {
        Some(Value::Object(map)) => std::mem::take(map),
        _ => Map::new(),
    };

    if factor == 1.0 {
        ext.remove("specularFactor");
    } else {
        ext.insert("specularFactor".to_string(), json!(factor));
    }
    if color == [1.0; 3] {
        ext.remove("specularColorFactor");
    } else {
        ext.insert("specularColorFactor".to_string(), json!(color));
    }

    if ext.is_empty() {
        remove_material_extension(material, KHR_MATERIALS_SPECULAR);
    } else {
        set_material_extension(material, KHR_MATERIALS_SPECULAR, Value::Object(ext));
    }
}

/// Keep `extensionsUsed`/`extensionsRequired` in line with the materials.
fn sync_extension_lists(root: &mut json::Root) {
    for name in [
        KHR_MATERIALS_SPECULAR,
        KHR_MATERIALS_SPECULAR_GLOSSINESS,
        KHR_MATERIALS_ANISOTROPY,
    ] {
        let used = root
            .materials
            .iter()
            .any(|m| material_extension(m, name).is_some());
        if used {
            if !root.extensions_used.iter().any(|e| e == name) {
                root.extensions_used.push(name.to_string());
            }
        } else {
            root.extensions_used.retain(|e| e != name);
            root.extensions_required.retain(|e| e != name);
        }
    }
}

/// Relative location for an external texture that stays inside `out_dir`.
fn contained_uri(texture: &Texture) -> String {
    let fallback = || format!("{}.{}", texture.name, texture.extension());
    let uri = texture.uri.clone().unwrap_or_else(fallback);
    let path = Path::new(&uri);
    let escapes = path
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(fallback)
    } else {
        uri
    }
}

/// Put texture bytes into buffer views, or into sibling files for external
/// textures unless `pack_all` asks for a self-contained binary.
fn store_textures(
    root: &mut json::Root,
    views: &mut Vec<Vec<u8>>,
    textures: &[Texture],
    out_dir: &Path,
    pack_all: bool,
) -> Result<(), HostError> {
    for (index, texture) in textures.iter().enumerate().take(root.images.len()) {
        if texture.data.is_empty() {
            log::warn!(
                "Image '{}' has no data; leaving its reference untouched",
                texture.name
            );
            continue;
        }

        if texture.embedded || pack_all {
            let existing = root.images[index]
                .buffer_view
                .map(|v| v.value())
                .filter(|v| *v < views.len());
            let view_index = match existing {
                Some(v) => {
                    views[v] = texture.data.clone();
                    Index::new(v as u32)
                }
                None => {
                    views.push(texture.data.clone());
                    add_view(root, texture.data.len())
                }
            };
            let image = &mut root.images[index];
            image.buffer_view = Some(view_index);
            image.uri = None;
            image.mime_type = texture.mime_type().map(|m| MimeType(m.to_string()));
        } else {
            let uri = contained_uri(texture);
            let target = out_dir.join(&uri);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            persist(&target, |file| Ok(file.write_all(&texture.data)?))?;
            log::debug!("Wrote external texture {}", target.display());

            let image = &mut root.images[index];
            image.buffer_view = None;
            image.uri = Some(uri);
            image.mime_type = texture.mime_type().map(|m| MimeType(m.to_string()));
        }
    }
    Ok(())
}

fn add_view(root: &mut json::Root, length: usize) -> Index<json::buffer::View> {
    let view = json::buffer::View {
        buffer: Index::<json::buffer::Buffer>::new(0),
        byte_length: length.into(),
        byte_offset: None,
        byte_stride: None,
        name: None,
        target: None,
        extensions: None,
        extras: Default::default(),
    };
    root.push(view)
}

fn pad_to_4bytes(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

/// Lay every view out back to back in a single buffer.
fn pack_views(root: &mut json::Root, views: Vec<Vec<u8>>) -> Vec<u8> {
    let mut blob: Vec<u8> = Vec::new();
    for (view, data) in root.buffer_views.iter_mut().zip(views) {
        let offset = blob.len();
        blob.extend_from_slice(&data);
        pad_to_4bytes(&mut blob);

        view.buffer = Index::new(0);
        view.byte_offset = if offset == 0 {
            None
        } else {
            Some(offset.into())
        };
        view.byte_length = data.len().into();
    }

    let name = root.buffers.first().and_then(|b| b.name.clone());
    root.buffers.clear();
    if !blob.is_empty() {
        root.buffers.push(json::Buffer {
            byte_length: blob.len().into(),
            name,
            uri: None,
            extensions: None,
            extras: Default::default(),
        });
    }
    blob
}

fn persist<F>(path: &Path, write: F) -> Result<(), HostError>
where
    F: FnOnce(&mut NamedTempFile) -> Result<(), HostError>,
{
    let mut file = NamedTempFile::new_in(output_dir(path))?;
    write(&mut file)?;
    file.flush()?;
    file.persist(path)?;
    Ok(())
}

fn write_glb(root: &json::Root, blob: Vec<u8>, path: &Path) -> Result<(), HostError> {
    let json_bytes = serde_json::to_vec(root)?;

    let glb = gltf::binary::Glb {
        header: gltf::binary::Header {
            magic: *b"glTF",
            version: 2,
            length: (json_bytes.len() + blob.len()) as u32,
        },
        json: Cow::Owned(json_bytes),
        bin: if blob.is_empty() {
            None
        } else {
            Some(Cow::Owned(blob))
        },
    };

    persist(path, |file| Ok(glb.to_writer(file)?))
}

fn write_separated(root: &mut json::Root, blob: Vec<u8>, path: &Path) -> Result<(), HostError> {
    if let Some(buffer) = root.buffers.first_mut() {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scene".to_string());
        let bin_name = format!("{stem}.bin");
        persist(&output_dir(path).join(&bin_name), |file| {
            Ok(file.write_all(&blob)?)
        })?;
        buffer.uri = Some(bin_name);
    }

    let json_bytes = serde_json::to_vec_pretty(root)?;
    persist(path, |file| Ok(file.write_all(&json_bytes)?))
}
