use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use gltf::json;
use image::ImageFormat;
use serde_json::Value;

use super::{
    GltfDocument, KHR_MATERIALS_ANISOTROPY, KHR_MATERIALS_SPECULAR,
    KHR_MATERIALS_SPECULAR_GLOSSINESS, TextureSlot, material_extension,
};
use crate::classify::AssetKind;
use crate::error::HostError;
use crate::host::ImportMode;
use crate::scene::{
    InputKind, Material, NodeKind, Principled, Scene, Shading, ShaderGraph, SocketValue, Texture,
    TextureId,
};

/// Parse `path` and load every buffer it references.
pub(super) fn load(path: &Path, kind: AssetKind, mode: ImportMode) -> Result<GltfDocument, HostError> {
    let bytes = fs::read(path)?;
    let gltf = match mode {
        ImportMode::Strict => gltf::Gltf::from_slice(&bytes)?,
        ImportMode::Degraded => gltf::Gltf::from_slice_without_validation(&bytes)?,
    };

    let gltf::Gltf { document, blob } = gltf;
    let mut root = document.into_json();
    if mode == ImportMode::Degraded {
        strip_animation_data(&mut root);
    }

    if kind == AssetKind::Avatar && !is_avatar(&root) {
        log::warn!(
            "{} has no VRM extension; exporting it as an avatar anyway",
            path.display()
        );
    }

    let base_dir = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let buffers = load_buffers(&root, blob, &base_dir)?;

    Ok(GltfDocument {
        root,
        buffers,
        base_dir,
    })
}

fn is_avatar(root: &json::Root) -> bool {
    root.extensions_used
        .iter()
        .any(|ext| ext == "VRM" || ext == "VRMC_vrm")
}

/// Drop animations, and skins whose references do not resolve.
fn strip_animation_data(root: &mut json::Root) {
    if !root.animations.is_empty() {
        log::warn!(
            "Dropping {} animation(s) to import without animation data",
            root.animations.len()
        );
        root.animations.clear();
    }

    let node_count = root.nodes.len();
    let accessor_count = root.accessors.len();
    let skin_count = root.skins.len();
    let broken_skin = root.skins.iter().any(|skin| {
        skin.joints.iter().any(|j| j.value() >= node_count)
            || skin.skeleton.is_some_and(|s| s.value() >= node_count)
            || skin
                .inverse_bind_matrices
                .is_some_and(|a| a.value() >= accessor_count)
    });
    let dangling_node = root
        .nodes
        .iter()
        .any(|n| n.skin.is_some_and(|s| s.value() >= skin_count));

    if broken_skin || dangling_node {
        log::warn!("Dropping malformed skeleton data ({skin_count} skin(s))");
        root.skins.clear();
        for node in &mut root.nodes {
            node.skin = None;
        }
    }
}

fn load_buffers(
    root: &json::Root,
    mut blob: Option<Vec<u8>>,
    base_dir: &Path,
) -> Result<Vec<Vec<u8>>, HostError> {
    let mut buffer_data = Vec::with_capacity(root.buffers.len());
    for (index, buffer) in root.buffers.iter().enumerate() {
        let data = match buffer.uri.as_deref() {
            None => blob.take().ok_or_else(|| HostError::Buffer {
                index,
                message: "GLB binary chunk is missing".to_string(),
            })?,
            Some(uri) if uri.starts_with("data:") => decode_data_uri(uri)?,
            Some(uri) => fs::read(base_dir.join(uri)).map_err(|e| HostError::Buffer {
                index,
                message: format!("{uri}: {e}"),
            })?,
        };
        buffer_data.push(data);
    }
    Ok(buffer_data)
}

pub(super) fn decode_data_uri(uri: &str) -> Result<Vec<u8>, HostError> {
    let Some((_, payload)) = uri.split_once(";base64,") else {
        let head: String = uri.chars().take(40).collect();
        return Err(HostError::DataUri(head));
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .map_err(|e| HostError::DataUri(e.to_string()))
}

/// Fill `scene` from `document` and keep the document for export.
pub(super) fn populate(scene: &mut Scene, document: GltfDocument) {
    let root = &document.root;

    for (index, image) in root.images.iter().enumerate() {
        let texture = read_texture(index, image, &document);
        scene.add_texture(texture);
    }

    let mut users = vec![0u32; root.materials.len()];
    for primitive in root.meshes.iter().flat_map(|m| m.primitives.iter()) {
        if let Some(slot) = primitive.material.and_then(|m| users.get_mut(m.value())) {
            *slot += 1;
        }
    }

    for (index, material) in root.materials.iter().enumerate() {
        scene.materials.push(Material {
            name: material
                .name
                .clone()
                .unwrap_or_else(|| format!("material_{index}")),
            users: users[index],
            shading: Shading::Graph(material_graph(material, root)),
        });
    }

    log::debug!(
        "Imported {} material(s) and {} image(s)",
        scene.materials.len(),
        scene.textures.len()
    );
    scene.document = Some(document);
}

fn read_texture(index: usize, image: &json::Image, document: &GltfDocument) -> Texture {
    let name = image
        .name
        .clone()
        .or_else(|| {
            image
                .uri
                .as_deref()
                .filter(|uri| !uri.starts_with("data:"))
                .and_then(|uri| Path::new(uri).file_stem())
                .map(|stem| stem.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| format!("image_{index}"));

    let (data, embedded, uri) = match (image.buffer_view, image.uri.as_deref()) {
        (Some(view), _) => {
            let data = document.view_bytes(view.value()).map(<[u8]>::to_vec);
            if data.is_none() {
                log::warn!("Image '{name}' points at an unreadable buffer view");
            }
            (data.unwrap_or_default(), true, None)
        }
        (None, Some(uri)) if uri.starts_with("data:") => {
            let data = decode_data_uri(uri).unwrap_or_else(|e| {
                log::warn!("Image '{name}' has an unreadable data URI: {e}");
                Vec::new()
            });
            (data, true, None)
        }
        (None, Some(uri)) => {
            let data = fs::read(document.base_dir.join(uri)).unwrap_or_else(|e| {
                log::warn!("Could not read external image '{uri}': {e}");
                Vec::new()
            });
            (data, false, Some(uri.to_string()))
        }
        (None, None) => (Vec::new(), true, None),
    };

    let mut texture = Texture::new(name, data);
    texture.embedded = embedded;
    texture.uri = uri;
    if texture.format.is_none() {
        texture.format = image
            .mime_type
            .as_ref()
            .and_then(|mime| ImageFormat::from_mime_type(&mime.0));
    }
    texture
}

fn color3(value: &Value) -> Option<[f32; 3]> {
    let items = value.as_array()?;
    match items.as_slice() {
        [r, g, b] => Some([r.as_f64()? as f32, g.as_f64()? as f32, b.as_f64()? as f32]),
        _ => None,
    }
}

/// Express a glTF material as a principled shading graph.
fn material_graph(material: &json::Material, root: &json::Root) -> ShaderGraph {
    let mut graph = ShaderGraph::default();
    let pbr = &material.pbr_metallic_roughness;

    let specular = material_extension(material, KHR_MATERIALS_SPECULAR);
    let specular_factor = specular
        .and_then(|ext| ext.get("specularFactor"))
        .and_then(Value::as_f64)
        .unwrap_or(1.0) as f32;
    let [sr, sg, sb] = specular
        .and_then(|ext| ext.get("specularColorFactor"))
        .and_then(color3)
        .unwrap_or([1.0; 3]);
    let [er, eg, eb] = material.emissive_factor.0;

    let bsdf = Principled::default()
        .with(InputKind::BaseColor, SocketValue::Color(pbr.base_color_factor.0))
        .with(InputKind::Metallic, SocketValue::Scalar(pbr.metallic_factor.0))
        .with(InputKind::Roughness, SocketValue::Scalar(pbr.roughness_factor.0))
        .with(InputKind::Emission, SocketValue::Color([er, eg, eb, 1.0]))
        .with(InputKind::SpecularIorLevel, SocketValue::Scalar(specular_factor))
        .with(InputKind::SpecularTint, SocketValue::Color([sr, sg, sb, 1.0]));
    let shader = graph.add_node("Principled BSDF", NodeKind::Principled(bsdf));

    for slot in TextureSlot::ALL {
        let Some(texture_index) = slot.texture_index(material) else {
            continue;
        };
        let texture = root
            .textures
            .get(texture_index)
            .map(|t| TextureId(t.source.value()));
        let node = graph.add_node(slot.node_name(), NodeKind::ImageTexture { texture });
        for input in slot.inputs() {
            graph.link(node, shader, *input);
        }
    }

    if material_extension(material, KHR_MATERIALS_SPECULAR_GLOSSINESS).is_some() {
        graph.add_node("Specular Glossiness", NodeKind::Glossy);
    }
    if material_extension(material, KHR_MATERIALS_ANISOTROPY).is_some() {
        graph.add_node("Anisotropy", NodeKind::Anisotropic);
    }

    graph
}
