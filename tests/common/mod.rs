#![allow(dead_code)]

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use gltf::json;
use gltf_bulk_opt::classify::{AssetKind, ExportFormat};
use gltf_bulk_opt::error::HostError;
use gltf_bulk_opt::host::{Host, ImportMode};
use gltf_bulk_opt::scene::{
    InputKind, Material, NodeKind, Principled, Scene, Shading, ShaderGraph, SocketValue, Texture,
};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use serde_json::{Value, json};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

/// Opaque RGB PNG.
pub fn rgb_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([180, 120, 60]));
    encode(&DynamicImage::ImageRgb8(img), ImageFormat::Png)
}

/// RGBA PNG with constant alpha.
pub fn rgba_png(width: u32, height: u32, alpha: u8) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([40, 90, 200, alpha]));
    encode(&DynamicImage::ImageRgba8(img), ImageFormat::Png)
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([90, 90, 90]));
    encode(&DynamicImage::ImageRgb8(img), ImageFormat::Jpeg)
}

/// Builds small but valid glTF documents with embedded images.
pub struct AssetBuilder {
    bin: Vec<u8>,
    doc: Value,
}

impl AssetBuilder {
    pub fn new() -> Self {
        let mut builder = Self {
            bin: Vec::new(),
            doc: json!({
                "asset": { "version": "2.0", "generator": "gltf_bulk_opt tests" },
                "scene": 0,
                "scenes": [ { "nodes": [0] } ],
                "nodes": [ { "mesh": 0 } ],
                "meshes": [ { "primitives": [ { "attributes": { "POSITION": 0 } } ] } ],
                "accessors": [],
                "bufferViews": [],
                "buffers": [],
                "images": [],
                "textures": [],
                "materials": []
            }),
        };
        let view = builder.push_view(&[0u8; 36]);
        builder.array("accessors").push(json!({
            "bufferView": view,
            "componentType": 5126,
            "count": 3,
            "type": "VEC3",
            "min": [0.0, 0.0, 0.0],
            "max": [0.0, 0.0, 0.0]
        }));
        builder
    }

    fn array(&mut self, key: &str) -> &mut Vec<Value> {
        self.doc[key].as_array_mut().unwrap()
    }

    fn push_view(&mut self, data: &[u8]) -> usize {
        let offset = self.bin.len();
        self.bin.extend_from_slice(data);
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let views = self.array("bufferViews");
        views.push(json!({ "buffer": 0, "byteOffset": offset, "byteLength": data.len() }));
        views.len() - 1
    }

    /// Embed `data` as a named image; returns the texture index.
    pub fn image(&mut self, name: &str, data: &[u8], mime: &str) -> usize {
        let view = self.push_view(data);
        let images = self.array("images");
        images.push(json!({ "name": name, "bufferView": view, "mimeType": mime }));
        let source = images.len() - 1;
        let textures = self.array("textures");
        textures.push(json!({ "source": source }));
        textures.len() - 1
    }

    /// Reference an image file next to the asset; returns the texture index.
    pub fn external_image(&mut self, uri: &str) -> usize {
        let images = self.array("images");
        images.push(json!({ "uri": uri }));
        let source = images.len() - 1;
        let textures = self.array("textures");
        textures.push(json!({ "source": source }));
        textures.len() - 1
    }

    /// Add a material used by one primitive; returns its index.
    pub fn material(&mut self, material: Value) -> usize {
        let index = self.unused_material(material);
        self.doc["meshes"][0]["primitives"]
            .as_array_mut()
            .unwrap()
            .push(json!({ "attributes": { "POSITION": 0 }, "material": index }));
        index
    }

    pub fn unused_material(&mut self, material: Value) -> usize {
        let materials = self.array("materials");
        materials.push(material);
        materials.len() - 1
    }

    pub fn extension_used(&mut self, name: &str) -> &mut Self {
        let used = self
            .doc
            .as_object_mut()
            .unwrap()
            .entry("extensionsUsed")
            .or_insert_with(|| json!([]));
        used.as_array_mut().unwrap().push(json!(name));
        self
    }

    /// Overwrite one field of buffer view `index`.
    pub fn patch_view(&mut self, index: usize, key: &str, value: Value) -> &mut Self {
        self.doc["bufferViews"][index][key] = value;
        self
    }

    pub fn set(&mut self, key: &str, value: Value) -> &mut Self {
        self.doc[key] = value;
        self
    }

    pub fn root(&self, buffer_uri: Option<&str>) -> json::Root {
        let mut doc = self.doc.clone();
        let mut buffer = json!({ "byteLength": self.bin.len() });
        if let Some(uri) = buffer_uri {
            buffer["uri"] = json!(uri);
        }
        doc["buffers"] = json!([buffer]);
        serde_json::from_value(doc).unwrap()
    }

    pub fn glb(&self) -> Vec<u8> {
        let json_bytes = serde_json::to_vec(&self.root(None)).unwrap();
        let glb = gltf::binary::Glb {
            header: gltf::binary::Header {
                magic: *b"glTF",
                version: 2,
                length: (json_bytes.len() + self.bin.len()) as u32,
            },
            json: Cow::Owned(json_bytes),
            bin: Some(Cow::Borrowed(&self.bin)),
        };
        let mut bytes = Vec::new();
        glb.to_writer(&mut bytes).unwrap();
        bytes
    }

    pub fn write_glb(&self, path: &Path) {
        fs::write(path, self.glb()).unwrap();
    }

    /// Write `<dir>/<stem>.gltf` with its buffer in `<dir>/<stem>.bin`.
    pub fn write_gltf(&self, dir: &Path, stem: &str) -> PathBuf {
        let bin_name = format!("{stem}.bin");
        fs::write(dir.join(&bin_name), &self.bin).unwrap();
        let path = dir.join(format!("{stem}.gltf"));
        let json_bytes = serde_json::to_vec_pretty(&self.root(Some(&bin_name))).unwrap();
        fs::write(&path, json_bytes).unwrap();
        path
    }
}

/// Parse a written GLB and return its document plus binary chunk.
pub fn read_glb(path: &Path) -> (json::Root, Vec<u8>) {
    let bytes = fs::read(path).unwrap();
    let gltf = gltf::Gltf::from_slice(&bytes).unwrap();
    let blob = gltf.blob.clone().unwrap_or_default();
    (gltf.document.into_json(), blob)
}

/// Bytes of the image at `index` inside a parsed GLB.
pub fn image_bytes(root: &json::Root, blob: &[u8], index: usize) -> Vec<u8> {
    let view_index = root.images[index].buffer_view.unwrap().value();
    let view = &root.buffer_views[view_index];
    let offset = view.byte_offset.map(|o| o.0 as usize).unwrap_or(0);
    let length = view.byte_length.0 as usize;
    blob[offset..offset + length].to_vec()
}

/// Principled material with `textures` linked to their inputs.
pub fn graph_material(name: &str, textures: &[(&str, usize, InputKind)]) -> Material {
    let mut graph = ShaderGraph::default();
    let bsdf = Principled::default()
        .with(InputKind::SpecularIorLevel, SocketValue::Scalar(0.5))
        .with(InputKind::SpecularTint, SocketValue::Color([0.8, 0.7, 0.6, 1.0]));
    let shader = graph.add_node("Principled BSDF", NodeKind::Principled(bsdf));
    for (node_name, texture, input) in textures {
        let node = graph.add_node(
            *node_name,
            NodeKind::ImageTexture {
                texture: Some(gltf_bulk_opt::scene::TextureId(*texture)),
            },
        );
        graph.link(node, shader, *input);
    }
    Material {
        name: name.to_string(),
        users: 1,
        shading: Shading::Graph(graph),
    }
}

/// Scene content a [`MockHost`] hands out for one path.
#[derive(Clone, Default)]
pub struct Fixture {
    pub textures: Vec<(String, Vec<u8>)>,
    pub materials: Vec<Material>,
}

/// In-memory host: imports fixtures by file name and records exports.
#[derive(Default)]
pub struct MockHost {
    pub fixtures: HashMap<String, Fixture>,
    pub strict_failures: HashSet<String>,
    pub degraded_failures: HashSet<String>,
    pub export_failures: HashSet<String>,
    pub imports: Vec<(String, ImportMode)>,
    /// File name, format and texture snapshot of every export.
    pub exports: Vec<(String, ExportFormat, Vec<Texture>)>,
    /// Scene emptiness seen at the start of every import.
    pub clean_on_import: Vec<bool>,
}

fn file_name(path: &Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

impl Host for MockHost {
    fn import(
        &mut self,
        path: &Path,
        _kind: AssetKind,
        mode: ImportMode,
        scene: &mut Scene,
    ) -> Result<(), HostError> {
        let name = file_name(path);
        self.clean_on_import.push(scene.is_empty());
        self.imports.push((name.clone(), mode));

        let failing = match mode {
            ImportMode::Strict => &self.strict_failures,
            ImportMode::Degraded => &self.degraded_failures,
        };
        if failing.contains(&name) {
            return Err(HostError::DataUri(format!("{name}: malformed")));
        }

        let fixture = self.fixtures.get(&name).cloned().unwrap_or_default();
        for (texture_name, data) in fixture.textures {
            scene.add_texture(Texture::new(texture_name, data));
        }
        scene.materials.extend(fixture.materials);
        Ok(())
    }

    fn export(
        &mut self,
        scene: &Scene,
        path: &Path,
        format: ExportFormat,
    ) -> Result<(), HostError> {
        let name = file_name(path);
        if self.export_failures.contains(&name) {
            return Err(HostError::NoDocument);
        }
        let size: usize = scene.textures.iter().map(|t| t.data.len()).sum();
        fs::write(path, vec![0u8; size.max(1)])?;
        self.exports.push((name, format, scene.textures.clone()));
        Ok(())
    }
}
