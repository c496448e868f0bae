//! In-memory scene for one asset: materials with their shading graphs and the
//! textures they sample.
//!
//! A [`Scene`] is owned by the asset processor and is reset before every
//! asset, so nothing imported for one file is visible while processing the
//! next.

use std::collections::HashSet;

use image::ImageFormat;

use crate::container::GltfDocument;
use crate::error::{GraphError, ImageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkId(pub u32);

/// A decoded-on-demand image referenced by shading nodes.
#[derive(Debug, Clone)]
pub struct Texture {
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// Declared encoding of `data`. `None` for formats the backend cannot read.
    pub format: Option<ImageFormat>,
    /// Stored inside the container rather than next to it.
    pub embedded: bool,
    /// Relative location for textures that live outside the container.
    pub uri: Option<String>,
    /// Encoded image bytes.
    pub data: Vec<u8>,
}

impl Texture {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        let format = image::guess_format(&data).ok();
        let (width, height) = imagesize::blob_size(&data)
            .map(|size| (size.width as u32, size.height as u32))
            .unwrap_or((0, 0));
        Self {
            name: name.into(),
            width,
            height,
            format,
            embedded: true,
            uri: None,
            data,
        }
    }

    /// Store the current bytes inside the container again.
    pub fn pack(&mut self) -> Result<(), ImageError> {
        if self.data.is_empty() {
            return Err(ImageError::EmptyPayload(self.name.clone()));
        }
        self.embedded = true;
        self.uri = None;
        Ok(())
    }

    /// Point the texture at an external file carrying `extension`, keeping the
    /// directory and stem of the previous location when there is one.
    pub fn retarget_uri(&mut self, extension: &str) {
        let base = self
            .uri
            .as_deref()
            .map(|uri| match uri.rfind('.') {
                Some(dot) if !uri[dot..].contains('/') => uri[..dot].to_string(),
                _ => uri.to_string(),
            })
            .unwrap_or_else(|| sanitize_file_stem(&self.name));
        self.uri = Some(format!("{base}.{extension}"));
    }

    pub fn mime_type(&self) -> Option<&'static str> {
        self.format.map(|format| match format {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            other => other.to_mime_type(),
        })
    }

    pub fn extension(&self) -> &'static str {
        self.format
            .and_then(|format| format.extensions_str().first().copied())
            .unwrap_or("bin")
    }
}

fn sanitize_file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect();
    if stem.is_empty() { "texture".to_string() } else { stem }
}

/// Inputs of a principled shading node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    BaseColor,
    Metallic,
    Roughness,
    Normal,
    Occlusion,
    Emission,
    Alpha,
    Specular,
    SpecularIorLevel,
    SpecularTint,
}

impl InputKind {
    pub const SPECULAR: [InputKind; 3] = [
        InputKind::Specular,
        InputKind::SpecularIorLevel,
        InputKind::SpecularTint,
    ];

    pub fn is_specular(self) -> bool {
        Self::SPECULAR.contains(&self)
    }
}

/// Default value of an unlinked input socket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SocketValue {
    Scalar(f32),
    Color([f32; 4]),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Principled {
    inputs: Vec<(InputKind, SocketValue)>,
}

impl Principled {
    pub fn with(mut self, kind: InputKind, value: SocketValue) -> Self {
        self.set(kind, value);
        self
    }

    pub fn input(&self, kind: InputKind) -> Option<SocketValue> {
        self.inputs
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, v)| *v)
    }

    pub fn set(&mut self, kind: InputKind, value: SocketValue) {
        match self.inputs.iter_mut().find(|(k, _)| *k == kind) {
            Some(slot) => slot.1 = value,
            None => self.inputs.push((kind, value)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    ImageTexture { texture: Option<TextureId> },
    Principled(Principled),
    Glossy,
    Anisotropic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
}

/// Connection from a node's output into an input of another node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub id: LinkId,
    pub from: NodeId,
    pub to: NodeId,
    pub input: InputKind,
}

#[derive(Debug, Clone, Default)]
pub struct ShaderGraph {
    nodes: Vec<Node>,
    links: Vec<Link>,
    next_id: u32,
}

impl ShaderGraph {
    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> NodeId {
        let id = NodeId(self.bump());
        self.nodes.push(Node {
            id,
            name: name.into(),
            kind,
        });
        id
    }

    pub fn link(&mut self, from: NodeId, to: NodeId, input: InputKind) -> LinkId {
        let id = LinkId(self.bump());
        self.links.push(Link {
            id,
            from,
            to,
            input,
        });
        id
    }

    fn bump(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    pub fn outgoing(&self, node: NodeId) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |l| l.from == node)
    }

    pub fn incoming(&self, node: NodeId, input: InputKind) -> impl Iterator<Item = &Link> {
        self.links
            .iter()
            .filter(move |l| l.to == node && l.input == input)
    }

    /// Whether any link feeds `input` on any node.
    pub fn is_input_linked(&self, input: InputKind) -> bool {
        self.links.iter().any(|l| l.input == input)
    }

    pub fn remove_link(&mut self, id: LinkId) -> Result<(), GraphError> {
        let pos = self
            .links
            .iter()
            .position(|l| l.id == id)
            .ok_or(GraphError::LinkNotFound(id))?;
        self.links.remove(pos);
        Ok(())
    }

    /// Remove a node together with any link still attached to it.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let pos = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or(GraphError::NodeNotFound(id))?;
        self.nodes.remove(pos);
        self.links.retain(|l| l.from != id && l.to != id);
        Ok(())
    }
}

/// Specular properties of a material without a shading graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatSpecular {
    pub intensity: f32,
    pub color: [f32; 3],
}

#[derive(Debug, Clone)]
pub enum Shading {
    Graph(ShaderGraph),
    Flat(FlatSpecular),
}

#[derive(Debug, Clone)]
pub struct Material {
    pub name: String,
    /// Number of mesh primitives using this material.
    pub users: u32,
    pub shading: Shading,
}

impl Material {
    pub fn in_use(&self) -> bool {
        self.users > 0
    }

    pub fn graph(&self) -> Option<&ShaderGraph> {
        match &self.shading {
            Shading::Graph(graph) => Some(graph),
            Shading::Flat(_) => None,
        }
    }
}

/// Everything resident for the asset currently being processed.
#[derive(Debug, Default)]
pub struct Scene {
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    processed: HashSet<TextureId>,
    pub(crate) document: Option<GltfDocument>,
}

impl Scene {
    /// Drop every material, texture and processed marker.
    pub fn reset(&mut self) {
        self.materials.clear();
        self.textures.clear();
        self.processed.clear();
        self.document = None;
        log::debug!("Scene cleared successfully");
    }

    pub fn is_empty(&self) -> bool {
        self.materials.is_empty() && self.textures.is_empty() && self.document.is_none()
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.push(texture);
        TextureId(self.textures.len() - 1)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0)
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.textures.get_mut(id.0)
    }

    pub fn is_processed(&self, id: TextureId) -> bool {
        self.processed.contains(&id)
    }

    pub fn mark_processed(&mut self, id: TextureId) {
        self.processed.insert(id);
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }
}
