//! Removal of specular tint and specular response from material graphs.

use crate::decision::is_specular_tint;
use crate::scene::{
    FlatSpecular, InputKind, LinkId, Material, NodeId, NodeKind, Shading, ShaderGraph,
    SocketValue, Texture,
};

/// What one sanitizer pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub tint_textures_removed: usize,
    pub reflection_nodes_removed: usize,
    pub links_removed: usize,
    pub inputs_reset: usize,
    /// Removals that failed and were skipped.
    pub failures: usize,
}

/// Value a specular input is reset to: identity for tint, neutral otherwise.
fn reset_value(input: InputKind, current: SocketValue) -> SocketValue {
    match (input, current) {
        (InputKind::SpecularTint, SocketValue::Scalar(_)) => SocketValue::Scalar(1.0),
        (InputKind::SpecularTint, SocketValue::Color(_)) => SocketValue::Color([1.0; 4]),
        (_, SocketValue::Scalar(_)) => SocketValue::Scalar(0.0),
        (_, SocketValue::Color(_)) => SocketValue::Color([0.0, 0.0, 0.0, 1.0]),
    }
}

/// Strip specular tint from `material` in place.
///
/// `textures` resolves the images referenced by texture nodes.
pub fn sanitize_material(material: &mut Material, textures: &[Texture]) -> SanitizeReport {
    let name = material.name.clone();
    match &mut material.shading {
        Shading::Flat(flat) => {
            *flat = FlatSpecular {
                intensity: 0.0,
                color: [0.0; 3],
            };
            log::debug!("Set specular properties to 0 on non-node material: {name}");
            SanitizeReport {
                inputs_reset: 2,
                ..Default::default()
            }
        }
        Shading::Graph(graph) => sanitize_graph(&name, graph, textures),
    }
}

fn sanitize_graph(material: &str, graph: &mut ShaderGraph, textures: &[Texture]) -> SanitizeReport {
    let mut report = SanitizeReport::default();
    let mut links_to_remove: Vec<LinkId> = Vec::new();
    let mut nodes_to_remove: Vec<NodeId> = Vec::new();
    let mut principled_nodes: Vec<NodeId> = Vec::new();

    for node in graph.nodes() {
        match &node.kind {
            NodeKind::ImageTexture {
                texture: Some(texture),
            } => {
                let image_name = textures
                    .get(texture.0)
                    .map(|t| t.name.as_str())
                    .unwrap_or_default();
                if is_specular_tint(image_name) || is_specular_tint(&node.name) {
                    log::debug!(
                        "Removing specular tint texture: {image_name} (node: {})",
                        node.name
                    );
                    links_to_remove.extend(graph.outgoing(node.id).map(|l| l.id));
                    nodes_to_remove.push(node.id);
                    report.tint_textures_removed += 1;
                }
            }
            NodeKind::ImageTexture { texture: None } => {}
            NodeKind::Principled(_) => principled_nodes.push(node.id),
            NodeKind::Glossy | NodeKind::Anisotropic => {
                log::debug!(
                    "Found specular node '{}' in material {material} - marking for removal",
                    node.name
                );
                nodes_to_remove.push(node.id);
                report.reflection_nodes_removed += 1;
            }
        }
    }

    for id in principled_nodes {
        for input in InputKind::SPECULAR {
            let incoming: Vec<LinkId> = graph.incoming(id, input).map(|l| l.id).collect();
            for link in incoming {
                if !links_to_remove.contains(&link) {
                    links_to_remove.push(link);
                }
            }

            let Some(node) = graph.node_mut(id) else {
                continue;
            };
            let NodeKind::Principled(bsdf) = &mut node.kind else {
                continue;
            };
            if let Some(current) = bsdf.input(input) {
                let value = reset_value(input, current);
                bsdf.set(input, value);
                report.inputs_reset += 1;
                log::debug!("Set {input:?} to {value:?} on material: {material}");
            }
        }
    }

    // Links go first so no removal leaves a link pointing at a missing node.
    for link in links_to_remove {
        match graph.remove_link(link) {
            Ok(()) => report.links_removed += 1,
            Err(e) => {
                log::warn!("Could not remove link from material '{material}': {e}");
                report.failures += 1;
            }
        }
    }

    for node in nodes_to_remove {
        match graph.remove_node(node) {
            Ok(()) => log::debug!("Removed node {node:?} from material '{material}'"),
            Err(e) => {
                log::warn!("Could not remove node from material '{material}': {e}");
                report.failures += 1;
            }
        }
    }

    report
}
