use std::path::PathBuf;

use crate::processor::AssetState;
use crate::scene::{LinkId, NodeId};

/// Errors raised by the image primitives.
#[derive(Debug, thiserror::Error)]
pub enum ImageError {
    #[error("image codec error: {0}")]
    Codec(#[from] image::ImageError),

    #[error("resize error: {0}")]
    Resize(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The texture carries no encoded bytes to decode or embed.
    #[error("texture '{0}' has no image data")]
    EmptyPayload(String),
}

impl From<fast_image_resize::ResizeError> for ImageError {
    fn from(e: fast_image_resize::ResizeError) -> Self {
        ImageError::Resize(e.to_string())
    }
}

impl From<fast_image_resize::ImageBufferError> for ImageError {
    fn from(e: fast_image_resize::ImageBufferError) -> Self {
        ImageError::Resize(e.to_string())
    }
}

/// Errors raised while mutating a shading graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node {0:?} is not part of the graph")]
    NodeNotFound(NodeId),

    #[error("link {0:?} is not part of the graph")]
    LinkNotFound(LinkId),
}

/// Errors raised by the host import/export collaborator.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("glTF error: {0}")]
    Gltf(#[from] gltf::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("buffer {index} could not be loaded: {message}")]
    Buffer { index: usize, message: String },

    #[error("unsupported data URI: {0}")]
    DataUri(String),

    /// Export was requested for a scene that was not imported by this host.
    #[error("scene has no source document to export")]
    NoDocument,

    #[error("could not move output into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// Errors that abort processing of a single asset.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("unrecognized asset type: {}", .0.display())]
    Unrecognized(PathBuf),

    #[error("failed to import {} (strict and degraded): {source}", path.display())]
    Import {
        path: PathBuf,
        #[source]
        source: HostError,
    },

    #[error("failed to export {} after {stage:?}: {source}", path.display())]
    Export {
        path: PathBuf,
        stage: AssetState,
        #[source]
        source: HostError,
    },
}

/// Errors fatal to a whole batch run.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("input directory does not exist: {}", .0.display())]
    MissingInputDir(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
