/// Asset classification and output naming.
pub mod classify;

/// Alpha usage sampling.
pub mod alpha;

/// Per-texture encoding decisions.
pub mod decision;

/// Specular tint removal from material graphs.
pub mod sanitize;

/// Resize and re-encode of a single texture.
pub mod transform;

/// Decode, resize and encode primitives.
pub mod imaging;

/// Scene, material graph and texture model.
pub mod scene;

/// Import/export collaborator trait.
pub mod host;

/// glTF, GLB and VRM host.
pub mod container;

/// Per-asset state machine.
pub mod processor;

/// Directory batch runs.
pub mod batch;

/// Run settings.
pub mod config;

/// Error types.
pub mod error;

pub use batch::{RunStats, run};
pub use config::{FormatPolicy, OptimizerConfig};
pub use container::GltfHost;
pub use error::{BatchError, GraphError, HostError, ImageError, ProcessError};
pub use imaging::RasterBackend;
pub use processor::{AssetProcessor, AssetReport, AssetState};

pub mod prelude {
    pub use crate::batch::{RunStats, run};
    pub use crate::classify::{AssetKind, ExportFormat};
    pub use crate::config::{FormatPolicy, OptimizerConfig};
    pub use crate::container::GltfHost;
    pub use crate::host::{Host, ImportMode};
    pub use crate::imaging::{ImageBackend, RasterBackend};
    pub use crate::processor::{AssetProcessor, AssetReport, AssetState};
    pub use crate::scene::Scene;
}
