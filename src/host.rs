use std::path::Path;

use crate::classify::{AssetKind, ExportFormat};
use crate::error::HostError;
use crate::scene::Scene;

/// How strictly an asset is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMode {
    Strict,
    /// Tolerates malformed animation and skeleton data by dropping it.
    Degraded,
}

/// Reads assets into a [`Scene`] and writes them back out.
pub trait Host {
    /// Populate `scene`, which the caller has already reset.
    fn import(
        &mut self,
        path: &Path,
        kind: AssetKind,
        mode: ImportMode,
        scene: &mut Scene,
    ) -> Result<(), HostError>;

    fn export(&mut self, scene: &Scene, path: &Path, format: ExportFormat)
    -> Result<(), HostError>;
}
