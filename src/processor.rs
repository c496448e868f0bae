//! Per-file driver: reset, import, sanitize, process textures, export.

use std::path::Path;

use crate::classify::{self, AssetKind};
use crate::config::OptimizerConfig;
use crate::decision::{self, DecisionPolicy, is_specular_tint};
use crate::error::ProcessError;
use crate::host::{Host, ImportMode};
use crate::imaging::ImageBackend;
use crate::sanitize::{SanitizeReport, sanitize_material};
use crate::scene::{NodeKind, Scene, TextureId};
use crate::transform::{TextureOutcome, TransformSettings, transform_texture};

/// Stage an asset reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetState {
    Cleared,
    Imported,
    Sanitized,
    TexturesProcessed,
    Exported,
    Failed,
}

/// Summary of one successfully exported asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetReport {
    pub kind: AssetKind,
    pub state: AssetState,
    /// Whether the strict import failed and the degraded one was used.
    pub degraded_import: bool,
    pub sanitize: SanitizeReport,
    pub textures_processed: usize,
    pub materials_with_textures: usize,
    pub texture_failures: usize,
}

/// Runs the optimisation pass over one asset at a time.
///
/// Owns the [`Scene`]; it is reset at the start of every asset.
pub struct AssetProcessor<H, B> {
    host: H,
    backend: B,
    config: OptimizerConfig,
    scene: Scene,
    state: AssetState,
}

impl<H: Host, B: ImageBackend> AssetProcessor<H, B> {
    pub fn new(host: H, backend: B, config: OptimizerConfig) -> Self {
        Self {
            host,
            backend,
            config,
            scene: Scene::default(),
            state: AssetState::Cleared,
        }
    }

    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Scene left behind by the last asset.
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Stage reached by the last asset.
    pub fn state(&self) -> AssetState {
        self.state
    }

    /// Optimise `input` and write the result to `output`.
    pub fn process(&mut self, input: &Path, output: &Path) -> Result<AssetReport, ProcessError> {
        log::info!(
            "Processing: {}",
            input.file_name().unwrap_or(input.as_os_str()).to_string_lossy()
        );

        self.scene.reset();
        self.advance(AssetState::Cleared);

        let result = self.run(input, output);
        if result.is_err() {
            self.advance(AssetState::Failed);
        }
        result
    }

    fn run(&mut self, input: &Path, output: &Path) -> Result<AssetReport, ProcessError> {
        let kind =
            classify::classify(input).ok_or_else(|| ProcessError::Unrecognized(input.to_path_buf()))?;

        let degraded_import = self.import(input, kind)?;
        self.advance(AssetState::Imported);

        let sanitize = if self.config.remove_specular {
            self.sanitize_materials()
        } else {
            SanitizeReport::default()
        };
        self.advance(AssetState::Sanitized);

        let (textures_processed, materials_with_textures, texture_failures) =
            self.process_textures();
        log::info!(
            "Processed {textures_processed} textures across {materials_with_textures} materials"
        );
        self.advance(AssetState::TexturesProcessed);

        let format = classify::export_format(kind, output, self.config.preserve_format);
        if let Err(source) = self.host.export(&self.scene, output, format) {
            log::error!("Error exporting file '{}': {source}", output.display());
            return Err(ProcessError::Export {
                path: output.to_path_buf(),
                stage: self.state,
                source,
            });
        }
        self.advance(AssetState::Exported);
        log::info!(
            "Successfully exported: {}",
            output.file_name().unwrap_or(output.as_os_str()).to_string_lossy()
        );

        Ok(AssetReport {
            kind,
            state: self.state,
            degraded_import,
            sanitize,
            textures_processed,
            materials_with_textures,
            texture_failures,
        })
    }

    fn advance(&mut self, to: AssetState) {
        log::trace!("{:?} -> {to:?}", self.state);
        self.state = to;
    }

    /// Import strictly, retrying once in degraded mode. Returns whether the
    /// degraded mode was needed.
    fn import(&mut self, input: &Path, kind: AssetKind) -> Result<bool, ProcessError> {
        match self
            .host
            .import(input, kind, ImportMode::Strict, &mut self.scene)
        {
            Ok(()) => {
                log::debug!("Imported {kind:?} file: {}", input.display());
                Ok(false)
            }
            Err(first) => {
                log::error!("Error importing file '{}': {first}", input.display());
                log::warn!("Retrying import without animation and skeleton data");
                self.scene.reset();
                match self
                    .host
                    .import(input, kind, ImportMode::Degraded, &mut self.scene)
                {
                    Ok(()) => {
                        log::info!("Imported {} without animations", input.display());
                        Ok(true)
                    }
                    Err(source) => {
                        log::error!("Failed to import even without animations: {source}");
                        self.scene.reset();
                        Err(ProcessError::Import {
                            path: input.to_path_buf(),
                            source,
                        })
                    }
                }
            }
        }
    }

    fn sanitize_materials(&mut self) -> SanitizeReport {
        let Scene {
            materials,
            textures,
            ..
        } = &mut self.scene;

        let mut total = SanitizeReport::default();
        for material in materials.iter_mut().filter(|m| m.in_use()) {
            let report = sanitize_material(material, textures);
            total.tint_textures_removed += report.tint_textures_removed;
            total.reflection_nodes_removed += report.reflection_nodes_removed;
            total.links_removed += report.links_removed;
            total.inputs_reset += report.inputs_reset;
            total.failures += report.failures;
        }
        total
    }

    /// Textures referenced by image nodes of in-use materials, grouped per material.
    fn texture_work(&self) -> Vec<Vec<TextureId>> {
        self.scene
            .materials
            .iter()
            .filter(|m| m.in_use())
            .filter_map(|m| m.graph())
            .map(|graph| {
                graph
                    .nodes()
                    .iter()
                    .filter_map(|node| match node.kind {
                        NodeKind::ImageTexture { texture: Some(id) } => {
                            let image_name = self
                                .scene
                                .texture(id)
                                .map(|t| t.name.as_str())
                                .unwrap_or_default();
                            if is_specular_tint(image_name) || is_specular_tint(&node.name) {
                                log::debug!(
                                    "Skipping specular tint texture that should have been removed: {image_name}"
                                );
                                None
                            } else {
                                Some(id)
                            }
                        }
                        _ => None,
                    })
                    .collect()
            })
            .collect()
    }

    fn process_textures(&mut self) -> (usize, usize, usize) {
        let policy = DecisionPolicy::from(&self.config);
        let settings = TransformSettings {
            target_resolution: self.config.target_resolution,
            force_recompression: self.config.force_recompression,
        };

        let mut processed = 0;
        let mut materials = 0;
        let mut failures = 0;

        for ids in self.texture_work() {
            let mut count = 0;
            for id in ids {
                if self.scene.is_processed(id) {
                    continue;
                }
                let Some(texture) = self.scene.texture(id) else {
                    continue;
                };
                let name = texture.name.clone();

                let image = match self.backend.decode(&texture.data) {
                    Ok(image) => Some(image),
                    Err(e) => {
                        log::warn!("Could not decode '{name}': {e}");
                        None
                    }
                };
                let decision = decision::decision(&name, image.as_ref(), &policy);
                log::debug!("'{name}' -> {:?}", decision.encoding);

                match transform_texture(
                    &mut self.scene,
                    id,
                    image,
                    decision,
                    &settings,
                    &self.backend,
                ) {
                    Ok(TextureOutcome::AlreadyProcessed) => {}
                    Ok(TextureOutcome::Transformed { .. }) => count += 1,
                    Err(e) => {
                        log::warn!("Error processing texture '{name}': {e}");
                        failures += 1;
                    }
                }
            }
            if count > 0 {
                materials += 1;
                processed += count;
            }
        }

        (processed, materials, failures)
    }
}
