use std::path::PathBuf;

/// Default edge length of the square texture target.
pub const DEFAULT_TARGET_RESOLUTION: u32 = 512;

/// Default quality for lossy (JPEG) encoding.
pub const DEFAULT_LOSSY_QUALITY: u8 = 80;

/// Output encoding policy for every texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FormatPolicy {
    /// Pick per texture from its name and alpha usage.
    #[default]
    Auto,
    /// Always lossless (PNG).
    #[value(alias = "png")]
    Lossless,
    /// Always lossy (JPEG).
    #[value(alias = "jpeg", alias = "jpg")]
    Lossy,
}

/// Settings for one batch run.
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub target_resolution: u32,
    pub skip_existing: bool,
    pub format_policy: FormatPolicy,
    pub lossy_quality: u8,
    /// Keep `.gltf` inputs in the separated form instead of converting to `.glb`.
    pub preserve_format: bool,
    pub remove_specular: bool,
    /// Prefer lossy encoding whenever no transparency is sampled.
    pub aggressive_conversion: bool,
    /// Re-save lossy textures even when neither size nor format changes.
    pub force_recompression: bool,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("models"),
            output_dir: PathBuf::from("models-optimized"),
            target_resolution: DEFAULT_TARGET_RESOLUTION,
            skip_existing: true,
            format_policy: FormatPolicy::Auto,
            lossy_quality: DEFAULT_LOSSY_QUALITY,
            preserve_format: false,
            remove_specular: true,
            aggressive_conversion: true,
            force_recompression: true,
        }
    }
}

impl OptimizerConfig {
    /// Lossy quality clamped to the valid 1..=100 range.
    pub fn quality(&self) -> u8 {
        self.lossy_quality.clamp(1, 100)
    }

    pub(crate) fn log_banner(&self) {
        log::info!("Starting GLTF/GLB/VRM Bulk Optimizer");
        log::info!("Input directory: {}", self.input_dir.display());
        log::info!("Output directory: {}", self.output_dir.display());
        log::info!("Target resolution: {0}x{0}", self.target_resolution);
        log::info!("Texture format: {:?}", self.format_policy);
        if self.remove_specular {
            log::info!("Specular removal: ENABLED");
        }
        if self.aggressive_conversion {
            log::info!("Aggressive JPEG conversion: ENABLED");
        }
        if self.force_recompression {
            log::info!("Force compression: ENABLED");
        }
        if self.format_policy != FormatPolicy::Lossless {
            log::info!("JPEG quality: {}%", self.quality());
        }
    }
}
