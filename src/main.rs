use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::{Builder, Env};
use gltf_bulk_opt::config::{DEFAULT_LOSSY_QUALITY, DEFAULT_TARGET_RESOLUTION};
use gltf_bulk_opt::prelude::*;

#[derive(Parser)]
#[command(name = "gltf-bulk-opt")]
#[command(about = "Shrink the textures of every .glb/.gltf/.vrm file in a directory", long_about = None)]
#[command(version)]
struct Cli {
    /// Directory scanned for .glb, .gltf and .vrm files
    #[arg(default_value = "models")]
    input: PathBuf,

    /// Directory the optimized files are written to
    #[arg(default_value = "models-optimized")]
    output: PathBuf,

    /// Edge length of the square texture target
    #[arg(short = 'r', long, default_value_t = DEFAULT_TARGET_RESOLUTION)]
    target_resolution: u32,

    /// Reprocess files whose output already exists
    #[arg(long)]
    no_skip_existing: bool,

    /// Texture encoding policy
    #[arg(short, long, value_enum, default_value_t = FormatPolicy::Auto)]
    format: FormatPolicy,

    /// JPEG quality (1-100)
    #[arg(long, default_value_t = DEFAULT_LOSSY_QUALITY)]
    quality: u8,

    /// Keep .gltf inputs as .gltf + .bin instead of converting to .glb
    #[arg(long)]
    preserve_format: bool,

    /// Leave specular tint and specular inputs untouched
    #[arg(long)]
    keep_specular: bool,

    /// Only use JPEG for textures named like color maps
    #[arg(long)]
    no_aggressive: bool,

    /// Do not re-save JPEG textures that need no resize
    #[arg(long)]
    no_force_recompression: bool,

    /// Log per-texture decisions
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show errors
    #[arg(short, long)]
    quiet: bool,
}

impl Cli {
    fn config(&self) -> OptimizerConfig {
        OptimizerConfig {
            input_dir: self.input.clone(),
            output_dir: self.output.clone(),
            target_resolution: self.target_resolution,
            skip_existing: !self.no_skip_existing,
            format_policy: self.format,
            lossy_quality: self.quality,
            preserve_format: self.preserve_format,
            remove_specular: !self.keep_specular,
            aggressive_conversion: !self.no_aggressive,
            force_recompression: !self.no_force_recompression,
        }
    }

    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    Builder::from_env(Env::default().default_filter_or(cli.log_level()))
        .format(|buf, record| {
            let level = match record.level() {
                log::Level::Warn => "WARNING".to_string(),
                level => level.to_string(),
            };
            writeln!(buf, "[{level}] {}", record.args())
        })
        .init();

    let mut processor = AssetProcessor::new(GltfHost, RasterBackend, cli.config());
    let stats = run(&mut processor).context("batch run failed")?;
    if stats.errors > 0 {
        log::warn!("{} file(s) failed", stats.errors);
    }
    Ok(())
}
