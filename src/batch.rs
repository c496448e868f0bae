//! Directory walk, skip policy and run summary.

use std::fs;
use std::path::{Path, PathBuf};

use crate::classify;
use crate::error::BatchError;
use crate::host::Host;
use crate::imaging::ImageBackend;
use crate::processor::AssetProcessor;

const MEGABYTE: f64 = 1024.0 * 1024.0;

/// Counters for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub found: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Input bytes of successfully processed files.
    ///
    /// A `.gltf` counts together with its `<stem>.bin`; external images
    /// referenced by URI are not counted on either side.
    pub bytes_before: u64,
    /// Output bytes of successfully processed files, measured like `bytes_before`.
    pub bytes_after: u64,
}

impl RunStats {
    /// Aggregate size reduction over processed files.
    pub fn reduction(&self) -> f64 {
        reduction_percent(self.bytes_before, self.bytes_after)
    }
}

/// `(before - after) / before * 100`, or 0 when `before` is 0.
pub fn reduction_percent(before: u64, after: u64) -> f64 {
    if before == 0 {
        return 0.0;
    }
    (before as f64 - after as f64) / before as f64 * 100.0
}

/// Recognized assets directly inside `dir`, sorted by path.
pub fn discover(dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && classify::classify(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Optimise every asset in the configured input directory.
///
/// Per-asset failures are counted and logged; only a missing input
/// directory or an unreadable output directory aborts the run.
pub fn run<H: Host, B: ImageBackend>(
    processor: &mut AssetProcessor<H, B>,
) -> Result<RunStats, BatchError> {
    let config = processor.config().clone();
    config.log_banner();

    if !config.input_dir.is_dir() {
        log::error!(
            "Input directory '{}' does not exist",
            config.input_dir.display()
        );
        return Err(BatchError::MissingInputDir(config.input_dir));
    }
    fs::create_dir_all(&config.output_dir)?;

    let files = discover(&config.input_dir)?;
    let mut stats = RunStats {
        found: files.len(),
        ..Default::default()
    };
    if files.is_empty() {
        log::warn!(
            "No GLTF/GLB/VRM files found in '{}'",
            config.input_dir.display()
        );
        return Ok(stats);
    }
    log::info!("Found {} .glb/.gltf/.vrm files to process", files.len());

    for (i, input) in files.iter().enumerate() {
        log::info!("--- Processing file {}/{} ---", i + 1, files.len());
        let Some(kind) = classify::classify(input) else {
            log::error!("Unrecognized asset type: {}", input.display());
            stats.errors += 1;
            continue;
        };
        let Some(name) = classify::output_file_name(input, kind, config.preserve_format) else {
            log::error!("Cannot derive an output name for '{}'", input.display());
            stats.errors += 1;
            continue;
        };
        let output = config.output_dir.join(name);

        if config.skip_existing && output.exists() {
            log::info!("Skipping existing file: {}", file_label(&output));
            stats.skipped += 1;
            continue;
        }

        match processor.process(input, &output) {
            Ok(_) => {
                stats.processed += 1;
                let before = asset_size(input);
                let after = asset_size(&output);
                stats.bytes_before += before;
                stats.bytes_after += after;
                log::info!(
                    "Size: {:.2}MB -> {:.2}MB ({:+.1}%)",
                    before as f64 / MEGABYTE,
                    after as f64 / MEGABYTE,
                    reduction_percent(before, after)
                );
            }
            Err(e) => {
                log::error!("Failed to process {}: {e}", file_label(input));
                stats.errors += 1;
            }
        }
    }

    log_summary(&stats);
    Ok(stats)
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned()
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Size of an asset on disk, including the `.bin` sidecar of a `.gltf`.
pub fn asset_size(path: &Path) -> u64 {
    let size = file_size(path);
    let separated = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gltf"));
    if !separated {
        return size;
    }
    let bin = path.with_extension("bin");
    let bin_size = file_size(&bin);
    log::debug!(
        "{}: {size} bytes + {bin_size} bytes in {} (external images not counted)",
        file_label(path),
        file_label(&bin)
    );
    size + bin_size
}

fn log_summary(stats: &RunStats) {
    let rule = "=".repeat(50);
    log::info!("{rule}");
    log::info!("PROCESSING COMPLETE");
    log::info!("{rule}");
    log::info!("Total files found: {}", stats.found);
    log::info!("Successfully processed: {}", stats.processed);
    log::info!("Skipped (already exist): {}", stats.skipped);
    log::info!("Errors: {}", stats.errors);
    if stats.processed > 0 {
        log::info!(
            "Total size reduction: {:.2}MB -> {:.2}MB ({:+.1}%)",
            stats.bytes_before as f64 / MEGABYTE,
            stats.bytes_after as f64 / MEGABYTE,
            stats.reduction()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduction_is_relative_to_before() {
        assert_eq!(reduction_percent(10, 4), 60.0);
        assert_eq!(reduction_percent(4, 10), -150.0);
        assert_eq!(reduction_percent(0, 10), 0.0);
    }

    #[test]
    fn separated_assets_count_their_bin() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("prop.gltf"), vec![b'{'; 10]).unwrap();
        fs::write(dir.path().join("prop.bin"), vec![0u8; 32]).unwrap();
        fs::write(dir.path().join("prop.glb"), vec![0u8; 7]).unwrap();
        assert_eq!(asset_size(&dir.path().join("prop.gltf")), 42);
        assert_eq!(asset_size(&dir.path().join("prop.glb")), 7);
        assert_eq!(asset_size(&dir.path().join("missing.gltf")), 0);
    }

    #[test]
    fn discover_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.GLB", "a.vrm", "c.gltf", "notes.txt", "d.fbx"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.glb")).unwrap();

        let names: Vec<String> = discover(dir.path())
            .unwrap()
            .iter()
            .map(|p| file_label(p))
            .collect();
        assert_eq!(names, vec!["a.vrm", "b.GLB", "c.gltf"]);
    }
}
