use std::path::Path;

/// Semantic kind of an input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// `.glb` or `.gltf`.
    Container,
    /// `.vrm` humanoid avatar.
    Avatar,
}

/// Concrete form an asset is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Single-file `.glb`.
    Binary,
    /// `.gltf` JSON with a sibling `.bin`.
    Separated,
    /// `.vrm` (GLB layout).
    Avatar,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Binary => "glb",
            ExportFormat::Separated => "gltf",
            ExportFormat::Avatar => "vrm",
        }
    }
}

/// Classify a file by its extension, case-insensitively.
pub fn classify(path: &Path) -> Option<AssetKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "glb" | "gltf" => Some(AssetKind::Container),
        "vrm" => Some(AssetKind::Avatar),
        _ => None,
    }
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
}

/// Pick the output form for an asset.
///
/// Avatars always stay avatars. Containers become `.glb` unless the preserve
/// policy is on and `target` itself carries the `.gltf` extension.
pub fn export_format(kind: AssetKind, target: &Path, preserve_format: bool) -> ExportFormat {
    match kind {
        AssetKind::Avatar => ExportFormat::Avatar,
        AssetKind::Container if preserve_format && has_extension(target, "gltf") => {
            ExportFormat::Separated
        }
        AssetKind::Container => ExportFormat::Binary,
    }
}

/// Output file name for `input`.
pub fn output_file_name(input: &Path, kind: AssetKind, preserve_format: bool) -> Option<String> {
    let stem = input.file_stem()?.to_string_lossy();
    let name = match kind {
        AssetKind::Avatar => format!("{stem}.vrm"),
        AssetKind::Container if preserve_format => input.file_name()?.to_string_lossy().into_owned(),
        AssetKind::Container => format!("{stem}.glb"),
    };
    Some(name)
}
