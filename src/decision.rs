//! Per-texture choice between lossless and lossy output.

use image::{DynamicImage, ImageFormat};

use crate::alpha;
use crate::config::{FormatPolicy, OptimizerConfig};

/// Name fragments of precision-sensitive maps that must stay lossless.
pub const PRECISION_KEYWORDS: [&str; 5] = ["normal", "nrm", "bump", "roughness", "metallic"];

/// Name fragments of maps assumed to carry alpha under the conservative policy.
pub const ALPHA_KEYWORDS: [&str; 3] = ["alpha", "opacity", "mask"];

/// Name fragments identifying specular tint textures.
pub const SPECULAR_TINT_KEYWORDS: [&str; 4] =
    ["specular_tint", "spectint", "spec_tint", "specular tint"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// PNG.
    Lossless,
    /// JPEG.
    Lossy,
}

impl Encoding {
    pub fn format(self) -> ImageFormat {
        match self {
            Encoding::Lossless => ImageFormat::Png,
            Encoding::Lossy => ImageFormat::Jpeg,
        }
    }
}

/// Encoding plus the quality to apply when lossy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub encoding: Encoding,
    pub quality: Option<u8>,
}

/// Global inputs of the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionPolicy {
    pub format: FormatPolicy,
    pub aggressive_conversion: bool,
    pub lossy_quality: u8,
}

impl From<&OptimizerConfig> for DecisionPolicy {
    fn from(config: &OptimizerConfig) -> Self {
        Self {
            format: config.format_policy,
            aggressive_conversion: config.aggressive_conversion,
            lossy_quality: config.quality(),
        }
    }
}

fn contains_any(name_lower: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| name_lower.contains(k))
}

/// Whether a texture or node name marks a specular tint map.
pub fn is_specular_tint(name: &str) -> bool {
    contains_any(&name.to_lowercase(), &SPECULAR_TINT_KEYWORDS)
}

/// Pick the output encoding for the texture called `name`.
///
/// `image` is only consulted under the aggressive auto policy.
pub fn decide(name: &str, image: Option<&DynamicImage>, policy: &DecisionPolicy) -> Encoding {
    match policy.format {
        FormatPolicy::Lossless => return Encoding::Lossless,
        FormatPolicy::Lossy => return Encoding::Lossy,
        FormatPolicy::Auto => {}
    }

    let name_lower = name.to_lowercase();
    if contains_any(&name_lower, &PRECISION_KEYWORDS) {
        return Encoding::Lossless;
    }

    if policy.aggressive_conversion {
        return match image {
            Some(img) if alpha::uses_transparency(name, img) => {
                log::debug!("Keeping '{name}' as PNG due to alpha channel usage");
                Encoding::Lossless
            }
            _ => Encoding::Lossy,
        };
    }

    if contains_any(&name_lower, &ALPHA_KEYWORDS) {
        Encoding::Lossless
    } else {
        Encoding::Lossy
    }
}

/// [`decide`] plus the quality attached to lossy output.
pub fn decision(name: &str, image: Option<&DynamicImage>, policy: &DecisionPolicy) -> Decision {
    let encoding = decide(name, image, policy);
    Decision {
        encoding,
        quality: (encoding == Encoding::Lossy).then_some(policy.lossy_quality),
    }
}
