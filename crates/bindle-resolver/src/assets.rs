//! Asset file-name parsing and scale-variant resolution.
//!
//! Assets follow the `<base>[@<scale>x][.<platform>].<ext>` naming scheme:
//! `img.png`, `img@2x.png`, `img@1.5x.ios.png` are all variants of the same
//! logical asset `img.png`.

use std::path::Path;

use bindle_fs::FileSystem;
use rustc_hash::FxHashSet;

/// Decomposed asset file name.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetName {
    /// Name with scale, platform and extension stripped.
    pub base: String,
    /// Density variant; 1.0 when the name carries no `@<scale>x` part.
    pub scale: f64,
    /// Platform qualifier, when present and configured.
    pub platform: Option<String>,
    /// File extension, without the dot.
    pub extension: String,
}

/// The outcome of resolving an asset reference against a directory.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetResolution {
    /// File name of the chosen variant (lowest-sorted name wins ties).
    pub file_name: String,
    /// Scale of the chosen variant.
    pub scale: f64,
    /// All scales present for this asset name, ascending.
    pub scales: Vec<f64>,
}

/// Parse `<base>[@<scale>x][.<platform>].<ext>`.
///
/// Only platforms in `platforms` are recognized as qualifiers; anything else
/// stays part of the base name. Returns `None` for names without an
/// extension.
pub fn parse_asset_name(file_name: &str, platforms: &FxHashSet<String>) -> Option<AssetName> {
    let (mut stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() || extension.contains('/') {
        return None;
    }

    let mut platform = None;
    if let Some((rest, last)) = stem.rsplit_once('.') {
        if platforms.contains(last) {
            platform = Some(last.to_string());
            stem = rest;
        }
    }

    let mut scale = 1.0;
    if let Some((base, qualifier)) = stem.rsplit_once('@') {
        if let Some(digits) = qualifier.strip_suffix('x') {
            if let Ok(parsed) = digits.parse::<f64>() {
                if parsed > 0.0 && !base.is_empty() {
                    scale = parsed;
                    stem = base;
                }
            }
        }
    }

    Some(AssetName {
        base: stem.to_string(),
        scale,
        platform,
        extension: extension.to_string(),
    })
}

/// Find the scale variants of an asset in `dir` and pick one.
///
/// Variants qualified for the requested platform shadow the generic ones
/// entirely when any exist. Among the surviving candidates the
/// lexicographically lowest file name is chosen, which keeps the pick stable
/// across directory-listing orders.
pub fn resolve_asset(
    fs: &dyn FileSystem,
    dir: &Path,
    name_hint: &str,
    platform: Option<&str>,
    platforms: &FxHashSet<String>,
) -> Option<AssetResolution> {
    let hint = parse_asset_name(name_hint, platforms)?;
    let names = fs.read_dir(dir).ok()?;

    let mut generic = Vec::new();
    let mut platform_specific = Vec::new();
    for name in names {
        let Some(parsed) = parse_asset_name(&name, platforms) else {
            continue;
        };
        if parsed.base != hint.base || parsed.extension != hint.extension {
            continue;
        }
        match parsed.platform.as_deref() {
            None => generic.push((name, parsed.scale)),
            Some(p) if Some(p) == platform => platform_specific.push((name, parsed.scale)),
            Some(_) => {}
        }
    }

    let candidates = if platform_specific.is_empty() {
        generic
    } else {
        platform_specific
    };
    if candidates.is_empty() {
        return None;
    }

    let (file_name, scale) = candidates
        .iter()
        .min_by(|(a, _), (b, _)| a.cmp(b))
        .cloned()?;

    let mut scales: Vec<f64> = candidates.iter().map(|(_, s)| *s).collect();
    scales.sort_by(f64::total_cmp);
    scales.dedup();

    Some(AssetResolution {
        file_name,
        scale,
        scales,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindle_fs::MemoryFileSystem;

    fn platforms() -> FxHashSet<String> {
        ["ios".to_string(), "android".to_string()]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_parse_plain_name() {
        let parsed = parse_asset_name("img.png", &platforms()).unwrap();
        assert_eq!(parsed.base, "img");
        assert_eq!(parsed.scale, 1.0);
        assert_eq!(parsed.platform, None);
        assert_eq!(parsed.extension, "png");
    }

    #[test]
    fn test_parse_scale_and_platform() {
        let parsed = parse_asset_name("icon@1.5x.ios.png", &platforms()).unwrap();
        assert_eq!(parsed.base, "icon");
        assert_eq!(parsed.scale, 1.5);
        assert_eq!(parsed.platform.as_deref(), Some("ios"));

        // Unknown platform token stays part of the base.
        let parsed = parse_asset_name("icon.web.png", &platforms()).unwrap();
        assert_eq!(parsed.base, "icon.web");
        assert_eq!(parsed.platform, None);
    }

    #[test]
    fn test_parse_rejects_extensionless_names() {
        assert!(parse_asset_name("README", &platforms()).is_none());
        assert!(parse_asset_name(".png", &platforms()).is_none());
    }

    #[test]
    fn test_malformed_scale_is_part_of_the_name() {
        let parsed = parse_asset_name("img@x.png", &platforms()).unwrap();
        assert_eq!(parsed.base, "img@x");
        assert_eq!(parsed.scale, 1.0);
    }

    #[test]
    fn test_resolve_prefers_platform_variants() {
        let fs = MemoryFileSystem::with_files([
            ("/assets/logo.png", ""),
            ("/assets/logo@2x.png", ""),
            ("/assets/logo@3x.ios.png", ""),
        ]);
        let resolved = resolve_asset(
            &fs,
            Path::new("/assets"),
            "logo.png",
            Some("ios"),
            &platforms(),
        )
        .unwrap();
        assert_eq!(resolved.file_name, "logo@3x.ios.png");
        assert_eq!(resolved.scale, 3.0);
        assert_eq!(resolved.scales, vec![3.0]);
    }

    #[test]
    fn test_resolve_generic_variants_sorted_by_name() {
        let fs = MemoryFileSystem::with_files([
            ("/assets/logo@2x.png", ""),
            ("/assets/logo.png", ""),
        ]);
        let resolved = resolve_asset(&fs, Path::new("/assets"), "logo.png", None, &platforms())
            .unwrap();
        // "logo.png" < "logo@2x.png"
        assert_eq!(resolved.file_name, "logo.png");
        assert_eq!(resolved.scale, 1.0);
        assert_eq!(resolved.scales, vec![1.0, 2.0]);
    }

    #[test]
    fn test_resolve_misses_unrelated_names() {
        let fs = MemoryFileSystem::with_files([("/assets/other.png", "")]);
        assert!(resolve_asset(&fs, Path::new("/assets"), "logo.png", None, &platforms()).is_none());
    }
}
