//! Pass template bundles.

use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use image::{ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use crate::wallet::GenerationError;

use super::pass::Pass;

pub const PASS_FILE: &str = "pass.json";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "signature";
pub const ICON_FILE: &str = "icon.png";
pub const THUMBNAIL_FILE: &str = "thumbnail.png";

/// Files the signer generates itself and that a bundle must not override.
const RESERVED_FILES: [&str; 3] = [PASS_FILE, MANIFEST_FILE, SIGNATURE_FILE];

/// In-memory set of asset files archived next to `pass.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassTemplate {
    files: BTreeMap<String, Vec<u8>>,
}

impl PassTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, name: impl Into<String>, data: Vec<u8>) {
        self.files.insert(name.into(), data);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    /// Files in name order.
    pub fn files(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// A designer-authored pass bundle loaded from disk.
#[derive(Debug, Clone)]
pub struct BundleTemplate {
    pub pass: Pass,
    pub assets: PassTemplate,
}

/// Load `pass.json` and every asset file of a bundle directory.
///
/// `manifest.json` and `signature` are skipped, as are subdirectories.
pub fn load_bundle(dir: &Path) -> Result<BundleTemplate, GenerationError> {
    let pass_path = dir.join(PASS_FILE);
    let raw = std::fs::read(&pass_path).map_err(|e| {
        GenerationError::Template(format!("reading {}: {}", pass_path.display(), e))
    })?;
    let pass = Pass::from_json(&raw).map_err(|e| {
        GenerationError::Template(format!("decoding {}: {}", pass_path.display(), e))
    })?;

    let entries = std::fs::read_dir(dir)
        .map_err(|e| GenerationError::Template(format!("reading {}: {}", dir.display(), e)))?;

    let mut assets = PassTemplate::new();
    for entry in entries {
        let entry = entry.map_err(|e| GenerationError::Template(e.to_string()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if RESERVED_FILES.contains(&name.as_str()) {
            continue;
        }

        let data = std::fs::read(&path).map_err(|e| {
            GenerationError::Template(format!("reading asset {}: {}", path.display(), e))
        })?;
        assets.add_file(name, data);
    }

    debug!(dir = %dir.display(), asset_count = assets.len(), "Loaded pass bundle");
    Ok(BundleTemplate { pass, assets })
}

/// Plain square icon used by the minimal template.
pub fn minimal_icon() -> Result<Vec<u8>, GenerationError> {
    let icon = RgbaImage::from_pixel(58, 58, Rgba([24, 24, 27, 255]));
    let mut png = Cursor::new(Vec::new());
    icon.write_to(&mut png, ImageFormat::Png)
        .map_err(|e| GenerationError::Encoding(format!("icon PNG: {}", e)))?;
    Ok(png.into_inner())
}
