//! Overlay image directory loading.

use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::OverlayImage;

#[derive(thiserror::Error, Debug)]
pub enum AssetError {
    #[error("failed to list {path}: {message}")]
    Scan { path: PathBuf, message: String },
    #[error("no readable images in {dir}")]
    NoImages { dir: PathBuf },
}

/// Pixel size every overlay is resized to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySize {
    pub width: u32,
    pub height: u32,
}

impl Default for DisplaySize {
    fn default() -> Self {
        Self {
            width: 560,
            height: 720,
        }
    }
}

/// Regular files directly inside `dir`, sorted by file name.
pub fn list_files_sorted(dir: &Path) -> Result<Vec<PathBuf>, AssetError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.map_err(|source| AssetError::Scan {
            path: dir.to_path_buf(),
            message: source.to_string(),
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Decode every image in `dir` and resize it to `target`.
///
/// Files that fail to decode are skipped with a warning. An empty result is
/// an error.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip(target)))]
pub fn load_overlay_images(
    dir: &Path,
    target: DisplaySize,
) -> Result<Vec<OverlayImage>, AssetError> {
    info!("loading overlay images from {}", dir.display());
    let mut images = Vec::new();
    for path in list_files_sorted(dir)? {
        let decoded = match image::open(&path) {
            Ok(img) => img.to_rgb8(),
            Err(e) => {
                warn!("skipping {}: {e}", path.display());
                continue;
            }
        };
        let resized = imageops::resize(&decoded, target.width, target.height, FilterType::Triangle);
        info!(
            "loaded {} ({}x{})",
            path.display(),
            decoded.width(),
            decoded.height()
        );
        images.push(OverlayImage::new(resized).with_source(path));
    }
    if images.is_empty() {
        return Err(AssetError::NoImages {
            dir: dir.to_path_buf(),
        });
    }
    Ok(images)
}
