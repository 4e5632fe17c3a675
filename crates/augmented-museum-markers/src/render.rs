//! Printable marker rasters.

use std::path::{Path, PathBuf};

use image::{GrayImage, Luma};
use log::info;

use crate::Dictionary;

#[derive(thiserror::Error, Debug)]
pub enum MarkerRenderError {
    #[error("marker id {id} is not in dictionary {dictionary} ({len} codes)")]
    UnknownId {
        id: u32,
        dictionary: String,
        len: usize,
    },
    #[error("side of {side_px}px cannot hold {cells} cells")]
    TooSmall { side_px: u32, cells: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Raster layout of a generated marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkerRenderConfig {
    /// Output side length in pixels.
    pub side_px: u32,
    /// Black border width, in cells, around the inner bits.
    pub border_bits: usize,
}

impl Default for MarkerRenderConfig {
    fn default() -> Self {
        Self {
            side_px: 200,
            border_bits: 1,
        }
    }
}

/// File name used for a generated marker image.
pub fn marker_file_name(id: u32) -> String {
    format!("aruco_marker_{id}.png")
}

/// Render marker `id` as a black/white square.
///
/// The marker is `marker_size + 2 * border_bits` cells wide; border cells are
/// black and inner cells follow the dictionary code (1 = black).
pub fn render_marker(
    dict: &Dictionary,
    id: u32,
    cfg: &MarkerRenderConfig,
) -> Result<GrayImage, MarkerRenderError> {
    let code = dict.code(id).ok_or_else(|| MarkerRenderError::UnknownId {
        id,
        dictionary: dict.name.clone(),
        len: dict.len(),
    })?;
    let cells = dict.marker_size + 2 * cfg.border_bits;
    if (cfg.side_px as usize) < cells {
        return Err(MarkerRenderError::TooSmall {
            side_px: cfg.side_px,
            cells,
        });
    }

    let side = cfg.side_px as usize;
    let border = cfg.border_bits;
    let n = dict.marker_size;
    Ok(GrayImage::from_fn(cfg.side_px, cfg.side_px, |x, y| {
        let cx = x as usize * cells / side;
        let cy = y as usize * cells / side;
        let inner = (border..border + n).contains(&cx) && (border..border + n).contains(&cy);
        let black = !inner || (code >> ((cy - border) * n + (cx - border))) & 1 == 1;
        Luma([if black { 0 } else { 255 }])
    }))
}

/// Render marker `id` and save it as `aruco_marker_<id>.png` under `out_dir`.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip(dict, cfg)))]
pub fn write_marker_png(
    dict: &Dictionary,
    id: u32,
    cfg: &MarkerRenderConfig,
    out_dir: &Path,
) -> Result<PathBuf, MarkerRenderError> {
    let img = render_marker(dict, id, cfg)?;
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(marker_file_name(id));
    img.save(&path)?;
    info!("marker {id} from {} saved as {}", dict.name, path.display());
    Ok(path)
}
