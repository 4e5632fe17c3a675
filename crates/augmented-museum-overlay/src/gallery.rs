//! Loaded overlay images and the current selection.

use std::path::{Path, PathBuf};

use image::RgbImage;
use serde::{Deserialize, Serialize};

/// A decoded overlay raster.
#[derive(Clone, Debug)]
pub struct OverlayImage {
    image: RgbImage,
    source: Option<PathBuf>,
}

impl OverlayImage {
    pub fn new(image: RgbImage) -> Self {
        Self {
            image,
            source: None,
        }
    }

    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Label for log lines: the file name if known.
    pub fn label(&self) -> String {
        self.source
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("{}x{}", self.width(), self.height()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum GalleryError {
    #[error("gallery has no images")]
    Empty,
}

/// Ordered overlay images plus the selected index.
///
/// Never empty: construction fails on an empty list, so `current_index` is
/// always in range.
#[derive(Clone, Debug)]
pub struct Gallery {
    images: Vec<OverlayImage>,
    current: usize,
}

impl Gallery {
    pub fn new(images: Vec<OverlayImage>) -> Result<Self, GalleryError> {
        if images.is_empty() {
            return Err(GalleryError::Empty);
        }
        Ok(Self { images, current: 0 })
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn images(&self) -> &[OverlayImage] {
        &self.images
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &OverlayImage {
        &self.images[self.current]
    }

    /// Step the selection, wrapping at both ends. Returns the new index.
    pub fn cycle(&mut self, direction: Direction) -> usize {
        let n = self.images.len();
        self.current = match direction {
            Direction::Forward => (self.current + 1) % n,
            Direction::Backward => (self.current + n - 1) % n,
        };
        self.current
    }

    /// Stable per-id assignment: `images[id mod len]`.
    pub fn for_marker(&self, id: u32) -> &OverlayImage {
        &self.images[id as usize % self.images.len()]
    }
}
