//! Startup context shared by the frame loop.

use augmented_museum_core::{build_object_points, CameraIntrinsics, MarkerObjectPoints};
use log::info;

use crate::{
    load_calibration, load_overlay_images, AssetError, CalibrationError, ConfigError, Gallery,
    GalleryError, MuseumConfig,
};

/// Read-only geometry fixed at startup.
#[derive(Clone, Debug)]
pub struct SceneGeometry {
    pub intrinsics: CameraIntrinsics,
    pub object_points: MarkerObjectPoints,
    /// Overlay canvas height as a multiple of the marker side.
    pub overlay_scale: f64,
}

impl SceneGeometry {
    pub fn new(intrinsics: CameraIntrinsics, marker_side_length: f64, overlay_scale: f64) -> Self {
        Self {
            intrinsics,
            object_points: build_object_points(marker_side_length),
            overlay_scale,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Calibration(#[from] CalibrationError),
    #[error(transparent)]
    Assets(#[from] AssetError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
}

/// Scene geometry, the gallery and the config for one run.
#[derive(Clone, Debug)]
pub struct Session {
    pub scene: SceneGeometry,
    pub gallery: Gallery,
    pub config: MuseumConfig,
}

impl Session {
    pub fn new(scene: SceneGeometry, gallery: Gallery, config: MuseumConfig) -> Self {
        Self {
            scene,
            gallery,
            config,
        }
    }

    /// Load calibration and overlay images named by `config`.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip_all))]
    pub fn load(config: MuseumConfig) -> Result<Self, SessionError> {
        config.validate()?;
        let calibration = load_calibration(&config.calibration_path)?;
        let images = load_overlay_images(&config.images_dir, config.display_size)?;
        let gallery = Gallery::new(images)?;
        info!(
            "session ready: {} overlay images, marker side {}",
            gallery.len(),
            config.marker_side_length
        );
        let scene = SceneGeometry::new(
            calibration.intrinsics,
            config.marker_side_length,
            config.overlay_scale,
        );
        Ok(Self::new(scene, gallery, config))
    }
}
