//! Per-marker overlay compositing.
//!
//! A composite runs in four steps:
//! 1. the active [`OverlayStrategy`] picks the destination quad in the frame,
//! 2. the overlay rectangle `(0,0),(W,0),(W,H),(0,H)` is mapped onto that quad
//!    by a 4-point homography,
//! 3. the overlay is warped by inverse mapping inside the rounded quad mask,
//! 4. masked pixels replace the frame's pixels (hard cut, no blending).
//!
//! Any failure leaves the destination frame untouched.

use augmented_museum_core::{
    fill_convex_polygon, homography_from_4pt, is_strictly_convex, rect_corners, round_polygon,
    CameraError, Homography, Mask,
};
use image::RgbImage;
use log::debug;
use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::warp::{composite_masked, warp_perspective_rgb_masked};
use crate::{DetectedMarker, OverlayImage, SceneGeometry};

/// Projected quads smaller than this (in px²) are treated as degenerate.
const MIN_QUAD_AREA: f64 = 1.0;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CompositeError {
    #[error("overlay image is empty ({width}x{height})")]
    EmptyOverlay { width: u32, height: u32 },
    #[error("destination quad is not strictly convex")]
    DegenerateQuad,
    #[error("no homography maps the overlay onto the destination quad")]
    HomographyFailed,
    #[error("overlay homography is not invertible")]
    NonInvertible,
    #[error(transparent)]
    Projection(#[from] CameraError),
}

/// Chooses where in the frame an overlay lands for one marker.
pub trait OverlayStrategy {
    fn name(&self) -> &'static str;

    /// Destination quad in TL, TR, BR, BL order, in frame pixels.
    fn destination_quad(
        &self,
        overlay: &OverlayImage,
        marker: &DetectedMarker,
        scene: &SceneGeometry,
    ) -> Result<[Point2<f64>; 4], CompositeError>;
}

/// Project a virtual canvas hung on the marker plane through the marker pose.
///
/// The canvas is centred on the marker, `overlay_scale * side` tall and as
/// wide as the overlay's aspect ratio requires.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoseProjection;

impl PoseProjection {
    /// Object-space corners of the canvas, TL, TR, BR, BL with +Y up.
    pub fn canvas_corners(overlay: &OverlayImage, scene: &SceneGeometry) -> [Point3<f64>; 4] {
        let h = scene.overlay_scale * scene.object_points.side_length();
        let w = h * overlay.width() as f64 / overlay.height() as f64;
        let (hw, hh) = (w / 2.0, h / 2.0);
        [
            Point3::new(-hw, hh, 0.0),
            Point3::new(hw, hh, 0.0),
            Point3::new(hw, -hh, 0.0),
            Point3::new(-hw, -hh, 0.0),
        ]
    }
}

impl OverlayStrategy for PoseProjection {
    fn name(&self) -> &'static str {
        "pose_projection"
    }

    fn destination_quad(
        &self,
        overlay: &OverlayImage,
        marker: &DetectedMarker,
        scene: &SceneGeometry,
    ) -> Result<[Point2<f64>; 4], CompositeError> {
        let corners = Self::canvas_corners(overlay, scene);
        let projected = scene.intrinsics.project_points(&marker.pose, &corners)?;
        Ok([projected[0], projected[1], projected[2], projected[3]])
    }
}

/// Stretch the overlay over the detected corners and ignore the pose.
#[derive(Clone, Copy, Debug, Default)]
pub struct CornerWarp;

impl OverlayStrategy for CornerWarp {
    fn name(&self) -> &'static str {
        "corner_warp"
    }

    fn destination_quad(
        &self,
        _overlay: &OverlayImage,
        marker: &DetectedMarker,
        _scene: &SceneGeometry,
    ) -> Result<[Point2<f64>; 4], CompositeError> {
        Ok(marker.image_corners)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    PoseProjection,
    CornerWarp,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn OverlayStrategy> {
        match self {
            StrategyKind::PoseProjection => Box::new(PoseProjection),
            StrategyKind::CornerWarp => Box::new(CornerWarp),
        }
    }
}

/// Result of a successful composite.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositeOutcome {
    pub quad: [Point2<f64>; 4],
    /// Maps overlay pixels to frame pixels.
    pub homography: Homography,
    pub covered_pixels: usize,
}

/// Composite `overlay` onto `dest` at `marker`.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        level = "debug",
        skip_all,
        fields(marker = marker.id, strategy = strategy.name())
    )
)]
pub fn composite(
    dest: &mut RgbImage,
    overlay: &OverlayImage,
    marker: &DetectedMarker,
    scene: &SceneGeometry,
    strategy: &dyn OverlayStrategy,
) -> Result<CompositeOutcome, CompositeError> {
    let (w, h) = (overlay.width(), overlay.height());
    if w == 0 || h == 0 {
        return Err(CompositeError::EmptyOverlay {
            width: w,
            height: h,
        });
    }

    let quad = strategy.destination_quad(overlay, marker, scene)?;
    if !is_strictly_convex(&quad, MIN_QUAD_AREA) {
        return Err(CompositeError::DegenerateQuad);
    }

    let rect = rect_corners(w as f64, h as f64);
    let homography = homography_from_4pt(&rect, &quad).ok_or(CompositeError::HomographyFailed)?;
    let h_src_from_dst = homography.inverse().ok_or(CompositeError::NonInvertible)?;

    let mut mask = Mask::new(dest.width() as usize, dest.height() as usize);
    fill_convex_polygon(&mut mask, &round_polygon(&quad), 255);

    let warped = warp_perspective_rgb_masked(overlay.image(), &h_src_from_dst, &mask);
    let covered_pixels = composite_masked(dest, &warped, &mask);
    debug!(
        "marker {} ({}): {} px covered by {}",
        marker.id,
        strategy.name(),
        covered_pixels,
        overlay.label()
    );

    Ok(CompositeOutcome {
        quad,
        homography,
        covered_pixels,
    })
}
