//! Core geometry for marker-guided overlays.
//!
//! This crate is purely geometric. It knows nothing about cameras as devices,
//! image codecs or marker detection; it provides:
//! - the marker's object-space square ([`build_object_points`]),
//! - pinhole + OpenCV-distortion projection ([`CameraIntrinsics`]),
//! - Rodrigues poses and planar pose recovery ([`MarkerPose`], [`estimate_marker_pose`]),
//! - four-point homographies ([`homography_from_4pt`]),
//! - convex footprint masks ([`fill_convex_polygon`]).

mod camera;
mod coords;
mod homography;
mod logger;
mod polygon;
mod pose;

pub use camera::{CameraError, CameraIntrinsics, DistortionCoeffs};
pub use coords::{build_object_points, MarkerObjectPoints};
pub use homography::{homography_from_4pt, rect_corners, Homography};
pub use polygon::{fill_convex_polygon, is_strictly_convex, polygon_area, round_polygon, Mask};
pub use pose::{estimate_marker_pose, MarkerPose, PoseError};

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::init_with_level;
