//! Marker pose as Rodrigues rotation + translation, and planar pose recovery.

use nalgebra::{Matrix3, Point2, Point3, Rotation3, Vector3};
use serde::{Deserialize, Serialize};

use crate::{homography_from_4pt, CameraIntrinsics, MarkerObjectPoints};

/// Pose of a marker relative to the camera: `p_cam = R(rvec) * p_obj + tvec`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerPose {
    /// Axis-angle rotation; direction is the axis, norm is the angle in radians.
    pub rotation_vector: Vector3<f64>,
    pub translation_vector: Vector3<f64>,
}

impl MarkerPose {
    pub fn new(rotation_vector: Vector3<f64>, translation_vector: Vector3<f64>) -> Self {
        Self {
            rotation_vector,
            translation_vector,
        }
    }

    pub fn from_rotation(rotation: Rotation3<f64>, translation_vector: Vector3<f64>) -> Self {
        Self::new(rotation.scaled_axis(), translation_vector)
    }

    pub fn rotation(&self) -> Rotation3<f64> {
        Rotation3::new(self.rotation_vector)
    }

    pub fn transform_point(&self, p: &Point3<f64>) -> Point3<f64> {
        self.rotation() * p + self.translation_vector
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoseError {
    #[error("marker corners do not define a homography")]
    DegenerateCorners,
    #[error("homography does not decompose into a rigid pose")]
    DegenerateHomography,
}

/// Recover a marker pose from its four image corners.
///
/// Corners are undistorted into normalized coordinates, a plane-induced
/// homography is fitted against the marker's `Z = 0` square, and the
/// homography is decomposed into `[r1 r2 t]`. The rotation is projected back
/// onto SO(3) through an SVD.
pub fn estimate_marker_pose(
    object_points: &MarkerObjectPoints,
    image_corners: &[Point2<f64>; 4],
    intrinsics: &CameraIntrinsics,
) -> Result<MarkerPose, PoseError> {
    let plane = object_points.planar();
    let normalized = image_corners.map(|c| intrinsics.normalize_pixel(&c));
    let h = homography_from_4pt(&plane, &normalized).ok_or(PoseError::DegenerateCorners)?;

    let h1 = h.h.column(0).into_owned();
    let h2 = h.h.column(1).into_owned();
    let h3 = h.h.column(2).into_owned();

    let denom = 0.5 * (h1.norm() + h2.norm());
    if denom <= 1e-12 {
        return Err(PoseError::DegenerateHomography);
    }
    let lambda = 1.0 / denom;

    let mut r1 = h1 * lambda;
    let mut r2 = h2 * lambda;
    let mut t = h3 * lambda;
    if t.z < 0.0 {
        r1 = -r1;
        r2 = -r2;
        t = -t;
    }
    let r3 = r1.cross(&r2);
    if r3.norm() <= 1e-12 {
        return Err(PoseError::DegenerateHomography);
    }

    let r_approx = Matrix3::from_columns(&[r1, r2, r3]);
    let svd = r_approx.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(PoseError::DegenerateHomography);
    };
    let mut r = u * v_t;
    if r.determinant() < 0.0 {
        let mut u_fixed = u;
        u_fixed.column_mut(2).neg_mut();
        r = u_fixed * v_t;
    }

    Ok(MarkerPose::from_rotation(
        Rotation3::from_matrix_unchecked(r),
        t,
    ))
}
