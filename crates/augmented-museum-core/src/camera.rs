//! Pinhole camera model with OpenCV-layout lens distortion.
//!
//! Coefficients follow the OpenCV ordering
//! `(k1, k2, p1, p2[, k3[, k4, k5, k6[, s1, s2, s3, s4]]])`: radial
//! polynomial terms, tangential terms, the rational denominator and the
//! thin-prism terms.

use nalgebra::{Matrix3, Point2, Point3};
use serde::{Deserialize, Serialize};

use crate::MarkerPose;

/// Errors produced when building or using a camera model.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum CameraError {
    #[error("unsupported distortion vector length {0} (expected 0, 4, 5, 8 or 12)")]
    UnsupportedDistortionLength(usize),
    #[error("camera matrix is not a valid pinhole matrix (fx={fx}, fy={fy})")]
    InvalidCameraMatrix { fx: f64, fy: f64 },
    #[error("point projects behind the camera (z={z})")]
    BehindCamera { z: f64 },
}

/// OpenCV distortion coefficients. Missing trailing terms are zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DistortionCoeffs {
    pub k1: f64,
    pub k2: f64,
    pub p1: f64,
    pub p2: f64,
    pub k3: f64,
    pub k4: f64,
    pub k5: f64,
    pub k6: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
    pub s4: f64,
}

impl DistortionCoeffs {
    pub fn from_slice(coeffs: &[f64]) -> Result<Self, CameraError> {
        if !matches!(coeffs.len(), 0 | 4 | 5 | 8 | 12) {
            return Err(CameraError::UnsupportedDistortionLength(coeffs.len()));
        }
        let at = |i: usize| coeffs.get(i).copied().unwrap_or(0.0);
        Ok(Self {
            k1: at(0),
            k2: at(1),
            p1: at(2),
            p2: at(3),
            k3: at(4),
            k4: at(5),
            k5: at(6),
            k6: at(7),
            s1: at(8),
            s2: at(9),
            s3: at(10),
            s4: at(11),
        })
    }

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.k1, self.k2, self.p1, self.p2, self.k3, self.k4, self.k5, self.k6, self.s1,
            self.s2, self.s3, self.s4,
        ]
    }

    pub fn is_zero(&self) -> bool {
        self.to_vec().iter().all(|&c| c == 0.0)
    }

    /// Apply distortion to undistorted normalized coordinates.
    pub fn distort(&self, x: f64, y: f64) -> (f64, f64) {
        let r2 = x * x + y * y;
        let r4 = r2 * r2;
        let r6 = r4 * r2;

        let num = 1.0 + self.k1 * r2 + self.k2 * r4 + self.k3 * r6;
        let den = 1.0 + self.k4 * r2 + self.k5 * r4 + self.k6 * r6;
        let radial = if den.abs() > 1e-12 { num / den } else { num };

        let xy = x * y;
        let x_d = x * radial
            + 2.0 * self.p1 * xy
            + self.p2 * (r2 + 2.0 * x * x)
            + self.s1 * r2
            + self.s2 * r4;
        let y_d = y * radial
            + self.p1 * (r2 + 2.0 * y * y)
            + 2.0 * self.p2 * xy
            + self.s3 * r2
            + self.s4 * r4;
        (x_d, y_d)
    }

    /// Invert [`Self::distort`] by fixed-point iteration.
    pub fn undistort(&self, x_d: f64, y_d: f64) -> (f64, f64) {
        if self.is_zero() {
            return (x_d, y_d);
        }
        let mut x = x_d;
        let mut y = y_d;
        for _ in 0..20 {
            let (xe, ye) = self.distort(x, y);
            x -= xe - x_d;
            y -= ye - y_d;
        }
        (x, y)
    }
}

/// Camera matrix plus distortion, loaded once per session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    camera_matrix: Matrix3<f64>,
    distortion: DistortionCoeffs,
}

impl CameraIntrinsics {
    pub fn new(
        camera_matrix: Matrix3<f64>,
        distortion: DistortionCoeffs,
    ) -> Result<Self, CameraError> {
        let fx = camera_matrix[(0, 0)];
        let fy = camera_matrix[(1, 1)];
        let valid = fx.is_finite()
            && fy.is_finite()
            && fx.abs() > 1e-12
            && fy.abs() > 1e-12
            && camera_matrix.iter().all(|v| v.is_finite())
            && camera_matrix[(2, 0)] == 0.0
            && camera_matrix[(2, 1)] == 0.0
            && camera_matrix[(2, 2)] != 0.0;
        if !valid {
            return Err(CameraError::InvalidCameraMatrix { fx, fy });
        }
        Ok(Self {
            camera_matrix,
            distortion,
        })
    }

    /// Ideal pinhole camera with no distortion.
    pub fn pinhole(fx: f64, fy: f64, cx: f64, cy: f64) -> Result<Self, CameraError> {
        Self::new(
            Matrix3::new(fx, 0.0, cx, 0.0, fy, cy, 0.0, 0.0, 1.0),
            DistortionCoeffs::default(),
        )
    }

    pub fn camera_matrix(&self) -> &Matrix3<f64> {
        &self.camera_matrix
    }

    pub fn distortion(&self) -> &DistortionCoeffs {
        &self.distortion
    }

    /// Project one camera-frame point through distortion and `K`.
    pub fn project_camera_point(&self, p: &Point3<f64>) -> Result<Point2<f64>, CameraError> {
        if p.z <= 1e-9 {
            return Err(CameraError::BehindCamera { z: p.z });
        }
        let (xd, yd) = self.distortion.distort(p.x / p.z, p.y / p.z);
        let k = &self.camera_matrix;
        let w = k[(2, 2)];
        Ok(Point2::new(
            (k[(0, 0)] * xd + k[(0, 1)] * yd + k[(0, 2)]) / w,
            (k[(1, 1)] * yd + k[(1, 2)]) / w,
        ))
    }

    /// Project object-space points through `pose` into pixel coordinates.
    ///
    /// Fails if any point lands at or behind the camera plane.
    pub fn project_points(
        &self,
        pose: &MarkerPose,
        object_points: &[Point3<f64>],
    ) -> Result<Vec<Point2<f64>>, CameraError> {
        object_points
            .iter()
            .map(|p| self.project_camera_point(&pose.transform_point(p)))
            .collect()
    }

    /// Map a pixel to undistorted normalized image coordinates.
    pub fn normalize_pixel(&self, pixel: &Point2<f64>) -> Point2<f64> {
        let k = &self.camera_matrix;
        let w = k[(2, 2)];
        let yd = (pixel.y * w - k[(1, 2)]) / k[(1, 1)];
        let xd = (pixel.x * w - k[(0, 2)] - k[(0, 1)] * yd) / k[(0, 0)];
        let (x, y) = self.distortion.undistort(xd, yd);
        Point2::new(x, y)
    }
}
