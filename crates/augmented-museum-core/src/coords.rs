use nalgebra::{Point2, Point3};
use serde::{Deserialize, Serialize};

/// Physical marker square on the `Z = 0` plane, centred at the origin.
///
/// Corner order is TL, TR, BR, BL with +Y pointing up in object space, the
/// same order detected image corners are reported in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MarkerObjectPoints {
    side_length: f64,
    points: [Point3<f64>; 4],
}

impl MarkerObjectPoints {
    pub fn side_length(&self) -> f64 {
        self.side_length
    }

    pub fn points(&self) -> &[Point3<f64>; 4] {
        &self.points
    }

    /// XY coordinates of the corners, for plane-to-image homographies.
    pub fn planar(&self) -> [Point2<f64>; 4] {
        self.points.map(|p| Point2::new(p.x, p.y))
    }
}

/// Build the marker square for a given side length.
///
/// The side length is not validated; callers pass a positive value.
pub fn build_object_points(marker_side_length: f64) -> MarkerObjectPoints {
    let h = marker_side_length / 2.0;
    MarkerObjectPoints {
        side_length: marker_side_length,
        points: [
            Point3::new(-h, h, 0.0),
            Point3::new(h, h, 0.0),
            Point3::new(h, -h, 0.0),
            Point3::new(-h, -h, 0.0),
        ],
    }
}
