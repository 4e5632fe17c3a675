use augmented_museum_core::MarkerPose;
use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// One marker observation for one frame.
///
/// `image_corners` are TL, TR, BR, BL, matching
/// [`augmented_museum_core::MarkerObjectPoints`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectedMarker {
    pub id: u32,
    pub image_corners: [Point2<f64>; 4],
    pub pose: MarkerPose,
}
