//! Per-frame fan-out of the compositor over all visible markers.

use image::RgbImage;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::compositor::{composite, CompositeError, OverlayStrategy, StrategyKind};
use crate::{DetectedMarker, Gallery, OverlayImage, SceneGeometry};

/// Which gallery image each marker receives.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPolicy {
    /// Every marker shows the current selection.
    #[default]
    Broadcast,
    /// Marker `id` shows `images[id mod len]`.
    PerMarkerId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkerFailure {
    pub id: u32,
    pub error: CompositeError,
}

/// What happened to one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderReport {
    pub composited: usize,
    pub failures: Vec<MarkerFailure>,
    pub covered_pixels: usize,
}

pub struct MarkerOverlayDriver {
    policy: OverlayPolicy,
    strategy: Box<dyn OverlayStrategy>,
}

impl MarkerOverlayDriver {
    pub fn new(policy: OverlayPolicy, strategy: Box<dyn OverlayStrategy>) -> Self {
        Self { policy, strategy }
    }

    pub fn from_kinds(policy: OverlayPolicy, strategy: StrategyKind) -> Self {
        Self::new(policy, strategy.build())
    }

    pub fn policy(&self) -> OverlayPolicy {
        self.policy
    }

    pub fn strategy(&self) -> &dyn OverlayStrategy {
        self.strategy.as_ref()
    }

    pub fn select<'g>(&self, gallery: &'g Gallery, marker_id: u32) -> &'g OverlayImage {
        match self.policy {
            OverlayPolicy::Broadcast => gallery.current(),
            OverlayPolicy::PerMarkerId => gallery.for_marker(marker_id),
        }
    }

    /// Composite an overlay for every marker, in detection order.
    ///
    /// A failing marker is logged and recorded; the others still render.
    #[cfg_attr(
        feature = "tracing",
        tracing::instrument(level = "debug", skip_all, fields(markers = markers.len()))
    )]
    pub fn render(
        &self,
        frame: &mut RgbImage,
        markers: &[DetectedMarker],
        gallery: &Gallery,
        scene: &SceneGeometry,
    ) -> RenderReport {
        let mut report = RenderReport::default();
        for marker in markers {
            let overlay = self.select(gallery, marker.id);
            match composite(frame, overlay, marker, scene, self.strategy.as_ref()) {
                Ok(outcome) => {
                    report.composited += 1;
                    report.covered_pixels += outcome.covered_pixels;
                }
                Err(error) => {
                    warn!("marker {}: overlay skipped: {error}", marker.id);
                    report.failures.push(MarkerFailure {
                        id: marker.id,
                        error,
                    });
                }
            }
        }
        report
    }
}

impl std::fmt::Debug for MarkerOverlayDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarkerOverlayDriver")
            .field("policy", &self.policy)
            .field("strategy", &self.strategy.name())
            .finish()
    }
}
