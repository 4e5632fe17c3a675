//! Marker-guided overlay compositing and the interactive museum loop.
//!
//! The crate is organised leaves first:
//! - [`compositor`]: one overlay onto one marker ([`composite`]),
//! - [`MarkerOverlayDriver`]: every visible marker of a frame,
//! - [`Gallery`]: overlay images and the current selection,
//! - [`InteractionLoop`]: capture, render, display and key handling,
//!
//! plus startup loading: [`load_calibration`], [`load_overlay_images`],
//! [`MuseumConfig`] and [`Session`].
//!
//! Devices (camera, detector, window, keyboard) are traits; see
//! [`FrameSource`], [`MarkerTracker`], [`FrameSink`], [`KeySource`] and
//! [`ScreenshotWriter`].

mod assets;
mod calibration;
pub mod compositor;
mod config;
mod driver;
mod gallery;
mod interaction;
mod screenshot;
mod session;
mod types;
mod warp;

pub use assets::{list_files_sorted, load_overlay_images, AssetError, DisplaySize};
pub use calibration::{
    calibration_from_json_str, calibration_from_xml_str, load_calibration, Calibration,
    CalibrationError,
};
pub use compositor::{
    composite, CompositeError, CompositeOutcome, CornerWarp, OverlayStrategy, PoseProjection,
    StrategyKind,
};
pub use config::{ConfigError, MuseumConfig};
pub use driver::{MarkerFailure, MarkerOverlayDriver, OverlayPolicy, RenderReport};
pub use gallery::{Direction, Gallery, GalleryError, OverlayImage};
pub use interaction::{
    CaptureError, Command, Devices, DisplayError, EndReason, FrameSink, FrameSource,
    InteractionLoop, KeyBindingError, KeyBindings, KeySource, LoopError, LoopState, LoopSummary,
    MarkerTracker, ScreenshotWriter, Step, TrackError,
};
pub use screenshot::{timestamp_utc, ScreenshotError, TimestampedScreenshots};
pub use session::{SceneGeometry, Session, SessionError};
pub use types::DetectedMarker;
pub use warp::{composite_masked, sample_bilinear_rgb, warp_perspective_rgb_masked};
