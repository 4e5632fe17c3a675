//! High-level facade crate for the `augmented-museum-*` workspace.
//!
//! This crate provides:
//! - re-exports of the geometry, marker and overlay crates,
//! - file-backed devices ([`replay`]) so the museum loop runs on recorded
//!   frames and detections without a camera or window.
//!
//! ## Quickstart
//!
//! ```no_run
//! use augmented_museum::overlay::{Devices, InteractionLoop, MuseumConfig, Session};
//! use augmented_museum::overlay::TimestampedScreenshots;
//! use augmented_museum::replay::{
//!     DirectorySink, ImageSequenceSource, RecordedTracker, ScriptedKeys,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::load(MuseumConfig::default())?;
//! let devices = Devices {
//!     frames: Box::new(ImageSequenceSource::open("capture/")?),
//!     tracker: Box::new(RecordedTracker::load("capture/detections.jsonl")?),
//!     sink: Box::new(DirectorySink::new("out/")),
//!     keys: Box::new(ScriptedKeys::new("..d..s..q")),
//!     screenshots: Box::new(TimestampedScreenshots::new(session.config.screenshot_dir.clone())),
//! };
//! let summary = InteractionLoop::new(devices, &session.config).run(&mut session)?;
//! println!("{} frames", summary.frames);
//! # Ok(())
//! # }
//! ```
//!
//! ## API map
//! - `augmented_museum::core`: object points, camera projection, homographies, masks, pose.
//! - `augmented_museum::markers`: marker dictionaries and printable marker PNGs.
//! - `augmented_museum::overlay`: compositor, driver, gallery, loop and startup loading.
//! - `augmented_museum::replay`: recorded frames, detections and scripted keys.

pub use augmented_museum_core as core;
pub use augmented_museum_markers as markers;
pub use augmented_museum_overlay as overlay;

pub use augmented_museum_overlay::{
    DetectedMarker, Gallery, InteractionLoop, MuseumConfig, OverlayPolicy, Session, StrategyKind,
};

pub mod replay;
