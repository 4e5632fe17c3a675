//! File-backed devices for running the museum loop without hardware.
//!
//! - [`ImageSequenceSource`]: frames from a directory, in file-name order.
//! - [`RecordedTracker`]: detections from a JSON Lines recording.
//! - [`DirectorySink`] / [`NullSink`]: composited frames to disk or nowhere.
//! - [`ScriptedKeys`]: one scripted key (or none) per frame.

use std::collections::{HashMap, VecDeque};
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::time::Duration;

use augmented_museum_core::{estimate_marker_pose, MarkerPose};
use augmented_museum_overlay::{
    list_files_sorted, CaptureError, DetectedMarker, DisplayError, FrameSink, FrameSource,
    KeySource, MarkerTracker, SceneGeometry, TrackError,
};
use image::{ImageFormat, RgbImage};
use log::{debug, info, warn};
use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Frames read from image files in a directory.
#[derive(Debug)]
pub struct ImageSequenceSource {
    pending: VecDeque<PathBuf>,
}

impl ImageSequenceSource {
    /// A missing or unreadable directory means the device is unavailable.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let dir = dir.as_ref();
        let files = list_files_sorted(dir).map_err(|e| CaptureError::Unavailable(e.to_string()))?;
        let pending: VecDeque<PathBuf> = files
            .into_iter()
            .filter(|p| ImageFormat::from_path(p).is_ok())
            .collect();
        info!("{} frames queued from {}", pending.len(), dir.display());
        Ok(Self { pending })
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        let Some(path) = self.pending.pop_front() else {
            return Ok(None);
        };
        let frame = image::open(&path)
            .map_err(|source| CaptureError::Frame {
                path: path.clone(),
                source,
            })?
            .to_rgb8();
        debug!("frame {}", path.display());
        Ok(Some(frame))
    }
}

/// One marker line of a recording. Pose fields are optional.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedMarker {
    pub id: u32,
    /// TL, TR, BR, BL in pixels.
    pub corners: [[f64; 2]; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rvec: Option<[f64; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tvec: Option<[f64; 3]>,
}

impl RecordedMarker {
    fn corners(&self) -> [Point2<f64>; 4] {
        self.corners.map(|[x, y]| Point2::new(x, y))
    }

    fn recorded_pose(&self) -> Option<MarkerPose> {
        match (self.rvec, self.tvec) {
            (Some(r), Some(t)) => Some(MarkerPose::new(Vector3::from(r), Vector3::from(t))),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordedFrame {
    pub frame: usize,
    #[serde(default)]
    pub markers: Vec<RecordedMarker>,
}

#[derive(thiserror::Error, Debug)]
pub enum RecordingError {
    #[error("failed to read detections {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read detections line {line}: {source}")]
    Read {
        line: usize,
        #[source]
        source: std::io::Error,
    },
    #[error("detections line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Parse a JSON Lines recording. Blank lines are ignored.
pub fn parse_detections(reader: impl BufRead) -> Result<Vec<RecordedFrame>, RecordingError> {
    let mut frames = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|source| RecordingError::Read {
            line: idx + 1,
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let frame = serde_json::from_str(&line).map_err(|source| RecordingError::Parse {
            line: idx + 1,
            source,
        })?;
        frames.push(frame);
    }
    Ok(frames)
}

/// Replays recorded detections, one recorded frame per `track` call.
///
/// Markers without a recorded pose get one from their corners. If that
/// fails the marker is dropped for the frame.
#[derive(Debug, Default)]
pub struct RecordedTracker {
    frames: HashMap<usize, Vec<RecordedMarker>>,
    next: usize,
}

impl RecordedTracker {
    pub fn from_frames(frames: Vec<RecordedFrame>) -> Self {
        let mut by_index: HashMap<usize, Vec<RecordedMarker>> = HashMap::new();
        for f in frames {
            by_index.entry(f.frame).or_default().extend(f.markers);
        }
        Self {
            frames: by_index,
            next: 0,
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RecordingError> {
        Self::load_path(path.as_ref())
    }

    #[cfg_attr(feature = "tracing", tracing::instrument(level = "info"))]
    fn load_path(path: &Path) -> Result<Self, RecordingError> {
        let file = std::fs::File::open(path).map_err(|source| RecordingError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let frames = parse_detections(std::io::BufReader::new(file)).map_err(|e| match e {
            RecordingError::Read { source, .. } => RecordingError::Io {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        info!("{} recorded frames from {}", frames.len(), path.display());
        Ok(Self::from_frames(frames))
    }
}

impl MarkerTracker for RecordedTracker {
    fn track(
        &mut self,
        _frame: &RgbImage,
        scene: &SceneGeometry,
    ) -> Result<Vec<DetectedMarker>, TrackError> {
        let index = self.next;
        self.next += 1;
        let Some(recorded) = self.frames.get(&index) else {
            return Ok(Vec::new());
        };

        let mut markers = Vec::with_capacity(recorded.len());
        for m in recorded {
            let image_corners = m.corners();
            let pose = match m.recorded_pose() {
                Some(pose) => pose,
                None => {
                    let estimated = estimate_marker_pose(
                        &scene.object_points,
                        &image_corners,
                        &scene.intrinsics,
                    );
                    match estimated {
                        Ok(pose) => pose,
                        Err(e) => {
                            warn!("frame {index}: marker {} dropped: {e}", m.id);
                            continue;
                        }
                    }
                }
            };
            markers.push(DetectedMarker {
                id: m.id,
                image_corners,
                pose,
            });
        }
        Ok(markers)
    }
}

/// Writes every displayed frame as `frame_NNNNNN.png`.
#[derive(Debug)]
pub struct DirectorySink {
    dir: PathBuf,
    written: usize,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            written: 0,
        }
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl FrameSink for DirectorySink {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        if self.written == 0 {
            std::fs::create_dir_all(&self.dir)?;
        }
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame.save(&path)?;
        self.written += 1;
        Ok(())
    }
}

/// Discards frames.
#[derive(Debug, Default)]
pub struct NullSink;

impl FrameSink for NullSink {
    fn show(&mut self, _frame: &RgbImage) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Keys from a script, one character per poll. `.` means no key pressed.
#[derive(Debug, Default)]
pub struct ScriptedKeys {
    script: VecDeque<Option<char>>,
}

impl ScriptedKeys {
    pub fn new(script: &str) -> Self {
        Self {
            script: script.chars().map(|c| (c != '.').then_some(c)).collect(),
        }
    }
}

impl KeySource for ScriptedKeys {
    fn poll_key(&mut self, _timeout: Duration) -> Option<char> {
        self.script.pop_front().flatten()
    }
}
