//! Frame loop: capture, track, render, display, then one key poll.
//!
//! The loop owns its devices. [`InteractionLoop::run`] consumes the loop, so
//! every device is dropped when it returns, whether it returns `Ok` or `Err`.

use std::path::PathBuf;
use std::time::Duration;

use image::RgbImage;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    DetectedMarker, Direction, MarkerOverlayDriver, MuseumConfig, RenderReport, SceneGeometry,
    ScreenshotError, Session,
};

#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    #[error("capture device unavailable: {0}")]
    Unavailable(String),
    #[error("failed to read frame {path}: {source}")]
    Frame {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

#[derive(thiserror::Error, Debug)]
pub enum TrackError {
    #[error("tracker failed: {0}")]
    Backend(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(thiserror::Error, Debug)]
pub enum DisplayError {
    #[error("display closed")]
    Closed,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

#[derive(thiserror::Error, Debug)]
pub enum LoopError {
    #[error("frame capture failed: {0}")]
    Capture(#[from] CaptureError),
    #[error("frame display failed: {0}")]
    Display(#[from] DisplayError),
}

/// Produces video frames. `Ok(None)` means the stream has ended.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError>;
}

/// Detects markers and estimates their poses in one frame.
pub trait MarkerTracker {
    fn track(
        &mut self,
        frame: &RgbImage,
        scene: &SceneGeometry,
    ) -> Result<Vec<DetectedMarker>, TrackError>;
}

pub trait FrameSink {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError>;
}

/// Key input. Waits at most `timeout` for one key.
pub trait KeySource {
    fn poll_key(&mut self, timeout: Duration) -> Option<char>;
}

pub trait ScreenshotWriter {
    fn save(&mut self, frame: &RgbImage) -> Result<PathBuf, ScreenshotError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    Quit,
    Screenshot,
    CycleLeft,
    CycleRight,
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("key {key:?} is bound twice")]
pub struct KeyBindingError {
    pub key: char,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyBindings {
    pub quit: char,
    pub screenshot: char,
    pub cycle_left: char,
    pub cycle_right: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            quit: 'q',
            screenshot: 's',
            cycle_left: 'a',
            cycle_right: 'd',
        }
    }
}

impl KeyBindings {
    pub fn command_for(&self, key: char) -> Option<Command> {
        [
            (self.quit, Command::Quit),
            (self.screenshot, Command::Screenshot),
            (self.cycle_left, Command::CycleLeft),
            (self.cycle_right, Command::CycleRight),
        ]
        .into_iter()
        .find_map(|(k, cmd)| (k == key).then_some(cmd))
    }

    pub fn validate(&self) -> Result<(), KeyBindingError> {
        let keys = [self.quit, self.screenshot, self.cycle_left, self.cycle_right];
        for (i, k) in keys.iter().enumerate() {
            if keys[i + 1..].contains(k) {
                return Err(KeyBindingError { key: *k });
            }
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Terminated,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Quit,
    EndOfStream,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoopSummary {
    pub frames: usize,
    pub screenshots: usize,
    pub composite_failures: usize,
    pub end: EndReason,
}

/// Outcome of a single iteration.
#[derive(Clone, Debug, PartialEq)]
pub enum Step {
    Frame {
        markers: usize,
        report: RenderReport,
        command: Option<Command>,
        screenshot: Option<PathBuf>,
    },
    EndOfStream,
}

/// The loop's collaborators.
pub struct Devices {
    pub frames: Box<dyn FrameSource>,
    pub tracker: Box<dyn MarkerTracker>,
    pub sink: Box<dyn FrameSink>,
    pub keys: Box<dyn KeySource>,
    pub screenshots: Box<dyn ScreenshotWriter>,
}

pub struct InteractionLoop {
    devices: Devices,
    driver: MarkerOverlayDriver,
    bindings: KeyBindings,
    poll_timeout: Duration,
    state: LoopState,
}

impl InteractionLoop {
    pub fn new(devices: Devices, config: &MuseumConfig) -> Self {
        Self {
            devices,
            driver: MarkerOverlayDriver::from_kinds(config.policy, config.strategy),
            bindings: config.key_bindings,
            poll_timeout: Duration::from_millis(config.poll_timeout_ms),
            state: LoopState::Running,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn driver(&self) -> &MarkerOverlayDriver {
        &self.driver
    }

    /// Run one iteration. Gallery changes apply from the next frame.
    pub fn step(&mut self, session: &mut Session) -> Result<Step, LoopError> {
        let Some(mut frame) = self.devices.frames.next_frame()? else {
            info!("frame stream ended");
            self.state = LoopState::Terminated;
            return Ok(Step::EndOfStream);
        };

        let markers = self
            .devices
            .tracker
            .track(&frame, &session.scene)
            .unwrap_or_else(|e| {
                warn!("tracking failed, rendering frame without markers: {e}");
                Vec::new()
            });

        let report = self
            .driver
            .render(&mut frame, &markers, &session.gallery, &session.scene);
        self.devices.sink.show(&frame)?;

        let command = self
            .devices
            .keys
            .poll_key(self.poll_timeout)
            .and_then(|k| self.bindings.command_for(k));

        let mut screenshot = None;
        match command {
            Some(Command::Quit) => {
                info!("quit requested");
                self.state = LoopState::Terminated;
            }
            Some(Command::Screenshot) => match self.devices.screenshots.save(&frame) {
                Ok(path) => {
                    info!("screenshot saved to {}", path.display());
                    screenshot = Some(path);
                }
                Err(e) => warn!("screenshot failed: {e}"),
            },
            Some(Command::CycleLeft) => {
                let idx = session.gallery.cycle(Direction::Backward);
                debug!("overlay {idx} selected");
            }
            Some(Command::CycleRight) => {
                let idx = session.gallery.cycle(Direction::Forward);
                debug!("overlay {idx} selected");
            }
            None => {}
        }

        Ok(Step::Frame {
            markers: markers.len(),
            report,
            command,
            screenshot,
        })
    }

    /// Iterate until quit or end of stream. Capture and display errors abort.
    #[cfg_attr(feature = "tracing", tracing::instrument(level = "info", skip_all))]
    pub fn run(mut self, session: &mut Session) -> Result<LoopSummary, LoopError> {
        let mut frames = 0;
        let mut screenshots = 0;
        let mut composite_failures = 0;
        loop {
            match self.step(session)? {
                Step::EndOfStream => {
                    return Ok(LoopSummary {
                        frames,
                        screenshots,
                        composite_failures,
                        end: EndReason::EndOfStream,
                    });
                }
                Step::Frame {
                    report,
                    command,
                    screenshot,
                    ..
                } => {
                    frames += 1;
                    composite_failures += report.failures.len();
                    screenshots += usize::from(screenshot.is_some());
                    if command == Some(Command::Quit) {
                        return Ok(LoopSummary {
                            frames,
                            screenshots,
                            composite_failures,
                            end: EndReason::Quit,
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Gallery, OverlayImage, OverlayPolicy};
    use augmented_museum_core::{CameraIntrinsics, MarkerPose};
    use image::Rgb;
    use nalgebra::{Point2, Vector3};
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use std::rc::Rc;

    const RED: Rgb<u8> = Rgb([255, 0, 0]);
    const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
    const BLUE: Rgb<u8> = Rgb([0, 0, 255]);

    struct Frames(VecDeque<Result<Option<RgbImage>, CaptureError>>);

    impl FrameSource for Frames {
        fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
            self.0.pop_front().unwrap_or(Ok(None))
        }
    }

    fn frames(n: usize) -> Frames {
        Frames((0..n).map(|_| Ok(Some(RgbImage::new(80, 60)))).collect())
    }

    struct OneMarker;

    impl MarkerTracker for OneMarker {
        fn track(
            &mut self,
            _frame: &RgbImage,
            _scene: &SceneGeometry,
        ) -> Result<Vec<DetectedMarker>, TrackError> {
            Ok(vec![DetectedMarker {
                id: 0,
                image_corners: [
                    Point2::new(20.0, 20.0),
                    Point2::new(40.0, 20.0),
                    Point2::new(40.0, 40.0),
                    Point2::new(20.0, 40.0),
                ],
                pose: MarkerPose::new(Vector3::zeros(), Vector3::new(0.0, 0.0, 1000.0)),
            }])
        }
    }

    struct BrokenTracker;

    impl MarkerTracker for BrokenTracker {
        fn track(
            &mut self,
            _frame: &RgbImage,
            _scene: &SceneGeometry,
        ) -> Result<Vec<DetectedMarker>, TrackError> {
            Err(TrackError::Backend("lost".into()))
        }
    }

    #[derive(Clone, Default)]
    struct Shown {
        frames: Rc<RefCell<Vec<RgbImage>>>,
        dropped: Rc<Cell<bool>>,
    }

    struct Sink(Shown);

    impl FrameSink for Sink {
        fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
            self.0.frames.borrow_mut().push(frame.clone());
            Ok(())
        }
    }

    impl Drop for Sink {
        fn drop(&mut self) {
            self.0.dropped.set(true);
        }
    }

    struct Keys(VecDeque<Option<char>>);

    impl KeySource for Keys {
        fn poll_key(&mut self, _timeout: Duration) -> Option<char> {
            self.0.pop_front().flatten()
        }
    }

    fn keys(script: &str) -> Keys {
        Keys(script.chars().map(|c| (c != '.').then_some(c)).collect())
    }

    #[derive(Default)]
    struct Shots {
        saved: Rc<Cell<usize>>,
        fail: bool,
    }

    impl ScreenshotWriter for Shots {
        fn save(&mut self, _frame: &RgbImage) -> Result<PathBuf, ScreenshotError> {
            if self.fail {
                return Err(ScreenshotError::Io {
                    path: PathBuf::from("img"),
                    source: std::io::Error::other("disk full"),
                });
            }
            self.saved.set(self.saved.get() + 1);
            Ok(PathBuf::from(format!("img/{}.png", self.saved.get())))
        }
    }

    fn session() -> Session {
        let gallery = Gallery::new(
            [RED, GREEN, BLUE]
                .into_iter()
                .map(|c| OverlayImage::new(RgbImage::from_pixel(8, 8, c)))
                .collect(),
        )
        .expect("gallery");
        let config = MuseumConfig {
            policy: OverlayPolicy::Broadcast,
            strategy: crate::StrategyKind::CornerWarp,
            ..MuseumConfig::default()
        };
        let scene = SceneGeometry::new(
            CameraIntrinsics::pinhole(300.0, 300.0, 40.0, 30.0).expect("intrinsics"),
            200.0,
            1.0,
        );
        Session::new(scene, gallery, config)
    }

    fn devices(
        frames: Frames,
        tracker: Box<dyn MarkerTracker>,
        sink: &Shown,
        key_script: &str,
    ) -> Devices {
        Devices {
            frames: Box::new(frames),
            tracker,
            sink: Box::new(Sink(sink.clone())),
            keys: Box::new(keys(key_script)),
            screenshots: Box::new(Shots::default()),
        }
    }

    #[test]
    fn default_bindings_map_commands() {
        let b = KeyBindings::default();
        assert_eq!(b.command_for('q'), Some(Command::Quit));
        assert_eq!(b.command_for('s'), Some(Command::Screenshot));
        assert_eq!(b.command_for('a'), Some(Command::CycleLeft));
        assert_eq!(b.command_for('d'), Some(Command::CycleRight));
        assert_eq!(b.command_for('x'), None);
        assert!(b.validate().is_ok());
    }

    #[test]
    fn driver_follows_configured_policy_and_strategy() {
        let shown = Shown::default();
        let s = session();
        let devs = devices(frames(1), Box::new(OneMarker), &shown, "");
        let lp = InteractionLoop::new(devs, &s.config);
        assert_eq!(lp.driver().policy(), OverlayPolicy::Broadcast);
        assert_eq!(lp.driver().strategy().name(), "corner_warp");

        let config = MuseumConfig {
            policy: OverlayPolicy::PerMarkerId,
            strategy: crate::StrategyKind::PoseProjection,
            ..MuseumConfig::default()
        };
        let devs = devices(frames(1), Box::new(OneMarker), &shown, "");
        let lp = InteractionLoop::new(devs, &config);
        assert_eq!(lp.driver().policy(), OverlayPolicy::PerMarkerId);
        assert_eq!(lp.driver().strategy().name(), "pose_projection");
        assert_eq!(lp.state(), LoopState::Running);
    }

    #[test]
    fn quit_key_terminates_and_releases_devices() {
        let shown = Shown::default();
        let mut s = session();
        let devs = devices(frames(10), Box::new(OneMarker), &shown, "..q");
        let lp = InteractionLoop::new(devs, &s.config);
        let summary = lp.run(&mut s).expect("run");
        assert_eq!(summary.frames, 3);
        assert_eq!(summary.end, EndReason::Quit);
        assert_eq!(shown.frames.borrow().len(), 3);
        assert!(shown.dropped.get());
    }

    #[test]
    fn end_of_stream_terminates_cleanly() {
        let shown = Shown::default();
        let mut s = session();
        let devs = devices(frames(2), Box::new(OneMarker), &shown, "");
        let summary = InteractionLoop::new(devs, &s.config)
            .run(&mut s)
            .expect("run");
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.end, EndReason::EndOfStream);
    }

    #[test]
    fn capture_error_is_fatal_and_releases_devices() {
        let shown = Shown::default();
        let mut s = session();
        let mut source = frames(1);
        source
            .0
            .push_back(Err(CaptureError::Unavailable("unplugged".into())));
        let err = InteractionLoop::new(devices(source, Box::new(OneMarker), &shown, ""), &s.config)
            .run(&mut s)
            .expect_err("capture");
        assert!(matches!(err, LoopError::Capture(CaptureError::Unavailable(_))));
        assert_eq!(shown.frames.borrow().len(), 1);
        assert!(shown.dropped.get());
    }

    #[test]
    fn cycle_takes_effect_on_next_frame() {
        let shown = Shown::default();
        let mut s = session();
        InteractionLoop::new(devices(frames(3), Box::new(OneMarker), &shown, "da"), &s.config)
            .run(&mut s)
            .expect("run");
        let colors: Vec<Rgb<u8>> = shown
            .frames
            .borrow()
            .iter()
            .map(|f| *f.get_pixel(30, 30))
            .collect();
        assert_eq!(colors, vec![RED, GREEN, RED]);
        assert_eq!(s.gallery.current_index(), 0);
    }

    #[test]
    fn screenshot_key_saves_composited_frame() {
        let shown = Shown::default();
        let mut s = session();
        let saved = Rc::new(Cell::new(0));
        let mut d = devices(frames(3), Box::new(OneMarker), &shown, "s.s");
        d.screenshots = Box::new(Shots {
            saved: saved.clone(),
            fail: false,
        });
        let summary = InteractionLoop::new(d, &s.config).run(&mut s).expect("run");
        assert_eq!(summary.screenshots, 2);
        assert_eq!(saved.get(), 2);
    }

    #[test]
    fn failed_screenshot_is_not_fatal() {
        let shown = Shown::default();
        let mut s = session();
        let mut d = devices(frames(2), Box::new(OneMarker), &shown, "s");
        d.screenshots = Box::new(Shots {
            fail: true,
            ..Shots::default()
        });
        let summary = InteractionLoop::new(d, &s.config).run(&mut s).expect("run");
        assert_eq!(summary.frames, 2);
        assert_eq!(summary.screenshots, 0);
    }

    #[test]
    fn tracker_error_renders_plain_frame() {
        let shown = Shown::default();
        let mut s = session();
        let devs = devices(frames(1), Box::new(BrokenTracker), &shown, "");
        let mut lp = InteractionLoop::new(devs, &s.config);
        let step = lp.step(&mut s).expect("step");
        assert!(matches!(step, Step::Frame { markers: 0, .. }));
        assert_eq!(shown.frames.borrow()[0], RgbImage::new(80, 60));
        assert_eq!(lp.state(), LoopState::Running);
        assert_eq!(lp.step(&mut s).expect("end"), Step::EndOfStream);
        assert_eq!(lp.state(), LoopState::Terminated);
    }
}
