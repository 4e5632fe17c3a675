use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

use augmented_museum_core::{estimate_marker_pose, MarkerPose};
use augmented_museum_overlay::{
    CaptureError, DetectedMarker, Devices, DisplayError, EndReason, FrameSink, FrameSource,
    InteractionLoop, KeySource, MarkerTracker, MuseumConfig, OverlayPolicy, SceneGeometry,
    Session, StrategyKind, TimestampedScreenshots, TrackError,
};
use image::{Rgb, RgbImage};
use nalgebra::Vector3;

const CALIBRATION: &str = r#"{
    "camera_matrix": [[640, 0, 160], [0, 640, 120], [0, 0, 1]],
    "dist_coeffs": [0, 0, 0, 0, 0]
}"#;

fn write_museum(dir: &std::path::Path) -> MuseumConfig {
    let paintings = dir.join("paintings");
    std::fs::create_dir(&paintings).expect("mkdir");
    for (name, color) in [("01.png", [200, 30, 30]), ("02.png", [30, 200, 30])] {
        RgbImage::from_pixel(28, 36, Rgb(color))
            .save(paintings.join(name))
            .expect("save painting");
    }
    let calibration = dir.join("calibration.json");
    std::fs::write(&calibration, CALIBRATION).expect("write calibration");
    MuseumConfig {
        calibration_path: calibration,
        images_dir: paintings,
        screenshot_dir: dir.join("img"),
        display_size: augmented_museum_overlay::DisplaySize {
            width: 56,
            height: 72,
        },
        ..MuseumConfig::default()
    }
}

struct Blank(usize);

impl FrameSource for Blank {
    fn next_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        if self.0 == 0 {
            return Ok(None);
        }
        self.0 -= 1;
        Ok(Some(RgbImage::from_pixel(320, 240, Rgb([10, 10, 10]))))
    }
}

/// Projects a fixed marker pose and recovers it from the corners.
struct Projecting {
    id: u32,
    truth: MarkerPose,
}

impl MarkerTracker for Projecting {
    fn track(
        &mut self,
        _frame: &RgbImage,
        scene: &SceneGeometry,
    ) -> Result<Vec<DetectedMarker>, TrackError> {
        let px = scene
            .intrinsics
            .project_points(&self.truth, scene.object_points.points())
            .map_err(|e| TrackError::Backend(e.to_string()))?;
        let corners = [px[0], px[1], px[2], px[3]];
        let pose = estimate_marker_pose(&scene.object_points, &corners, &scene.intrinsics)
            .map_err(|e| TrackError::Backend(e.to_string()))?;
        Ok(vec![DetectedMarker {
            id: self.id,
            image_corners: corners,
            pose,
        }])
    }
}

#[derive(Clone, Default)]
struct Captured(Rc<RefCell<Vec<RgbImage>>>);

impl FrameSink for Captured {
    fn show(&mut self, frame: &RgbImage) -> Result<(), DisplayError> {
        self.0.borrow_mut().push(frame.clone());
        Ok(())
    }
}

struct Script(Vec<Option<char>>);

impl KeySource for Script {
    fn poll_key(&mut self, _timeout: Duration) -> Option<char> {
        if self.0.is_empty() {
            None
        } else {
            self.0.remove(0)
        }
    }
}

fn truth() -> MarkerPose {
    MarkerPose::new(
        Vector3::new(std::f64::consts::PI - 0.2, 0.1, 0.0),
        Vector3::new(5.0, -3.0, 2500.0),
    )
}

#[test]
fn loaded_session_renders_cycles_and_screenshots() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = write_museum(dir.path());
    let mut session = Session::load(config).expect("session");
    assert_eq!(session.gallery.len(), 2);

    let shown = Captured::default();
    let devices = Devices {
        frames: Box::new(Blank(5)),
        tracker: Box::new(Projecting {
            id: 0,
            truth: truth(),
        }),
        sink: Box::new(shown.clone()),
        keys: Box::new(Script(vec![None, Some('d'), Some('s'), Some('x')])),
        screenshots: Box::new(TimestampedScreenshots::new(
            session.config.screenshot_dir.clone(),
        )),
    };
    let summary = InteractionLoop::new(devices, &session.config)
        .run(&mut session)
        .expect("run");

    assert_eq!(summary.frames, 5);
    assert_eq!(summary.end, EndReason::EndOfStream);
    assert_eq!(summary.screenshots, 1);
    assert_eq!(summary.composite_failures, 0);

    let frames = shown.0.borrow();
    let centre = |i: usize| *frames[i].get_pixel(165, 115);
    assert_eq!(centre(0), Rgb([200, 30, 30]));
    assert_eq!(centre(1), Rgb([200, 30, 30]));
    assert_eq!(centre(2), Rgb([30, 200, 30]));
    assert_eq!(*frames[4].get_pixel(2, 2), Rgb([10, 10, 10]));

    let shots: Vec<PathBuf> = std::fs::read_dir(&session.config.screenshot_dir)
        .expect("img dir")
        .map(|e| e.expect("entry").path())
        .collect();
    assert_eq!(shots.len(), 1);
    let saved = image::open(&shots[0]).expect("decode").to_rgb8();
    assert_eq!(saved, frames[2]);
}

#[test]
fn per_marker_policy_with_corner_warp_ignores_selection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = MuseumConfig {
        policy: OverlayPolicy::PerMarkerId,
        strategy: StrategyKind::CornerWarp,
        ..write_museum(dir.path())
    };
    let mut session = Session::load(config).expect("session");

    let shown = Captured::default();
    let devices = Devices {
        frames: Box::new(Blank(3)),
        tracker: Box::new(Projecting {
            id: 3,
            truth: truth(),
        }),
        sink: Box::new(shown.clone()),
        keys: Box::new(Script(vec![Some('a'), Some('a'), Some('q')])),
        screenshots: Box::new(TimestampedScreenshots::new(dir.path().join("unused"))),
    };
    let summary = InteractionLoop::new(devices, &session.config)
        .run(&mut session)
        .expect("run");
    assert_eq!(summary.end, EndReason::Quit);
    assert_eq!(summary.frames, 3);

    // Marker 3 over two images always shows the second one.
    for frame in shown.0.borrow().iter() {
        assert_eq!(*frame.get_pixel(165, 115), Rgb([30, 200, 30]));
    }
}
