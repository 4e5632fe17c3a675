use std::path::Path;

use assert_cmd::Command;
use augmented_museum::markers::{builtin_dictionary, DEFAULT_DICTIONARY};
use image::{Rgb, RgbImage};
use predicates::prelude::*;

const DICTIONARY: &str = r#"{"name":"TEST_3X3","marker_size":3,"max_correction_bits":0,"codes":[341,0,511,146]}"#;

const CALIBRATION: &str = r#"{
    "camera_matrix": [[500, 0, 160], [0, 500, 120], [0, 0, 1]],
    "dist_coeffs": [0, 0, 0, 0, 0]
}"#;

fn museum() -> Command {
    Command::cargo_bin("augmented-museum").expect("binary")
}

fn write_fixture(root: &Path) {
    let paintings = root.join("paintings");
    let frames = root.join("frames");
    std::fs::create_dir(&paintings).expect("mkdir");
    std::fs::create_dir(&frames).expect("mkdir");
    RgbImage::from_pixel(20, 30, Rgb([220, 180, 40]))
        .save(paintings.join("sunflowers.png"))
        .expect("save");
    for i in 0..4 {
        RgbImage::from_pixel(320, 240, Rgb([0, 0, 0]))
            .save(frames.join(format!("{i:04}.png")))
            .expect("save");
    }
    std::fs::write(root.join("calibration.json"), CALIBRATION).expect("write");
    let line = r#"{"frame":FRAME,"markers":[{"id":1,"corners":[[135,95],[185,95],[185,145],[135,145]]}]}"#;
    let detections: String = (0..4)
        .map(|i| line.replace("FRAME", &i.to_string()) + "\n")
        .collect();
    std::fs::write(root.join("detections.jsonl"), detections).expect("write");
}

#[test]
fn generate_marker_writes_png() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dict = dir.path().join("dict.json");
    std::fs::write(&dict, DICTIONARY).expect("write");

    museum()
        .args(["generate-marker", "--dictionary"])
        .arg(&dict)
        .args(["--id", "2", "--size", "100", "--out-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("aruco_marker_2.png"));

    let img = image::open(dir.path().join("aruco_marker_2.png"))
        .expect("decode")
        .to_luma8();
    assert_eq!(img.dimensions(), (100, 100));
    // Code 511 sets every inner bit, so the marker is all black.
    assert!(img.pixels().all(|p| p[0] == 0));
}

#[test]
fn generate_marker_defaults_to_builtin_dictionary() {
    let dir = tempfile::tempdir().expect("tempdir");
    museum()
        .args(["generate-marker", "--id", "7", "--out-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("aruco_marker_7.png"));

    let img = image::open(dir.path().join("aruco_marker_7.png"))
        .expect("decode")
        .to_luma8();
    assert_eq!(img.dimensions(), (200, 200));

    // 6 inner bits plus a one-cell border: 8 cells of 25 px.
    let dict = builtin_dictionary(DEFAULT_DICTIONARY).expect("builtin");
    let mut code = 0u64;
    for y in 0..6 {
        for x in 0..6 {
            if img.get_pixel(25 * (x + 1) + 12, 25 * (y + 1) + 12)[0] < 128 {
                code |= 1 << (y * 6 + x);
            }
        }
    }
    assert_eq!(Some(code), dict.code(7));
    assert_eq!(img.get_pixel(3, 3)[0], 0);
}

#[test]
fn generate_marker_without_id_picks_one_from_the_dictionary() {
    let dir = tempfile::tempdir().expect("tempdir");
    museum()
        .args(["generate-marker", "--out-dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("aruco_marker_"));

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 1);
    let id: u32 = names[0]
        .strip_prefix("aruco_marker_")
        .and_then(|rest| rest.strip_suffix(".png"))
        .and_then(|id| id.parse().ok())
        .expect("marker file name");
    assert!(id < 250);
}

#[test]
fn generate_marker_rejects_unknown_builtin() {
    let dir = tempfile::tempdir().expect("tempdir");
    museum()
        .args(["generate-marker", "--builtin", "DICT_7X7_1000", "--id", "1", "--out-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("DICT_7X7_1000"));
}

#[test]
fn generate_marker_rejects_unknown_id() {
    let dir = tempfile::tempdir().expect("tempdir");
    let dict = dir.path().join("dict.json");
    std::fs::write(&dict, DICTIONARY).expect("write");

    museum()
        .args(["generate-marker", "--dictionary"])
        .arg(&dict)
        .args(["--id", "250", "--out-dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("250"));
}

#[test]
fn run_replays_recording_and_reports_summary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    write_fixture(root);

    museum()
        .arg("run")
        .arg("-p")
        .arg(root.join("paintings"))
        .arg("-c")
        .arg(root.join("calibration.json"))
        .arg("--frames")
        .arg(root.join("frames"))
        .arg("--detections")
        .arg(root.join("detections.jsonl"))
        .arg("--output")
        .arg(root.join("out"))
        .arg("--screenshot-dir")
        .arg(root.join("img"))
        .args(["--keys", ".s.q", "--log-level", "warn"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""frames":4"#))
        .stdout(predicate::str::contains(r#""end":"quit""#))
        .stdout(predicate::str::contains(r#""screenshots":1"#));

    let out = image::open(root.join("out").join("frame_000000.png"))
        .expect("decode")
        .to_rgb8();
    assert_eq!(*out.get_pixel(160, 120), Rgb([220, 180, 40]));
    assert_eq!(*out.get_pixel(5, 5), Rgb([0, 0, 0]));
    assert_eq!(std::fs::read_dir(root.join("img")).expect("img").count(), 1);
}

#[test]
fn run_without_calibration_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    write_fixture(root);

    museum()
        .arg("run")
        .arg("-p")
        .arg(root.join("paintings"))
        .arg("-c")
        .arg(root.join("missing.xml"))
        .arg("--frames")
        .arg(root.join("frames"))
        .arg("--detections")
        .arg(root.join("detections.jsonl"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing.xml"));
}

#[test]
fn run_with_missing_frames_dir_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    write_fixture(root);

    museum()
        .arg("run")
        .arg("-p")
        .arg(root.join("paintings"))
        .arg("-c")
        .arg(root.join("calibration.json"))
        .arg("--frames")
        .arg(root.join("camera0"))
        .arg("--detections")
        .arg(root.join("detections.jsonl"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unavailable"));
}
