//! Camera calibration files.
//!
//! Two layouts are accepted:
//! - JSON, where each matrix is a nested array, a flat array or
//!   `{"rows", "cols", "data"}`;
//! - OpenCV FileStorage XML (`.xml`), with `opencv-matrix` nodes.
//!
//! Both read the same keys: `camera_matrix` (required), `dist_coeffs` and the
//! optional per-view `rotation_vectors` / `translation_vectors`.

use std::path::{Path, PathBuf};

use augmented_museum_core::{CameraError, CameraIntrinsics, DistortionCoeffs};
use log::{info, warn};
use nalgebra::{Matrix3, Vector3};
use roxmltree::Node;
use serde::Deserialize;

#[derive(thiserror::Error, Debug)]
pub enum CalibrationError {
    #[error("failed to read calibration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid calibration JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid calibration XML: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("calibration has no {0}")]
    Missing(&'static str),
    #[error("{field}: {reason}")]
    BadMatrix { field: String, reason: String },
    #[error(transparent)]
    Camera(#[from] CameraError),
}

/// Loaded calibration. Only `intrinsics` drives projection; the per-view
/// extrinsics are kept for reporting.
#[derive(Clone, Debug)]
pub struct Calibration {
    pub intrinsics: CameraIntrinsics,
    pub rotation_vectors: Vec<Vector3<f64>>,
    pub translation_vectors: Vec<Vector3<f64>>,
}

#[derive(Clone, Debug, PartialEq)]
struct RawMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl RawMatrix {
    fn check(self, field: &str) -> Result<Self, CalibrationError> {
        if self.rows * self.cols != self.data.len() {
            return Err(bad(
                field,
                format!(
                    "{}x{} matrix with {} values",
                    self.rows,
                    self.cols,
                    self.data.len()
                ),
            ));
        }
        Ok(self)
    }

    fn into_matrix3(self, field: &str) -> Result<Matrix3<f64>, CalibrationError> {
        if self.rows != 3 || self.cols != 3 {
            return Err(bad(field, format!("expected 3x3, got {}x{}", self.rows, self.cols)));
        }
        Ok(Matrix3::from_row_slice(&self.data))
    }

    fn into_vector3(self, field: &str) -> Result<Vector3<f64>, CalibrationError> {
        if self.data.len() != 3 {
            return Err(bad(field, format!("expected 3 values, got {}", self.data.len())));
        }
        Ok(Vector3::new(self.data[0], self.data[1], self.data[2]))
    }
}

fn bad(field: &str, reason: String) -> CalibrationError {
    CalibrationError::BadMatrix {
        field: field.to_string(),
        reason,
    }
}

fn assemble(
    camera_matrix: Option<RawMatrix>,
    dist_coeffs: Option<RawMatrix>,
    rotation_vectors: Vec<RawMatrix>,
    translation_vectors: Vec<RawMatrix>,
) -> Result<Calibration, CalibrationError> {
    let k = camera_matrix
        .ok_or(CalibrationError::Missing("camera_matrix"))?
        .check("camera_matrix")?
        .into_matrix3("camera_matrix")?;
    let distortion = match dist_coeffs {
        Some(d) => DistortionCoeffs::from_slice(&d.check("dist_coeffs")?.data)?,
        None => {
            warn!("calibration has no dist_coeffs, assuming zero distortion");
            DistortionCoeffs::default()
        }
    };
    let vectors = |list: Vec<RawMatrix>, field: &str| {
        list.into_iter()
            .map(|m| m.check(field)?.into_vector3(field))
            .collect::<Result<Vec<_>, _>>()
    };
    Ok(Calibration {
        intrinsics: CameraIntrinsics::new(k, distortion)?,
        rotation_vectors: vectors(rotation_vectors, "rotation_vectors")?,
        translation_vectors: vectors(translation_vectors, "translation_vectors")?,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum MatrixField {
    Nested(Vec<Vec<f64>>),
    Flat(Vec<f64>),
    Object {
        rows: usize,
        cols: usize,
        data: Vec<f64>,
    },
}

impl MatrixField {
    fn into_raw(self, field: &str) -> Result<RawMatrix, CalibrationError> {
        Ok(match self {
            MatrixField::Nested(rows) => {
                let cols = rows.first().map_or(0, Vec::len);
                if rows.iter().any(|r| r.len() != cols) {
                    return Err(bad(field, "ragged rows".to_string()));
                }
                RawMatrix {
                    rows: rows.len(),
                    cols,
                    data: rows.into_iter().flatten().collect(),
                }
            }
            MatrixField::Flat(data) => RawMatrix {
                rows: 1,
                cols: data.len(),
                data,
            },
            MatrixField::Object { rows, cols, data } => RawMatrix { rows, cols, data },
        })
    }
}

#[derive(Deserialize)]
struct CalibrationJson {
    camera_matrix: Option<MatrixField>,
    dist_coeffs: Option<MatrixField>,
    #[serde(default)]
    rotation_vectors: Vec<MatrixField>,
    #[serde(default)]
    translation_vectors: Vec<MatrixField>,
}

pub fn calibration_from_json_str(s: &str) -> Result<Calibration, CalibrationError> {
    let raw: CalibrationJson = serde_json::from_str(s)?;
    let list = |v: Vec<MatrixField>, field: &str| {
        v.into_iter()
            .map(|m| m.into_raw(field))
            .collect::<Result<Vec<_>, _>>()
    };
    assemble(
        raw.camera_matrix
            .map(|m| m.into_raw("camera_matrix"))
            .transpose()?,
        raw.dist_coeffs
            .map(|m| m.into_raw("dist_coeffs"))
            .transpose()?,
        list(raw.rotation_vectors, "rotation_vectors")?,
        list(raw.translation_vectors, "translation_vectors")?,
    )
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn parse_usize(node: Node<'_, '_>, tag: &str, field: &str) -> Result<usize, CalibrationError> {
    let text = child_element(node, tag)
        .and_then(|n| n.text())
        .ok_or_else(|| bad(field, format!("missing <{tag}>")))?;
    text.trim()
        .parse()
        .map_err(|_| bad(field, format!("<{tag}> is not an integer: {text:?}")))
}

fn parse_opencv_matrix(node: Node<'_, '_>, field: &str) -> Result<RawMatrix, CalibrationError> {
    let rows = parse_usize(node, "rows", field)?;
    let cols = parse_usize(node, "cols", field)?;
    let data = child_element(node, "data")
        .and_then(|n| n.text())
        .unwrap_or("")
        .split_whitespace()
        .map(|tok| {
            tok.parse::<f64>()
                .map_err(|_| bad(field, format!("bad number {tok:?}")))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RawMatrix { rows, cols, data })
}

pub fn calibration_from_xml_str(xml: &str) -> Result<Calibration, CalibrationError> {
    let doc = roxmltree::Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "opencv_storage" {
        return Err(bad(
            "document",
            format!("expected <opencv_storage>, found <{}>", root.tag_name().name()),
        ));
    }
    let matrix = |tag: &'static str| {
        child_element(root, tag)
            .map(|n| parse_opencv_matrix(n, tag))
            .transpose()
    };
    let sequence = |tag: &'static str| -> Result<Vec<RawMatrix>, CalibrationError> {
        let Some(node) = child_element(root, tag) else {
            return Ok(Vec::new());
        };
        node.children()
            .filter(|c| c.is_element())
            .map(|c| parse_opencv_matrix(c, tag))
            .collect()
    };
    assemble(
        matrix("camera_matrix")?,
        matrix("dist_coeffs")?,
        sequence("rotation_vectors")?,
        sequence("translation_vectors")?,
    )
}

fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xml"))
}

/// Read a calibration file; `.xml` is parsed as OpenCV FileStorage, anything
/// else as JSON.
#[cfg_attr(feature = "tracing", tracing::instrument(level = "info"))]
pub fn load_calibration(path: &Path) -> Result<Calibration, CalibrationError> {
    let raw = std::fs::read_to_string(path).map_err(|source| CalibrationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let calibration = if has_xml_extension(path) {
        calibration_from_xml_str(&raw)?
    } else {
        calibration_from_json_str(&raw)?
    };
    info!(
        "calibration loaded from {}: K = {:?}, distortion = {:?}, {} views",
        path.display(),
        calibration.intrinsics.camera_matrix().as_slice(),
        calibration.intrinsics.distortion().to_vec(),
        calibration.rotation_vectors.len()
    );
    Ok(calibration)
}
