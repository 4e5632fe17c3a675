//! JSON run configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{DisplaySize, KeyBindings, OverlayPolicy, StrategyKind};

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Everything a museum session needs to start.
///
/// Every field has a default, so `{}` is a complete config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuseumConfig {
    pub calibration_path: PathBuf,
    pub images_dir: PathBuf,
    pub screenshot_dir: PathBuf,
    /// Physical marker side, in the same unit as the calibration's translations.
    pub marker_side_length: f64,
    /// Overlay height as a multiple of the marker side.
    pub overlay_scale: f64,
    pub display_size: DisplaySize,
    pub policy: OverlayPolicy,
    pub strategy: StrategyKind,
    pub key_bindings: KeyBindings,
    pub poll_timeout_ms: u64,
}

impl Default for MuseumConfig {
    fn default() -> Self {
        Self {
            calibration_path: PathBuf::from("bin/calibration.xml"),
            images_dir: PathBuf::from("bin/paintings"),
            screenshot_dir: PathBuf::from("img"),
            marker_side_length: 200.0,
            overlay_scale: 1.0,
            display_size: DisplaySize::default(),
            policy: OverlayPolicy::default(),
            strategy: StrategyKind::default(),
            key_bindings: KeyBindings::default(),
            poll_timeout_ms: 10,
        }
    }
}

impl MuseumConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: Self = serde_json::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.marker_side_length.is_finite() && self.marker_side_length > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "marker_side_length must be positive, got {}",
                self.marker_side_length
            )));
        }
        if !(self.overlay_scale.is_finite() && self.overlay_scale > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "overlay_scale must be positive, got {}",
                self.overlay_scale
            )));
        }
        if self.display_size.width == 0 || self.display_size.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "display_size must be non-empty, got {}x{}",
                self.display_size.width, self.display_size.height
            )));
        }
        self.key_bindings
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}
