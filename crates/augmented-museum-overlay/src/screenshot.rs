//! Timestamped PNG screenshots.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use image::RgbImage;

use crate::ScreenshotWriter;

#[derive(thiserror::Error, Debug)]
pub enum ScreenshotError {
    #[error("failed to prepare {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// `YYYYMMDD_HHMMSS` in UTC.
pub fn timestamp_utc(t: SystemTime) -> String {
    let secs = t
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    let (days, rem) = (secs.div_euclid(86_400), secs.rem_euclid(86_400));
    let (y, m, d) = civil_from_days(days);
    format!(
        "{y:04}{m:02}{d:02}_{:02}{:02}{:02}",
        rem / 3600,
        (rem % 3600) / 60,
        rem % 60
    )
}

// Days since 1970-01-01 to a proleptic Gregorian date.
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

/// Writes `<dir>/<timestamp>.png`, appending `_N` when the name is taken.
pub struct TimestampedScreenshots {
    dir: PathBuf,
    clock: Box<dyn FnMut() -> SystemTime>,
}

impl TimestampedScreenshots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_clock(dir, SystemTime::now)
    }

    pub fn with_clock(
        dir: impl Into<PathBuf>,
        clock: impl FnMut() -> SystemTime + 'static,
    ) -> Self {
        Self {
            dir: dir.into(),
            clock: Box::new(clock),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn free_path(&self, stamp: &str) -> PathBuf {
        let first = self.dir.join(format!("{stamp}.png"));
        if !first.exists() {
            return first;
        }
        (1..)
            .map(|n| self.dir.join(format!("{stamp}_{n}.png")))
            .find(|p| !p.exists())
            .unwrap_or(first)
    }
}

impl ScreenshotWriter for TimestampedScreenshots {
    fn save(&mut self, frame: &RgbImage) -> Result<PathBuf, ScreenshotError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| ScreenshotError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let stamp = timestamp_utc((self.clock)());
        let path = self.free_path(&stamp);
        frame.save(&path).map_err(|source| ScreenshotError::Encode {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }
}
