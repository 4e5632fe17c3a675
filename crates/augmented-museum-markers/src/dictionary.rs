//! Marker dictionaries: packed row-major inner-bit codes per id.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

#[derive(thiserror::Error, Debug)]
pub enum DictionaryError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("no built-in dictionary named {0:?}")]
    UnknownBuiltin(String),
    #[error("dictionary has no codes")]
    Empty,
    #[error("marker_size {marker_size} implies {bits} bits > 64 (unsupported)")]
    MarkerTooLarge { marker_size: usize, bits: usize },
    #[error("code for marker id {id} sets bits beyond the {bits}-bit payload")]
    CodeOutOfRange { id: usize, bits: usize },
}

/// An ArUco-style dictionary loaded from JSON.
///
/// Uses the `*_CODES.json` layout: one `u64` per marker id, encoding the
/// inner `marker_size × marker_size` bits in row-major order with
/// **black = 1**.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dictionary {
    /// Dictionary name, e.g. `DICT_4X4_250`.
    pub name: String,
    /// Inner bits per marker side.
    pub marker_size: usize,
    /// Largest bit-error count a detector may correct for this set.
    #[serde(default)]
    pub max_correction_bits: u8,
    pub codes: Vec<u64>,
}

impl Dictionary {
    pub fn from_json_str(raw: &str) -> Result<Self, DictionaryError> {
        let dict: Self = serde_json::from_str(raw)?;
        dict.validate()?;
        Ok(dict)
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, DictionaryError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    fn validate(&self) -> Result<(), DictionaryError> {
        let bits = self.bit_count();
        if bits > 64 {
            return Err(DictionaryError::MarkerTooLarge {
                marker_size: self.marker_size,
                bits,
            });
        }
        if self.codes.is_empty() {
            return Err(DictionaryError::Empty);
        }
        if bits < 64 {
            if let Some(id) = self.codes.iter().position(|&c| c >> bits != 0) {
                return Err(DictionaryError::CodeOutOfRange { id, bits });
            }
        }
        Ok(())
    }

    /// `marker_size²`.
    #[inline]
    pub fn bit_count(&self) -> usize {
        self.marker_size * self.marker_size
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn code(&self, id: u32) -> Option<u64> {
        self.codes.get(id as usize).copied()
    }

    /// Inner bit at `(x, y)` of marker `id`; `true` means black.
    pub fn bit(&self, id: u32, x: usize, y: usize) -> Option<bool> {
        let code = self.code(id)?;
        if x >= self.marker_size || y >= self.marker_size {
            return None;
        }
        Some((code >> (y * self.marker_size + x)) & 1 == 1)
    }
}
