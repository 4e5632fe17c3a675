//! Fiducial dictionaries and printable marker generation.
//!
//! Detection is not part of this crate; it only turns a dictionary id into a
//! raster that a detector can later recognise.

mod builtins;
mod dictionary;
mod render;

pub use builtins::{builtin_dictionary, builtin_dictionary_names, DEFAULT_DICTIONARY};
pub use dictionary::{Dictionary, DictionaryError};
pub use render::{
    marker_file_name, render_marker, write_marker_png, MarkerRenderConfig, MarkerRenderError,
};
