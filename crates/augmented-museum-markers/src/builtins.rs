//! Embedded built-in dictionaries.
//!
//! The source of truth lives in `augmented-museum-markers/data/*_CODES.json`.

use crate::{Dictionary, DictionaryError};

/// Dictionary used when no codes file is given: 250 ids of 6×6 bits.
pub const DEFAULT_DICTIONARY: &str = "MUSEUM_6X6_250";

const BUILTINS: &[(&str, &str)] = &[(
    DEFAULT_DICTIONARY,
    include_str!("../data/MUSEUM_6X6_250_CODES.json"),
)];

/// Names accepted by [`builtin_dictionary`].
pub fn builtin_dictionary_names() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(name, _)| *name)
}

pub fn builtin_dictionary(name: &str) -> Result<Dictionary, DictionaryError> {
    let (_, raw) = BUILTINS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .ok_or_else(|| DictionaryError::UnknownBuiltin(name.to_string()))?;
    Dictionary::from_json_str(raw)
}
