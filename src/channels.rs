//! Canonical EEG channel manifest.
//!
//! The 48-channel subset and its ordering are a single source of truth:
//! every downstream component (loader, preprocessor, encoder) assumes
//! this exact order. Changing it invalidates any persisted `ModelBundle`.

use crate::error::{Error, Result};

/// Number of canonical channels, `C` in the spec.
pub const NUM_CHANNELS: usize = 48;

/// Canonical channel names in manifest order (extended 10-10 montage).
pub const CANONICAL_CHANNELS: [&str; NUM_CHANNELS] = [
    "Fp1", "Fp2", "F7", "F3", "Fz", "F4", "F8", "FC5", "FC1", "FC2", "FC6", "T7", "C3", "Cz",
    "C4", "T8", "TP9", "CP5", "CP1", "CP2", "CP6", "TP10", "P7", "P3", "Pz", "P4", "P8", "PO9",
    "O1", "Oz", "O2", "PO10", "AF7", "AF3", "AF4", "AF8", "F5", "F1", "F2", "F6", "FT7", "FC3",
    "FCz", "FC4", "FT8", "C5", "C1", "C2",
];

/// Returns the canonical channel manifest.
pub fn manifest() -> &'static [&'static str; NUM_CHANNELS] {
    &CANONICAL_CHANNELS
}

/// Resolve the index of a canonical channel into the manifest, or
/// `None` if `name` is not one of the 48 canonical channels.
pub fn index_of(name: &str) -> Option<usize> {
    CANONICAL_CHANNELS.iter().position(|&c| c == name)
}

/// Validate that `names` contains every canonical channel (order and
/// extras in `names` don't matter — the loader selects by name).
pub fn validate_channel_set(names: &[String]) -> Result<()> {
    for required in CANONICAL_CHANNELS.iter() {
        if !names.iter().any(|n| n == required) {
            return Err(Error::InputFormat(format!(
                "missing required channel '{required}'"
            )));
        }
    }
    Ok(())
}
