//! Loads `.eegrec` recording files from disk and validates/reorders
//! their channel set against the canonical montage (spec §3, §4.A).

use std::path::Path;

use ndarray::Array2;

use crate::channels;
use crate::error::{Error, Result};
use crate::signal::format::RecordingFile;
use crate::types::Trial;

/// Read a recording file and return its trials as validated [`Trial`]s,
/// reordered to the canonical channel order. Channels present in the
/// file but outside the canonical set are dropped.
pub fn load_trials(path: &Path) -> Result<Vec<Trial>> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::InputFormat(format!("reading {}: {e}", path.display())))?;
    let recording: RecordingFile = bincode::deserialize(&bytes)
        .map_err(|e| Error::InputFormat(format!("decoding {}: {e}", path.display())))?;

    channels::validate_channel_set(&recording.channel_names)?;
    let canonical = channels::manifest();
    let keep_indices: Vec<usize> = canonical
        .iter()
        .map(|name| {
            recording
                .channel_names
                .iter()
                .position(|n| n == name)
                .expect("validate_channel_set guarantees presence")
        })
        .collect();

    recording
        .trials
        .into_iter()
        .map(|trial_record| {
            if trial_record.samples.len() != trial_record.num_channels * trial_record.num_samples {
                return Err(Error::InputFormat(
                    "trial sample count does not match declared shape".into(),
                ));
            }
            let raw = Array2::from_shape_vec(
                (trial_record.num_channels, trial_record.num_samples),
                trial_record.samples,
            )
            .map_err(|e| Error::InputFormat(format!("reshaping trial: {e}")))?;

            let reordered = Array2::from_shape_fn(
                (keep_indices.len(), trial_record.num_samples),
                |(c, t)| raw[[keep_indices[c], t]],
            );

            Trial::new(reordered, recording.fs_in, canonical.iter().map(|s| s.to_string()).collect())
        })
        .collect()
}
