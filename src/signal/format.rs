//! On-disk recording format: a `bincode`-serialized container for one
//! or more raw trials captured from a single session, used by
//! [`super::loader`] to read enrollment/training recordings.

use serde::{Deserialize, Serialize};

pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Row-major `(channels, samples)` flattened samples.
    pub samples: Vec<f32>,
    pub num_channels: usize,
    pub num_samples: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingFile {
    pub version: u32,
    pub fs_in: u32,
    pub channel_names: Vec<String>,
    pub trials: Vec<TrialRecord>,
}

impl RecordingFile {
    pub fn new(fs_in: u32, channel_names: Vec<String>) -> Self {
        Self {
            version: FORMAT_VERSION,
            fs_in,
            channel_names,
            trials: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_bincode() {
        let mut rec = RecordingFile::new(256, vec!["Fz".into(), "Cz".into()]);
        rec.trials.push(TrialRecord {
            samples: vec![0.0; 20],
            num_channels: 2,
            num_samples: 10,
        });
        let bytes = bincode::serialize(&rec).unwrap();
        let back: RecordingFile = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.fs_in, 256);
        assert_eq!(back.trials.len(), 1);
    }
}
