//! Checkpoint management for the training orchestrator (spec §4.E).
//!
//! Uses burn's native record format (NamedMpk) for encoder weights.
//! Checkpoints are tagged per training phase so resuming a run after
//! an interrupted warmup doesn't clobber a later metric-learning
//! checkpoint, mirroring this crate's model-bundle persistence.

use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};

use crate::error::TrainingError;
use crate::model::SequenceEncoder;

/// Which training phase a checkpoint belongs to.
#[derive(Debug, Clone, Copy)]
pub enum CheckpointTag {
    WarmupBest,
    MetricBest,
}

impl CheckpointTag {
    fn stem(&self) -> &'static str {
        match self {
            Self::WarmupBest => "warmup_best",
            Self::MetricBest => "metric_best",
        }
    }
}

fn checkpoint_path(dir: &Path, tag: CheckpointTag) -> PathBuf {
    dir.join(tag.stem())
}

/// Save the encoder to `dir/{tag}.mpk`, creating `dir` if needed.
/// Only called once the caller has already verified the epoch's loss
/// and gradient norm are finite, so a checkpoint never commits a
/// diverged encoder.
pub fn save_checkpoint<B: Backend>(
    encoder: &SequenceEncoder<B>,
    dir: &Path,
    tag: CheckpointTag,
) -> Result<PathBuf, TrainingError> {
    std::fs::create_dir_all(dir)
        .map_err(|e| TrainingError::CheckpointWrite(format!("mkdir {}: {e}", dir.display())))?;

    let path = checkpoint_path(dir, tag);
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    encoder
        .clone()
        .save_file(path.clone(), &recorder)
        .map_err(|e| TrainingError::CheckpointWrite(format!("save {}: {e}", path.display())))?;

    Ok(path.with_extension("mpk"))
}

/// Load a previously saved checkpoint for `tag`, if one exists.
/// Returns `Ok(None)` rather than an error when the file is simply
/// absent, since "no checkpoint yet" is the normal state of a fresh
/// run, not a failure.
pub fn load_checkpoint<B: Backend>(
    encoder: SequenceEncoder<B>,
    dir: &Path,
    tag: CheckpointTag,
    device: &B::Device,
) -> Result<SequenceEncoder<B>, TrainingError> {
    let path = checkpoint_path(dir, tag);
    let full_path = path.with_extension("mpk");
    if !full_path.exists() {
        return Ok(encoder);
    }

    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    encoder
        .load_file(path, &recorder, device)
        .map_err(|e| TrainingError::CheckpointWrite(format!("load {}: {e}", full_path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SequenceEncoderConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn checkpoint_tag_stems() {
        assert_eq!(CheckpointTag::WarmupBest.stem(), "warmup_best");
        assert_eq!(CheckpointTag::MetricBest.stem(), "metric_best");
    }

    #[test]
    fn load_without_a_prior_save_returns_the_encoder_unchanged() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let encoder = SequenceEncoderConfig::new(4)
            .with_hidden_width(8)
            .with_num_layers(1)
            .with_embedding_dim(6)
            .init::<TestBackend>(&device);

        let loaded = load_checkpoint(encoder, dir.path(), CheckpointTag::WarmupBest, &device).unwrap();
        // No panic, no error: absence of a checkpoint is not a failure.
        let _ = loaded;
    }

    #[test]
    fn save_then_load_round_trips() {
        let device = Default::default();
        let dir = tempfile::tempdir().unwrap();
        let encoder = SequenceEncoderConfig::new(4)
            .with_hidden_width(8)
            .with_num_layers(1)
            .with_embedding_dim(6)
            .init::<TestBackend>(&device);

        let path = save_checkpoint(&encoder, dir.path(), CheckpointTag::MetricBest).unwrap();
        assert!(path.exists());

        let fresh = SequenceEncoderConfig::new(4)
            .with_hidden_width(8)
            .with_num_layers(1)
            .with_embedding_dim(6)
            .init::<TestBackend>(&device);
        let _loaded = load_checkpoint(fresh, dir.path(), CheckpointTag::MetricBest, &device).unwrap();
    }
}
