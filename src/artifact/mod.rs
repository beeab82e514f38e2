//! Model bundle persistence (spec §6): small structs go through
//! `bincode`, tensor weights go through burn's native `NamedMpkFileRecorder`,
//! and a JSON manifest records the hyperparameters needed to validate
//! a bundle at load time, following the save/load split used by the
//! original neural checkpoint module this crate's training pipeline
//! is descended from.

pub mod manifest;
pub mod store;

use std::path::Path;

use burn::module::Module;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};

use crate::calibration::LogisticCalibrator;
use crate::error::{Error, Result};
use crate::model::{EmbeddingAutoencoder, EmbeddingAutoencoderConfig, SequenceEncoder, SequenceEncoderConfig};
use crate::prototype::PrototypeTable;
use crate::verify::engine::OperatingThreshold;

pub use manifest::BundleManifest;
pub use store::ArtifactStore;

const ENCODER_STEM: &str = "encoder";
const AUTOENCODER_STEM: &str = "autoencoder";
const SMALL_STATE_FILE: &str = "state.bincode";
const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SmallState {
    calibrator: LogisticCalibrator,
    prototypes: PrototypeTable,
    threshold: OperatingThreshold,
    tau_spoof: f32,
}

/// Everything a [`crate::verify::engine::VerificationEngine`] needs,
/// held behind `arc_swap::ArcSwap` in `serving::SharedState` so a hot
/// reload is one atomic pointer swap.
pub struct ModelBundle<B: Backend> {
    pub encoder: SequenceEncoder<B>,
    pub autoencoder: EmbeddingAutoencoder<B>,
    pub calibrator: LogisticCalibrator,
    pub prototypes: PrototypeTable,
    pub threshold: OperatingThreshold,
    pub tau_spoof: f32,
}

impl<B: Backend> ModelBundle<B> {
    pub fn save(&self, dir: &Path, manifest: &BundleManifest) -> Result<()> {
        std::fs::create_dir_all(dir)
            .map_err(|e| Error::InputFormat(format!("mkdir {}: {e}", dir.display())))?;

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        self.encoder
            .clone()
            .save_file(dir.join(ENCODER_STEM), &recorder)
            .map_err(|e| Error::InputFormat(format!("saving encoder weights: {e}")))?;
        self.autoencoder
            .clone()
            .save_file(dir.join(AUTOENCODER_STEM), &recorder)
            .map_err(|e| Error::InputFormat(format!("saving autoencoder weights: {e}")))?;

        let small = SmallState {
            calibrator: self.calibrator,
            prototypes: self.prototypes.clone(),
            threshold: self.threshold,
            tau_spoof: self.tau_spoof,
        };
        let bytes = bincode::serialize(&small)
            .map_err(|e| Error::InputFormat(format!("serializing bundle state: {e}")))?;
        std::fs::write(dir.join(SMALL_STATE_FILE), bytes)
            .map_err(|e| Error::InputFormat(format!("writing bundle state: {e}")))?;

        manifest.save(&dir.join(MANIFEST_FILE))
    }

    pub fn load(dir: &Path, expected_manifest: &BundleManifest, device: &B::Device) -> Result<Self> {
        let manifest = BundleManifest::load(&dir.join(MANIFEST_FILE))?;
        if manifest != *expected_manifest {
            return Err(Error::InputFormat(
                "bundle manifest does not match the running configuration".into(),
            ));
        }

        let encoder_config = SequenceEncoderConfig::new(manifest.n_channels)
            .with_hidden_width(manifest.hidden_width)
            .with_num_layers(manifest.encoder_layers)
            .with_embedding_dim(manifest.embedding_dim);
        let autoencoder_config = EmbeddingAutoencoderConfig::new(manifest.embedding_dim);

        let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
        let encoder = encoder_config
            .init::<B>(device)
            .load_file(dir.join(ENCODER_STEM), &recorder, device)
            .map_err(|e| Error::InputFormat(format!("loading encoder weights: {e}")))?;
        let autoencoder = autoencoder_config
            .init::<B>(device)
            .load_file(dir.join(AUTOENCODER_STEM), &recorder, device)
            .map_err(|e| Error::InputFormat(format!("loading autoencoder weights: {e}")))?;

        let bytes = std::fs::read(dir.join(SMALL_STATE_FILE))
            .map_err(|e| Error::InputFormat(format!("reading bundle state: {e}")))?;
        let small: SmallState = bincode::deserialize(&bytes)
            .map_err(|e| Error::InputFormat(format!("decoding bundle state: {e}")))?;

        Ok(Self {
            encoder,
            autoencoder,
            calibrator: small.calibrator,
            prototypes: small.prototypes,
            threshold: small.threshold,
            tau_spoof: small.tau_spoof,
        })
    }
}
