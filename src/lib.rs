//! EEG biometric verification core: signal preprocessing, a
//! sequence-encoder embedding model, prototype-based scoring,
//! calibration, a spoof/anomaly gate, and an auditable verification
//! engine with gradient attribution.

pub mod artifact;
pub mod attribution;
pub mod calibration;
pub mod channels;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod prototype;
pub mod serving;
pub mod signal;
pub mod training;
pub mod types;
pub mod verify;

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use burn::tensor::backend::AutodiffBackend;
use uuid::Uuid;

use artifact::ModelBundle;
use config::Config;
use error::Result;
use prototype::build_prototypes;
use serving::SharedState;
use signal::preprocess::Preprocessor;
use signal::window;
use types::{Embedding, Trial};
use verify::engine::{AttributionArtifact, VerificationOutcome};

/// Enroll a user from a set of raw trials: preprocess, window, embed
/// every window, and cluster the resulting embeddings into that
/// user's prototype set (spec §4.E).
pub fn enroll<B: AutodiffBackend>(
    encoder: &model::SequenceEncoder<B>,
    trials: &[Trial],
    config: &Config,
    device: &B::Device,
) -> Result<prototype::PrototypeSet> {
    let preprocessor = Preprocessor::new(config);
    let mut embeddings = Vec::new();

    for trial in trials {
        let processed = preprocessor.process(trial)?;
        let windows = window::window_for_training(&processed, config);
        for w in &windows {
            embeddings.push(embed_window(encoder, w, device)?);
        }
    }

    build_prototypes(&embeddings, config)
}

fn embed_window<B: AutodiffBackend>(
    encoder: &model::SequenceEncoder<B>,
    window: &types::Window,
    device: &B::Device,
) -> Result<Embedding> {
    use burn::prelude::*;

    let (c, t) = window.data.dim();
    let mut data = vec![0.0f32; c * t];
    for ti in 0..t {
        for ci in 0..c {
            data[ti * c + ci] = window.data[[ci, ti]];
        }
    }
    let input: Tensor<B, 3> = Tensor::from_data(TensorData::new(data, [1, t, c]), device);
    let raw = encoder.forward(input);
    let values: Vec<f32> = raw.into_data().to_vec().unwrap();
    Embedding::from_raw(values)
}

/// Verify a probe trial against an enrolled user. Thin wrapper over
/// [`SharedState::verify`]; exposed at the crate root per the public
/// API surface.
pub fn verify<B: AutodiffBackend>(
    state: &SharedState<B>,
    user_id: &str,
    probe: &Trial,
    device: &B::Device,
) -> Result<VerificationOutcome> {
    state.verify(user_id, probe, device)
}

/// Verify with a wall-clock deadline (spec §5 cancellation contract).
pub fn verify_with_deadline<B: AutodiffBackend>(
    state: &SharedState<B>,
    user_id: &str,
    probe: &Trial,
    device: &B::Device,
    deadline: Instant,
) -> Result<VerificationOutcome> {
    state.verify_with_deadline(user_id, probe, device, deadline)
}

/// Retrieve a previously stored attribution artifact by id.
pub fn fetch_attribution<B: AutodiffBackend>(state: &SharedState<B>, artifact_id: Uuid) -> Result<AttributionArtifact> {
    state.fetch_attribution(artifact_id)
}

/// Atomically swap in a freshly trained/loaded bundle.
pub fn hot_reload<B: AutodiffBackend>(state: &Arc<SharedState<B>>, bundle: ModelBundle<B>) {
    state.hot_reload(bundle);
}

/// Load a model bundle from disk into a fresh [`SharedState`] at startup.
pub fn load_bundle<B: AutodiffBackend>(
    dir: &Path,
    config: Config,
    device: &B::Device,
) -> Result<SharedState<B>> {
    let manifest = artifact::BundleManifest::from_config(&config);
    let bundle = ModelBundle::load(dir, &manifest, device)?;
    Ok(SharedState::new(bundle, config))
}
