//! Verification engine (spec §4.I): the ordered pipeline from a raw
//! probe trial to a decision plus attribution artifact.
//!
//! Step order is the specification's contract, not an implementation
//! detail: window -> embed -> aggregate -> score -> calibrate ->
//! spoof-gate -> decide -> attribute.

use std::time::Instant;

use burn::tensor::backend::AutodiffBackend;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attribution::{self, AttributionStrategy};
use crate::calibration::LogisticCalibrator;
use crate::config::{Config, DecisionCriterion};
use crate::error::{Error, Result};
use crate::model::{EmbeddingAutoencoder, SequenceEncoder};
use crate::prototype::PrototypeTable;
use crate::signal::preprocess::Preprocessor;
use crate::signal::window;
use crate::types::{Embedding, Trial};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Accept,
    Reject,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct OperatingThreshold {
    pub tau_decision: f32,
    pub criterion: DecisionCriterion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributionArtifact {
    pub probe_id: Uuid,
    pub raw_score: f32,
    pub calibrated_probability: f32,
    pub spoof_score: f32,
    pub decision: Decision,
    pub importance: Array2<f32>,
    pub strategy: AttributionStrategy,
    pub error_kind: Option<String>,
}

pub struct VerificationOutcome {
    pub decision: Decision,
    pub calibrated_probability: f32,
    pub artifact_id: Uuid,
}

/// Everything the engine needs to score a probe against a specific
/// enrolled user: encoder weights, per-user prototypes, a spoof/anomaly
/// model, a calibrator, and the decision threshold.
pub struct VerificationEngine<B: AutodiffBackend> {
    pub encoder: SequenceEncoder<B>,
    pub autoencoder: EmbeddingAutoencoder<B>,
    pub prototypes: PrototypeTable,
    pub calibrator: LogisticCalibrator,
    pub threshold: OperatingThreshold,
    pub tau_spoof: f32,
    pub config: Config,
}

impl<B: AutodiffBackend> VerificationEngine<B> {
    /// Run the full verification pipeline for `user_id` against
    /// `probe`. Writes an attribution artifact into `store` on every
    /// path, including rejects, so audits can see why a request failed.
    pub fn verify(
        &self,
        user_id: &str,
        probe: &Trial,
        device: &B::Device,
        store: &crate::artifact::store::ArtifactStore,
    ) -> Result<VerificationOutcome> {
        self.verify_with_deadline(user_id, probe, device, store, None)
    }

    pub fn verify_with_deadline(
        &self,
        user_id: &str,
        probe: &Trial,
        device: &B::Device,
        store: &crate::artifact::store::ArtifactStore,
        deadline: Option<Instant>,
    ) -> Result<VerificationOutcome> {
        let prototype_set = self
            .prototypes
            .get(user_id)
            .ok_or_else(|| Error::UnknownUser(user_id.to_string()))?;

        check_deadline(deadline)?;

        // 1. Window: preprocess then slice, rejecting probes too short
        //    to yield a single window.
        let preprocessor = Preprocessor::new(&self.config);
        let processed = preprocessor.process(probe)?;
        let windows = window::window_for_verification(&processed, &self.config)?;

        check_deadline(deadline)?;

        // 2. Embed: encode every window independently.
        let embeddings: Result<Vec<Embedding>> = windows
            .iter()
            .map(|w| embed_window(&self.encoder, w, device))
            .collect();
        let embeddings = embeddings?;

        // 3. Aggregate: mean, then renormalize to unit length.
        let aggregate = Embedding::mean_renormalized(&embeddings)?;

        check_deadline(deadline)?;

        // 4. Score: cosine similarity to the best-matching prototype.
        let raw_score = prototype_set.best_similarity(&aggregate);

        // 5. Calibrate.
        let calibrated_probability = self.calibrator.apply(raw_score);

        // 6. Spoof gate: autoencoder reconstruction error on the
        //    aggregate embedding.
        let spoof_score = reconstruction_error(&self.autoencoder, &aggregate, device);
        let is_spoof = spoof_score > self.tau_spoof;

        check_deadline(deadline)?;

        // 7. Decide. `tau_decision` is fit against raw cosine
        // similarity (see `cli::train::equal_error_threshold`), not the
        // calibrated probability; DESIGN.md's open-question #2 records
        // this as the chosen layering.
        let decision = if is_spoof {
            Decision::Reject
        } else if raw_score >= self.threshold.tau_decision {
            Decision::Accept
        } else {
            Decision::Reject
        };

        // 8. Attribution: integrated gradients against the
        //    best-matching prototype.
        let best_prototype = best_matching_prototype(prototype_set, &aggregate)?;
        let importance = attribution::integrated_gradients(
            &self.encoder,
            &windows,
            &best_prototype,
            attribution::IG_STEPS,
            device,
        );

        let artifact = AttributionArtifact {
            probe_id: Uuid::new_v4(),
            raw_score,
            calibrated_probability,
            spoof_score,
            decision,
            importance,
            strategy: AttributionStrategy::IntegratedGradients,
            error_kind: None,
        };
        let artifact_id = store.put(artifact);

        Ok(VerificationOutcome {
            decision,
            calibrated_probability,
            artifact_id,
        })
    }
}

fn check_deadline(deadline: Option<Instant>) -> Result<()> {
    if let Some(d) = deadline {
        if Instant::now() >= d {
            return Err(Error::Timeout);
        }
    }
    Ok(())
}

fn embed_window<B: AutodiffBackend>(
    encoder: &SequenceEncoder<B>,
    window: &crate::types::Window,
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

fn reconstruction_error<B: AutodiffBackend>(
    autoencoder: &EmbeddingAutoencoder<B>,
    embedding: &Embedding,
    device: &B::Device,
) -> f32 {
    use burn::prelude::*;

    let input: Tensor<B, 2> = Tensor::from_data(
        TensorData::new(embedding.as_slice().to_vec(), [1, embedding.dim()]),
        device,
    );
    let error = autoencoder.reconstruction_error(input);
    error.into_data().to_vec::<f32>().unwrap()[0]
}

/// The best-matching prototype, i.e. the smallest-index centroid
/// achieving the maximum cosine similarity to `aggregate`: only a
/// strict improvement moves the running best, so ties resolve to the
/// lowest index.
fn best_matching_prototype(
    prototype_set: &crate::prototype::PrototypeSet,
    aggregate: &Embedding,
) -> Result<Embedding> {
    let centroids = prototype_set.centroids();
    let mut best: Option<(usize, f32)> = None;
    for (i, c) in centroids.iter().enumerate() {
        let sim = c.cosine_similarity(aggregate);
        if best.map_or(true, |(_, best_sim)| sim > best_sim) {
            best = Some((i, sim));
        }
    }
    best.map(|(i, _)| centroids[i].clone())
        .ok_or_else(|| Error::Numeric("prototype set is empty".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::store::ArtifactStore;
    use crate::model::{EmbeddingAutoencoderConfig, SequenceEncoderConfig};
    use crate::prototype::PrototypeSet;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn engine() -> VerificationEngine<TestBackend> {
        let device = Default::default();
        let mut config = Config::default();
        config.n_channels = 4;
        config.embedding_dim = 6;
        config.hidden_width = 8;
        config.encoder_layers = 1;
        config.sample_rate_out = 8;
        config.window_seconds = 1.0;
        config.step_seconds = 1.0;
        config.fast_mode = true;

        let encoder = SequenceEncoderConfig::new(4)
            .with_hidden_width(8)
            .with_num_layers(1)
            .with_embedding_dim(6)
            .init::<TestBackend>(&device);
        let autoencoder = EmbeddingAutoencoderConfig::new(6).with_bottleneck_dim(3).init::<TestBackend>(&device);

        let mut prototypes = PrototypeTable::default();
        prototypes.insert(
            "alice".into(),
            PrototypeSet {
                centroids: vec![vec![1.0, 0.0, 0.0, 0.0, 0.0, 0.0]],
            },
        );

        VerificationEngine {
            encoder,
            autoencoder,
            prototypes,
            calibrator: LogisticCalibrator { a: 1.0, b: 0.0 },
            threshold: OperatingThreshold {
                tau_decision: -1.0, // accept anything with a finite score for this smoke test
                criterion: DecisionCriterion::EqualErrorRate,
            },
            tau_spoof: f32::INFINITY,
            config,
        }
    }

    fn sample_trial(n_channels: usize, samples: usize) -> Trial {
        let names: Vec<String> = (0..n_channels).map(|i| format!("ch{i}")).collect();
        let data = Array2::<f32>::from_shape_fn((n_channels, samples), |(c, t)| {
            ((t as f32) * 0.1 + c as f32).sin()
        });
        Trial::new(data, 8, names).unwrap()
    }

    #[test]
    fn verify_rejects_unknown_user() {
        let eng = engine();
        let device = Default::default();
        let store = ArtifactStore::new();
        let trial = sample_trial(4, 16);
        let result = eng.verify("nobody", &trial, &device, &store);
        assert!(matches!(result, Err(Error::UnknownUser(_))));
    }

    #[test]
    fn verify_rejects_short_probe() {
        let eng = engine();
        let device = Default::default();
        let store = ArtifactStore::new();
        let trial = sample_trial(4, 2);
        let result = eng.verify("alice", &trial, &device, &store);
        assert!(matches!(result, Err(Error::ProbeTooShort { .. })));
    }

    #[test]
    fn verify_accepts_and_writes_artifact() {
        let eng = engine();
        let device = Default::default();
        let store = ArtifactStore::new();
        let trial = sample_trial(4, 16);
        let outcome = eng.verify("alice", &trial, &device, &store).unwrap();
        assert_eq!(store.len(), 1);
        let artifact = store.get(outcome.artifact_id).unwrap();
        assert_eq!(artifact.decision, outcome.decision);
    }

    #[test]
    fn verify_with_past_deadline_times_out() {
        let eng = engine();
        let device = Default::default();
        let store = ArtifactStore::new();
        let trial = sample_trial(4, 16);
        let past = Instant::now() - std::time::Duration::from_secs(1);
        let result = eng.verify_with_deadline("alice", &trial, &device, &store, Some(past));
        assert!(matches!(result, Err(Error::Timeout)));
        assert_eq!(store.len(), 0);
    }
}
