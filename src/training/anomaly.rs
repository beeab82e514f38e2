//! Spoof/anomaly detector training (spec §4.H): fit the embedding
//! autoencoder on genuine-user embeddings only, then calibrate a
//! reconstruction-error threshold at a configured percentile.

use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use crate::model::EmbeddingAutoencoder;

pub struct AnomalyEpochResult {
    pub avg_loss: f32,
}

/// Train one epoch of the autoencoder on `embeddings` (already
/// unit-norm, flattened row-major `[batch, embedding_dim]`).
pub fn train_epoch<B: AutodiffBackend>(
    autoencoder: EmbeddingAutoencoder<B>,
    embeddings: &[Vec<f32>],
    optimizer: &mut impl Optimizer<EmbeddingAutoencoder<B>, B>,
    lr: f64,
    device: &B::Device,
) -> (EmbeddingAutoencoder<B>, AnomalyEpochResult) {
    let mut autoencoder = autoencoder;
    if embeddings.is_empty() {
        return (autoencoder, AnomalyEpochResult { avg_loss: 0.0 });
    }
    let dim = embeddings[0].len();
    let batch = embeddings.len();
    let flat: Vec<f32> = embeddings.iter().flatten().copied().collect();
    let input: Tensor<B, 2> = Tensor::from_data(TensorData::new(flat, [batch, dim]), device);

    let reconstructed = autoencoder.forward(input.clone());
    let diff = reconstructed - input;
    let loss: Tensor<B, 1> = (diff.clone() * diff).mean();
    let loss_value: f32 = loss.clone().into_data().to_vec::<f32>().unwrap()[0];

    let grads = loss.backward();
    let grads = GradientsParams::from_grads(grads, &autoencoder);
    autoencoder = optimizer.step(lr, autoencoder, grads);

    (autoencoder, AnomalyEpochResult { avg_loss: loss_value })
}

pub fn create_optimizer<B: AutodiffBackend>(weight_decay: f64) -> impl Optimizer<EmbeddingAutoencoder<B>, B> {
    AdamWConfig::new().with_weight_decay(weight_decay as f32).init()
}

/// Find the reconstruction-error value at `percentile` (0-100) over a
/// held-out genuine set, used as the spoof rejection threshold.
pub fn calibrate_threshold(errors: &[f32], percentile: f64) -> f32 {
    if errors.is_empty() {
        return f32::INFINITY;
    }
    let mut sorted = errors.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let rank = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EmbeddingAutoencoderConfig;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn train_epoch_reduces_loss_on_repeated_calls() {
        let device = Default::default();
        let autoencoder = EmbeddingAutoencoderConfig::new(8).with_bottleneck_dim(4).init::<TestBackend>(&device);
        let mut optimizer = create_optimizer::<TestBackend>(0.0);

        let embeddings = vec![vec![0.5f32; 8], vec![0.4f32; 8]];
        let (ae, first) = train_epoch(autoencoder, &embeddings, &mut optimizer, 1e-2, &device);
        let (_ae2, second) = train_epoch(ae, &embeddings, &mut optimizer, 1e-2, &device);
        assert!(second.avg_loss <= first.avg_loss + 1e-4);
    }

    #[test]
    fn calibrate_threshold_picks_percentile() {
        let errors: Vec<f32> = (1..=100).map(|v| v as f32).collect();
        let t = calibrate_threshold(&errors, 99.0);
        assert!(t >= 98.0 && t <= 100.0);
    }

    #[test]
    fn calibrate_threshold_handles_empty() {
        assert_eq!(calibrate_threshold(&[], 99.0), f32::INFINITY);
    }
}
