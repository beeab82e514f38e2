//! Phase 1 (spec §4.D): classification warmup. Trains the encoder
//! jointly with a throwaway per-user classification head via
//! cross-entropy, to give the encoder a useful starting point before
//! metric learning takes over.

use burn::grad_clipping::GradientClippingConfig;
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation;
use burn::tensor::backend::AutodiffBackend;

use crate::model::{ClassifierHead, SequenceEncoder};

pub struct WarmupExample {
    /// `(channels, time)` window data, channel-major.
    pub data: Vec<f32>,
    pub num_channels: usize,
    pub time: usize,
    pub user_index: usize,
}

pub struct WarmupEpochResult {
    pub avg_loss: f32,
    pub num_examples: usize,
    /// L2 norm of the loss gradient w.r.t. each example's input,
    /// accumulated over the epoch — a finite-ness/divergence signal
    /// independent of the optimizer's own gradient clipping.
    pub grad_norm: f32,
}

/// Run one warmup epoch over `examples`, updating both the encoder
/// and classifier head in place via AdamW.
pub fn train_epoch<B: AutodiffBackend>(
    encoder: SequenceEncoder<B>,
    head: ClassifierHead<B>,
    examples: &[WarmupExample],
    encoder_optimizer: &mut impl Optimizer<SequenceEncoder<B>, B>,
    head_optimizer: &mut impl Optimizer<ClassifierHead<B>, B>,
    lr: f64,
    device: &B::Device,
) -> (SequenceEncoder<B>, ClassifierHead<B>, WarmupEpochResult) {
    let mut encoder = encoder;
    let mut head = head;
    let mut total_loss = 0.0f32;
    let mut grad_norm_sq = 0.0f32;

    for example in examples {
        let input: Tensor<B, 3> = Tensor::from_data(
            TensorData::new(
                reorder_channel_major_to_time_major(&example.data, example.num_channels, example.time),
                [1, example.time, example.num_channels],
            ),
            device,
        )
        .require_grad();
        let target = Tensor::<B, 1, Int>::from_data(
            TensorData::new(vec![example.user_index as i32], [1]),
            device,
        );

        let embedding = encoder.forward(input.clone());
        let logits = head.forward(embedding);
        let log_probs = activation::log_softmax(logits, 1);
        let target_2d: Tensor<B, 2, Int> = target.unsqueeze_dim(1);
        let selected = log_probs.gather(1, target_2d);
        let loss: Tensor<B, 1> = selected.mean().neg();

        let loss_value: f32 = loss.clone().into_data().to_vec::<f32>().unwrap()[0];
        total_loss += loss_value;

        let grads = loss.backward();
        if let Some(input_grad) = input.grad(&grads) {
            let values: Vec<f32> = input_grad.into_data().to_vec().unwrap();
            grad_norm_sq += values.iter().map(|v| v * v).sum::<f32>();
        }
        let mut grads = grads;
        let encoder_grads = GradientsParams::from_module(&mut grads, &encoder);
        let head_grads = GradientsParams::from_module(&mut grads, &head);
        encoder = encoder_optimizer.step(lr, encoder, encoder_grads);
        head = head_optimizer.step(lr, head, head_grads);
    }

    let avg_loss = if examples.is_empty() {
        0.0
    } else {
        total_loss / examples.len() as f32
    };

    (
        encoder,
        head,
        WarmupEpochResult {
            avg_loss,
            num_examples: examples.len(),
            grad_norm: grad_norm_sq.sqrt(),
        },
    )
}

fn reorder_channel_major_to_time_major(data: &[f32], channels: usize, time: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; data.len()];
    for c in 0..channels {
        for t in 0..time {
            out[t * channels + c] = data[c * time + t];
        }
    }
    out
}

pub fn create_optimizer<M: Module<B> + burn::module::AutodiffModule<B>, B: AutodiffBackend>(
    weight_decay: f64,
    grad_clip_norm: f32,
) -> impl Optimizer<M, B> {
    AdamWConfig::new()
        .with_weight_decay(weight_decay as f32)
        .with_grad_clipping(Some(GradientClippingConfig::Norm(grad_clip_norm)))
        .init()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassifierHeadConfig, SequenceEncoderConfig};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn train_epoch_reduces_or_preserves_finiteness() {
        let device = Default::default();
        let encoder = SequenceEncoderConfig::new(4)
            .with_hidden_width(8)
            .with_num_layers(1)
            .with_embedding_dim(8)
            .init::<TestBackend>(&device);
        let head = ClassifierHeadConfig::new(8, 3).init::<TestBackend>(&device);

        let examples = vec![WarmupExample {
            data: vec![0.1; 4 * 6],
            num_channels: 4,
            time: 6,
            user_index: 1,
        }];

        let mut encoder_opt = create_optimizer::<SequenceEncoder<TestBackend>, TestBackend>(0.01, 1.0);
        let mut head_opt = create_optimizer::<ClassifierHead<TestBackend>, TestBackend>(0.01, 1.0);

        let (_encoder, _head, result) = train_epoch(
            encoder,
            head,
            &examples,
            &mut encoder_opt,
            &mut head_opt,
            1e-3,
            &device,
        );
        assert_eq!(result.num_examples, 1);
        assert!(result.avg_loss.is_finite());
    }
}
