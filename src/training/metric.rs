//! Phase 2 (spec §4.D): proxy-based metric learning. Each user owns a
//! learned proxy vector; embeddings are pulled toward their own
//! proxy and pushed away from others via a margin- and
//! temperature-scaled softmax, following the proxy-anchor family of
//! losses.

use burn::config::Config as BurnConfig;
use burn::module::{Module, Param};
use burn::optim::{AdamWConfig, GradientsParams, Optimizer};
use burn::prelude::*;
use burn::tensor::activation;
use burn::tensor::backend::AutodiffBackend;

use crate::model::SequenceEncoder;

#[derive(BurnConfig, Debug)]
pub struct ProxyBankConfig {
    pub num_users: usize,
    pub embedding_dim: usize,
}

/// Learned per-user proxy vectors, `[num_users, embedding_dim]`.
#[derive(Module, Debug)]
pub struct ProxyBank<B: Backend> {
    proxies: Param<Tensor<B, 2>>,
}

impl ProxyBankConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ProxyBank<B> {
        let proxies = Tensor::random(
            [self.num_users, self.embedding_dim],
            burn::tensor::Distribution::Normal(0.0, 0.1),
            device,
        );
        ProxyBank {
            proxies: Param::from_tensor(proxies),
        }
    }
}

impl<B: Backend> ProxyBank<B> {
    /// L2-normalized proxy matrix, `[num_users, embedding_dim]`.
    pub fn normalized(&self) -> Tensor<B, 2> {
        let p = self.proxies.val();
        let norm = p.clone().powf_scalar(2.0).sum_dim(1).sqrt();
        let dim = p.dims()[1];
        p / norm.expand([self.proxies.val().dims()[0], dim])
    }
}

pub struct MetricEpochResult {
    pub avg_loss: f32,
    pub num_examples: usize,
    /// L2 norm of the loss gradient w.r.t. each batch's input,
    /// accumulated over the epoch; see `warmup::WarmupEpochResult::grad_norm`.
    pub grad_norm: f32,
}

/// Margin- and temperature-scaled proxy loss for one batch of
/// already-unit-norm embeddings against their labels.
pub fn proxy_loss<B: AutodiffBackend>(
    embeddings: Tensor<B, 2>,
    labels: &[usize],
    proxy_bank: &ProxyBank<B>,
    margin: f64,
    temperature: f64,
) -> Tensor<B, 1> {
    let proxies = proxy_bank.normalized(); // [num_users, dim]
    let similarities = embeddings.matmul(proxies.transpose()); // [batch, num_users]

    let batch = similarities.dims()[0];
    let num_users = similarities.dims()[1];

    let label_data: Vec<i32> = labels.iter().map(|&l| l as i32).collect();
    let label_tensor = Tensor::<B, 1, Int>::from_data(
        TensorData::new(label_data.clone(), [batch]),
        &similarities.device(),
    );

    // Subtract margin from the positive-class logit (additive margin softmax).
    let margin_mask_data: Vec<f32> = (0..batch)
        .flat_map(|i| {
            let label_i = label_data[i];
            (0..num_users).map(move |j| if label_i as usize == j { margin as f32 } else { 0.0 })
        })
        .collect();
    let margin_mask = Tensor::<B, 2>::from_data(TensorData::new(margin_mask_data, [batch, num_users]), &similarities.device());

    let adjusted = (similarities - margin_mask) / temperature as f32;
    let log_probs = activation::log_softmax(adjusted, 1);
    let label_2d: Tensor<B, 2, Int> = label_tensor.unsqueeze_dim(1);
    let selected = log_probs.gather(1, label_2d);
    selected.mean().neg()
}

/// Run one metric-learning epoch, jointly updating the encoder and
/// proxy bank. `batches` groups window tensors with their user index
/// labels; each batch item is `(channel-major data, num_channels, time, user_index)`.
pub fn train_epoch<B: AutodiffBackend>(
    encoder: SequenceEncoder<B>,
    proxy_bank: ProxyBank<B>,
    batches: &[Vec<(Vec<f32>, usize, usize, usize)>],
    encoder_optimizer: &mut impl Optimizer<SequenceEncoder<B>, B>,
    proxy_optimizer: &mut impl Optimizer<ProxyBank<B>, B>,
    lr: f64,
    margin: f64,
    temperature: f64,
    device: &B::Device,
) -> (SequenceEncoder<B>, ProxyBank<B>, MetricEpochResult) {
    let mut encoder = encoder;
    let mut proxy_bank = proxy_bank;
    let mut total_loss = 0.0f32;
    let mut total_examples = 0usize;
    let mut grad_norm_sq = 0.0f32;

    for batch in batches {
        if batch.is_empty() {
            continue;
        }
        let time = batch[0].2;
        let channels = batch[0].1;
        let batch_size = batch.len();

        let mut flat = Vec::with_capacity(batch_size * time * channels);
        let mut labels = Vec::with_capacity(batch_size);
        for (data, c, t, user_index) in batch {
            for ti in 0..*t {
                for ci in 0..*c {
                    flat.push(data[ci * t + ti]);
                }
            }
            labels.push(*user_index);
        }

        let input: Tensor<B, 3> = Tensor::from_data(
            TensorData::new(flat, [batch_size, time, channels]),
            device,
        )
        .require_grad();

        let raw_embedding = encoder.forward(input.clone());
        let norm = raw_embedding.clone().powf_scalar(2.0).sum_dim(1).sqrt();
        let dim = raw_embedding.dims()[1];
        let unit_embedding = raw_embedding / norm.expand([batch_size, dim]);

        let loss = proxy_loss(unit_embedding, &labels, &proxy_bank, margin, temperature);
        let loss_value: f32 = loss.clone().into_data().to_vec::<f32>().unwrap()[0];
        total_loss += loss_value * batch_size as f32;
        total_examples += batch_size;

        let grads = loss.backward();
        if let Some(input_grad) = input.grad(&grads) {
            let values: Vec<f32> = input_grad.into_data().to_vec().unwrap();
            grad_norm_sq += values.iter().map(|v| v * v).sum::<f32>();
        }
        let mut grads = grads;
        let encoder_grads = GradientsParams::from_module(&mut grads, &encoder);
        let proxy_grads = GradientsParams::from_module(&mut grads, &proxy_bank);
        encoder = encoder_optimizer.step(lr, encoder, encoder_grads);
        proxy_bank = proxy_optimizer.step(lr, proxy_bank, proxy_grads);
    }

    let avg_loss = if total_examples == 0 {
        0.0
    } else {
        total_loss / total_examples as f32
    };

    (
        encoder,
        proxy_bank,
        MetricEpochResult {
            avg_loss,
            num_examples: total_examples,
            grad_norm: grad_norm_sq.sqrt(),
        },
    )
}

pub fn create_optimizer<M: Module<B> + burn::module::AutodiffModule<B>, B: AutodiffBackend>(weight_decay: f64) -> impl Optimizer<M, B> {
    AdamWConfig::new().with_weight_decay(weight_decay as f32).init()
}
