//! Two-phase training orchestration (spec §4.D/§4.E): classification
//! warmup, then proxy-based metric learning, with cosine learning-rate
//! decay, early stopping on validation loss, and validation-gated
//! checkpointing behind a finite-loss/gradient-norm sanity gate.

use std::path::Path;

use burn::tensor::backend::AutodiffBackend;

use crate::config::Config;
use crate::error::TrainingError;
use crate::model::{ClassifierHead, ClassifierHeadConfig, SequenceEncoder, SequenceEncoderConfig};
use crate::training::checkpoint::{self, CheckpointTag};
use crate::training::metric::{self, ProxyBank, ProxyBankConfig};
use crate::training::warmup::{self, WarmupExample};

/// Cosine-annealed learning rate between `lr` and a small floor,
/// matching the decay shape used for the classification stage this
/// trainer's phase 1 is adapted from.
pub fn cosine_lr(lr: f64, lr_min: f64, epoch: usize, total_epochs: usize) -> f64 {
    if total_epochs <= 1 {
        return lr;
    }
    let t = epoch as f64 / total_epochs as f64;
    lr_min + 0.5 * (lr - lr_min) * (1.0 + (std::f64::consts::PI * t).cos())
}

pub struct EarlyStopper {
    patience: usize,
    best_loss: f32,
    epochs_without_improvement: usize,
}

impl EarlyStopper {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            best_loss: f32::INFINITY,
            epochs_without_improvement: 0,
        }
    }

    /// Record a validation loss; returns `true` if training should stop.
    pub fn record(&mut self, val_loss: f32) -> bool {
        if val_loss < self.best_loss - 1e-5 {
            self.best_loss = val_loss;
            self.epochs_without_improvement = 0;
        } else {
            self.epochs_without_improvement += 1;
        }
        self.epochs_without_improvement >= self.patience
    }

    pub fn best_loss(&self) -> f32 {
        self.best_loss
    }
}

pub struct TrainingReport {
    pub warmup_final_loss: f32,
    pub metric_final_loss: f32,
    pub warmup_epochs_run: usize,
    pub metric_epochs_run: usize,
}

/// Run phase 1 (warmup) to convergence or `config.warmup_epochs`,
/// whichever comes first under early stopping, then phase 2 (metric
/// learning) the same way. Returns the trained encoder plus a report;
/// the warmup-only classifier head and proxy bank are training
/// scaffolding and are not persisted into the serving bundle.
///
/// When `checkpoint_dir` is `Some`, each phase resumes from its own
/// best checkpoint if one already exists there, and commits a new
/// checkpoint whenever validation loss improves — gated on that
/// epoch's loss and gradient norm both being finite, so a diverged
/// epoch never overwrites a good checkpoint. A non-finite loss or
/// gradient norm aborts training with [`TrainingError::Diverged`].
pub fn train<B: AutodiffBackend>(
    num_users: usize,
    warmup_examples: &[WarmupExample],
    warmup_val_examples: &[WarmupExample],
    metric_batches: &[Vec<(Vec<f32>, usize, usize, usize)>],
    metric_val_batches: &[Vec<(Vec<f32>, usize, usize, usize)>],
    config: &Config,
    device: &B::Device,
    checkpoint_dir: Option<&Path>,
) -> Result<(SequenceEncoder<B>, TrainingReport), TrainingError> {
    if warmup_examples.is_empty() || metric_batches.iter().all(|b| b.is_empty()) {
        return Err(TrainingError::DataEmpty);
    }

    let mut encoder = SequenceEncoderConfig::new(config.n_channels)
        .with_hidden_width(config.hidden_width)
        .with_num_layers(config.encoder_layers)
        .with_embedding_dim(config.embedding_dim)
        .init::<B>(device);
    if let Some(dir) = checkpoint_dir {
        encoder = checkpoint::load_checkpoint(encoder, dir, CheckpointTag::WarmupBest, device)?;
    }
    let mut head = ClassifierHeadConfig::new(config.embedding_dim, num_users).init::<B>(device);

    let mut encoder_opt = warmup::create_optimizer::<SequenceEncoder<B>, B>(config.weight_decay, 1.0);
    let mut head_opt = warmup::create_optimizer::<ClassifierHead<B>, B>(config.weight_decay, 1.0);

    let mut stopper = EarlyStopper::new(config.patience);
    let mut warmup_final_loss = 0.0;
    let mut warmup_epochs_run = 0;

    for epoch in 0..config.warmup_epochs {
        let lr = cosine_lr(config.lr, config.lr * 0.01, epoch, config.warmup_epochs);
        let (new_encoder, new_head, result) = warmup::train_epoch(
            encoder,
            head,
            warmup_examples,
            &mut encoder_opt,
            &mut head_opt,
            lr,
            device,
        );
        encoder = new_encoder;
        head = new_head;
        warmup_final_loss = result.avg_loss;
        warmup_epochs_run = epoch + 1;

        if !result.avg_loss.is_finite() || !result.grad_norm.is_finite() {
            return Err(TrainingError::Diverged(format!(
                "warmup epoch {epoch}: loss={} grad_norm={}",
                result.avg_loss, result.grad_norm
            )));
        }

        let best_before = stopper.best_loss();
        let val_loss = evaluate_warmup_loss(&encoder, &head, warmup_val_examples, device);
        let should_stop = stopper.record(val_loss);
        if let Some(dir) = checkpoint_dir {
            if stopper.best_loss() < best_before {
                checkpoint::save_checkpoint(&encoder, dir, CheckpointTag::WarmupBest)?;
            }
        }
        if should_stop {
            break;
        }
    }
    drop(head);

    let proxy_bank = ProxyBankConfig::new(num_users, config.embedding_dim).init::<B>(device);
    let mut encoder_opt2 = metric::create_optimizer::<SequenceEncoder<B>, B>(config.weight_decay);
    let mut proxy_opt = metric::create_optimizer::<ProxyBank<B>, B>(config.weight_decay);

    if let Some(dir) = checkpoint_dir {
        encoder = checkpoint::load_checkpoint(encoder, dir, CheckpointTag::MetricBest, device)?;
    }

    let mut proxy_bank = proxy_bank;
    let mut metric_stopper = EarlyStopper::new(config.patience);
    let mut metric_final_loss = 0.0;
    let mut metric_epochs_run = 0;

    for epoch in 0..config.metric_epochs {
        let lr = cosine_lr(config.lr, config.lr * 0.01, epoch, config.metric_epochs);
        let (new_encoder, new_bank, result) = metric::train_epoch(
            encoder,
            proxy_bank,
            metric_batches,
            &mut encoder_opt2,
            &mut proxy_opt,
            lr,
            config.metric_margin,
            config.metric_temperature,
            device,
        );
        encoder = new_encoder;
        proxy_bank = new_bank;
        metric_final_loss = result.avg_loss;
        metric_epochs_run = epoch + 1;

        if !result.avg_loss.is_finite() || !result.grad_norm.is_finite() {
            return Err(TrainingError::Diverged(format!(
                "metric epoch {epoch}: loss={} grad_norm={}",
                result.avg_loss, result.grad_norm
            )));
        }

        let best_before = metric_stopper.best_loss();
        let val_loss = evaluate_metric_loss(&encoder, &proxy_bank, metric_val_batches, config, device);
        let should_stop = metric_stopper.record(val_loss);
        if let Some(dir) = checkpoint_dir {
            if metric_stopper.best_loss() < best_before {
                checkpoint::save_checkpoint(&encoder, dir, CheckpointTag::MetricBest)?;
            }
        }
        if should_stop {
            break;
        }
    }
    drop(proxy_bank);

    Ok((
        encoder,
        TrainingReport {
            warmup_final_loss,
            metric_final_loss,
            warmup_epochs_run,
            metric_epochs_run,
        },
    ))
}

fn evaluate_warmup_loss<B: AutodiffBackend>(
    encoder: &SequenceEncoder<B>,
    head: &ClassifierHead<B>,
    examples: &[WarmupExample],
    device: &B::Device,
) -> f32 {
    use burn::prelude::*;
    use burn::tensor::activation;

    if examples.is_empty() {
        return 0.0;
    }
    let mut total = 0.0f32;
    for example in examples {
        let mut reordered = vec![0.0f32; example.data.len()];
        for c in 0..example.num_channels {
            for t in 0..example.time {
                reordered[t * example.num_channels + c] = example.data[c * example.time + t];
            }
        }
        let input: Tensor<B, 3> = Tensor::from_data(
            TensorData::new(reordered, [1, example.time, example.num_channels]),
            device,
        );
        let embedding = encoder.forward(input);
        let logits = head.forward(embedding);
        let log_probs = activation::log_softmax(logits, 1);
        let value: Vec<f32> = log_probs.into_data().to_vec().unwrap();
        total += -value[example.user_index.min(value.len() - 1)];
    }
    total / examples.len() as f32
}

fn evaluate_metric_loss<B: AutodiffBackend>(
    encoder: &SequenceEncoder<B>,
    proxy_bank: &ProxyBank<B>,
    batches: &[Vec<(Vec<f32>, usize, usize, usize)>],
    config: &Config,
    device: &B::Device,
) -> f32 {
    use burn::prelude::*;

    if batches.is_empty() {
        return 0.0;
    }
    let mut total = 0.0f32;
    let mut count = 0usize;
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
        let input: Tensor<B, 3> = Tensor::from_data(TensorData::new(flat, [batch_size, time, channels]), device);
        let raw = encoder.forward(input);
        let norm = raw.clone().powf_scalar(2.0).sum_dim(1).sqrt();
        let dim = raw.dims()[1];
        let unit = raw / norm.expand([batch_size, dim]);
        let loss = metric::proxy_loss(unit, &labels, proxy_bank, config.metric_margin, config.metric_temperature);
        let value: f32 = loss.into_data().to_vec::<f32>().unwrap()[0];
        total += value;
        count += 1;
    }
    if count == 0 {
        0.0
    } else {
        total / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn cosine_lr_starts_high_and_ends_low() {
        let start = cosine_lr(1e-3, 1e-5, 0, 10);
        let end = cosine_lr(1e-3, 1e-5, 9, 10);
        assert!(start > end);
    }

    #[test]
    fn early_stopper_triggers_after_patience() {
        let mut stopper = EarlyStopper::new(2);
        assert!(!stopper.record(1.0));
        assert!(!stopper.record(1.1));
        assert!(stopper.record(1.2));
    }

    #[test]
    fn train_runs_end_to_end_on_tiny_data() {
        let device = Default::default();
        let mut config = Config::default();
        config.n_channels = 4;
        config.embedding_dim = 6;
        config.hidden_width = 8;
        config.encoder_layers = 1;
        config.warmup_epochs = 1;
        config.metric_epochs = 1;
        config.patience = 10;

        let warmup_examples = vec![WarmupExample {
            data: vec![0.1; 4 * 5],
            num_channels: 4,
            time: 5,
            user_index: 0,
        }];
        let metric_batches = vec![vec![
            (vec![0.1; 4 * 5], 4, 5, 0),
            (vec![0.2; 4 * 5], 4, 5, 1),
        ]];

        let (_encoder, report) = train::<TestBackend>(
            2,
            &warmup_examples,
            &warmup_examples,
            &metric_batches,
            &metric_batches,
            &config,
            &device,
            None,
        )
        .unwrap();
        assert!(report.warmup_final_loss.is_finite());
        assert!(report.metric_final_loss.is_finite());
        assert_eq!(report.warmup_epochs_run, 1);
        assert_eq!(report.metric_epochs_run, 1);
    }

    #[test]
    fn train_rejects_empty_data() {
        let device = Default::default();
        let mut config = Config::default();
        config.n_channels = 4;
        config.embedding_dim = 6;
        config.hidden_width = 8;
        config.encoder_layers = 1;

        let result = train::<TestBackend>(2, &[], &[], &[], &[], &config, &device, None);
        assert!(matches!(result, Err(TrainingError::DataEmpty)));
    }

    #[test]
    fn train_writes_and_resumes_from_a_checkpoint() {
        let device = Default::default();
        let mut config = Config::default();
        config.n_channels = 4;
        config.embedding_dim = 6;
        config.hidden_width = 8;
        config.encoder_layers = 1;
        config.warmup_epochs = 1;
        config.metric_epochs = 1;
        config.patience = 10;

        let warmup_examples = vec![WarmupExample {
            data: vec![0.1; 4 * 5],
            num_channels: 4,
            time: 5,
            user_index: 0,
        }];
        let metric_batches = vec![vec![
            (vec![0.1; 4 * 5], 4, 5, 0),
            (vec![0.2; 4 * 5], 4, 5, 1),
        ]];

        let dir = tempfile::tempdir().unwrap();
        let (_encoder, _report) = train::<TestBackend>(
            2,
            &warmup_examples,
            &warmup_examples,
            &metric_batches,
            &metric_batches,
            &config,
            &device,
            Some(dir.path()),
        )
        .unwrap();

        assert!(dir.path().join("warmup_best.mpk").exists());
        assert!(dir.path().join("metric_best.mpk").exists());

        // A second run against the same checkpoint directory resumes
        // rather than failing.
        let (_encoder2, _report2) = train::<TestBackend>(
            2,
            &warmup_examples,
            &warmup_examples,
            &metric_batches,
            &metric_batches,
            &config,
            &device,
            Some(dir.path()),
        )
        .unwrap();
    }
}
