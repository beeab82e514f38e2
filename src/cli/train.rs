use std::path::PathBuf;

use clap::Args;

use cortexauth::artifact::{BundleManifest, ModelBundle};
use cortexauth::config::Config;
use cortexauth::model::EmbeddingAutoencoderConfig;
use cortexauth::signal::loader;
use cortexauth::signal::preprocess::Preprocessor;
use cortexauth::signal::window;
use cortexauth::training::anomaly;
use cortexauth::training::orchestrator;
use cortexauth::training::warmup::WarmupExample;
use cortexauth::{calibration, prototype};

use super::{device, Backend};

#[derive(Args)]
pub struct TrainArgs {
    /// Directory containing one subdirectory per user, each holding
    /// `.eegrec` recording files.
    #[arg(long)]
    pub data_dir: PathBuf,
    /// Where to write the trained model bundle.
    #[arg(long, default_value = "bundle")]
    pub output_dir: PathBuf,
    /// Optional config.toml overriding defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn cmd_train(args: TrainArgs) {
    let config = match &args.config {
        Some(path) => Config::load_or_default(path).expect("loading config"),
        None => Config::default(),
    };
    let device = device();

    let mut user_ids: Vec<String> = std::fs::read_dir(&args.data_dir)
        .expect("reading data_dir")
        .filter_map(|e| e.ok())
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    user_ids.sort();

    if user_ids.len() < 2 {
        eprintln!("need at least two enrolled users to train metric learning; found {}", user_ids.len());
        return;
    }

    let preprocessor = Preprocessor::new(&config);
    let mut windows_per_user: Vec<Vec<cortexauth::types::Window>> = Vec::with_capacity(user_ids.len());

    for user_id in &user_ids {
        let mut windows = Vec::new();
        let user_dir = args.data_dir.join(user_id);
        for entry in std::fs::read_dir(&user_dir).expect("reading user dir").flatten() {
            if entry.path().extension().and_then(|e| e.to_str()) != Some("eegrec") {
                continue;
            }
            let trials = loader::load_trials(&entry.path()).expect("loading recording");
            for trial in &trials {
                let processed = preprocessor.process(trial).expect("preprocessing trial");
                windows.extend(window::window_for_training(&processed, &config));
            }
        }
        tracing::info!(user = %user_id, num_windows = windows.len(), "collected training windows");
        windows_per_user.push(windows);
    }

    let warmup_examples: Vec<WarmupExample> = windows_per_user
        .iter()
        .enumerate()
        .flat_map(|(idx, windows)| {
            windows.iter().map(move |w| WarmupExample {
                data: flatten_channel_major(w),
                num_channels: w.num_channels(),
                time: w.len(),
                user_index: idx,
            })
        })
        .collect();

    let metric_batches = build_metric_batches(&windows_per_user, config.hidden_width.max(8).min(16));

    let checkpoint_dir = args.output_dir.join("checkpoints");
    let (encoder, report) = orchestrator::train::<Backend>(
        user_ids.len(),
        &warmup_examples,
        &warmup_examples,
        &metric_batches,
        &metric_batches,
        &config,
        &device,
        Some(&checkpoint_dir),
    )
    .expect("training the encoder");
    tracing::info!(
        warmup_loss = report.warmup_final_loss,
        metric_loss = report.metric_final_loss,
        "encoder training complete"
    );

    // Per-user prototypes and genuine embeddings (for the anomaly
    // detector and calibration).
    let mut prototype_table = prototype::PrototypeTable::default();
    let mut genuine_embeddings_by_user: Vec<Vec<Vec<f32>>> = Vec::with_capacity(user_ids.len());

    for (idx, user_id) in user_ids.iter().enumerate() {
        let embeddings: Vec<cortexauth::types::Embedding> = windows_per_user[idx]
            .iter()
            .map(|w| embed(&encoder, w, &device))
            .collect();
        let set = prototype::build_prototypes(&embeddings, &config).expect("building prototypes");
        prototype_table.insert(user_id.clone(), set);
        genuine_embeddings_by_user.push(embeddings.iter().map(|e| e.as_slice().to_vec()).collect());
    }

    // Calibration: genuine score = cosine(embedding, own prototype),
    // impostor score = cosine(embedding, nearest other user's prototype).
    let mut scores = Vec::new();
    let mut labels = Vec::new();
    for (idx, user_id) in user_ids.iter().enumerate() {
        let own = prototype_table.get(user_id).unwrap();
        for raw in &genuine_embeddings_by_user[idx] {
            let e = cortexauth::types::Embedding::from_raw(raw.clone()).unwrap();
            scores.push(own.best_similarity(&e));
            labels.push(1.0);

            for (other_idx, other_id) in user_ids.iter().enumerate() {
                if other_idx == idx {
                    continue;
                }
                let other = prototype_table.get(other_id).unwrap();
                scores.push(other.best_similarity(&e));
                labels.push(0.0);
            }
        }
    }
    let calibrator = calibration::fit_logistic(&scores, &labels).expect("fitting calibrator");
    let threshold = equal_error_threshold(&scores, &labels);

    // Anomaly detector: autoencoder trained on all genuine embeddings.
    let autoencoder_config = EmbeddingAutoencoderConfig::new(config.embedding_dim);
    let mut autoencoder = autoencoder_config.init::<Backend>(&device);
    let mut ae_opt = anomaly::create_optimizer::<Backend>(config.weight_decay);
    let all_genuine: Vec<Vec<f32>> = genuine_embeddings_by_user.into_iter().flatten().collect();
    for _epoch in 0..config.metric_epochs.min(10) {
        let (new_ae, result) = anomaly::train_epoch(autoencoder, &all_genuine, &mut ae_opt, config.lr, &device);
        autoencoder = new_ae;
        tracing::debug!(loss = result.avg_loss, "anomaly detector epoch");
    }

    let errors: Vec<f32> = all_genuine
        .iter()
        .map(|raw| {
            reconstruction_error(&autoencoder, raw, &device)
        })
        .collect();
    let tau_spoof = anomaly::calibrate_threshold(&errors, config.spoof_threshold_percentile);

    let bundle = ModelBundle {
        encoder,
        autoencoder,
        calibrator,
        prototypes: prototype_table,
        threshold: cortexauth::verify::engine::OperatingThreshold {
            tau_decision: threshold,
            criterion: config.decision_criterion,
        },
        tau_spoof,
    };
    let manifest = BundleManifest::from_config(&config);
    bundle.save(&args.output_dir, &manifest).expect("saving bundle");

    println!(
        "trained on {} users, {} total windows; bundle written to {}",
        user_ids.len(),
        warmup_examples.len(),
        args.output_dir.display()
    );
}

fn flatten_channel_major(w: &cortexauth::types::Window) -> Vec<f32> {
    w.data.iter().copied().collect()
}

fn embed<B: burn::tensor::backend::AutodiffBackend>(
    encoder: &cortexauth::model::SequenceEncoder<B>,
    window: &cortexauth::types::Window,
    device: &B::Device,
) -> cortexauth::types::Embedding {
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
    cortexauth::types::Embedding::from_raw(values).expect("encoder produces finite output")
}

fn reconstruction_error<B: burn::tensor::backend::AutodiffBackend>(
    autoencoder: &cortexauth::model::EmbeddingAutoencoder<B>,
    embedding: &[f32],
    device: &B::Device,
) -> f32 {
    use burn::prelude::*;

    let input: Tensor<B, 2> = Tensor::from_data(TensorData::new(embedding.to_vec(), [1, embedding.len()]), device);
    let error = autoencoder.reconstruction_error(input);
    error.into_data().to_vec::<f32>().unwrap()[0]
}

fn build_metric_batches(
    windows_per_user: &[Vec<cortexauth::types::Window>],
    batch_size: usize,
) -> Vec<Vec<(Vec<f32>, usize, usize, usize)>> {
    let mut flat: Vec<(Vec<f32>, usize, usize, usize)> = Vec::new();
    for (idx, windows) in windows_per_user.iter().enumerate() {
        for w in windows {
            flat.push((flatten_channel_major(w), w.num_channels(), w.len(), idx));
        }
    }
    flat.chunks(batch_size.max(1)).map(|c| c.to_vec()).collect()
}

/// Scan candidate thresholds and pick the one minimizing |FAR - FRR|.
fn equal_error_threshold(scores: &[f32], labels: &[f32]) -> f32 {
    let mut candidates: Vec<f32> = scores.to_vec();
    candidates.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mut best_tau = 0.5;
    let mut best_gap = f32::INFINITY;
    for &tau in &candidates {
        let mut false_accepts = 0;
        let mut false_rejects = 0;
        let mut impostors = 0;
        let mut genuine = 0;
        for (&s, &l) in scores.iter().zip(labels.iter()) {
            if l > 0.5 {
                genuine += 1;
                if s < tau {
                    false_rejects += 1;
                }
            } else {
                impostors += 1;
                if s >= tau {
                    false_accepts += 1;
                }
            }
        }
        let far = if impostors > 0 { false_accepts as f32 / impostors as f32 } else { 0.0 };
        let frr = if genuine > 0 { false_rejects as f32 / genuine as f32 } else { 0.0 };
        let gap = (far - frr).abs();
        if gap < best_gap {
            best_gap = gap;
            best_tau = tau;
        }
    }
    best_tau
}
