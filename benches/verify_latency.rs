//! Verification-pipeline latency benchmark.
//!
//! Measures each stage of `VerificationEngine::verify`:
//! 1. Preprocessing + windowing
//! 2. Encoding (all windows)
//! 3. Full pipeline (window -> embed -> aggregate -> score ->
//!    calibrate -> spoof-gate -> decide -> attribute)
//!
//! Target: stay under the 100ms soft verification budget
//! (`Config::verify_soft_budget_ms`).

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use burn::backend::{Autodiff, NdArray};

use cortexauth::artifact::ArtifactStore;
use cortexauth::calibration::LogisticCalibrator;
use cortexauth::config::{Config, DecisionCriterion};
use cortexauth::model::{EmbeddingAutoencoderConfig, SequenceEncoderConfig};
use cortexauth::prototype::{PrototypeSet, PrototypeTable};
use cortexauth::signal::preprocess::Preprocessor;
use cortexauth::signal::window;
use cortexauth::types::Trial;
use cortexauth::verify::engine::{OperatingThreshold, VerificationEngine};

type B = Autodiff<NdArray>;

fn bench_config() -> Config {
    let mut config = Config::default();
    config.n_channels = 8;
    config.embedding_dim = 32;
    config.hidden_width = 16;
    config.encoder_layers = 2;
    config.sample_rate_out = 128;
    config.window_seconds = 2.0;
    config.step_seconds = 1.0;
    config.fast_mode = true; // skip ICA so the benchmark isolates the model/pipeline cost
    config
}

fn sample_trial(n_channels: usize, samples: usize) -> Trial {
    let names: Vec<String> = (0..n_channels).map(|i| format!("ch{i}")).collect();
    let data = ndarray::Array2::<f32>::from_shape_fn((n_channels, samples), |(c, t)| {
        ((t as f32) * 0.01 + c as f32).sin()
    });
    Trial::new(data, 128, names).unwrap()
}

fn bench_engine(config: &Config) -> VerificationEngine<B> {
    let device = Default::default();
    let encoder = SequenceEncoderConfig::new(config.n_channels)
        .with_hidden_width(config.hidden_width)
        .with_num_layers(config.encoder_layers)
        .with_embedding_dim(config.embedding_dim)
        .init::<B>(&device);
    let autoencoder = EmbeddingAutoencoderConfig::new(config.embedding_dim).init::<B>(&device);

    let mut prototypes = PrototypeTable::default();
    let mut centroid = vec![0.0f32; config.embedding_dim];
    centroid[0] = 1.0;
    prototypes.insert("bench_user".into(), PrototypeSet { centroids: vec![centroid] });

    VerificationEngine {
        encoder,
        autoencoder,
        prototypes,
        calibrator: LogisticCalibrator { a: 1.0, b: 0.0 },
        threshold: OperatingThreshold {
            tau_decision: -1.0,
            criterion: DecisionCriterion::EqualErrorRate,
        },
        tau_spoof: f32::INFINITY,
        config: config.clone(),
    }
}

fn bench_preprocess(c: &mut Criterion) {
    let config = bench_config();
    let preprocessor = Preprocessor::new(&config);
    let trial = sample_trial(config.n_channels, 512);

    c.bench_function("preprocess_4s_trial", |b| {
        b.iter(|| preprocessor.process(black_box(&trial)).unwrap())
    });
}

fn bench_windowing(c: &mut Criterion) {
    let config = bench_config();
    let preprocessor = Preprocessor::new(&config);
    let trial = sample_trial(config.n_channels, 512);
    let processed = preprocessor.process(&trial).unwrap();

    c.bench_function("window_for_verification_4s", |b| {
        b.iter(|| window::window_for_verification(black_box(&processed), black_box(&config)).unwrap())
    });
}

fn bench_verify_end_to_end(c: &mut Criterion) {
    let config = bench_config();
    let device = Default::default();
    let engine = bench_engine(&config);
    let store = ArtifactStore::new();
    let trial = sample_trial(config.n_channels, 512);

    c.bench_function("verify_4s_probe", |b| {
        b.iter(|| {
            engine
                .verify(black_box("bench_user"), black_box(&trial), &device, &store)
                .unwrap()
        })
    });
}

criterion_group!(benches, bench_preprocess, bench_windowing, bench_verify_end_to_end);
criterion_main!(benches);
