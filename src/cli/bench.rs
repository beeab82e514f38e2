use std::path::PathBuf;
use std::time::Instant;

use clap::Args;

use cortexauth::config::Config;
use cortexauth::signal::loader;

use super::{device, Backend};

#[derive(Args)]
pub struct BenchArgs {
    #[arg(long)]
    pub bundle_dir: PathBuf,
    #[arg(long)]
    pub user_id: String,
    #[arg(long)]
    pub probe: PathBuf,
    #[arg(long, default_value_t = 50)]
    pub iterations: usize,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Repeatedly verifies the same probe and reports latency percentiles
/// against the soft budget (`Config::verify_soft_budget_ms`, 100ms by
/// default). A thinner, repeatable companion to `benches/verify_latency.rs`.
pub fn cmd_bench(args: BenchArgs) {
    let config = match &args.config {
        Some(path) => Config::load_or_default(path).expect("loading config"),
        None => Config::default(),
    };
    let budget_ms = config.verify_soft_budget_ms;
    let device = device();

    let state = cortexauth::load_bundle::<Backend>(&args.bundle_dir, config, &device)
        .expect("loading model bundle");

    let mut trials = loader::load_trials(&args.probe).expect("loading probe recording");
    let probe = trials.pop().expect("recording contains at least one trial");

    let mut latencies_ms = Vec::with_capacity(args.iterations);
    for _ in 0..args.iterations {
        let start = Instant::now();
        let _ = cortexauth::verify(&state, &args.user_id, &probe, &device);
        latencies_ms.push(start.elapsed().as_secs_f64() * 1000.0);
    }

    latencies_ms.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let p50 = percentile(&latencies_ms, 50.0);
    let p95 = percentile(&latencies_ms, 95.0);
    let max = *latencies_ms.last().unwrap_or(&0.0);

    println!(
        "{} iterations: p50={:.2}ms p95={:.2}ms max={:.2}ms (soft budget {}ms)",
        args.iterations, p50, p95, max, budget_ms
    );
    if p95 > budget_ms as f64 {
        println!("warning: p95 latency exceeds the configured soft budget");
    }
}

fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * (sorted.len() - 1) as f64).round() as usize;
    sorted[rank.min(sorted.len() - 1)]
}
