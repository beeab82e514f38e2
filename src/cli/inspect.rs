use std::path::PathBuf;

use clap::Args;
use uuid::Uuid;

use cortexauth::config::Config;

use super::{device, Backend};

#[derive(Args)]
pub struct InspectArgs {
    #[arg(long)]
    pub bundle_dir: PathBuf,
    /// Artifact id returned by a prior `verify` call.
    #[arg(long)]
    pub artifact_id: Uuid,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn cmd_inspect(args: InspectArgs) {
    let config = match &args.config {
        Some(path) => Config::load_or_default(path).expect("loading config"),
        None => Config::default(),
    };
    let device = device();

    let state = cortexauth::load_bundle::<Backend>(&args.bundle_dir, config, &device)
        .expect("loading model bundle");

    let artifact = cortexauth::fetch_attribution(&state, args.artifact_id).expect("artifact not found");

    println!(
        "decision={:?} raw_score={:.4} calibrated_probability={:.4} spoof_score={:.4}",
        artifact.decision, artifact.raw_score, artifact.calibrated_probability, artifact.spoof_score
    );

    let (channels, time) = artifact.importance.dim();
    println!("importance map: {channels} channels x {time} samples");
    for c in 0..channels {
        let row_sum: f32 = artifact.importance.row(c).iter().sum();
        println!("  channel {c}: total importance {row_sum:.5}");
    }
}
