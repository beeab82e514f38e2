use std::path::PathBuf;

use clap::Args;

use cortexauth::config::Config;
use cortexauth::signal::loader;
use cortexauth::verify::boundary;

use super::{device, Backend};

#[derive(Args)]
pub struct VerifyArgs {
    #[arg(long)]
    pub bundle_dir: PathBuf,
    #[arg(long)]
    pub user_id: String,
    /// A single `.eegrec` recording holding the probe trial.
    #[arg(long)]
    pub probe: PathBuf,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn cmd_verify(args: VerifyArgs) {
    let config = match &args.config {
        Some(path) => Config::load_or_default(path).expect("loading config"),
        None => Config::default(),
    };
    let device = device();

    let state = cortexauth::load_bundle::<Backend>(&args.bundle_dir, config, &device)
        .expect("loading model bundle");

    let mut trials = loader::load_trials(&args.probe).expect("loading probe recording");
    let probe = trials.pop().expect("recording contains at least one trial");

    let result = cortexauth::verify(&state, &args.user_id, &probe, &device);
    let external = boundary::to_external(&result);

    match &result {
        Ok(outcome) => {
            println!(
                "{:?}: calibrated_probability={:.4} artifact_id={}",
                external, outcome.calibrated_probability, outcome.artifact_id
            );
        }
        Err(e) => {
            tracing::warn!(error_kind = boundary::internal_error_tag(e), "verification failed");
            println!("{external:?}");
        }
    }
}
