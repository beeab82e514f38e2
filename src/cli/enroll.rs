use std::path::PathBuf;

use clap::Args;

use cortexauth::artifact::{BundleManifest, ModelBundle};
use cortexauth::config::Config;
use cortexauth::signal::loader;

use super::{device, Backend};

#[derive(Args)]
pub struct EnrollArgs {
    /// Bundle directory produced by `train`, updated in place.
    #[arg(long)]
    pub bundle_dir: PathBuf,
    /// User id to (re-)enroll.
    #[arg(long)]
    pub user_id: String,
    /// One or more `.eegrec` recording files for this user.
    #[arg(long, required = true)]
    pub recordings: Vec<PathBuf>,
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn cmd_enroll(args: EnrollArgs) {
    let config = match &args.config {
        Some(path) => Config::load_or_default(path).expect("loading config"),
        None => Config::default(),
    };
    let device = device();
    let manifest = BundleManifest::from_config(&config);

    let mut bundle = ModelBundle::<Backend>::load(&args.bundle_dir, &manifest, &device)
        .expect("loading existing bundle; run `train` first");

    let mut trials = Vec::new();
    for path in &args.recordings {
        trials.extend(loader::load_trials(path).expect("loading recording"));
    }
    tracing::info!(user = %args.user_id, num_trials = trials.len(), "enrolling user");

    let prototype_set = cortexauth::enroll(&bundle.encoder, &trials, &config, &device)
        .expect("building prototypes from enrollment trials");
    bundle.prototypes.insert(args.user_id.clone(), prototype_set);

    bundle.save(&args.bundle_dir, &manifest).expect("saving updated bundle");
    println!("enrolled '{}' with {} trials", args.user_id, trials.len());
}
