mod cli;

use clap::{Parser, Subcommand};

use cli::bench::{cmd_bench, BenchArgs};
use cli::enroll::{cmd_enroll, EnrollArgs};
use cli::inspect::{cmd_inspect, InspectArgs};
use cli::train::{cmd_train, TrainArgs};
use cli::verify::{cmd_verify, VerifyArgs};

#[derive(Parser)]
#[command(
    name = "cortexauth",
    version,
    about = "EEG biometric verification: train, enroll, verify, and inspect"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train an encoder, prototypes, calibrator, and spoof gate from a
    /// corpus of `.eegrec` recordings.
    Train(TrainArgs),
    /// Add or replace a user's prototypes in an existing bundle.
    Enroll(EnrollArgs),
    /// Verify a probe recording against a claimed identity.
    Verify(VerifyArgs),
    /// Print a previously stored attribution artifact.
    InspectAttribution(InspectArgs),
    /// Measure `verify()` latency against the soft budget.
    Bench(BenchArgs),
}

fn main() {
    cortexauth::logging::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Train(args) => cmd_train(args),
        Command::Enroll(args) => cmd_enroll(args),
        Command::Verify(args) => cmd_verify(args),
        Command::InspectAttribution(args) => cmd_inspect(args),
        Command::Bench(args) => cmd_bench(args),
    }
}
