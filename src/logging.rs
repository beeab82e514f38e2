//! Logging initialization.
//!
//! `tracing` + `tracing-subscriber`, env-filter controlled
//! (`CORTEXAUTH_LOG`, defaulting to `info`). Called once from `main`.

use tracing_subscriber::EnvFilter;

pub fn init() {
    let filter = EnvFilter::try_from_env("CORTEXAUTH_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Short, non-reversible tag for a user id suitable for logging at
/// `info` without putting raw identities in the log stream.
pub fn hashed_user_tag(user_id: &str) -> String {
    let hash = blake3::hash(user_id.as_bytes());
    hash.to_hex()[..12].to_string()
}
