//! Error taxonomy for the verification core.
//!
//! `Error` surfaces the internal kind; the serving boundary
//! ([`crate::verify::boundary`]) is responsible for collapsing every
//! variant into a uniform external reject so a caller can't use error
//! shape as an oracle (see spec §7).

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("input format error: {0}")]
    InputFormat(String),

    #[error("trial has no samples")]
    EmptyTrial,

    #[error("probe too short: need at least {required} samples, got {got}")]
    ProbeTooShort { required: usize, got: usize },

    #[error("filter error: {0}")]
    Filter(String),

    #[error("numeric error: {0}")]
    Numeric(String),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("model not loaded")]
    ModelNotLoaded,

    #[error("verification exceeded deadline")]
    Timeout,
}

impl Error {
    /// A short, stable tag for logs and attribution artifacts — distinct
    /// from `Display`, which may carry interpolated detail that drifts.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Error::InputFormat(_) => "InputFormatError",
            Error::EmptyTrial => "EmptyTrialError",
            Error::ProbeTooShort { .. } => "ProbeTooShort",
            Error::Filter(_) => "FilterError",
            Error::Numeric(_) => "NumericError",
            Error::UnknownUser(_) => "UnknownUser",
            Error::ModelNotLoaded => "ModelNotLoaded",
            Error::Timeout => "Timeout",
        }
    }
}

/// Errors fatal to the offline training batch job (distinct taxonomy:
/// these abort the process rather than resolving to a reject decision).
#[derive(Error, Debug)]
pub enum TrainingError {
    #[error("training diverged: {0}")]
    Diverged(String),

    #[error("failed to write checkpoint: {0}")]
    CheckpointWrite(String),

    #[error("training data is empty")]
    DataEmpty,

    #[error(transparent)]
    Core(#[from] Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_tag_is_stable_across_variant_payloads() {
        let a = Error::UnknownUser("alice".into());
        let b = Error::UnknownUser("bob".into());
        assert_eq!(a.kind_tag(), b.kind_tag());
    }

    #[test]
    fn probe_too_short_display_includes_counts() {
        let e = Error::ProbeTooShort {
            required: 256,
            got: 200,
        };
        assert!(e.to_string().contains("256"));
        assert!(e.to_string().contains("200"));
    }
}
