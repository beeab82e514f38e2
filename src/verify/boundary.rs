//! External boundary mapping (spec §7): collapses every internal
//! error into a single uniform reject response, so an external caller
//! can never distinguish "unknown user" from "probe too short" from
//! "model not loaded" — any such signal would let an attacker probe
//! the system for account existence or format details.

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExternalResult {
    Accept,
    Reject,
}

/// Map an internal verification result to the external boundary
/// shape. Every `Err(Error)` becomes `Reject` regardless of kind.
pub fn to_external(result: &crate::error::Result<crate::verify::engine::VerificationOutcome>) -> ExternalResult {
    match result {
        Ok(outcome) => match outcome.decision {
            crate::verify::engine::Decision::Accept => ExternalResult::Accept,
            crate::verify::engine::Decision::Reject => ExternalResult::Reject,
        },
        Err(_) => ExternalResult::Reject,
    }
}

/// Stable tag for internal logging/metrics that must never reach the
/// external boundary directly.
pub fn internal_error_tag(error: &Error) -> &'static str {
    error.kind_tag()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn every_error_kind_maps_to_reject() {
        let errors = [
            Error::EmptyTrial,
            Error::UnknownUser("x".into()),
            Error::ModelNotLoaded,
            Error::Timeout,
            Error::ProbeTooShort { required: 1, got: 0 },
        ];
        for err in errors {
            let result: crate::error::Result<crate::verify::engine::VerificationOutcome> = Err(err);
            assert_eq!(to_external(&result), ExternalResult::Reject);
        }
    }
}
