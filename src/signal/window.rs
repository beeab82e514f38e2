//! Windowing helpers distinguishing the verification path (which must
//! reject short probes outright, spec §4.I step 1) from the
//! training/enrollment path (which simply yields whatever windows fit).

use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{ProcessedTrial, Window};

/// Window a probe for verification. Returns `Error::ProbeTooShort` if
/// the trial yields zero windows at the configured `(W, S)`.
pub fn window_for_verification(trial: &ProcessedTrial, config: &Config) -> Result<Vec<Window>> {
    let w = config.window_len();
    let s = config.step_len();
    let windows = trial.windows(w, s);
    if windows.is_empty() {
        return Err(Error::ProbeTooShort {
            required: w,
            got: trial.num_samples(),
        });
    }
    Ok(windows)
}

/// Window a trial for training or enrollment. Short trials simply
/// yield no windows; callers decide whether that's fatal.
pub fn window_for_training(trial: &ProcessedTrial, config: &Config) -> Vec<Window> {
    trial.windows(config.window_len(), config.step_len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn trial(samples: usize) -> ProcessedTrial {
        ProcessedTrial {
            data: Array2::<f32>::zeros((48, samples)),
            fs_out: 128,
        }
    }

    #[test]
    fn verification_rejects_short_probe() {
        let config = Config::default();
        let short = trial(config.window_len() - 1);
        let result = window_for_verification(&short, &config);
        assert!(matches!(result, Err(Error::ProbeTooShort { .. })));
    }

    #[test]
    fn verification_accepts_exact_length() {
        let config = Config::default();
        let exact = trial(config.window_len());
        let windows = window_for_verification(&exact, &config).unwrap();
        assert_eq!(windows.len(), 1);
    }

    #[test]
    fn training_returns_empty_vec_for_short_trial() {
        let config = Config::default();
        let short = trial(config.window_len() - 1);
        assert!(window_for_training(&short, &config).is_empty());
    }
}
