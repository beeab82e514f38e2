//! Configuration surface (spec §6/§9).
//!
//! Loaded from an optional `config.toml`; every field has a default
//! matching the spec's enumerated defaults, so a missing file or a
//! partially-specified one both produce a usable `Config`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub sample_rate_out: u32,
    pub window_seconds: f64,
    pub step_seconds: f64,
    pub n_channels: usize,
    pub embedding_dim: usize,
    pub prototypes_per_user: usize,
    pub calibrator_form: CalibratorForm,
    pub spoof_threshold_percentile: f64,
    pub decision_criterion: DecisionCriterion,
    pub ig_steps: usize,

    // Ambient additions (§9 of SPEC_FULL.md).
    pub hidden_width: usize,
    pub encoder_layers: usize,
    pub warmup_epochs: usize,
    pub metric_epochs: usize,
    pub metric_margin: f64,
    pub metric_temperature: f64,
    pub patience: usize,
    pub lr: f64,
    pub weight_decay: f64,
    pub fast_mode: bool,
    pub channel_dropout_p: f64,
    pub snr_db_range: (f64, f64),
    pub time_shift_seconds: f64,
    pub mixup_beta: f64,
    pub seed: u64,
    pub verify_soft_budget_ms: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CalibratorForm {
    #[default]
    Logistic,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCriterion {
    #[default]
    EqualErrorRate,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate_out: 128,
            window_seconds: 2.0,
            step_seconds: 1.0,
            n_channels: crate::channels::NUM_CHANNELS,
            embedding_dim: 128,
            prototypes_per_user: 2,
            calibrator_form: CalibratorForm::Logistic,
            spoof_threshold_percentile: 99.0,
            decision_criterion: DecisionCriterion::EqualErrorRate,
            ig_steps: 50,
            hidden_width: 128,
            encoder_layers: 2,
            warmup_epochs: 3,
            metric_epochs: 30,
            metric_margin: 0.2,
            metric_temperature: 0.1,
            patience: 7,
            lr: 1e-3,
            weight_decay: 0.01,
            fast_mode: false,
            channel_dropout_p: 0.15,
            snr_db_range: (12.0, 28.0),
            time_shift_seconds: 0.5,
            mixup_beta: 0.4,
            seed: 0x5EED_5EED,
            verify_soft_budget_ms: 100,
        }
    }
}

impl Config {
    /// Window length in samples, `W` in the spec.
    pub fn window_len(&self) -> usize {
        (self.sample_rate_out as f64 * self.window_seconds).round() as usize
    }

    /// Window stride in samples, `S` in the spec.
    pub fn step_len(&self) -> usize {
        (self.sample_rate_out as f64 * self.step_seconds).round() as usize
    }

    /// Load from a TOML file, falling back to defaults for absent fields.
    /// If `path` doesn't exist, returns plain defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::InputFormat(format!("reading {}: {e}", path.display())))?;
        toml::from_str(&text)
            .map_err(|e| Error::InputFormat(format!("parsing {}: {e}", path.display())))
    }
}
