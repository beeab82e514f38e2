//! Trial preprocessing pipeline (spec §4.B): band-pass + notch
//! filtering, optional artifact removal, resampling, per-channel
//! standardization.

use ndarray::Array2;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::signal::filters::{self, Biquad};
use crate::signal::ica;
use crate::types::{ProcessedTrial, Trial};

/// Lower/upper band-pass edges in Hz, per spec §4.B.
const BANDPASS_LOW_HZ: f32 = 1.0;
const BANDPASS_HIGH_HZ: f32 = 50.0;
/// Mains notch frequency in Hz; applied whenever it falls within the
/// band-pass, since mains hum lands squarely inside it.
const NOTCH_LINE_HZ: f32 = 50.0;
/// Per-channel standard deviation floor to avoid dividing by ~0 on a
/// flat-line or saturated channel.
const STD_FLOOR: f32 = 1e-6;

pub struct Preprocessor {
    fs_out: u32,
    fast_mode: bool,
}

impl Preprocessor {
    pub fn new(config: &Config) -> Self {
        Self {
            fs_out: config.sample_rate_out,
            fast_mode: config.fast_mode,
        }
    }

    /// Run the full pipeline on a single trial, producing a
    /// resampled, standardized `ProcessedTrial`.
    pub fn process(&self, trial: &Trial) -> Result<ProcessedTrial> {
        if trial.num_samples() == 0 {
            return Err(Error::EmptyTrial);
        }
        let fs_in = trial.fs_in as f32;

        let filtered = self.apply_filters(&trial.data, fs_in);

        let cleaned = if self.fast_mode {
            filtered
        } else {
            ica::remove_artifacts(&filtered)
        };

        let resampled = resample_linear(&cleaned, fs_in, self.fs_out as f32);
        let standardized = standardize_rows(&resampled);

        if !standardized.iter().all(|v| v.is_finite()) {
            return Err(Error::Numeric("preprocessing produced non-finite samples".into()));
        }

        Ok(ProcessedTrial {
            data: standardized,
            fs_out: self.fs_out,
        })
    }

    fn apply_filters(&self, data: &Array2<f32>, fs_in: f32) -> Array2<f32> {
        let bandpass_stages = filters::bandpass_cascade(BANDPASS_LOW_HZ, BANDPASS_HIGH_HZ, fs_in);
        let notch_stage: Option<Biquad> = if NOTCH_LINE_HZ <= BANDPASS_HIGH_HZ {
            Some(filters::notch_stage(NOTCH_LINE_HZ, fs_in))
        } else {
            None
        };

        let mut out = data.clone();
        for mut row in out.rows_mut() {
            let channel: Vec<f32> = row.to_vec();
            let mut filtered = filters::filtfilt(&bandpass_stages, &channel);
            if let Some(stage) = notch_stage {
                filtered = filters::filtfilt(std::slice::from_ref(&stage), &filtered);
            }
            row.assign(&ndarray::Array1::from(filtered));
        }
        out
    }
}

/// Linear-interpolation resampling from `fs_in` to `fs_out`, applied
/// independently per channel.
fn resample_linear(data: &Array2<f32>, fs_in: f32, fs_out: f32) -> Array2<f32> {
    if (fs_in - fs_out).abs() < f32::EPSILON {
        return data.clone();
    }
    let (c, t) = data.dim();
    if t < 2 {
        return data.clone();
    }
    let duration = (t - 1) as f32 / fs_in;
    let t_out = ((duration * fs_out).round() as usize + 1).max(1);

    let mut out = Array2::<f32>::zeros((c, t_out));
    for ch in 0..c {
        let row = data.row(ch);
        for i in 0..t_out {
            let t_sec = i as f32 / fs_out;
            let src_pos = t_sec * fs_in;
            let i0 = src_pos.floor() as usize;
            let frac = src_pos - i0 as f32;
            let i0c = i0.min(t - 1);
            let i1c = (i0 + 1).min(t - 1);
            out[[ch, i]] = row[i0c] * (1.0 - frac) + row[i1c] * frac;
        }
    }
    out
}

/// Per-channel zero-mean, unit-variance standardization.
fn standardize_rows(data: &Array2<f32>) -> Array2<f32> {
    let mut out = data.clone();
    for mut row in out.rows_mut() {
        let mean = row.mean().unwrap_or(0.0);
        let var = row.mapv(|v| (v - mean).powi(2)).mean().unwrap_or(0.0);
        let std = var.sqrt().max(STD_FLOOR);
        row.mapv_inplace(|v| (v - mean) / std);
    }
    out
}
