//! Biquad IIR filters (RBJ audio-cookbook coefficient forms) used by
//! the preprocessor for band-pass and notch filtering.
//!
//! Each filter runs in direct-form transposed II. [`filtfilt`] gives
//! zero-phase output by filtering forward then backward, matching the
//! "zero-phase, 4th-order recommended" band-pass called for in spec §4.B:
//! two cascaded biquad sections approximate the 4th-order response.

use std::f32::consts::PI;

/// Minimum samples required for `filtfilt`'s forward+backward pass to
/// be meaningful (avoids filtering degenerate single-sample channels).
const MIN_FILTFILT_LEN: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

struct BiquadState {
    z1: f32,
    z2: f32,
}

impl Biquad {
    /// RBJ "constant 0dB peak gain" band-pass, center `f0`, quality `q`.
    pub fn bandpass(f0: f32, q: f32, fs: f32) -> Self {
        let w0 = 2.0 * PI * f0 / fs;
        let alpha = w0.sin() / (2.0 * q);
        let b0 = alpha;
        let b1 = 0.0;
        let b2 = -alpha;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * w0.cos();
        let a2 = 1.0 - alpha;
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    /// RBJ notch filter centered at `f0` with quality `q`.
    pub fn notch(f0: f32, q: f32, fs: f32) -> Self {
        let w0 = 2.0 * PI * f0 / fs;
        let alpha = w0.sin() / (2.0 * q);
        let b0 = 1.0;
        let b1 = -2.0 * w0.cos();
        let b2 = 1.0;
        let a0 = 1.0 + alpha;
        let a1 = -2.0 * w0.cos();
        let a2 = 1.0 - alpha;
        Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: a1 / a0,
            a2: a2 / a0,
        }
    }

    fn run(&self, input: &[f32]) -> Vec<f32> {
        let mut state = BiquadState { z1: 0.0, z2: 0.0 };
        input
            .iter()
            .map(|&x| {
                let y = self.b0 * x + state.z1;
                state.z1 = self.b1 * x - self.a1 * y + state.z2;
                state.z2 = self.b2 * x - self.a2 * y;
                y
            })
            .collect()
    }
}

/// Cascade a series of biquads, zero-phase (forward-backward).
pub fn filtfilt(stages: &[Biquad], signal: &[f32]) -> Vec<f32> {
    if signal.len() < MIN_FILTFILT_LEN || stages.is_empty() {
        return signal.to_vec();
    }
    let mut out = signal.to_vec();
    for stage in stages {
        out = stage.run(&out);
        out.reverse();
        out = stage.run(&out);
        out.reverse();
    }
    out
}

/// Two-stage Butterworth-like band-pass between `f_low` and `f_high`.
pub fn bandpass_cascade(f_low: f32, f_high: f32, fs: f32) -> Vec<Biquad> {
    let f0 = (f_low * f_high).sqrt();
    let bw_octaves = (f_high / f_low).log2();
    // Q from bandwidth in octaves (RBJ cookbook relation).
    let q = (2f32.powf(bw_octaves)).sqrt() / (2f32.powf(bw_octaves) - 1.0);
    vec![Biquad::bandpass(f0, q, fs), Biquad::bandpass(f0, q, fs)]
}

/// Narrow notch at `f_line` (mains frequency).
pub fn notch_stage(f_line: f32, fs: f32) -> Biquad {
    const NOTCH_Q: f32 = 30.0;
    Biquad::notch(f_line, NOTCH_Q, fs)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, fs: f32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / fs).sin())
            .collect()
    }

    fn rms(signal: &[f32]) -> f32 {
        (signal.iter().map(|v| v * v).sum::<f32>() / signal.len() as f32).sqrt()
    }

    #[test]
    fn bandpass_attenuates_out_of_band_tone() {
        let fs = 512.0;
        let stages = bandpass_cascade(1.0, 50.0, fs);
        let low_freq = sine(0.1, fs, 2048); // well below passband
        let mid_freq = sine(10.0, fs, 2048); // inside passband

        let filtered_low = filtfilt(&stages, &low_freq);
        let filtered_mid = filtfilt(&stages, &mid_freq);

        assert!(rms(&filtered_low) < 0.3 * rms(&low_freq));
        assert!(rms(&filtered_mid) > 0.5 * rms(&mid_freq));
    }

    #[test]
    fn notch_attenuates_line_frequency() {
        let fs = 512.0;
        let stage = notch_stage(50.0, fs);
        let tone = sine(50.0, fs, 2048);
        let filtered = filtfilt(&[stage], &tone);
        assert!(rms(&filtered) < 0.2 * rms(&tone));
    }

    #[test]
    fn filtfilt_is_finite_on_short_signals() {
        let stages = bandpass_cascade(1.0, 50.0, 512.0);
        let short = vec![0.0, 1.0];
        let out = filtfilt(&stages, &short);
        assert!(out.iter().all(|v| v.is_finite()));
    }
}
