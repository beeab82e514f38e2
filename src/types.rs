//! Core data types (spec §3): Trial, ProcessedTrial, Window, Embedding.

use ndarray::Array2;

use crate::error::{Error, Result};

/// An ordered multi-channel recording segment, `(channel, sample)`.
#[derive(Debug, Clone)]
pub struct Trial {
    /// Shape `(channels, samples)`.
    pub data: Array2<f32>,
    pub fs_in: u32,
    pub channel_names: Vec<String>,
}

impl Trial {
    pub fn new(data: Array2<f32>, fs_in: u32, channel_names: Vec<String>) -> Result<Self> {
        if data.nrows() != channel_names.len() {
            return Err(Error::InputFormat(format!(
                "data has {} channel rows but {} channel names were given",
                data.nrows(),
                channel_names.len()
            )));
        }
        if !data.iter().all(|v| v.is_finite()) {
            return Err(Error::Numeric("trial contains non-finite samples".into()));
        }
        if data.ncols() == 0 {
            return Err(Error::EmptyTrial);
        }
        Ok(Self {
            data,
            fs_in,
            channel_names,
        })
    }

    pub fn num_samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn num_channels(&self) -> usize {
        self.data.nrows()
    }
}

/// A Trial resampled to `fs_out` and per-channel standardized.
#[derive(Debug, Clone)]
pub struct ProcessedTrial {
    /// Shape `(channels, samples)`.
    pub data: Array2<f32>,
    pub fs_out: u32,
}

impl ProcessedTrial {
    pub fn num_samples(&self) -> usize {
        self.data.ncols()
    }

    pub fn num_channels(&self) -> usize {
        self.data.nrows()
    }

    /// Slide fixed-length windows of length `w` at stride `s`.
    /// Yields `floor((T - w) / s) + 1` windows, time-ordered, or zero
    /// windows if the trial is shorter than `w`.
    pub fn windows(&self, w: usize, s: usize) -> Vec<Window> {
        let t = self.num_samples();
        if t < w || w == 0 || s == 0 {
            return Vec::new();
        }
        let n = (t - w) / s + 1;
        (0..n)
            .map(|i| {
                let start = i * s;
                Window {
                    data: self.data.slice(ndarray::s![.., start..start + w]).to_owned(),
                }
            })
            .collect()
    }
}

/// A fixed-shape `(C, W)` slice fed to the encoder.
#[derive(Debug, Clone)]
pub struct Window {
    pub data: Array2<f32>,
}

impl Window {
    pub fn num_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn len(&self) -> usize {
        self.data.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.data.ncols() == 0
    }
}

/// A unit-L2-norm embedding vector, `d_emb` elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding(Vec<f32>);

/// Numerical tolerance for the `‖e‖₂ = 1` invariant (spec §8, invariant 1).
pub const NORM_TOLERANCE: f32 = 1e-4;

impl Embedding {
    /// Build from a raw vector, L2-renormalizing it. Fails if the norm
    /// is zero or any element is non-finite.
    pub fn from_raw(values: Vec<f32>) -> Result<Self> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::Numeric("embedding contains non-finite values".into()));
        }
        let norm = (values.iter().map(|v| v * v).sum::<f32>()).sqrt();
        if !(norm > 0.0) {
            return Err(Error::Numeric("embedding has zero norm".into()));
        }
        Ok(Self(values.into_iter().map(|v| v / norm).collect()))
    }

    /// Build from values already known to be unit-norm (e.g. the
    /// mean-then-renormalize aggregate); still validates the invariant.
    pub fn assert_unit_norm(values: Vec<f32>) -> Result<Self> {
        let norm = (values.iter().map(|v| v * v).sum::<f32>()).sqrt();
        if (norm - 1.0).abs() > NORM_TOLERANCE * 10.0 {
            return Err(Error::Numeric(format!(
                "embedding norm {norm} deviates from unit norm"
            )));
        }
        Self::from_raw(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn dim(&self) -> usize {
        self.0.len()
    }

    pub fn norm(&self) -> f32 {
        self.0.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| a * b)
            .sum()
    }

    /// Mean of several embeddings, L2-renormalized (spec §4.I step 3).
    pub fn mean_renormalized(embeddings: &[Embedding]) -> Result<Embedding> {
        if embeddings.is_empty() {
            return Err(Error::Numeric("cannot aggregate zero embeddings".into()));
        }
        let dim = embeddings[0].dim();
        let mut acc = vec![0.0f32; dim];
        for e in embeddings {
            for (a, v) in acc.iter_mut().zip(e.0.iter()) {
                *a += v;
            }
        }
        let n = embeddings.len() as f32;
        for a in acc.iter_mut() {
            *a /= n;
        }
        Embedding::from_raw(acc)
    }
}
