//! Embedding autoencoder (spec §4.H): a small bottleneck
//! reconstruction network trained only on genuine-user embeddings.
//! Reconstruction error at verification time feeds the spoof/anomaly
//! gate.

use burn::config::Config as BurnConfig;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig, Relu};
use burn::prelude::*;

#[derive(BurnConfig, Debug)]
pub struct EmbeddingAutoencoderConfig {
    pub embedding_dim: usize,
    #[config(default = 32)]
    pub bottleneck_dim: usize,
}

#[derive(Module, Debug)]
pub struct EmbeddingAutoencoder<B: Backend> {
    encoder: Linear<B>,
    decoder: Linear<B>,
    activation: Relu,
}

impl EmbeddingAutoencoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> EmbeddingAutoencoder<B> {
        EmbeddingAutoencoder {
            encoder: LinearConfig::new(self.embedding_dim, self.bottleneck_dim).init(device),
            decoder: LinearConfig::new(self.bottleneck_dim, self.embedding_dim).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> EmbeddingAutoencoder<B> {
    /// `input`: `[batch, embedding_dim]`. Returns the reconstruction,
    /// same shape.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let code = self.activation.forward(self.encoder.forward(input));
        self.decoder.forward(code)
    }

    /// Per-example mean-squared reconstruction error, `[batch]`.
    pub fn reconstruction_error(&self, input: Tensor<B, 2>) -> Tensor<B, 1> {
        let reconstructed = self.forward(input.clone());
        let diff = reconstructed - input;
        let squared = diff.clone() * diff;
        squared.mean_dim(1).squeeze_dim::<1>(1)
    }
}
