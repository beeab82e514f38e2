//! Sequence encoder (spec §4.C): bidirectional GRU over a windowed
//! trial followed by temporal attention pooling, producing a
//! fixed-size embedding that is L2-normalized downstream by the
//! caller (see [`crate::types::Embedding`]).

use burn::config::Config as BurnConfig;
use burn::module::Module;
use burn::nn::gru::{Gru, GruConfig};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

#[derive(BurnConfig, Debug)]
pub struct SequenceEncoderConfig {
    pub num_channels: usize,
    #[config(default = 128)]
    pub hidden_width: usize,
    #[config(default = 2)]
    pub num_layers: usize,
    #[config(default = 128)]
    pub embedding_dim: usize,
}

/// Bidirectional GRU stack + temporal attention pooling + projection
/// head. `forward` consumes a `[batch, time, channels]` tensor and
/// returns a `[batch, embedding_dim]` raw (not yet unit-normalized)
/// embedding.
#[derive(Module, Debug)]
pub struct SequenceEncoder<B: Backend> {
    forward_layers: Vec<Gru<B>>,
    backward_layers: Vec<Gru<B>>,
    attn_score: Linear<B>,
    project: Linear<B>,
    hidden_width: usize,
}

impl SequenceEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SequenceEncoder<B> {
        let mut forward_layers = Vec::with_capacity(self.num_layers);
        let mut backward_layers = Vec::with_capacity(self.num_layers);
        for i in 0..self.num_layers {
            let d_in = if i == 0 {
                self.num_channels
            } else {
                self.hidden_width * 2
            };
            forward_layers.push(GruConfig::new(d_in, self.hidden_width, true).init(device));
            backward_layers.push(GruConfig::new(d_in, self.hidden_width, true).init(device));
        }
        SequenceEncoder {
            forward_layers,
            backward_layers,
            attn_score: LinearConfig::new(self.hidden_width * 2, 1).init(device),
            project: LinearConfig::new(self.hidden_width * 2, self.embedding_dim).init(device),
            hidden_width: self.hidden_width,
        }
    }
}

impl<B: Backend> SequenceEncoder<B> {
    /// `input`: `[batch, time, num_channels]`. Returns `[batch, embedding_dim]`.
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let [batch, time, _] = input.dims();
        let mut h = input;

        for (fwd, bwd) in self.forward_layers.iter().zip(self.backward_layers.iter()) {
            let forward_out = fwd.forward(h.clone(), None); // [batch, time, hidden]
            let reversed = reverse_time(h.clone());
            let backward_out_rev = bwd.forward(reversed, None);
            let backward_out = reverse_time(backward_out_rev); // back to original order

            h = Tensor::cat(vec![forward_out, backward_out], 2); // [batch, time, 2*hidden]
        }

        // Temporal attention pooling.
        let scores = self.attn_score.forward(h.clone()); // [batch, time, 1]
        let weights = burn::tensor::activation::softmax(scores, 1); // normalize over time
        let weighted = h * weights.expand([batch, time, self.hidden_width * 2]);
        let pooled: Tensor<B, 2> = weighted.sum_dim(1).squeeze_dim::<2>(1); // [batch, 2*hidden]

        self.project.forward(pooled)
    }
}

fn reverse_time<B: Backend>(t: Tensor<B, 3>) -> Tensor<B, 3> {
    let time = t.dims()[1];
    let indices: Vec<i32> = (0..time as i32).rev().collect();
    let idx = Tensor::<B, 1, Int>::from_ints(indices.as_slice(), &t.device());
    t.select(1, idx)
}
