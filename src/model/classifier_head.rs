//! Classification head used only during warmup training (spec §4.D
//! phase 1): a linear projection from embedding space to per-user
//! logits, discarded once metric-learning phase 2 begins.

use burn::config::Config as BurnConfig;
use burn::module::Module;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

#[derive(BurnConfig, Debug)]
pub struct ClassifierHeadConfig {
    pub embedding_dim: usize,
    pub num_users: usize,
}

#[derive(Module, Debug)]
pub struct ClassifierHead<B: Backend> {
    linear: Linear<B>,
}

impl ClassifierHeadConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> ClassifierHead<B> {
        ClassifierHead {
            linear: LinearConfig::new(self.embedding_dim, self.num_users).init(device),
        }
    }
}

impl<B: Backend> ClassifierHead<B> {
    /// `embeddings`: `[batch, embedding_dim]`. Returns `[batch, num_users]` logits.
    pub fn forward(&self, embeddings: Tensor<B, 2>) -> Tensor<B, 2> {
        self.linear.forward(embeddings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn forward_produces_logits_per_user() {
        let device = Default::default();
        let head = ClassifierHeadConfig::new(16, 5).init::<TestBackend>(&device);
        let embeddings = Tensor::<TestBackend, 2>::zeros([3, 16], &device);
        let logits = head.forward(embeddings);
        assert_eq!(logits.dims(), [3, 5]);
    }
}
