//! Gradient-based attribution (spec §4.I step 8): integrated
//! gradients over 50 interpolation steps from a zero baseline,
//! attributing the cosine similarity between an embedding and its
//! best-matching prototype back to `(channel, time)` input cells.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use ndarray::Array2;

use crate::model::SequenceEncoder;
use crate::types::{Embedding, Window};

pub const IG_STEPS: usize = 50;

/// Which attribution strategy produced a stored artifact. Integrated
/// gradients is the only implementation today; the field exists so
/// future strategies can be distinguished without migrating old
/// artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AttributionStrategy {
    IntegratedGradients,
}

/// Compute an integrated-gradients importance map for each window
/// against the target prototype, then average across windows into a
/// single `(C, W)` map (spec §8 scenario S5 permits either a per-window
/// tensor or an aggregate; this implementation aggregates).
pub fn integrated_gradients<B: AutodiffBackend>(
    encoder: &SequenceEncoder<B>,
    windows: &[Window],
    target_prototype: &Embedding,
    steps: usize,
    device: &B::Device,
) -> Array2<f32> {
    assert!(!windows.is_empty());
    let (c, w) = windows[0].data.dim();

    let mut accumulated = Array2::<f32>::zeros((c, w));
    for window in windows {
        let importance = integrated_gradients_single(encoder, window, target_prototype, steps, device);
        accumulated = accumulated + importance;
    }
    accumulated / windows.len() as f32
}

fn integrated_gradients_single<B: AutodiffBackend>(
    encoder: &SequenceEncoder<B>,
    window: &Window,
    target_prototype: &Embedding,
    steps: usize,
    device: &B::Device,
) -> Array2<f32> {
    let (c, t) = window.data.dim();
    // Model input is [batch, time, channels]; window storage is (C, T).
    let input_data: Vec<f32> = (0..t).flat_map(|ti| (0..c).map(move |ci| (ci, ti))).map(|(ci, ti)| window.data[[ci, ti]]).collect();
    let input: Tensor<B, 3> = Tensor::from_data(TensorData::new(input_data, [1, t, c]), device);

    let target: Tensor<B, 1> = Tensor::from_data(
        TensorData::new(target_prototype.as_slice().to_vec(), [target_prototype.dim()]),
        device,
    );

    let mut grad_sum: Tensor<B, 3> = Tensor::zeros([1, t, c], device);

    for step in 1..=steps {
        let alpha = step as f32 / steps as f32;
        let interpolated = input.clone().mul_scalar(alpha).require_grad();

        let embedding = encoder.forward(interpolated.clone()); // [1, embedding_dim]
        let norm = embedding.clone().powf_scalar(2.0).sum_dim(1).sqrt();
        let unit_embedding = embedding / norm.expand([1, target_prototype.dim()]);

        let target_2d: Tensor<B, 2> = target.clone().unsqueeze_dim(0);
        let cosine = (unit_embedding * target_2d).sum_dim(1); // [1, 1]
        let loss: Tensor<B, 1> = cosine.sum();

        let grads = loss.backward();
        if let Some(grad) = interpolated.grad(&grads) {
            grad_sum = grad_sum + Tensor::<B, 3>::from_inner(grad);
        }
    }

    let avg_grad = grad_sum.div_scalar(steps as f32);
    let importance_tensor = avg_grad * input; // (input - baseline) with baseline = 0

    let data: Vec<f32> = importance_tensor.into_data().to_vec().unwrap();
    // data is [1, t, c] row-major -> rebuild to (c, t)
    let mut out = Array2::<f32>::zeros((c, t));
    for ti in 0..t {
        for ci in 0..c {
            out[[ci, ti]] = data[ti * c + ci];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SequenceEncoderConfig;
    use burn::backend::{Autodiff, NdArray};
    use ndarray::Array2 as NdArray2;

    type TestBackend = Autodiff<NdArray>;

    #[test]
    fn integrated_gradients_produces_correct_shape() {
        let device = Default::default();
        let config = SequenceEncoderConfig::new(4).with_hidden_width(8).with_num_layers(1).with_embedding_dim(6);
        let encoder = config.init::<TestBackend>(&device);

        let window = Window {
            data: NdArray2::<f32>::from_shape_fn((4, 5), |(c, t)| (c + t) as f32 * 0.1),
        };
        let target = Embedding::from_raw(vec![1.0; 6]).unwrap();

        let importance = integrated_gradients(&encoder, &[window], &target, 5, &device);
        assert_eq!(importance.dim(), (4, 5));
        assert!(importance.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn zero_input_yields_zero_importance() {
        let device = Default::default();
        let config = SequenceEncoderConfig::new(3).with_hidden_width(4).with_num_layers(1).with_embedding_dim(4);
        let encoder = config.init::<TestBackend>(&device);

        let window = Window {
            data: NdArray2::<f32>::zeros((3, 4)),
        };
        let target = Embedding::from_raw(vec![1.0; 4]).unwrap();
        let importance = integrated_gradients(&encoder, &[window], &target, 5, &device);
        assert!(importance.iter().all(|&v| v == 0.0));
    }
}
