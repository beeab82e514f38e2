//! CLI subcommands. The binary pins a single concrete backend
//! (`burn::backend::Autodiff<burn::backend::NdArray>`) since this is a
//! CPU-only verification service; a GPU backend would only matter for
//! the training subcommand and is not required by the spec.

pub mod bench;
pub mod enroll;
pub mod inspect;
pub mod train;
pub mod verify;

use burn::backend::{Autodiff, NdArray};

pub type Backend = Autodiff<NdArray>;

pub fn device() -> <NdArray as burn::tensor::backend::Backend>::Device {
    Default::default()
}
