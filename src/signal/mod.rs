//! Signal pipeline (spec §4.A-§4.B): loading raw recordings,
//! filtering/resampling/standardizing them, slicing windows, and
//! augmenting windows for training.

pub mod augment;
pub mod filters;
pub mod format;
pub mod ica;
pub mod loader;
pub mod preprocess;
pub mod window;

pub use augment::Augmenter;
pub use preprocess::Preprocessor;
