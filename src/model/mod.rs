//! Neural network modules (spec §4.C, §4.F): the sequence encoder,
//! its warmup-only classification head, and the embedding autoencoder
//! used for spoof/anomaly scoring.

pub mod autoencoder;
pub mod classifier_head;
pub mod encoder;

pub use autoencoder::{EmbeddingAutoencoder, EmbeddingAutoencoderConfig};
pub use classifier_head::{ClassifierHead, ClassifierHeadConfig};
pub use encoder::{SequenceEncoder, SequenceEncoderConfig};
