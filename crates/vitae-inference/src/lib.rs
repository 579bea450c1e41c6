//! ONNX inference layer for vitae.
//!
//! This crate hides the ONNX runtime behind [`InferenceBackend`] and exposes
//! [`TextModel`], a transformer model bundled with its tokenizer and label
//! metadata. Named-entity taggers and zero-shot classifiers in `vitae-core`
//! are built on top of it.

mod backend;
mod error;
mod tensor;
mod text;

pub use backend::InferenceBackend;
pub use error::InferenceError;
pub use tensor::{softmax, InputTensor, OutputTensor};
pub use text::{Encoding, ModelMetadata};

#[cfg(feature = "native")]
pub use backend::ort::OrtBackend;

#[cfg(feature = "native")]
pub use text::TextModel;

/// Result type for inference operations.
pub type Result<T> = std::result::Result<T, InferenceError>;
