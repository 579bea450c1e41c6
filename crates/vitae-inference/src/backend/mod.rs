//! Inference backend implementations.

#[cfg(feature = "native")]
pub mod ort;

use crate::{InputTensor, OutputTensor, Result};

/// Trait for ONNX inference backends.
///
/// Backends must be shareable between pipeline runs on different threads;
/// implementations serialize access to their session internally.
pub trait InferenceBackend: Send + Sync {
    /// Run inference with the given named inputs.
    fn run(&self, inputs: &[(&str, InputTensor)]) -> Result<Vec<(String, OutputTensor)>>;

    /// Input names expected by the model.
    fn input_names(&self) -> &[String];

    /// Output names produced by the model.
    fn output_names(&self) -> &[String];

    /// Whether the model declares an input with this name.
    fn accepts(&self, name: &str) -> bool {
        self.input_names().iter().any(|n| n == name)
    }
}
