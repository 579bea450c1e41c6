//! Error types for the inference layer.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading or running a text model.
#[derive(Error, Debug)]
pub enum InferenceError {
    /// A required model file is missing.
    #[error("model file not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// Failed to load the ONNX model.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Failed to create an inference session.
    #[error("failed to create session: {0}")]
    SessionCreate(String),

    /// Failed to load or run the tokenizer.
    #[error("tokenizer error: {0}")]
    Tokenizer(String),

    /// Invalid input tensor shape or type.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Inference execution failed.
    #[error("inference failed: {0}")]
    InferenceFailed(String),

    /// Output tensor extraction failed.
    #[error("failed to extract output: {0}")]
    OutputExtraction(String),

    /// Malformed model metadata (config.json).
    #[error("invalid model metadata: {0}")]
    Metadata(String),

    /// I/O error when loading model files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
