//! Error and warning types for the vitae-core library.
//!
//! Fatal errors abort a document's run and surface as [`VitaeError`].
//! Non-fatal problems are collected as [`PipelineWarning`]s inside the
//! extraction result.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::section::SectionKind;

/// Pipeline stage names, used for error context and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    Preprocess,
    Ocr,
    Segment,
    Extract,
    Filter,
    Normalize,
    Map,
    Merge,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Preprocess => "preprocess",
            Stage::Ocr => "ocr",
            Stage::Segment => "segment",
            Stage::Extract => "extract",
            Stage::Filter => "filter",
            Stage::Normalize => "normalize",
            Stage::Map => "map",
            Stage::Merge => "merge",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Main error type for the vitae library.
#[derive(Error, Debug)]
pub enum VitaeError {
    /// A stage failed fatally for one document.
    #[error("{stage} stage failed for document '{document}': {source}")]
    Stage {
        stage: Stage,
        document: String,
        #[source]
        source: StageError,
    },

    /// A routed model could not be loaded at construction time.
    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] ModelUnavailableError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VitaeError {
    pub(crate) fn stage(stage: Stage, document: &str, source: impl Into<StageError>) -> Self {
        VitaeError::Stage {
            stage,
            document: document.to_string(),
            source: source.into(),
        }
    }

    /// Loader reason code, when the document could not be loaded at all.
    pub fn loader_reason(&self) -> Option<LoaderErrorReason> {
        match self {
            VitaeError::Stage {
                source: StageError::Loader(err),
                ..
            } => Some(err.reason),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            VitaeError::Stage {
                source: StageError::Cancelled,
                ..
            }
        )
    }
}

/// Cause of a fatal stage failure.
#[derive(Error, Debug)]
pub enum StageError {
    #[error(transparent)]
    Loader(#[from] LoaderError),

    #[error(transparent)]
    Timeout(#[from] StageTimeoutError),

    #[error("run cancelled")]
    Cancelled,
}

/// Why a document could not be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoaderErrorReason {
    UnsupportedFormat,
    CorruptContent,
    EmptyDocument,
}

impl fmt::Display for LoaderErrorReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LoaderErrorReason::UnsupportedFormat => "unsupported_format",
            LoaderErrorReason::CorruptContent => "corrupt_content",
            LoaderErrorReason::EmptyDocument => "empty_document",
        })
    }
}

/// Fatal loader failure: no usable text can be produced.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{reason}: {detail}")]
pub struct LoaderError {
    pub reason: LoaderErrorReason,
    pub detail: String,
}

impl LoaderError {
    pub fn unsupported(detail: impl Into<String>) -> Self {
        Self {
            reason: LoaderErrorReason::UnsupportedFormat,
            detail: detail.into(),
        }
    }

    pub fn corrupt(detail: impl Into<String>) -> Self {
        Self {
            reason: LoaderErrorReason::CorruptContent,
            detail: detail.into(),
        }
    }

    pub fn empty(detail: impl Into<String>) -> Self {
        Self {
            reason: LoaderErrorReason::EmptyDocument,
            detail: detail.into(),
        }
    }
}

/// Degraded OCR or language detection.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum PreprocessingWarning {
    #[error("OCR failed on page {page}: {message}")]
    OcrFailed { page: u32, message: String },

    #[error("OCR on page {page} exceeded {budget_ms}ms")]
    OcrTimeout { page: u32, budget_ms: u64 },

    #[error("document has no usable text layer and OCR is not available")]
    OcrUnavailable,

    #[error("language detection fell back to '{fallback}' (confidence {confidence:.2})")]
    LanguageFallback {
        detected: Option<String>,
        confidence: f32,
        fallback: String,
    },
}

/// One extractor in a chain failed or was skipped.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExtractionWarning {
    #[error("extractor '{extractor}' failed in {section} section: {message}")]
    ExtractorFailed {
        section: SectionKind,
        extractor: String,
        message: String,
    },

    #[error("no {task} model routed for language '{language}', using '{model}'")]
    ModelRouting {
        task: String,
        language: String,
        model: String,
    },

    #[error("extractor '{extractor}' skipped in {section} section: inference deadline reached")]
    InferenceSkipped { section: SectionKind, extractor: String },
}

/// A mapped entry rejected by the schema guard.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("schema guard rejected {path}: {reason}")]
pub struct SchemaValidationError {
    pub path: String,
    pub reason: String,
}

/// A slow stage exceeded its time budget.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{stage} stage exceeded its {budget_ms}ms budget")]
pub struct StageTimeoutError {
    pub stage: Stage,
    pub budget_ms: u64,
}

/// A required model could not be loaded and no fallback is configured.
#[derive(Error, Debug, Clone)]
#[error("model '{model}' could not be loaded from {}: {reason}", path.display())]
pub struct ModelUnavailableError {
    pub model: String,
    pub path: PathBuf,
    pub reason: String,
}

/// Errors reading rule files or settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {name}: {source}")]
    Parse {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors raised by a single extractor; converted into [`ExtractionWarning`]s.
#[derive(Error, Debug)]
pub enum ExtractorError {
    #[error("inference error: {0}")]
    Inference(#[from] vitae_inference::InferenceError),

    #[error("model output has unexpected shape {0:?}")]
    OutputShape(Vec<usize>),

    #[error("{0}")]
    Other(String),
}

/// OCR failures; always non-fatal at pipeline level.
#[derive(Error, Debug)]
pub enum OcrError {
    #[error("failed to load OCR model: {0}")]
    ModelLoad(String),

    #[error("text recognition failed: {0}")]
    Recognition(String),

    #[error("OCR worker stopped: {0}")]
    Worker(String),
}

/// Non-fatal problem recorded in an extraction result.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    #[error("loader: {message}")]
    Loader { message: String },

    #[error(transparent)]
    Preprocessing(PreprocessingWarning),

    #[error(transparent)]
    Extraction(ExtractionWarning),

    #[error(transparent)]
    SchemaValidation(SchemaValidationError),

    #[error(transparent)]
    StageTimeout(StageTimeoutError),
}

impl From<PreprocessingWarning> for PipelineWarning {
    fn from(w: PreprocessingWarning) -> Self {
        PipelineWarning::Preprocessing(w)
    }
}

impl From<ExtractionWarning> for PipelineWarning {
    fn from(w: ExtractionWarning) -> Self {
        PipelineWarning::Extraction(w)
    }
}

impl From<SchemaValidationError> for PipelineWarning {
    fn from(w: SchemaValidationError) -> Self {
        PipelineWarning::SchemaValidation(w)
    }
}

impl From<StageTimeoutError> for PipelineWarning {
    fn from(w: StageTimeoutError) -> Self {
        PipelineWarning::StageTimeout(w)
    }
}

/// Result type for the vitae library.
pub type Result<T> = std::result::Result<T, VitaeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_reason_codes() {
        assert_eq!(LoaderErrorReason::EmptyDocument.to_string(), "empty_document");
        let err = LoaderError::unsupported("text/plain");
        assert_eq!(err.to_string(), "unsupported_format: text/plain");
    }

    #[test]
    fn test_stage_error_carries_context() {
        let err = VitaeError::stage(Stage::Load, "cv.pdf", LoaderError::empty("0 bytes"));
        assert_eq!(
            err.to_string(),
            "load stage failed for document 'cv.pdf': empty_document: 0 bytes"
        );
        assert_eq!(err.loader_reason(), Some(LoaderErrorReason::EmptyDocument));
        assert!(!err.is_cancelled());
    }

    #[test]
    fn test_warning_serializes_with_kind_tag() {
        let warning = PipelineWarning::from(PreprocessingWarning::OcrUnavailable);
        let json = serde_json::to_value(&warning).unwrap();
        assert_eq!(json["kind"], "preprocessing");
        assert_eq!(json["reason"], "ocr_unavailable");
    }
}
