//! Core library for résumé extraction.
//!
//! This crate provides:
//! - Document loading (PDF, DOCX, ODT, images) with OCR fallback
//! - Section segmentation driven by a multilingual heading lexicon
//! - Field extraction through rule, NER and zero-shot extractor chains
//! - Confidence filtering, normalization and profile mapping
//! - Conflict resolution when a new résumé updates an existing profile

pub mod error;
pub mod models;
pub mod rules;
pub mod text;
pub mod dates;
pub mod redact;
pub mod loader;
pub mod preprocess;
pub mod segment;
pub mod extract;
pub mod filter;
pub mod normalize;
pub mod mapper;
pub mod merge;
pub mod pipeline;

pub use error::{PipelineWarning, Result, Stage, VitaeError};
pub use models::{
    Document, DocumentFormat, ExtractionResult, FieldCandidate, FieldName, ProfileSnapshot,
    Section, SectionKind, VitaeConfig,
};
pub use rules::RuleSet;
pub use loader::{LoadedDocument, Loader};
pub use preprocess::{OcrEngine, Preprocessor};
pub use segment::Segmenter;
pub use extract::{FieldExtractor, ModelRegistry};
pub use filter::{ConfidenceFilter, FilterOutcome};
pub use normalize::Normalizer;
pub use mapper::{ExtractionMapper, MappingOutcome};
pub use merge::{ConflictResolver, MergeOutcome};
pub use pipeline::{CancellationToken, Pipeline, PipelineBuilder};

#[cfg(feature = "native")]
pub use preprocess::PureOcrEngine;

/// Re-export inference types.
pub use vitae_inference::{InferenceBackend, InputTensor, OutputTensor};

#[cfg(feature = "native")]
pub use vitae_inference::OrtBackend;
