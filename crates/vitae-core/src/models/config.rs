//! Runtime configuration for the extraction pipeline.
//!
//! Rule tables (section aliases, chains, thresholds, routing) live in
//! [`crate::rules::RuleSet`]; this file holds the knobs that are not rules.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Main configuration for the vitae pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VitaeConfig {
    pub loader: LoaderConfig,
    pub preprocess: PreprocessConfig,
    pub ocr: OcrConfig,
    pub segmenter: SegmenterConfig,
    pub extraction: ExtractionConfig,
    pub pipeline: PipelineConfig,
    pub models: ModelConfig,
}

/// Document loading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Maximum pages to read (0 = unlimited).
    pub max_pages: usize,

    /// Collect embedded page images so OCR can run on scanned PDFs.
    pub extract_images: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_pages: 0,
            extract_images: true,
        }
    }
}

/// Text cleaning and language detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessConfig {
    /// Language assumed when detection is inconclusive.
    pub default_language: String,

    /// Minimum detection confidence to trust the detected language.
    pub language_confidence_threshold: f32,

    /// Below this many characters of text, OCR is attempted.
    pub min_text_chars: usize,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            default_language: "fr".to_string(),
            language_confidence_threshold: 0.3,
            min_text_chars: 40,
        }
    }
}

/// OCR fallback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub enabled: bool,

    /// Time budget per page image.
    pub timeout_secs: u64,

    /// Drop recognized lines below this confidence.
    pub min_line_confidence: f32,

    /// Keep `[UNK]` tokens in recognized text.
    pub keep_unknown_tokens: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout_secs: 30,
            min_line_confidence: 0.0,
            keep_unknown_tokens: false,
        }
    }
}

/// Heading detection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Lines at least this long are never headings.
    pub max_heading_chars: usize,

    /// Minimum folded similarity for a fuzzy alias match.
    pub fuzzy_threshold: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            max_heading_chars: 100,
            fuzzy_threshold: 0.85,
        }
    }
}

/// Field extraction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Run NER and zero-shot steps of the chains.
    pub enable_ml: bool,

    /// Factor applied to a candidate demoted by an overlapping one.
    pub overlap_penalty: f32,

    /// Budget for all ML steps of one document.
    pub inference_timeout_secs: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            enable_ml: true,
            overlap_penalty: 0.5,
            inference_timeout_secs: 30,
        }
    }
}

/// Whole-run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Budget for one document across slow stages (0 = unlimited).
    pub document_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            document_timeout_secs: 120,
        }
    }
}

/// Model file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Directory containing model files.
    pub model_dir: PathBuf,

    /// Directory of rule files overriding the built-in ones.
    pub rules_dir: Option<PathBuf>,

    /// Text detection model file name.
    pub ocr_detection_model: String,

    /// Text recognition model file name.
    pub ocr_recognition_model: String,

    /// Character dictionary file name.
    pub ocr_dictionary: String,

    /// Threads per inference session.
    pub intra_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            rules_dir: None,
            ocr_detection_model: "det.onnx".to_string(),
            ocr_recognition_model: "latin_rec.onnx".to_string(),
            ocr_dictionary: "latin_dict.txt".to_string(),
            intra_threads: 2,
        }
    }
}

impl VitaeConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            name: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string()))?;
        std::fs::write(path, content)
    }

    /// Get full path to a model file or directory.
    pub fn model_path(&self, name: impl AsRef<Path>) -> PathBuf {
        self.models.model_dir.join(name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let penalty = self.extraction.overlap_penalty;
        if !(0.0..=1.0).contains(&penalty) {
            return Err(ConfigError::Invalid(format!(
                "extraction.overlap_penalty must be within [0, 1], got {}",
                penalty
            )));
        }
        if !(0.0..=1.0).contains(&self.segmenter.fuzzy_threshold) {
            return Err(ConfigError::Invalid(format!(
                "segmenter.fuzzy_threshold must be within [0, 1], got {}",
                self.segmenter.fuzzy_threshold
            )));
        }
        if self.preprocess.default_language.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "preprocess.default_language must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = VitaeConfig::default();
        assert_eq!(config.preprocess.default_language, "fr");
        assert_eq!(config.extraction.overlap_penalty, 0.5);
        assert_eq!(config.segmenter.fuzzy_threshold, 0.85);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"ocr": {"timeout_secs": 5}}"#).unwrap();

        let config = VitaeConfig::from_file(&path).unwrap();
        assert_eq!(config.ocr.timeout_secs, 5);
        assert!(config.ocr.enabled);
        assert_eq!(config.models.intra_threads, 2);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let mut config = VitaeConfig::default();
        config.preprocess.default_language = "en".to_string();
        config.save(&path).unwrap();

        let loaded = VitaeConfig::from_file(&path).unwrap();
        assert_eq!(loaded.preprocess.default_language, "en");
    }

    #[test]
    fn test_invalid_penalty_rejected() {
        let mut config = VitaeConfig::default();
        config.extraction.overlap_penalty = 1.5;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
