//! Transformer text models: ONNX session + tokenizer + label metadata.
//!
//! A model directory holds `model.onnx`, `tokenizer.json` and optionally a
//! Hugging Face style `config.json` carrying `id2label`.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::InferenceError;
use crate::Result;

/// Token-level encoding of one input, ready to feed a model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Encoding {
    pub ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub type_ids: Vec<i64>,
    /// Byte offsets of each token in the first input sequence.
    pub offsets: Vec<(usize, usize)>,
    /// `true` for special tokens such as `[CLS]` / `[SEP]`.
    pub special: Vec<bool>,
}

impl Encoding {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Cut the encoding to at most `max_len` tokens.
    pub fn truncate(&mut self, max_len: usize) {
        if self.ids.len() > max_len {
            self.ids.truncate(max_len);
            self.attention_mask.truncate(max_len);
            self.type_ids.truncate(max_len);
            self.offsets.truncate(max_len);
            self.special.truncate(max_len);
        }
    }
}

/// Label metadata read from `config.json`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelMetadata {
    /// Labels indexed by output position.
    pub labels: Vec<String>,
}

impl ModelMetadata {
    /// Parse the `id2label` table of a Hugging Face `config.json`.
    pub fn from_config_json(content: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(content).map_err(|e| InferenceError::Metadata(e.to_string()))?;

        let Some(table) = value.get("id2label").and_then(|v| v.as_object()) else {
            return Ok(Self::default());
        };

        let mut ordered = BTreeMap::new();
        for (key, label) in table {
            let index: usize = key
                .parse()
                .map_err(|_| InferenceError::Metadata(format!("non-numeric label id '{}'", key)))?;
            let label = label
                .as_str()
                .ok_or_else(|| InferenceError::Metadata(format!("label {} is not a string", key)))?;
            ordered.insert(index, label.to_string());
        }

        Ok(Self {
            labels: ordered.into_values().collect(),
        })
    }

    /// Index of a label, compared case-insensitively.
    pub fn index_of(&self, label: &str) -> Option<usize> {
        self.labels.iter().position(|l| l.eq_ignore_ascii_case(label))
    }

    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join("config.json");
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        Self::from_config_json(&content)
    }
}

#[cfg(feature = "native")]
pub use native::TextModel;

#[cfg(feature = "native")]
mod native {
    use std::path::Path;

    use ndarray::ArrayD;
    use tracing::{debug, info};

    use super::{Encoding, ModelMetadata};
    use crate::backend::ort::OrtBackend;
    use crate::error::InferenceError;
    use crate::tensor::InputTensor;
    use crate::{InferenceBackend, Result};

    /// A sequence model (token classification or NLI) with its tokenizer.
    pub struct TextModel {
        backend: Box<dyn InferenceBackend>,
        tokenizer: tokenizers::Tokenizer,
        metadata: ModelMetadata,
        max_length: usize,
    }

    impl TextModel {
        /// Load `model.onnx`, `tokenizer.json` and `config.json` from a directory.
        pub fn load(dir: &Path, max_length: usize, intra_threads: usize) -> Result<Self> {
            let model_path = dir.join("model.onnx");
            let tokenizer_path = dir.join("tokenizer.json");

            if !tokenizer_path.exists() {
                return Err(InferenceError::MissingFile(tokenizer_path));
            }

            let backend = OrtBackend::from_file(&model_path, intra_threads)?;
            let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
            let metadata = ModelMetadata::load(dir)?;

            info!(
                "Loaded text model from {} ({} labels)",
                dir.display(),
                metadata.labels.len()
            );

            Ok(Self {
                backend: Box::new(backend),
                tokenizer,
                metadata,
                max_length,
            })
        }

        pub fn metadata(&self) -> &ModelMetadata {
            &self.metadata
        }

        /// Encode a single sequence.
        pub fn encode(&self, text: &str) -> Result<Encoding> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
            Ok(self.convert(&encoding))
        }

        /// Encode a premise/hypothesis pair.
        pub fn encode_pair(&self, first: &str, second: &str) -> Result<Encoding> {
            let encoding = self
                .tokenizer
                .encode((first, second), true)
                .map_err(|e| InferenceError::Tokenizer(e.to_string()))?;
            Ok(self.convert(&encoding))
        }

        fn convert(&self, encoding: &tokenizers::Encoding) -> Encoding {
            let mut converted = Encoding {
                ids: encoding.get_ids().iter().map(|&id| id as i64).collect(),
                attention_mask: encoding
                    .get_attention_mask()
                    .iter()
                    .map(|&m| m as i64)
                    .collect(),
                type_ids: encoding.get_type_ids().iter().map(|&t| t as i64).collect(),
                offsets: encoding.get_offsets().to_vec(),
                special: encoding
                    .get_special_tokens_mask()
                    .iter()
                    .map(|&s| s == 1)
                    .collect(),
            };
            converted.truncate(self.max_length);
            converted
        }

        /// Run the model and return the first float output (the logits).
        pub fn logits(&self, encoding: &Encoding) -> Result<ArrayD<f32>> {
            if encoding.is_empty() {
                return Err(InferenceError::InvalidInput("empty encoding".to_string()));
            }

            let mut inputs = vec![
                ("input_ids", InputTensor::batch_of_one(&encoding.ids)?),
                (
                    "attention_mask",
                    InputTensor::batch_of_one(&encoding.attention_mask)?,
                ),
            ];
            if self.backend.accepts("token_type_ids") {
                inputs.push((
                    "token_type_ids",
                    InputTensor::batch_of_one(&encoding.type_ids)?,
                ));
            }

            let outputs = self.backend.run(&inputs)?;
            debug!("Model produced {} outputs", outputs.len());

            outputs
                .into_iter()
                .find_map(|(_, tensor)| tensor.as_f32().cloned())
                .ok_or_else(|| InferenceError::OutputExtraction("no float output".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_metadata_orders_labels_by_id() {
        let json = r#"{"id2label": {"2": "B-ORG", "0": "O", "1": "B-PER", "10": "I-LOC"}}"#;
        let meta = ModelMetadata::from_config_json(json).unwrap();
        assert_eq!(meta.labels, vec!["O", "B-PER", "B-ORG", "I-LOC"]);
        assert_eq!(meta.index_of("b-org"), Some(2));
    }

    #[test]
    fn test_metadata_without_labels() {
        let meta = ModelMetadata::from_config_json(r#"{"model_type": "bert"}"#).unwrap();
        assert!(meta.labels.is_empty());
    }

    #[test]
    fn test_metadata_rejects_bad_ids() {
        let err = ModelMetadata::from_config_json(r#"{"id2label": {"x": "O"}}"#);
        assert!(matches!(err, Err(InferenceError::Metadata(_))));
    }

    #[test]
    fn test_encoding_truncate() {
        let mut enc = Encoding {
            ids: vec![1, 2, 3, 4],
            attention_mask: vec![1; 4],
            type_ids: vec![0; 4],
            offsets: vec![(0, 0); 4],
            special: vec![false; 4],
        };
        enc.truncate(2);
        assert_eq!(enc.len(), 2);
        assert_eq!(enc.offsets.len(), 2);
    }
}
