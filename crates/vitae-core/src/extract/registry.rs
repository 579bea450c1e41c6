//! Model loading and per-language routing.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::warn;

use super::ner::NerModel;
use super::zero_shot::ZeroShotModel;
use crate::error::{ExtractionWarning, ModelUnavailableError};
use crate::models::config::ModelConfig;
use crate::rules::{Fallback, ModelSpec, TaskRouting};

#[cfg(feature = "native")]
use tracing::info;
#[cfg(feature = "native")]
use vitae_inference::TextModel;

/// Loads text models once and shares them between pipelines.
///
/// Failed loads are cached too, so a missing model is reported once.
pub struct ModelRegistry {
    model_dir: PathBuf,
    #[cfg_attr(not(feature = "native"), allow(dead_code))]
    intra_threads: usize,
    #[cfg(feature = "native")]
    cache: Mutex<HashMap<String, Result<Arc<TextModel>, String>>>,
    #[cfg(not(feature = "native"))]
    cache: Mutex<HashMap<String, String>>,
}

impl ModelRegistry {
    pub fn new(model_dir: impl Into<PathBuf>, intra_threads: usize) -> Self {
        Self {
            model_dir: model_dir.into(),
            intra_threads: intra_threads.max(1),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::new(&config.model_dir, config.intra_threads)
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Directory of a model.
    pub fn resolve(&self, spec: &ModelSpec) -> PathBuf {
        self.model_dir.join(&spec.path)
    }

    /// Whether the model files are present on disk.
    pub fn is_available(&self, spec: &ModelSpec) -> bool {
        let dir = self.resolve(spec);
        dir.join("model.onnx").is_file() && dir.join("tokenizer.json").is_file()
    }

    fn unavailable(&self, id: &str, spec: &ModelSpec, reason: impl Into<String>) -> ModelUnavailableError {
        ModelUnavailableError {
            model: id.to_string(),
            path: self.resolve(spec),
            reason: reason.into(),
        }
    }

    /// Load (or fetch from cache) the model `id`.
    #[cfg(feature = "native")]
    pub fn load(&self, id: &str, spec: &ModelSpec) -> Result<Arc<TextModel>, ModelUnavailableError> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| self.unavailable(id, spec, "model cache lock poisoned"))?;

        let entry = cache.entry(id.to_string()).or_insert_with(|| {
            let dir = self.resolve(spec);
            info!("Loading model '{}' from {}", id, dir.display());
            TextModel::load(&dir, spec.max_length, self.intra_threads)
                .map(Arc::new)
                .map_err(|e| e.to_string())
        });

        entry.clone().map_err(|reason| self.unavailable(id, spec, reason))
    }

    #[cfg(not(feature = "native"))]
    fn load_failure(&self, id: &str, spec: &ModelSpec) -> ModelUnavailableError {
        let reason = "built without native inference support";
        if let Ok(mut cache) = self.cache.lock() {
            cache.entry(id.to_string()).or_insert_with(|| reason.to_string());
        }
        self.unavailable(id, spec, reason)
    }

    pub(crate) fn load_ner(&self, id: &str, spec: &ModelSpec) -> Result<NerModel, ModelUnavailableError> {
        #[cfg(feature = "native")]
        {
            let model = self.load(id, spec)?;
            Ok(NerModel::Onnx(super::ner::native::OnnxNer::new(model, spec.labels.clone())))
        }
        #[cfg(not(feature = "native"))]
        {
            Err(self.load_failure(id, spec))
        }
    }

    pub(crate) fn load_zero_shot(
        &self,
        id: &str,
        spec: &ModelSpec,
    ) -> Result<ZeroShotModel, ModelUnavailableError> {
        #[cfg(feature = "native")]
        {
            let model = self.load(id, spec)?;
            Ok(ZeroShotModel::Onnx(super::zero_shot::native::OnnxZeroShot::new(
                model,
                &spec.labels,
            )))
        }
        #[cfg(not(feature = "native"))]
        {
            Err(self.load_failure(id, spec))
        }
    }
}

/// Implemented by routed models so routes can report heuristic fallbacks.
pub trait RoutedModel {
    fn is_heuristic(&self) -> bool;
}

impl RoutedModel for NerModel {
    fn is_heuristic(&self) -> bool {
        NerModel::is_heuristic(self)
    }
}

impl RoutedModel for ZeroShotModel {
    fn is_heuristic(&self) -> bool {
        ZeroShotModel::is_heuristic(self)
    }
}

/// The model chosen for one section.
pub struct Selected<'a, M> {
    pub model_id: &'a str,
    pub model: &'a M,
    /// Set when the language had no route of its own.
    pub warning: Option<ExtractionWarning>,
}

/// Loaded models of one task, routed by language.
pub struct ModelRoutes<M> {
    task: &'static str,
    routing: TaskRouting,
    models: BTreeMap<String, Arc<M>>,
    heuristic: Arc<M>,
}

impl<M: RoutedModel> ModelRoutes<M> {
    /// Load every model the routing table names.
    ///
    /// A model that fails to load is replaced by `heuristic` when the task
    /// falls back to heuristics, and fails construction otherwise.
    pub fn build<F>(
        task: &'static str,
        routing: &TaskRouting,
        specs: &BTreeMap<String, ModelSpec>,
        heuristic: M,
        mut load: F,
    ) -> Result<Self, ModelUnavailableError>
    where
        F: FnMut(&str, &ModelSpec) -> Result<M, ModelUnavailableError>,
    {
        let heuristic = Arc::new(heuristic);
        let mut models = BTreeMap::new();

        for id in routing.model_ids() {
            let loaded = match specs.get(id) {
                Some(spec) => load(id, spec),
                None => Err(ModelUnavailableError {
                    model: id.to_string(),
                    path: PathBuf::new(),
                    reason: "no model entry in the routing table".to_string(),
                }),
            };
            match (loaded, routing.fallback) {
                (Ok(model), _) => {
                    models.insert(id.to_string(), Arc::new(model));
                }
                (Err(e), Fallback::Heuristic) => {
                    warn!("{} model unavailable, using heuristics: {}", task, e);
                    models.insert(id.to_string(), heuristic.clone());
                }
                (Err(e), Fallback::None) => return Err(e),
            }
        }

        Ok(Self {
            task,
            routing: routing.clone(),
            models,
            heuristic,
        })
    }

    /// Routes with no models: every language uses `heuristic`.
    pub fn heuristic_only(task: &'static str, heuristic: M) -> Self {
        Self {
            task,
            routing: TaskRouting::default(),
            models: BTreeMap::new(),
            heuristic: Arc::new(heuristic),
        }
    }

    pub fn select(&self, language: &str) -> Selected<'_, M> {
        let routed = self
            .routing
            .route(language)
            .and_then(|(id, from_default)| self.models.get_key_value(id).map(|(k, m)| (k, m, from_default)));

        match routed {
            Some((id, model, from_default)) => Selected {
                model_id: id.as_str(),
                model: model.as_ref(),
                warning: from_default.then(|| ExtractionWarning::ModelRouting {
                    task: self.task.to_string(),
                    language: language.to_string(),
                    model: id.clone(),
                }),
            },
            None => Selected {
                model_id: "heuristic",
                model: self.heuristic.as_ref(),
                warning: (!self.models.is_empty()).then(|| ExtractionWarning::ModelRouting {
                    task: self.task.to_string(),
                    language: language.to_string(),
                    model: "heuristic".to_string(),
                }),
            },
        }
    }

    /// (loaded models, models replaced by heuristics)
    pub fn counts(&self) -> (usize, usize) {
        let heuristic = self.models.values().filter(|m| m.is_heuristic()).count();
        (self.models.len() - heuristic, heuristic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::RoutingTable;

    fn routing() -> RoutingTable {
        serde_json::from_str(
            r#"{
                "ner": {"languages": {"fr": "ner-fr"}, "default": "ner-multi", "fallback": "heuristic"},
                "zero_shot": {"default": "nli", "fallback": "none"},
                "models": {
                    "ner-fr": {"path": "ner/fr"},
                    "ner-multi": {"path": "ner/multi"},
                    "nli": {"path": "nli"}
                }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_missing_models_fall_back_to_heuristics() {
        let table = routing();
        let registry = ModelRegistry::new("/nonexistent/models", 1);
        let routes = ModelRoutes::build("ner", &table.ner, &table.models, NerModel::Heuristic, |id, spec| {
            registry.load_ner(id, spec)
        })
        .unwrap();

        assert_eq!(routes.counts(), (0, 2));
        let fr = routes.select("fr");
        assert_eq!(fr.model_id, "ner-fr");
        assert!(fr.model.is_heuristic());
        assert!(fr.warning.is_none());

        let de = routes.select("de");
        assert_eq!(de.model_id, "ner-multi");
        assert_eq!(
            de.warning,
            Some(ExtractionWarning::ModelRouting {
                task: "ner".into(),
                language: "de".into(),
                model: "ner-multi".into(),
            })
        );
    }

    #[test]
    fn test_missing_model_without_fallback_fails() {
        let table = routing();
        let registry = ModelRegistry::new("/nonexistent/models", 1);
        let err = ModelRoutes::build(
            "zero_shot",
            &table.zero_shot,
            &table.models,
            ZeroShotModel::Keyword,
            |id, spec| registry.load_zero_shot(id, spec),
        )
        .err()
        .unwrap();
        assert_eq!(err.model, "nli");
        assert_eq!(err.path, PathBuf::from("/nonexistent/models/nli"));
    }

    #[test]
    fn test_heuristic_only_routes() {
        let routes = ModelRoutes::heuristic_only("ner", NerModel::Heuristic);
        let selected = routes.select("fr");
        assert_eq!(selected.model_id, "heuristic");
        assert!(selected.warning.is_none());
        assert_eq!(routes.counts(), (0, 0));
    }

    #[test]
    fn test_availability_check() {
        let dir = tempfile::TempDir::new().unwrap();
        let registry = ModelRegistry::new(dir.path(), 1);
        let spec: ModelSpec = serde_json::from_str(r#"{"path": "ner"}"#).unwrap();
        assert!(!registry.is_available(&spec));

        std::fs::create_dir_all(dir.path().join("ner")).unwrap();
        std::fs::write(dir.path().join("ner/model.onnx"), b"x").unwrap();
        std::fs::write(dir.path().join("ner/tokenizer.json"), b"{}").unwrap();
        assert!(registry.is_available(&spec));
    }
}
