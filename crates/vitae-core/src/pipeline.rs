//! End-to-end extraction pipeline.
//!
//! A [`Pipeline`] is built once and shared across documents. Each call to
//! [`Pipeline::extract`] runs load, preprocess, segment, extract, filter and
//! normalize in order; [`Pipeline::map`] and [`Pipeline::merge`] turn the
//! result into a profile and reconcile it with an existing one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::{PipelineWarning, Stage, StageError, StageTimeoutError, VitaeError};
use crate::extract::{FieldExtractor, ModelRegistry, SectionInput};
use crate::filter::ConfidenceFilter;
use crate::loader::Loader;
use crate::mapper::{ExtractionMapper, MappingOutcome};
use crate::merge::{ConflictResolver, MergeOutcome};
use crate::models::{
    ConfidenceStats, Document, ExtractionMetadata, ExtractionMetrics, ExtractionResult,
    ProfileSnapshot, VitaeConfig,
};
use crate::normalize::{dedup, Normalizer};
use crate::preprocess::{OcrEngine, Preprocessor};
use crate::rules::RuleSet;
use crate::segment::Segmenter;

/// Cooperative cancellation flag, checked between stages.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Builder for [`Pipeline`].
pub struct PipelineBuilder {
    config: VitaeConfig,
    rules: Option<RuleSet>,
    registry: Option<Arc<ModelRegistry>>,
    ocr: Option<Arc<dyn OcrEngine>>,
}

impl PipelineBuilder {
    pub fn new(config: VitaeConfig) -> Self {
        Self {
            config,
            rules: None,
            registry: None,
            ocr: None,
        }
    }

    /// Use these rule tables instead of the configured or built-in ones.
    pub fn with_rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    pub fn with_registry(mut self, registry: Arc<ModelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Use this OCR engine instead of loading the configured one.
    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    /// Compile rules and load models.
    pub fn build(self) -> Result<Pipeline, VitaeError> {
        let config = self.config;
        config.validate()?;

        let rules = match (self.rules, &config.models.rules_dir) {
            (Some(rules), _) => rules,
            (None, Some(dir)) => RuleSet::load_dir(dir)?,
            (None, None) => RuleSet::builtin()?,
        };
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(ModelRegistry::from_config(&config.models)));

        let extractor = FieldExtractor::new(&rules, &config.extraction, &registry)?;
        let segmenter = Segmenter::new(
            config.segmenter.clone(),
            &rules.sections,
            rules.thresholds.section_label,
        );

        let mut preprocessor = Preprocessor::new(config.preprocess.clone(), config.ocr.clone());
        if let Some(engine) = self.ocr.or_else(|| load_ocr(&config)) {
            preprocessor = preprocessor.with_ocr(engine);
        }

        let pipeline = Pipeline {
            loader: Loader::new(config.loader.clone()),
            preprocessor,
            segmenter,
            extractor,
            filter: ConfidenceFilter::new(rules.thresholds.clone(), rules.precedence.clone()),
            mapper: ExtractionMapper::new(rules.precedence.clone()),
            resolver: ConflictResolver::new(rules.precedence.clone()),
            rules: Arc::new(rules),
            config,
        };
        info!(
            "Pipeline ready ({}, OCR {})",
            pipeline.extractor.ai_mode(),
            if pipeline.preprocessor.has_ocr() { "on" } else { "off" }
        );
        Ok(pipeline)
    }
}

#[cfg(feature = "native")]
fn load_ocr(config: &VitaeConfig) -> Option<Arc<dyn OcrEngine>> {
    use crate::preprocess::PureOcrEngine;

    if !config.ocr.enabled {
        return None;
    }
    match PureOcrEngine::from_config(&config.models, config.ocr.clone()) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            warn!("OCR engine unavailable: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "native"))]
fn load_ocr(config: &VitaeConfig) -> Option<Arc<dyn OcrEngine>> {
    if config.ocr.enabled {
        warn!("OCR requires the native feature");
    }
    None
}

/// Shared, immutable extraction pipeline.
pub struct Pipeline {
    config: VitaeConfig,
    rules: Arc<RuleSet>,
    loader: Loader,
    preprocessor: Preprocessor,
    segmenter: Segmenter,
    extractor: FieldExtractor,
    filter: ConfidenceFilter,
    mapper: ExtractionMapper,
    resolver: ConflictResolver,
}

impl Pipeline {
    /// Pipeline with built-in rules and the given configuration.
    pub fn new(config: VitaeConfig) -> Result<Self, VitaeError> {
        PipelineBuilder::new(config).build()
    }

    pub fn builder(config: VitaeConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    pub fn config(&self) -> &VitaeConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn has_ocr(&self) -> bool {
        self.preprocessor.has_ocr()
    }

    /// Extract sections and field candidates from one document.
    pub fn extract(&self, document: &Document, cancel: &CancellationToken) -> Result<ExtractionResult, VitaeError> {
        let started = Instant::now();
        let id = document.id();
        let deadline = match self.config.pipeline.document_timeout_secs {
            0 => None,
            secs => Some(started + Duration::from_secs(secs)),
        };
        let mut stages = Vec::new();
        let mut warnings: Vec<PipelineWarning> = Vec::new();

        checkpoint(cancel, Stage::Load, id)?;
        let loaded = self
            .loader
            .load(document)
            .map_err(|e| VitaeError::stage(Stage::Load, id, e))?;
        let (format, _) = self
            .loader
            .resolve_format(document)
            .map_err(|e| VitaeError::stage(Stage::Load, id, e))?;
        warnings.extend(
            loaded
                .warnings
                .iter()
                .map(|message| PipelineWarning::Loader {
                    message: message.clone(),
                }),
        );
        stages.push(Stage::Load);

        checkpoint(cancel, Stage::Preprocess, id)?;
        let pre = self
            .preprocessor
            .preprocess(&loaded, document.language(), deadline);
        stages.push(Stage::Preprocess);
        if pre.ocr_used {
            stages.push(Stage::Ocr);
        }
        warnings.extend(pre.warnings.iter().cloned());

        checkpoint(cancel, Stage::Segment, id)?;
        let mut sections = self.segmenter.segment(&pre.text, &pre.blocks, &pre.language.code);
        stages.push(Stage::Segment);

        checkpoint(cancel, Stage::Extract, id)?;
        let inference_budget = Duration::from_secs(self.config.extraction.inference_timeout_secs);
        let inference_deadline = match (deadline, Instant::now().checked_add(inference_budget)) {
            (Some(doc), Some(ml)) => Some(doc.min(ml)),
            (doc, ml) => doc.or(ml),
        };
        for section in &mut sections {
            let input = SectionInput {
                kind: section.kind,
                blocks: &pre.blocks,
                range: section.body_blocks(),
                language: &pre.language.code,
            };
            let extraction = self.extractor.extract(&input, inference_deadline);
            section.candidates = extraction.candidates;
            warnings.extend(extraction.warnings.into_iter().map(PipelineWarning::from));
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!("Document {} ran past its time budget during extraction", id);
            warnings.push(
                StageTimeoutError {
                    stage: Stage::Extract,
                    budget_ms: self.config.pipeline.document_timeout_secs * 1000,
                }
                .into(),
            );
        }
        stages.push(Stage::Extract);

        checkpoint(cancel, Stage::Filter, id)?;
        let mut dropped = 0;
        let mut collapsed = 0;
        for section in &mut sections {
            let outcome = self.filter.filter(std::mem::take(&mut section.candidates));
            collapsed += outcome.duplicate_count();
            dropped += outcome.dropped.len() - outcome.duplicate_count();
            section.candidates = outcome.kept;
        }
        stages.push(Stage::Filter);

        checkpoint(cancel, Stage::Normalize, id)?;
        let normalizer = Normalizer::new(self.extractor.grammar(), self.extractor.vocab());
        for section in &mut sections {
            let candidates = normalizer.normalize_all(std::mem::take(&mut section.candidates));
            section.candidates = dedup(candidates);
        }
        stages.push(Stage::Normalize);

        let mut unique: Vec<PipelineWarning> = Vec::with_capacity(warnings.len());
        for warning in warnings {
            if !unique.contains(&warning) {
                unique.push(warning);
            }
        }

        let high = self.rules.thresholds.high_confidence;
        let all = || sections.iter().flat_map(|s| s.candidates.iter());
        let metrics = ExtractionMetrics {
            sections_detected: sections.len(),
            fields_extracted: all().count(),
            high_confidence_fields: all().filter(|c| c.confidence >= high).count(),
            low_confidence_fields: all().filter(|c| c.low_confidence).count(),
            dropped_candidates: dropped,
            collapsed_duplicates: collapsed,
            confidence: ConfidenceStats::from_scores(all().map(|c| c.confidence)),
        };

        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(
            "Extracted {} fields from {} sections of {} in {}ms",
            metrics.fields_extracted, metrics.sections_detected, id, processing_time_ms
        );
        debug!(
            "{} warnings, {} dropped, {} collapsed",
            unique.len(),
            dropped,
            collapsed
        );

        Ok(ExtractionResult {
            source_id: id.to_string(),
            format,
            language: pre.language,
            extracted_at: Utc::now(),
            text: pre.text,
            blocks: pre.blocks,
            sections,
            warnings: unique,
            metadata: ExtractionMetadata {
                ai_mode: self.extractor.ai_mode(),
                ocr_used: pre.ocr_used,
                processing_time_ms,
                stages_completed: stages,
                metrics,
            },
        })
    }

    /// Map an extraction result onto a profile snapshot.
    pub fn map(&self, result: &ExtractionResult) -> MappingOutcome {
        self.mapper.map(result)
    }

    /// Reconcile a freshly mapped profile with an existing one.
    pub fn merge(&self, incoming: &ProfileSnapshot, existing: &ProfileSnapshot) -> MergeOutcome {
        self.resolver.merge(incoming, existing)
    }

    /// Extract and map in one call.
    pub fn process(
        &self,
        document: &Document,
        cancel: &CancellationToken,
    ) -> Result<(ExtractionResult, MappingOutcome), VitaeError> {
        let result = self.extract(document, cancel)?;
        checkpoint(cancel, Stage::Map, document.id())?;
        let mapped = self.map(&result);
        Ok((result, mapped))
    }
}

fn checkpoint(cancel: &CancellationToken, stage: Stage, document: &str) -> Result<(), VitaeError> {
    if cancel.is_cancelled() {
        debug!("Run for {} cancelled before {}", document, stage);
        return Err(VitaeError::stage(stage, document, StageError::Cancelled));
    }
    Ok(())
}
