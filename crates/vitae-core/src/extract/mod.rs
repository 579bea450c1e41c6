//! Field extraction.
//!
//! Each section kind has a chain of extractors (see `rules/chains.json`).
//! Steps run in order over the section's body lines. When a step proposes a
//! candidate overlapping one from an earlier step, the step's overlap policy
//! decides: `demote` lowers the less specific candidate (or the later one for
//! the same field), `veto` removes earlier candidates of a different field.

pub mod patterns;

mod ner;
mod registry;
mod rules;
mod vocab;
mod zero_shot;

pub use ner::{decode_bio, Entity, EntityLabel, NerModel, TokenTag};
pub use registry::{ModelRegistry, ModelRoutes, RoutedModel, Selected};
pub use vocab::{VocabIndex, WordHit, WordList};
pub use zero_shot::{LabelScore, ZeroShotModel};

use std::ops::Range;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::dates::DateGrammar;
use crate::error::{ExtractionWarning, ExtractorError, VitaeError};
use crate::models::config::ExtractionConfig;
use crate::models::{
    AiMode, ExtractionMethod, FieldCandidate, FieldName, SectionKind, SourceSpan, TextBlock,
};
use crate::rules::{ChainStep, ChainTable, NerStep, OverlapPolicy, PatternRule, RuleSet, ZeroShotStep};

/// Compiled matching tables shared by rules and heuristic models.
pub struct ExtractContext<'a> {
    pub grammar: &'a DateGrammar,
    pub vocab: &'a VocabIndex,
}

/// Lines of one section handed to its chain.
pub struct SectionInput<'a> {
    pub kind: SectionKind,
    /// All blocks of the document.
    pub blocks: &'a [TextBlock],
    /// Body blocks of the section.
    pub range: Range<usize>,
    pub language: &'a str,
}

#[derive(Debug, Default)]
pub struct SectionExtraction {
    pub candidates: Vec<FieldCandidate>,
    pub warnings: Vec<ExtractionWarning>,
}

/// Runs extractor chains over sections.
pub struct FieldExtractor {
    chains: ChainTable,
    grammar: DateGrammar,
    vocab: VocabIndex,
    ner: ModelRoutes<NerModel>,
    zero_shot: ModelRoutes<ZeroShotModel>,
    enable_ml: bool,
    overlap_penalty: f32,
}

impl FieldExtractor {
    /// Compile rule tables and load the routed models.
    ///
    /// Fails when a model cannot be loaded and its task has no fallback.
    pub fn new(rules: &RuleSet, config: &ExtractionConfig, registry: &ModelRegistry) -> Result<Self, VitaeError> {
        let grammar = DateGrammar::new(&rules.dates)?;
        let vocab = VocabIndex::new(&rules.vocab)?;
        let routing = &rules.routing;

        let ner = if config.enable_ml && rules.chains.uses_ner() {
            ModelRoutes::build("ner", &routing.ner, &routing.models, NerModel::Heuristic, |id, spec| {
                registry.load_ner(id, spec)
            })?
        } else {
            ModelRoutes::heuristic_only("ner", NerModel::Heuristic)
        };
        let zero_shot = if config.enable_ml && rules.chains.uses_zero_shot() {
            ModelRoutes::build(
                "zero_shot",
                &routing.zero_shot,
                &routing.models,
                ZeroShotModel::Keyword,
                |id, spec| registry.load_zero_shot(id, spec),
            )?
        } else {
            ModelRoutes::heuristic_only("zero_shot", ZeroShotModel::Keyword)
        };

        let extractor = Self {
            chains: rules.chains.clone(),
            grammar,
            vocab,
            ner,
            zero_shot,
            enable_ml: config.enable_ml,
            overlap_penalty: config.overlap_penalty,
        };
        info!("Field extractor ready ({})", extractor.ai_mode());
        Ok(extractor)
    }

    pub fn grammar(&self) -> &DateGrammar {
        &self.grammar
    }

    pub fn vocab(&self) -> &VocabIndex {
        &self.vocab
    }

    /// How much of the extraction runs on loaded models.
    pub fn ai_mode(&self) -> AiMode {
        if !self.enable_ml {
            return AiMode::RulesOnly;
        }
        let mut loaded = 0;
        let mut fallback = 0;
        if self.chains.uses_ner() {
            let (l, f) = self.ner.counts();
            loaded += l;
            fallback += f;
        }
        if self.chains.uses_zero_shot() {
            let (l, f) = self.zero_shot.counts();
            loaded += l;
            fallback += f;
        }
        match (loaded, fallback) {
            (0, _) => AiMode::RulesOnly,
            (_, 0) => AiMode::FullAi,
            _ => AiMode::PartialAi,
        }
    }

    /// Run the section's chain. ML steps are skipped once `deadline` passes.
    pub fn extract(&self, input: &SectionInput<'_>, deadline: Option<Instant>) -> SectionExtraction {
        let ctx = ExtractContext {
            grammar: &self.grammar,
            vocab: &self.vocab,
        };
        let mut out = SectionExtraction::default();

        for step in self.chains.steps(input.kind) {
            if step.is_ml() && !self.enable_ml {
                continue;
            }

            let produced = match step {
                ChainStep::Rule(rule) => rules::apply(rule, input, &ctx),
                ChainStep::Ner(ner_step) => {
                    let selected = self.ner.select(input.language);
                    let extractor = model_extractor("ner", selected.model_id, selected.model.is_heuristic());
                    self.run_model_step(input, deadline, &extractor, selected.warning, &mut out, || {
                        run_ner(ner_step, selected.model, &extractor, input, &ctx)
                    })
                }
                ChainStep::ZeroShot(zs_step) => {
                    let selected = self.zero_shot.select(input.language);
                    let extractor =
                        model_extractor("zero_shot", selected.model_id, selected.model.is_heuristic());
                    self.run_model_step(input, deadline, &extractor, selected.warning, &mut out, || {
                        run_zero_shot(zs_step, selected.model, &extractor, input, &ctx)
                    })
                }
            };

            merge_step(&mut out.candidates, produced, step.overlap(), self.overlap_penalty);
        }

        debug!(
            "Extracted {} candidates from {} section",
            out.candidates.len(),
            input.kind
        );
        out
    }

    fn run_model_step<F>(
        &self,
        input: &SectionInput<'_>,
        deadline: Option<Instant>,
        extractor: &str,
        routing_warning: Option<ExtractionWarning>,
        out: &mut SectionExtraction,
        run: F,
    ) -> Vec<FieldCandidate>
    where
        F: FnOnce() -> Result<Vec<FieldCandidate>, ExtractorError>,
    {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            debug!("Skipping {} in {}: inference deadline reached", extractor, input.kind);
            out.warnings.push(ExtractionWarning::InferenceSkipped {
                section: input.kind,
                extractor: extractor.to_string(),
            });
            return Vec::new();
        }
        out.warnings.extend(routing_warning);

        match run() {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Extractor {} failed in {}: {}", extractor, input.kind, e);
                out.warnings.push(ExtractionWarning::ExtractorFailed {
                    section: input.kind,
                    extractor: extractor.to_string(),
                    message: e.to_string(),
                });
                Vec::new()
            }
        }
    }
}

fn model_extractor(task: &str, model_id: &str, heuristic: bool) -> String {
    if heuristic {
        format!("{}:heuristic", task)
    } else {
        format!("{}:{}", task, model_id)
    }
}

fn run_ner(
    step: &NerStep,
    model: &NerModel,
    extractor: &str,
    input: &SectionInput<'_>,
    ctx: &ExtractContext<'_>,
) -> Result<Vec<FieldCandidate>, ExtractorError> {
    let field_for = |label: EntityLabel| {
        step.labels
            .iter()
            .find(|(tag, _)| EntityLabel::from_tag(tag) == Some(label))
            .map(|(_, field)| *field)
            .or_else(|| label.default_field())
    };

    let mut out = Vec::new();
    for index in input.range.clone() {
        let Some(block) = input.blocks.get(index) else { continue };
        for entity in model.recognize(&block.text, ctx)? {
            if entity.score < step.min_score {
                continue;
            }
            let (Some(field), Some(raw)) = (field_for(entity.label), block.text.get(entity.start..entity.end)) else {
                continue;
            };
            let base = block.span.start;
            out.push(
                FieldCandidate::new(
                    field,
                    raw,
                    entity.score,
                    ExtractionMethod::Ner,
                    SourceSpan::new(base + entity.start, base + entity.end),
                )
                .with_extractor(extractor)
                .with_block(index),
            );
        }
    }
    Ok(out)
}

fn run_zero_shot(
    step: &ZeroShotStep,
    model: &ZeroShotModel,
    extractor: &str,
    input: &SectionInput<'_>,
    ctx: &ExtractContext<'_>,
) -> Result<Vec<FieldCandidate>, ExtractorError> {
    let labels: Vec<&str> = step.labels.keys().map(String::as_str).collect();
    let items = rules::apply(&PatternRule::ListItems(FieldName::Skill), input, ctx);

    let mut out = Vec::new();
    for item in items {
        let scores = model.classify(&item.raw_value, &labels, &step.hypothesis, ctx)?;
        let best = scores
            .into_iter()
            .fold(None, |best: Option<LabelScore>, s| match best {
                Some(b) if b.score >= s.score => Some(b),
                _ => Some(s),
            });
        let Some(best) = best else { continue };
        if best.score < step.min_score {
            continue;
        }
        let Some(field) = step.labels.get(&best.label) else { continue };
        out.push(
            FieldCandidate::new(*field, item.raw_value.clone(), best.score, ExtractionMethod::ZeroShot, item.span)
                .with_extractor(extractor)
                .with_block(item.block),
        );
    }
    Ok(out)
}

/// Add one step's candidates to those of earlier steps, applying the
/// overlap policy against earlier candidates only.
fn merge_step(existing: &mut Vec<FieldCandidate>, produced: Vec<FieldCandidate>, policy: OverlapPolicy, penalty: f32) {
    let mut vetoed = vec![false; existing.len()];
    let mut demoted = vec![false; existing.len()];
    let mut added = Vec::with_capacity(produced.len());

    for mut candidate in produced {
        let mut demote_new = false;
        for (i, earlier) in existing.iter().enumerate() {
            if !earlier.span.overlaps(&candidate.span) {
                continue;
            }
            if earlier.field == candidate.field {
                demote_new = true;
            } else if policy == OverlapPolicy::Veto {
                vetoed[i] = true;
            } else if candidate.field.is_generic() && !earlier.field.is_generic() {
                demote_new = true;
            } else if earlier.field.is_generic() && !candidate.field.is_generic() {
                demoted[i] = true;
            }
        }
        if demote_new {
            candidate.confidence *= penalty;
        }
        added.push(candidate);
    }

    for (candidate, demote) in existing.iter_mut().zip(&demoted) {
        if *demote {
            candidate.confidence *= penalty;
        }
    }
    let mut index = 0;
    existing.retain(|_| {
        let keep = !vetoed[index];
        index += 1;
        keep
    });
    existing.extend(added);
}
