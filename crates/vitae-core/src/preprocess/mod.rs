//! Text normalization, language detection and OCR fallback.

mod clean;
mod language;
pub(crate) mod ocr;

pub use clean::{clean_line, split_lines};
pub use language::{supported_languages, Detection, LanguageDetector};
pub use ocr::{reading_order, recognize_with_timeout, OcrEngine, OcrLine, OcrOutcome};

#[cfg(feature = "native")]
pub use ocr::PureOcrEngine;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{PipelineWarning, PreprocessingWarning, Stage, StageTimeoutError};
use crate::loader::LoadedDocument;
use crate::models::config::{OcrConfig, PreprocessConfig};
use crate::models::{LanguageGuess, LayoutHint, SourceSpan, TextBlock};

/// Normalized text ready for segmentation.
#[derive(Debug, Clone, Default)]
pub struct Preprocessed {
    /// Normalized text; block spans index into it.
    pub text: String,
    pub blocks: Vec<TextBlock>,
    pub language: LanguageGuess,
    pub ocr_used: bool,
    pub warnings: Vec<PipelineWarning>,
}

impl Preprocessed {
    fn push_block(&mut self, text: String, origin: Option<SourceSpan>, page: u32, hint: LayoutHint) {
        if !self.text.is_empty() {
            self.text.push('\n');
        }
        let start = self.text.len();
        self.text.push_str(&text);
        let mut block = TextBlock::new(text, SourceSpan::new(start, self.text.len()), page)
            .with_hint(hint);
        block.origin = origin;
        self.blocks.push(block);
    }

    fn text_chars(&self) -> usize {
        self.text.chars().filter(|c| !c.is_whitespace()).count()
    }
}

/// Preprocessing stage.
pub struct Preprocessor {
    config: PreprocessConfig,
    ocr_config: OcrConfig,
    ocr: Option<Arc<dyn OcrEngine>>,
    detector: LanguageDetector,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig, ocr_config: OcrConfig) -> Self {
        Self {
            config,
            ocr_config,
            ocr: None,
            detector: LanguageDetector::new(),
        }
    }

    /// Set the OCR engine used for image-only documents.
    pub fn with_ocr(mut self, engine: Arc<dyn OcrEngine>) -> Self {
        self.ocr = Some(engine);
        self
    }

    pub fn has_ocr(&self) -> bool {
        self.ocr.is_some() && self.ocr_config.enabled
    }

    /// Normalize loader output.
    ///
    /// `declared_language` skips detection. `deadline` bounds OCR; OCR
    /// failures and timeouts become warnings and the embedded text is kept.
    pub fn preprocess(
        &self,
        loaded: &LoadedDocument,
        declared_language: Option<&str>,
        deadline: Option<Instant>,
    ) -> Preprocessed {
        let mut out = Preprocessed::default();

        for block in &loaded.blocks {
            for (offset, line) in split_lines(&block.text) {
                let cleaned = clean_line(line);
                if cleaned.is_empty() {
                    continue;
                }
                let raw_start = block.span.start + offset;
                let origin = SourceSpan::new(raw_start, raw_start + line.len());
                out.push_block(cleaned, Some(origin), block.page, block.hint.clone());
            }
        }

        if out.text_chars() < self.config.min_text_chars && !loaded.images.is_empty() {
            self.run_ocr(loaded, deadline, &mut out);
        }

        out.language = self.language(&out.text, declared_language, &mut out.warnings);

        debug!(
            "Preprocessed {} blocks ({} chars), language {} ({:.2})",
            out.blocks.len(),
            out.text.len(),
            out.language.code,
            out.language.confidence
        );
        out
    }

    fn language(
        &self,
        text: &str,
        declared: Option<&str>,
        warnings: &mut Vec<PipelineWarning>,
    ) -> LanguageGuess {
        if let Some(code) = declared {
            return LanguageGuess {
                code: code.to_ascii_lowercase(),
                confidence: 1.0,
                fallback: false,
            };
        }

        let detection = self.detector.detect(text);
        match detection {
            Some(d) if d.confidence >= self.config.language_confidence_threshold => LanguageGuess {
                code: d.code.to_string(),
                confidence: d.confidence,
                fallback: false,
            },
            other => {
                let fallback = self.config.default_language.clone();
                let (detected, confidence) = match other {
                    Some(d) => (Some(d.code.to_string()), d.confidence),
                    None => (None, 0.0),
                };
                debug!("Language detection inconclusive, using '{}'", fallback);
                warnings.push(
                    PreprocessingWarning::LanguageFallback {
                        detected,
                        confidence,
                        fallback: fallback.clone(),
                    }
                    .into(),
                );
                LanguageGuess {
                    code: fallback,
                    confidence,
                    fallback: true,
                }
            }
        }
    }

    fn run_ocr(
        &self,
        loaded: &LoadedDocument,
        deadline: Option<Instant>,
        out: &mut Preprocessed,
    ) {
        let engine = match (&self.ocr, self.ocr_config.enabled) {
            (Some(engine), true) => engine,
            _ => {
                warn!("No usable text layer and OCR is unavailable");
                out.warnings.push(PreprocessingWarning::OcrUnavailable.into());
                return;
            }
        };

        let page_budget = Duration::from_secs(self.ocr_config.timeout_secs.max(1));
        let mut timed_out = None;

        for page in &loaded.images {
            let budget = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        timed_out = Some(StageTimeoutError {
                            stage: Stage::Ocr,
                            budget_ms: page_budget.as_millis() as u64,
                        });
                        break;
                    }
                    remaining.min(page_budget)
                }
                None => page_budget,
            };

            info!("Running OCR on page {}", page.page);
            match recognize_with_timeout(engine.clone(), page.image.clone(), budget) {
                OcrOutcome::Lines(lines) => {
                    out.ocr_used = true;
                    for line in lines {
                        let cleaned = clean_line(&line.text);
                        if cleaned.is_empty() {
                            continue;
                        }
                        let hint = LayoutHint {
                            ocr_confidence: Some(line.confidence),
                            bbox: Some(line.bbox),
                            ..Default::default()
                        };
                        out.push_block(cleaned, None, page.page, hint);
                    }
                }
                OcrOutcome::Failed(e) => {
                    warn!("OCR failed on page {}: {}", page.page, e);
                    out.warnings.push(
                        PreprocessingWarning::OcrFailed {
                            page: page.page,
                            message: e.to_string(),
                        }
                        .into(),
                    );
                }
                OcrOutcome::TimedOut => {
                    let budget_ms = budget.as_millis() as u64;
                    warn!("OCR on page {} exceeded {}ms", page.page, budget_ms);
                    out.warnings.push(
                        PreprocessingWarning::OcrTimeout {
                            page: page.page,
                            budget_ms,
                        }
                        .into(),
                    );
                    timed_out = Some(StageTimeoutError {
                        stage: Stage::Ocr,
                        budget_ms,
                    });
                }
            }
        }

        if let Some(timeout) = timed_out {
            out.warnings.push(timeout.into());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::PageImage;
    use crate::preprocess::ocr::tests::FixedOcr;
    use image::DynamicImage;

    fn loaded(lines: &[&str]) -> LoadedDocument {
        let mut doc = LoadedDocument::default();
        for line in lines {
            doc.push_line(line, 1, LayoutHint::default());
        }
        doc.page_count = 1;
        doc
    }

    fn scanned(text_lines: &[&str]) -> LoadedDocument {
        let mut doc = loaded(text_lines);
        doc.images.push(PageImage {
            page: 1,
            image: DynamicImage::new_rgb8(8, 8),
        });
        doc
    }

    fn preprocessor() -> Preprocessor {
        Preprocessor::new(PreprocessConfig::default(), OcrConfig::default())
    }

    #[test]
    fn test_normalizes_lines_and_keeps_origin() {
        let doc = loaded(&["  Jane\u{00a0}Doe ", "", "Développeuse\tRust\r"]);
        let out = preprocessor().preprocess(&doc, Some("fr"), None);

        assert_eq!(out.text, "Jane Doe\nDéveloppeuse Rust");
        assert_eq!(out.blocks.len(), 2);
        for block in &out.blocks {
            assert_eq!(block.span.slice(&out.text), Some(block.text.as_str()));
        }
        let origin = out.blocks[1].origin.unwrap();
        assert_eq!(origin.slice(&doc.text), Some("Développeuse\tRust"));
    }

    #[test]
    fn test_declared_language_skips_detection() {
        let out = preprocessor().preprocess(&loaded(&["Hi"]), Some("EN"), None);
        assert_eq!(out.language.code, "en");
        assert!(!out.language.fallback);
        assert!(out.warnings.is_empty());
    }

    #[test]
    fn test_short_text_falls_back_to_default_language() {
        let out = preprocessor().preprocess(&loaded(&["Jane Doe"]), None, None);
        assert_eq!(out.language.code, "fr");
        assert!(out.language.fallback);
        assert!(matches!(
            out.warnings[0],
            PipelineWarning::Preprocessing(PreprocessingWarning::LanguageFallback { .. })
        ));
    }

    #[test]
    fn test_ocr_appends_lines() {
        let pre = preprocessor().with_ocr(Arc::new(FixedOcr::lines(&["Jane Doe", "jane@example.com"])));
        let out = pre.preprocess(&scanned(&[]), Some("en"), None);

        assert!(out.ocr_used);
        assert_eq!(out.text, "Jane Doe\njane@example.com");
        assert_eq!(out.blocks[0].hint.ocr_confidence, Some(0.9));
        assert!(out.blocks[0].origin.is_none());
    }

    #[test]
    fn test_missing_ocr_engine_warns() {
        let out = preprocessor().preprocess(&scanned(&["Jane Doe"]), Some("en"), None);
        assert!(!out.ocr_used);
        assert_eq!(out.text, "Jane Doe");
        assert!(out
            .warnings
            .contains(&PreprocessingWarning::OcrUnavailable.into()));
    }

    #[test]
    fn test_ocr_failure_keeps_embedded_text() {
        let mut failing = FixedOcr::lines(&[]);
        failing.fail = true;
        let pre = preprocessor().with_ocr(Arc::new(failing));
        let out = pre.preprocess(&scanned(&["jane@example.com"]), Some("en"), None);

        assert_eq!(out.text, "jane@example.com");
        assert!(matches!(
            out.warnings[0],
            PipelineWarning::Preprocessing(PreprocessingWarning::OcrFailed { page: 1, .. })
        ));
    }

    #[test]
    fn test_ocr_timeout_without_text_is_a_warning() {
        let mut slow = FixedOcr::lines(&["late"]);
        slow.delay = Duration::from_millis(300);
        let pre = preprocessor().with_ocr(Arc::new(slow));
        let deadline = Instant::now() + Duration::from_millis(20);

        let out = pre.preprocess(&scanned(&[]), Some("en"), Some(deadline));
        assert!(out.text.is_empty());
        assert!(!out.ocr_used);
        assert!(out.warnings.iter().any(|w| matches!(
            w,
            PipelineWarning::StageTimeout(StageTimeoutError { stage: Stage::Ocr, .. })
        )));
        assert!(out.warnings.iter().any(|w| matches!(
            w,
            PipelineWarning::Preprocessing(PreprocessingWarning::OcrTimeout { page: 1, .. })
        )));
    }

    #[test]
    fn test_ocr_timeout_with_text_is_a_warning() {
        let mut slow = FixedOcr::lines(&["late"]);
        slow.delay = Duration::from_millis(300);
        let pre = preprocessor().with_ocr(Arc::new(slow));
        let deadline = Instant::now() + Duration::from_millis(20);

        let out = pre
            .preprocess(&scanned(&["jane@example.com"]), Some("en"), Some(deadline));
        assert_eq!(out.text, "jane@example.com");
        assert!(out.warnings.iter().any(|w| matches!(w, PipelineWarning::StageTimeout(_))));
        assert!(out.warnings.iter().any(|w| matches!(
            w,
            PipelineWarning::Preprocessing(PreprocessingWarning::OcrTimeout { .. })
        )));
    }
}
