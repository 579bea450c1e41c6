//! OCR fallback for documents without a usable text layer.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::OcrError;

/// One recognized line of text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub text: String,
    /// Recognition confidence (0.0 - 1.0).
    pub confidence: f32,
    /// Axis-aligned box `[x_min, y_min, x_max, y_max]` in pixels.
    pub bbox: [f32; 4],
}

/// Text recognition over a page image.
pub trait OcrEngine: Send + Sync {
    /// Recognize lines of text, in reading order.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrLine>, OcrError>;
}

/// Outcome of a time-limited OCR call.
#[derive(Debug)]
pub enum OcrOutcome {
    Lines(Vec<OcrLine>),
    Failed(OcrError),
    TimedOut,
}

/// Run OCR on a worker thread, giving up after `budget`.
///
/// A timed-out worker is left to finish on its own; its result is discarded.
pub fn recognize_with_timeout(
    engine: Arc<dyn OcrEngine>,
    image: DynamicImage,
    budget: Duration,
) -> OcrOutcome {
    let (tx, rx) = mpsc::channel();
    let spawned = thread::Builder::new()
        .name("vitae-ocr".to_string())
        .spawn(move || {
            let _ = tx.send(engine.recognize(&image));
        });

    if let Err(e) = spawned {
        return OcrOutcome::Failed(OcrError::Worker(e.to_string()));
    }

    match rx.recv_timeout(budget) {
        Ok(Ok(lines)) => OcrOutcome::Lines(lines),
        Ok(Err(e)) => OcrOutcome::Failed(e),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            debug!("OCR exceeded {:?}", budget);
            OcrOutcome::TimedOut
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => {
            OcrOutcome::Failed(OcrError::Worker("worker exited without a result".to_string()))
        }
    }
}

/// Sort lines top-to-bottom in rows, then left-to-right.
pub fn reading_order(lines: &mut [OcrLine]) {
    lines.sort_by(|a, b| {
        let row_a = (a.bbox[1] / 20.0) as i32;
        let row_b = (b.bbox[1] / 20.0) as i32;
        row_a
            .cmp(&row_b)
            .then(a.bbox[0].partial_cmp(&b.bbox[0]).unwrap_or(std::cmp::Ordering::Equal))
    });
}

#[cfg(feature = "native")]
pub use native::PureOcrEngine;

#[cfg(feature = "native")]
mod native {
    use std::path::Path;
    use std::sync::Mutex;
    use std::time::Instant;

    use image::{DynamicImage, GenericImageView};
    use tracing::info;

    use super::{reading_order, OcrEngine, OcrLine};
    use crate::error::OcrError;
    use crate::models::config::{ModelConfig, OcrConfig};

    /// OCR engine backed by `pure-onnx-ocr`.
    pub struct PureOcrEngine {
        engine: Mutex<pure_onnx_ocr::engine::OcrEngine>,
        config: OcrConfig,
    }

    impl PureOcrEngine {
        /// Load detection, recognition and dictionary files from the model directory.
        pub fn from_config(models: &ModelConfig, config: OcrConfig) -> Result<Self, OcrError> {
            let dir: &Path = &models.model_dir;
            let det_path = dir.join(&models.ocr_detection_model);
            let rec_path = dir.join(&models.ocr_recognition_model);
            let dict_path = dir.join(&models.ocr_dictionary);

            let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
                .det_model_path(&det_path)
                .rec_model_path(&rec_path)
                .dictionary_path(&dict_path)
                .build()
                .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

            info!("Loaded pure-onnx-ocr engine from {}", dir.display());

            Ok(Self {
                engine: Mutex::new(engine),
                config,
            })
        }
    }

    impl OcrEngine for PureOcrEngine {
        fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrLine>, OcrError> {
            let start = Instant::now();
            let (width, height) = image.dimensions();

            let results = {
                let engine = self
                    .engine
                    .lock()
                    .map_err(|_| OcrError::Worker("OCR engine lock poisoned".to_string()))?;
                engine
                    .run_from_image(image)
                    .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?
            };

            let mut lines: Vec<OcrLine> = results
                .iter()
                .filter(|r| r.confidence >= self.config.min_line_confidence)
                .map(|r| {
                    let text = if self.config.keep_unknown_tokens {
                        r.text.clone()
                    } else {
                        r.text.replace("[UNK]", " ")
                    };
                    OcrLine {
                        text,
                        confidence: r.confidence.clamp(0.0, 1.0),
                        bbox: polygon_to_rect(&r.bounding_box),
                    }
                })
                .filter(|l| !l.text.trim().is_empty())
                .collect();

            reading_order(&mut lines);

            info!(
                "OCR on {}x{} image: {} lines in {}ms",
                width,
                height,
                lines.len(),
                start.elapsed().as_millis()
            );
            Ok(lines)
        }
    }

    /// Axis-aligned bounds of a detection polygon.
    fn polygon_to_rect(polygon: &pure_onnx_ocr::Polygon<f64>) -> [f32; 4] {
        let mut rect = [f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY];
        for coord in polygon.exterior().coords() {
            rect[0] = rect[0].min(coord.x as f32);
            rect[1] = rect[1].min(coord.y as f32);
            rect[2] = rect[2].max(coord.x as f32);
            rect[3] = rect[3].max(coord.y as f32);
        }
        if rect[0].is_finite() { rect } else { [0.0; 4] }
    }
}
