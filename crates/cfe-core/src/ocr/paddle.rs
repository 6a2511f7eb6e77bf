//! PaddleOCR backend using `pure-onnx-ocr` (pure Rust, no external ONNX Runtime).

use std::path::PathBuf;
use std::time::Instant;

use tracing::{debug, info};

use super::{MODEL_FILES, OcrBackend, Recognition, missing_model_files, resolve_model_dir};
use crate::error::OcrError;

/// OCR backend loading PaddleOCR ONNX models from a model directory.
pub struct PaddleOcrBackend {
    model_dir: PathBuf,
    keep_unk: bool,
    engine: Option<pure_onnx_ocr::engine::OcrEngine>,
}

impl PaddleOcrBackend {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            keep_unk: false,
            engine: None,
        }
    }

    /// Keep `[UNK]` tokens instead of replacing them with spaces.
    pub fn with_keep_unk(mut self, keep_unk: bool) -> Self {
        self.keep_unk = keep_unk;
        self
    }
}

impl OcrBackend for PaddleOcrBackend {
    fn initialize(&mut self, language: &str) -> Result<(), OcrError> {
        let dir = resolve_model_dir(&self.model_dir, language);

        let missing = missing_model_files(&dir);
        if !missing.is_empty() {
            return Err(OcrError::ModelLoad(format!(
                "{} is missing {}",
                dir.display(),
                missing.join(", ")
            )));
        }

        let [det, rec, dict] = MODEL_FILES.map(|name| dir.join(name));
        let engine = pure_onnx_ocr::engine::OcrEngineBuilder::new()
            .det_model_path(&det)
            .rec_model_path(&rec)
            .dictionary_path(&dict)
            .build()
            .map_err(|e| OcrError::ModelLoad(format!("pure-onnx-ocr: {}", e)))?;

        info!("Loaded pure-onnx-ocr models from {}", dir.display());
        self.engine = Some(engine);
        Ok(())
    }

    fn recognize(&mut self, image: &[u8]) -> Result<Recognition, OcrError> {
        let engine = self.engine.as_ref().ok_or(OcrError::NotInitialized)?;
        let start = Instant::now();

        let image =
            image::load_from_memory(image).map_err(|e| OcrError::InvalidImage(e.to_string()))?;

        let results = engine
            .run_from_image(&image)
            .map_err(|e| OcrError::Recognition(format!("pure-onnx-ocr: {}", e)))?;

        debug!("pure-onnx-ocr returned {} text regions", results.len());

        let mut lines: Vec<((f64, f64), String, f64)> = results
            .iter()
            .map(|r| {
                let text = if self.keep_unk {
                    r.text.clone()
                } else {
                    r.text.replace("[UNK]", " ")
                };
                (top_left(&r.bounding_box), text, f64::from(r.confidence))
            })
            .collect();

        // Reading order: rows of ~20px top to bottom, then left to right.
        lines.sort_by(|((ax, ay), ..), ((bx, by), ..)| {
            let row_a = (ay / 20.0) as i64;
            let row_b = (by / 20.0) as i64;
            row_a
                .cmp(&row_b)
                .then(ax.partial_cmp(bx).unwrap_or(std::cmp::Ordering::Equal))
        });

        let confidence_percent = if lines.is_empty() {
            0.0
        } else {
            lines.iter().map(|(_, _, c)| c).sum::<f64>() / lines.len() as f64 * 100.0
        };

        let text = lines
            .into_iter()
            .map(|(_, text, _)| text)
            .collect::<Vec<_>>()
            .join("\n");

        info!(
            chars = text.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "OCR recognition complete"
        );

        Ok(Recognition {
            text,
            confidence_percent,
        })
    }

    fn terminate(&mut self) {
        self.engine = None;
    }
}

/// Minimum x and y over the polygon's exterior.
fn top_left(polygon: &pure_onnx_ocr::Polygon<f64>) -> (f64, f64) {
    polygon
        .exterior()
        .coords()
        .fold((f64::INFINITY, f64::INFINITY), |(x, y), c| {
            (x.min(c.x), y.min(c.y))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_reports_missing_models() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = PaddleOcrBackend::new(dir.path());

        let err = backend.initialize("spa").unwrap_err();
        assert!(matches!(err, OcrError::ModelLoad(ref m) if m.contains("det.onnx")));
    }

    #[test]
    fn recognize_requires_initialization() {
        let mut backend = PaddleOcrBackend::new("models");
        assert!(matches!(
            backend.recognize(&[0u8; 4]),
            Err(OcrError::NotInitialized)
        ));
    }
}
