//! OCR engine boundary and lifecycle management.

mod engine;
#[cfg(feature = "native")]
mod paddle;
#[cfg(test)]
pub(crate) mod testing;

pub use engine::{EngineStatus, OcrEngine};
#[cfg(feature = "native")]
pub use paddle::PaddleOcrBackend;

use std::path::{Path, PathBuf};

use crate::error::OcrError;

/// Model files a language directory must contain.
pub const MODEL_FILES: [&str; 3] = ["det.onnx", "latin_rec.onnx", "latin_dict.txt"];

/// Text recognized from one image.
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    /// Engine-reported confidence, 0 - 100.
    pub confidence_percent: f64,
}

impl Recognition {
    /// Confidence normalized to 0.0 - 1.0.
    pub fn confidence(&self) -> f64 {
        (self.confidence_percent / 100.0).clamp(0.0, 1.0)
    }
}

/// Boundary to a stateful OCR engine.
///
/// Implementations are driven by [`OcrEngine`], which guarantees at most one call
/// in flight per backend, so methods take `&mut self`.
pub trait OcrBackend: Send + 'static {
    /// Load the model for `language`.
    fn initialize(&mut self, language: &str) -> Result<(), OcrError>;

    /// Recognize text in an encoded image.
    fn recognize(&mut self, image: &[u8]) -> Result<Recognition, OcrError>;

    /// Release engine resources.
    fn terminate(&mut self);
}

/// Resolve the model directory for a language.
///
/// Prefers `<model_dir>/<language>`, falling back to a flat `<model_dir>`.
pub fn resolve_model_dir(model_dir: &Path, language: &str) -> PathBuf {
    let per_language = model_dir.join(language);
    if per_language.is_dir() {
        per_language
    } else {
        model_dir.to_path_buf()
    }
}

/// Model files missing from a directory.
pub fn missing_model_files(dir: &Path) -> Vec<&'static str> {
    MODEL_FILES
        .iter()
        .copied()
        .filter(|name| !dir.join(name).exists())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_normalized() {
        let rec = Recognition {
            text: "CFE".to_string(),
            confidence_percent: 87.5,
        };
        assert_eq!(rec.confidence(), 0.875);

        let rec = Recognition {
            text: String::new(),
            confidence_percent: 140.0,
        };
        assert_eq!(rec.confidence(), 1.0);
    }

    #[test]
    fn model_dir_falls_back_to_flat_layout() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_model_dir(dir.path(), "spa"), dir.path());

        std::fs::create_dir(dir.path().join("spa")).unwrap();
        assert_eq!(resolve_model_dir(dir.path(), "spa"), dir.path().join("spa"));
    }

    #[test]
    fn reports_missing_model_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("det.onnx"), b"").unwrap();
        assert_eq!(
            missing_model_files(dir.path()),
            vec!["latin_rec.onnx", "latin_dict.txt"]
        );
    }
}
