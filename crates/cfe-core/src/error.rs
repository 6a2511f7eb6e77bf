//! Error types for the cfe-core library.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for the cfe library.
#[derive(Error, Debug)]
pub enum CfeError {
    /// No extraction path produced text for the document.
    #[error("document unreadable: {0}")]
    DocumentUnreadable(String),

    /// OCR is required but the engine is not in the ready state.
    #[error("OCR engine not ready: {0}")]
    OcrNotReady(String),

    /// OCR did not finish within the per-document deadline.
    #[error("OCR timed out after {0}ms")]
    OcrTimeout(u64),

    /// Ground truth is missing or not shaped like a field map.
    #[error("invalid validation input: {0}")]
    ValidationInputInvalid(String),

    /// Document analysis failed; wraps the structured cause.
    #[error("OCR analysis failed for {filename} after {elapsed_ms}ms (path: {path}): {source}")]
    AnalysisFailed {
        filename: String,
        elapsed_ms: u64,
        path: String,
        #[source]
        source: Box<CfeError>,
    },

    /// Not enough data points for a statistical computation.
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// PDF processing error.
    #[error("PDF error: {0}")]
    Pdf(#[from] PdfError),

    /// OCR backend error.
    #[error("OCR error: {0}")]
    Ocr(#[from] OcrError),

    /// Result store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Machine-checkable failure kind carried by every [`CfeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureKind {
    DocumentUnreadable,
    OcrNotReady,
    OcrTimeout,
    ValidationInputInvalid,
    OcrAnalysisFailed,
    InsufficientData,
    Storage,
    Io,
    Config,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::DocumentUnreadable => "document-unreadable",
            FailureKind::OcrNotReady => "ocr-not-ready",
            FailureKind::OcrTimeout => "ocr-timeout",
            FailureKind::ValidationInputInvalid => "validation-input-invalid",
            FailureKind::OcrAnalysisFailed => "ocr-analysis-failed",
            FailureKind::InsufficientData => "insufficient-data",
            FailureKind::Storage => "storage",
            FailureKind::Io => "io",
            FailureKind::Config => "config",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl CfeError {
    /// Kind of this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            CfeError::DocumentUnreadable(_) => FailureKind::DocumentUnreadable,
            CfeError::OcrNotReady(_) => FailureKind::OcrNotReady,
            CfeError::OcrTimeout(_) => FailureKind::OcrTimeout,
            CfeError::ValidationInputInvalid(_) => FailureKind::ValidationInputInvalid,
            CfeError::AnalysisFailed { .. } => FailureKind::OcrAnalysisFailed,
            CfeError::InsufficientData(_) => FailureKind::InsufficientData,
            // Backend errors only escape when no fallback could absorb them.
            CfeError::Pdf(_) | CfeError::Ocr(_) => FailureKind::DocumentUnreadable,
            CfeError::Store(_) => FailureKind::Storage,
            CfeError::Json(_) | CfeError::Io(_) => FailureKind::Io,
            CfeError::Config(_) => FailureKind::Config,
        }
    }

    /// Kind of the underlying cause, looking through `AnalysisFailed`.
    pub fn root_kind(&self) -> FailureKind {
        match self {
            CfeError::AnalysisFailed { source, .. } => source.root_kind(),
            other => other.kind(),
        }
    }

    /// Whether the caller should retry later rather than give up on the input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root_kind(),
            FailureKind::OcrNotReady | FailureKind::OcrTimeout
        )
    }
}

/// Errors raised by the PDF text-layer extractor.
#[derive(Error, Debug)]
pub enum PdfError {
    /// Failed to open/parse the PDF file.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// Failed to extract text from PDF.
    #[error("failed to extract text: {0}")]
    TextExtraction(String),

    /// The PDF is encrypted and cannot be processed.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF is empty or has no pages.
    #[error("PDF has no pages")]
    NoPages,
}

/// Errors raised by an OCR backend.
#[derive(Error, Debug)]
pub enum OcrError {
    /// Failed to load OCR models for a language.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// The input bytes could not be decoded as an image.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// Text recognition failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// The backend is not initialized.
    #[error("engine not initialized")]
    NotInitialized,
}

/// Errors raised by a result store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Referenced batch does not exist.
    #[error("batch not found: {0}")]
    BatchNotFound(String),

    /// Stored record could not be read back.
    #[error("corrupt record {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Backing storage failed.
    #[error("storage backend failed: {0}")]
    Backend(String),
}

/// Result type for the cfe library.
pub type Result<T> = std::result::Result<T, CfeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analysis_failure_exposes_root_kind() {
        let err = CfeError::AnalysisFailed {
            filename: "recibo.png".to_string(),
            elapsed_ms: 12,
            path: "ocr-engine".to_string(),
            source: Box::new(CfeError::OcrNotReady("degraded".to_string())),
        };

        assert_eq!(err.kind(), FailureKind::OcrAnalysisFailed);
        assert_eq!(err.root_kind(), FailureKind::OcrNotReady);
        assert!(err.is_retryable());
    }

    #[test]
    fn unreadable_documents_are_not_retryable() {
        let err = CfeError::DocumentUnreadable("no text layer".to_string());
        assert!(!err.is_retryable());
        assert_eq!(err.kind().to_string(), "document-unreadable");
    }

    #[test]
    fn kind_serializes_kebab_case() {
        let json = serde_json::to_string(&FailureKind::ValidationInputInvalid).unwrap();
        assert_eq!(json, "\"validation-input-invalid\"");
    }
}
