//! Core library for CFE electricity receipt OCR.
//!
//! This crate provides:
//! - Text extraction from PDF text layers with an OCR fallback
//! - A serialized, lifecycle-aware wrapper around the OCR engine
//! - Rule-based extraction of receipt fields (service number, kWh, amounts, tariff)
//! - Validation of extractions against ground truth and corpus-level accuracy metrics
//! - A result store boundary and batch runner for accuracy test campaigns

pub mod batch;
pub mod consumption;
pub mod error;
pub mod models;
pub mod ocr;
pub mod pdf;
pub mod receipt;
pub mod store;
pub mod validation;

pub use batch::{BatchItem, BatchOutcome, BatchRunner};
pub use error::{CfeError, FailureKind, Result};
pub use models::config::CfeConfig;
pub use models::metrics::{ErrorPattern, Impact, MetricsReport};
pub use models::receipt::{
    ExtractedFields, ExtractionResult, ExtractionSource, FieldValue, ReceiptField,
};
pub use models::validation::{
    ErrorKind, FieldResult, GroundTruth, ValidationResult, ValidationSummary,
};
pub use ocr::{EngineStatus, OcrBackend, OcrEngine, Recognition};
#[cfg(feature = "native")]
pub use ocr::PaddleOcrBackend;
pub use pdf::{LopdfExtractor, PdfText, PdfTextExtractor};
pub use receipt::{
    ReceiptAnalyzer, extract_fields, is_usable_extraction, score_confidence,
};
pub use store::{JsonDirStore, MemoryStore, ResultStore};
pub use validation::{MetricsAggregator, ValidationEngine};
