//! Document analysis: text extraction with OCR fallback, then field extraction.

use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::confidence::score_confidence;
use super::extractor::{extract_fields, is_usable_extraction};
use crate::error::{CfeError, Result};
use crate::models::config::PdfConfig;
use crate::models::receipt::{ExtractionResult, ExtractionSource};
use crate::ocr::{OcrBackend, OcrEngine};
use crate::pdf::{PdfTextExtractor, is_pdf};

/// Text recovered from a document, before field extraction.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredText {
    pub text: String,
    pub confidence: f64,
    pub source: ExtractionSource,
    pub warnings: Vec<String>,
}

/// Turns document bytes into an [`ExtractionResult`].
///
/// PDFs are read through their text layer first; a low-scoring layer is re-tried
/// through OCR and replaced only when OCR does better. Images go straight to OCR.
pub struct ReceiptAnalyzer<B, P> {
    engine: OcrEngine<B>,
    pdf: P,
    config: PdfConfig,
}

impl<B: OcrBackend, P: PdfTextExtractor> ReceiptAnalyzer<B, P> {
    pub fn new(engine: OcrEngine<B>, pdf: P) -> Self {
        Self {
            engine,
            pdf,
            config: PdfConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PdfConfig) -> Self {
        self.config = config;
        self
    }

    pub fn engine(&self) -> &OcrEngine<B> {
        &self.engine
    }

    /// Analyze one document.
    ///
    /// Failures are wrapped in [`CfeError::AnalysisFailed`] carrying the filename,
    /// elapsed time and the extraction path that was attempted.
    pub async fn analyze_document(&self, data: &[u8], filename: &str) -> Result<ExtractionResult> {
        let start = Instant::now();
        let path = if is_pdf(data) {
            "primary-text-layer"
        } else {
            "ocr-engine"
        };
        debug!(filename, bytes = data.len(), path, "Analyzing document");

        let recovered = match self.recover_text(data).await {
            Ok(recovered) => recovered,
            Err(e) => {
                let elapsed_ms = start.elapsed().as_millis() as u64;
                error!(filename, elapsed_ms, path, error = %e, "Document analysis failed");
                return Err(CfeError::AnalysisFailed {
                    filename: filename.to_string(),
                    elapsed_ms,
                    path: path.to_string(),
                    source: Box::new(e),
                });
            }
        };

        let RecoveredText {
            text,
            confidence,
            source,
            mut warnings,
        } = recovered;

        let extracted_fields = extract_fields(&text);
        let usable = is_usable_extraction(&extracted_fields);
        if !usable {
            warnings.push(
                "Extracted fields lack identity, consumption or billing information".to_string(),
            );
        }

        let processing_time = start.elapsed().as_millis() as u64;
        info!(
            filename,
            source = %source,
            confidence,
            fields = extracted_fields.len(),
            usable,
            elapsed_ms = processing_time,
            "Document analyzed"
        );

        Ok(ExtractionResult {
            filename: filename.to_string(),
            raw_text: text,
            confidence,
            extracted_fields,
            source,
            processing_time,
            warnings,
            usable,
        })
    }

    /// Recover text without extracting fields.
    pub async fn recover_text(&self, data: &[u8]) -> Result<RecoveredText> {
        if is_pdf(data) {
            self.recover_pdf_text(data).await
        } else {
            self.recover_image_text(data).await
        }
    }

    async fn recover_image_text(&self, data: &[u8]) -> Result<RecoveredText> {
        let recognition = self
            .engine
            .recognize(data.to_vec())
            .await
            .map_err(unreadable_on_ocr_error)?;

        let mut warnings = Vec::new();
        if recognition.text.trim().is_empty() {
            warnings.push("OCR recovered no text".to_string());
        }

        Ok(RecoveredText {
            confidence: recognition.confidence(),
            text: recognition.text,
            source: ExtractionSource::OcrEngine,
            warnings,
        })
    }

    async fn recover_pdf_text(&self, data: &[u8]) -> Result<RecoveredText> {
        let layer = match self.pdf.extract(data) {
            Ok(layer) => layer,
            Err(pdf_err) => return self.recover_unreadable_pdf(data, pdf_err.to_string()).await,
        };

        let confidence = score_confidence(&layer.text);
        let mut recovered = RecoveredText {
            text: layer.text,
            confidence,
            source: ExtractionSource::PrimaryTextLayer,
            warnings: Vec::new(),
        };
        debug!(confidence, pages = layer.page_count, "Scored PDF text layer");

        if recovered.text.trim().chars().count() < self.config.min_page_text_length {
            recovered
                .warnings
                .push("PDF text layer is sparse; document may be scanned".to_string());
        }

        if confidence >= self.config.ocr_fallback_threshold {
            return Ok(recovered);
        }

        if !self.engine.is_ready().await {
            warn!(confidence, "Low-confidence text layer and OCR engine unavailable");
            recovered.warnings.push(format!(
                "Text layer confidence {:.2} is below {:.2} and OCR is unavailable",
                confidence, self.config.ocr_fallback_threshold
            ));
            return Ok(recovered);
        }

        match self.engine.recognize(self.ocr_input(data)).await {
            Ok(recognition) if recognition.confidence() > confidence => {
                info!(
                    text_layer = confidence,
                    ocr = recognition.confidence(),
                    "OCR re-scan replaced low-confidence text layer"
                );
                recovered.warnings.push(format!(
                    "Text layer confidence {:.2} replaced by OCR re-scan at {:.2}",
                    confidence,
                    recognition.confidence()
                ));
                recovered.confidence = recognition.confidence();
                recovered.text = recognition.text;
                recovered.source = ExtractionSource::Hybrid;
            }
            Ok(recognition) => {
                debug!(ocr = recognition.confidence(), "OCR re-scan did not improve text layer");
                recovered
                    .warnings
                    .push("OCR re-scan did not improve the text layer".to_string());
            }
            Err(e) => {
                warn!(error = %e, "OCR re-scan failed, keeping text layer");
                recovered.warnings.push(format!("OCR re-scan failed: {}", e));
            }
        }

        Ok(recovered)
    }

    /// The text layer could not be read; OCR is the only way left.
    async fn recover_unreadable_pdf(&self, data: &[u8], reason: String) -> Result<RecoveredText> {
        warn!(reason = %reason, "PDF text layer extraction failed");

        if !self.engine.is_ready().await {
            return Err(CfeError::DocumentUnreadable(format!(
                "PDF text layer failed ({}) and OCR is unavailable",
                reason
            )));
        }

        let recognition = self
            .engine
            .recognize(self.ocr_input(data))
            .await
            .map_err(|e| match e {
                CfeError::Ocr(ocr) => CfeError::DocumentUnreadable(format!(
                    "PDF text layer failed ({}); OCR failed ({})",
                    reason, ocr
                )),
                other => other,
            })?;

        Ok(RecoveredText {
            confidence: recognition.confidence(),
            text: recognition.text,
            source: ExtractionSource::OcrEngine,
            warnings: vec![format!("PDF text layer unreadable ({}); used OCR", reason)],
        })
    }

    /// Image handed to OCR for a PDF: the first page's image, or a bounded prefix
    /// of the raw bytes when none can be pulled out.
    fn ocr_input(&self, data: &[u8]) -> Vec<u8> {
        self.pdf.first_page_image(data).unwrap_or_else(|| {
            let end = data.len().min(self.config.max_ocr_bytes);
            data[..end].to_vec()
        })
    }
}

/// Backend errors mean the bytes could not be read; lifecycle errors pass through.
fn unreadable_on_ocr_error(e: CfeError) -> CfeError {
    match e {
        CfeError::Ocr(ocr) => CfeError::DocumentUnreadable(ocr.to_string()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureKind, PdfError};
    use crate::ocr::testing::FakeBackend;
    use crate::pdf::PdfText;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const RECEIPT: &str = "No. de Servicio: 123456789012\n\
        TARIFA: 1C\n\
        Consumo: 245 kWh\n\
        Fecha límite de pago: 30/01/2024\n\
        TOTAL A PAGAR: $850.00\n";

    struct FakePdf {
        text: Option<String>,
        image: Option<Vec<u8>>,
    }

    impl FakePdf {
        fn with_text(text: &str) -> Self {
            Self {
                text: Some(text.to_string()),
                image: None,
            }
        }

        fn broken() -> Self {
            Self {
                text: None,
                image: None,
            }
        }
    }

    impl PdfTextExtractor for FakePdf {
        fn extract(&self, _data: &[u8]) -> crate::pdf::Result<PdfText> {
            match &self.text {
                Some(text) => Ok(PdfText {
                    text: text.clone(),
                    page_count: 1,
                }),
                None => Err(PdfError::Parse("broken xref".to_string())),
            }
        }

        fn first_page_image(&self, _data: &[u8]) -> Option<Vec<u8>> {
            self.image.clone()
        }
    }

    async fn analyzer(
        backend: FakeBackend,
        pdf: FakePdf,
        initialize: bool,
    ) -> ReceiptAnalyzer<FakeBackend, FakePdf> {
        let engine = OcrEngine::new(backend, Duration::from_secs(5));
        if initialize {
            engine.initialize("spa").await;
        }
        ReceiptAnalyzer::new(engine, pdf)
    }

    fn pdf_bytes() -> Vec<u8> {
        b"%PDF-1.7\n...".to_vec()
    }

    #[tokio::test]
    async fn test_confident_text_layer_skips_ocr() {
        let text = RECEIPT.repeat(10);
        let analyzer = analyzer(FakeBackend::new("ocr", 99.0), FakePdf::with_text(&text), true).await;

        let result = analyzer.analyze_document(&pdf_bytes(), "recibo.pdf").await.unwrap();
        assert_eq!(result.source, ExtractionSource::PrimaryTextLayer);
        assert_eq!(result.raw_text, text);
        assert!(result.confidence >= 0.6);
        assert!(result.usable);
        assert!(result.warnings.is_empty());
        assert_eq!(result.extracted_fields.len(), 5);
    }

    #[tokio::test]
    async fn test_low_confidence_layer_replaced_by_better_ocr() {
        let analyzer = analyzer(
            FakeBackend::new(RECEIPT, 92.0),
            FakePdf::with_text("pagina escaneada"),
            true,
        )
        .await;

        let result = analyzer.analyze_document(&pdf_bytes(), "scan.pdf").await.unwrap();
        assert_eq!(result.source, ExtractionSource::Hybrid);
        assert_eq!(result.raw_text, RECEIPT);
        assert_eq!(result.confidence, 0.92);
        assert!(result.warnings.iter().any(|w| w.contains("replaced by OCR")));
    }

    #[tokio::test]
    async fn test_low_confidence_layer_kept_when_ocr_is_worse() {
        let analyzer = analyzer(
            FakeBackend::new("ruido", 0.0),
            FakePdf::with_text("pagina escaneada"),
            true,
        )
        .await;

        let result = analyzer.analyze_document(&pdf_bytes(), "scan.pdf").await.unwrap();
        assert_eq!(result.source, ExtractionSource::PrimaryTextLayer);
        assert_eq!(result.raw_text, "pagina escaneada");
        assert!(!result.usable);
    }

    #[tokio::test]
    async fn test_low_confidence_layer_kept_when_ocr_unavailable() {
        let analyzer = analyzer(FakeBackend::failing(), FakePdf::with_text("poco texto"), true).await;

        let result = analyzer.analyze_document(&pdf_bytes(), "scan.pdf").await.unwrap();
        assert_eq!(result.source, ExtractionSource::PrimaryTextLayer);
        assert!(result.warnings.iter().any(|w| w.contains("OCR is unavailable")));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_rescan_timeout_keeps_text_layer() {
        let mut backend = FakeBackend::new(RECEIPT, 95.0);
        backend.delay = Duration::from_millis(300);
        let engine = OcrEngine::new(backend, Duration::from_millis(20));
        engine.initialize("spa").await;
        let analyzer = ReceiptAnalyzer::new(engine, FakePdf::with_text("pagina escaneada"));

        let result = analyzer.analyze_document(&pdf_bytes(), "lento.pdf").await.unwrap();
        assert_eq!(result.source, ExtractionSource::PrimaryTextLayer);
        assert_eq!(result.raw_text, "pagina escaneada");
        assert!(result.warnings.iter().any(|w| w.contains("OCR re-scan failed")));
    }

    #[tokio::test]
    async fn test_rescan_without_page_image_sends_bounded_prefix() {
        let backend = FakeBackend::new("ruido", 0.0);
        let last_input_len = Arc::clone(&backend.last_input_len);
        let engine = OcrEngine::new(backend, Duration::from_secs(5));
        engine.initialize("spa").await;
        let analyzer = ReceiptAnalyzer::new(engine, FakePdf::with_text("pagina escaneada"))
            .with_config(PdfConfig {
                max_ocr_bytes: 64,
                ..Default::default()
            });

        let mut data = b"%PDF-1.7\n".to_vec();
        data.extend(std::iter::repeat_n(0u8, 4096));
        analyzer.analyze_document(&data, "grande.pdf").await.unwrap();
        assert_eq!(last_input_len.load(Ordering::SeqCst), 64);
    }

    #[tokio::test]
    async fn test_rescan_prefers_page_image() {
        let backend = FakeBackend::new("ruido", 0.0);
        let last_input_len = Arc::clone(&backend.last_input_len);
        let pdf = FakePdf {
            text: Some("pagina escaneada".to_string()),
            image: Some(vec![7; 10]),
        };
        let analyzer = analyzer(backend, pdf, true).await;

        analyzer.analyze_document(&pdf_bytes(), "scan.pdf").await.unwrap();
        assert_eq!(last_input_len.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_broken_pdf_falls_back_to_ocr() {
        let analyzer = analyzer(FakeBackend::new(RECEIPT, 80.0), FakePdf::broken(), true).await;

        let result = analyzer.analyze_document(&pdf_bytes(), "roto.pdf").await.unwrap();
        assert_eq!(result.source, ExtractionSource::OcrEngine);
        assert_eq!(result.confidence, 0.8);
        assert!(result.usable);
    }

    #[tokio::test]
    async fn test_broken_pdf_without_ocr_is_unreadable() {
        let analyzer = analyzer(FakeBackend::new(RECEIPT, 80.0), FakePdf::broken(), false).await;

        let err = analyzer
            .analyze_document(&pdf_bytes(), "roto.pdf")
            .await
            .unwrap_err();
        match &err {
            CfeError::AnalysisFailed { filename, path, .. } => {
                assert_eq!(filename, "roto.pdf");
                assert_eq!(path, "primary-text-layer");
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(err.root_kind(), FailureKind::DocumentUnreadable);
    }

    #[tokio::test]
    async fn test_image_requires_ready_engine() {
        let analyzer = analyzer(FakeBackend::new(RECEIPT, 80.0), FakePdf::broken(), false).await;

        let err = analyzer
            .analyze_document(b"\x89PNG....", "foto.png")
            .await
            .unwrap_err();
        assert_eq!(err.root_kind(), FailureKind::OcrNotReady);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_image_goes_through_ocr() {
        let analyzer = analyzer(FakeBackend::new(RECEIPT, 75.0), FakePdf::broken(), true).await;

        let result = analyzer.analyze_document(b"\x89PNG....", "foto.png").await.unwrap();
        assert_eq!(result.source, ExtractionSource::OcrEngine);
        assert_eq!(result.filename, "foto.png");
        assert_eq!(result.confidence, 0.75);
        assert_eq!(
            result.extracted_fields.get("serviceNumber").map(|v| v.to_string()),
            Some("123456789012".to_string())
        );
    }

    #[tokio::test]
    async fn test_unusable_extraction_is_flagged() {
        let analyzer = analyzer(FakeBackend::new("TARIFA: 1C", 90.0), FakePdf::broken(), true).await;

        let result = analyzer.analyze_document(b"\x89PNG", "parcial.png").await.unwrap();
        assert!(!result.usable);
        assert_eq!(result.warnings.len(), 1);
    }
}
