//! PDF text-layer extraction.

mod extractor;

pub use extractor::LopdfExtractor;

use crate::error::PdfError;

/// PDF files start with this marker.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Whether the bytes look like a PDF document.
pub fn is_pdf(data: &[u8]) -> bool {
    data.len() >= PDF_MAGIC.len() && &data[..PDF_MAGIC.len()] == PDF_MAGIC
}

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Text recovered from a PDF text layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfText {
    pub text: String,
    pub page_count: u32,
}

/// Boundary to a PDF text-layer extractor.
pub trait PdfTextExtractor: Send + Sync {
    /// Extract the embedded text layer. Fails on malformed PDFs.
    fn extract(&self, data: &[u8]) -> Result<PdfText>;

    /// Encoded image of the first page, used as OCR input when the text layer is poor.
    fn first_page_image(&self, _data: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_magic() {
        assert!(is_pdf(b"%PDF-1.7\n..."));
        assert!(!is_pdf(b"\x89PNG\r\n"));
        assert!(!is_pdf(b"%PD"));
    }
}
