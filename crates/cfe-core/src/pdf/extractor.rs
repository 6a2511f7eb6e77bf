//! PDF text and first-page image extraction using lopdf and pdf-extract.

use std::io::Cursor;

use image::{DynamicImage, ImageBuffer, Rgba};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, trace};

use super::{PdfText, PdfTextExtractor, Result};
use crate::error::PdfError;

/// Text-layer extractor backed by lopdf (structure) and pdf-extract (text).
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfExtractor;

impl LopdfExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Parse the document, decrypting empty-password PDFs.
    ///
    /// Returns the document together with the bytes pdf-extract should read.
    fn load(&self, data: &[u8]) -> Result<(Document, Vec<u8>)> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        let raw = if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            let mut decrypted = Vec::new();
            doc.save_to(&mut decrypted)
                .map_err(|e| PdfError::Parse(format!("failed to save decrypted PDF: {}", e)))?;
            decrypted
        } else {
            data.to_vec()
        };

        if doc.get_pages().is_empty() {
            return Err(PdfError::NoPages);
        }

        Ok((doc, raw))
    }

    fn page_images(&self, doc: &Document, page_id: ObjectId) -> Vec<Vec<u8>> {
        let mut images = Vec::new();

        let Some(resources) = page_resources(doc, page_id) else {
            return images;
        };
        let Ok(xobjects) = resources.get(b"XObject") else {
            return images;
        };
        if let Ok((_, Object::Dictionary(xobj_dict))) = doc.dereference(xobjects) {
            for (_name, obj_ref) in xobj_dict.iter() {
                if let Ok((_, obj)) = doc.dereference(obj_ref) {
                    if let Some(encoded) = encode_image_object(doc, obj) {
                        images.push(encoded);
                    }
                }
            }
        }

        images
    }
}

impl PdfTextExtractor for LopdfExtractor {
    fn extract(&self, data: &[u8]) -> Result<PdfText> {
        let (doc, raw) = self.load(data)?;
        let page_count = doc.get_pages().len() as u32;

        let text = pdf_extract::extract_text_from_mem(&raw)
            .map_err(|e| PdfError::TextExtraction(e.to_string()))?;

        debug!(page_count, chars = text.len(), "Extracted PDF text layer");
        Ok(PdfText { text, page_count })
    }

    fn first_page_image(&self, data: &[u8]) -> Option<Vec<u8>> {
        let (doc, _) = self.load(data).ok()?;
        let pages = doc.get_pages();
        let (_, page_id) = pages.iter().next()?;

        // Scanned receipts carry one full-page image; take the largest.
        let image = self
            .page_images(&doc, *page_id)
            .into_iter()
            .max_by_key(|bytes| bytes.len());

        debug!(found = image.is_some(), "Looked for first-page image");
        image
    }
}

/// Resources dictionary for a page, following `Parent` inheritance.
fn page_resources(doc: &Document, node_id: ObjectId) -> Option<Dictionary> {
    let Object::Dictionary(dict) = doc.get_object(node_id).ok()? else {
        return None;
    };

    if let Ok(resources) = dict.get(b"Resources") {
        if let Ok((_, Object::Dictionary(res_dict))) = doc.dereference(resources) {
            return Some(res_dict.clone());
        }
    }

    match dict.get(b"Parent") {
        Ok(Object::Reference(parent_id)) => page_resources(doc, *parent_id),
        _ => None,
    }
}

/// Encode an image XObject as bytes an OCR backend can decode.
fn encode_image_object(doc: &Document, obj: &Object) -> Option<Vec<u8>> {
    let Object::Stream(stream) = obj else {
        return None;
    };
    let dict = &stream.dict;

    if dict.get(b"Subtype").ok()?.as_name().ok()? != b"Image" {
        return None;
    }

    let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
    let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;
    trace!("Found image object: {}x{}", width, height);

    if let Ok(filter) = dict.get(b"Filter") {
        let filter_name = match filter {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            _ => None,
        };

        match filter_name {
            // JPEG streams are already a decodable file.
            Some(b"DCTDecode") => return Some(stream.content.clone()),
            Some(b"JPXDecode") | Some(b"CCITTFaxDecode") | Some(b"JBIG2Decode") => {
                trace!("Skipping unsupported image filter");
                return None;
            }
            _ => {}
        }
    }

    let data = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());

    let color_space = dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|o| match o {
            Object::Name(name) => Some(name.as_slice()),
            Object::Array(arr) => arr.first().and_then(|o| o.as_name().ok()),
            Object::Reference(r) => doc.get_object(*r).ok().and_then(|o| o.as_name().ok()),
            _ => None,
        })
        .unwrap_or(b"DeviceRGB");

    let bits = dict
        .get(b"BitsPerComponent")
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(8);
    if bits != 8 {
        trace!("Unsupported bits per component: {}", bits);
        return None;
    }

    let image = raw_to_image(&data, width, height, color_space)?;
    let mut encoded = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut encoded), image::ImageFormat::Png)
        .ok()?;
    Some(encoded)
}

fn raw_to_image(data: &[u8], width: u32, height: u32, color_space: &[u8]) -> Option<DynamicImage> {
    let pixels = (width as usize) * (height as usize);
    let mut rgba = Vec::with_capacity(pixels * 4);

    match color_space {
        b"DeviceRGB" | b"RGB" if data.len() >= pixels * 3 => {
            for chunk in data[..pixels * 3].chunks_exact(3) {
                rgba.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
            }
        }
        b"DeviceGray" | b"G" if data.len() >= pixels => {
            for &gray in &data[..pixels] {
                rgba.extend_from_slice(&[gray, gray, gray, 255]);
            }
        }
        _ => {
            trace!(
                "Could not decode image: data_len={}, colorspace={:?}",
                data.len(),
                String::from_utf8_lossy(color_space)
            );
            return None;
        }
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, rgba).map(DynamicImage::ImageRgba8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_pdf_is_a_parse_error() {
        let err = LopdfExtractor::new()
            .extract(b"%PDF-1.4\nthis is not a pdf")
            .unwrap_err();
        assert!(matches!(err, PdfError::Parse(_) | PdfError::NoPages));
    }

    #[test]
    fn malformed_pdf_has_no_page_image() {
        assert!(LopdfExtractor::new().first_page_image(b"garbage").is_none());
    }

    #[test]
    fn gray_pixels_expand_to_rgba() {
        let image = raw_to_image(&[0, 128, 255, 64], 2, 2, b"DeviceGray").unwrap();
        assert_eq!(image.width(), 2);
        assert_eq!(image.to_rgba8().get_pixel(1, 0).0, [128, 128, 128, 255]);
    }

    #[test]
    fn short_rgb_buffer_is_rejected() {
        assert!(raw_to_image(&[1, 2, 3], 2, 2, b"DeviceRGB").is_none());
    }
}
