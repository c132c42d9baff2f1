//! In-process document parser: extracts raw text and an inferred page count
//! from PDF, DOCX, and plain-text uploads without any remote service.
//!
//! Grounded on `ingest::pdf::PdfDocument`'s use of `pdf_extract` for
//! in-memory text extraction; `infer` sniffs the upload's real type from its
//! magic bytes rather than trusting the filename extension, the way a
//! production ingest boundary must.

use regex::Regex;
use std::sync::OnceLock;

use crate::error::{Error, Result};

/// Text and structural metadata extracted from an upload.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub text: String,
    pub page_count: Option<u32>,
}

fn page_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"/Type\s*/Page[^s]").unwrap())
}

/// Parses `bytes` into text and an inferred page count.
///
/// `ocr_enabled` indicates this call is the OCR Router's fallback path —
/// for an image-only upload with no embedded text, the in-process parser
/// can do no better than report what little it can infer; it never invokes
/// a real OCR model.
pub fn parse_document(bytes: &[u8], filename: &str, ocr_enabled: bool) -> Result<ParsedDocument> {
    match detect_type(bytes, filename) {
        DocumentType::Pdf => parse_pdf(bytes),
        DocumentType::Docx => parse_docx(bytes),
        DocumentType::Image => parse_image(ocr_enabled),
        DocumentType::PlainText => parse_plain_text(bytes),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentType {
    Pdf,
    Docx,
    Image,
    PlainText,
}

fn detect_type(bytes: &[u8], filename: &str) -> DocumentType {
    if let Some(kind) = infer::get(bytes) {
        let mime = kind.mime_type();
        if mime == "application/pdf" {
            return DocumentType::Pdf;
        }
        if mime == "application/vnd.openxmlformats-officedocument.wordprocessingml.document" {
            return DocumentType::Docx;
        }
        if mime.starts_with("image/") {
            return DocumentType::Image;
        }
    }

    let lower = filename.to_lowercase();
    if lower.ends_with(".pdf") {
        DocumentType::Pdf
    } else if lower.ends_with(".docx") {
        DocumentType::Docx
    } else if lower.ends_with(".png") || lower.ends_with(".jpg") || lower.ends_with(".jpeg") || lower.ends_with(".tiff") {
        DocumentType::Image
    } else {
        DocumentType::PlainText
    }
}

fn parse_pdf(bytes: &[u8]) -> Result<ParsedDocument> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|err| Error::ingest(format!("failed to extract PDF text: {err}")))?;
    let page_count = estimate_pdf_page_count(bytes);
    Ok(ParsedDocument { text, page_count })
}

fn estimate_pdf_page_count(bytes: &[u8]) -> Option<u32> {
    let as_text = String::from_utf8_lossy(bytes);
    let count = page_marker_regex().find_iter(&as_text).count();
    if count > 0 {
        Some(count as u32)
    } else {
        None
    }
}

fn parse_docx(bytes: &[u8]) -> Result<ParsedDocument> {
    let text = docx_lite::extract_text(bytes)
        .map_err(|err| Error::ingest(format!("failed to extract DOCX text: {err}")))?;
    Ok(ParsedDocument { text, page_count: None })
}

fn parse_image(ocr_enabled: bool) -> Result<ParsedDocument> {
    if !ocr_enabled {
        return Err(Error::ingest("image upload requires OCR to extract text"));
    }
    // No in-process OCR model is available; the caller (OCR Router) only
    // reaches here after the remote GPU client has already failed, so an
    // empty body is the best this path can offer.
    Ok(ParsedDocument { text: String::new(), page_count: Some(1) })
}

fn parse_plain_text(bytes: &[u8]) -> Result<ParsedDocument> {
    let text = String::from_utf8_lossy(bytes).into_owned();
    Ok(ParsedDocument { text, page_count: None })
}
