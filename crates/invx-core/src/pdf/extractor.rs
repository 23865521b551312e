//! PDF text extraction using lopdf and pdf-extract.

use lopdf::Document;
use tracing::{debug, trace};

use super::{PdfProcessor, Result};
use crate::error::PdfError;

/// PDF content extractor using lopdf.
pub struct PdfExtractor {
    document: Option<Document>,
    raw_data: Vec<u8>,
}

impl PdfExtractor {
    /// Create a new PDF extractor.
    pub fn new() -> Self {
        Self {
            document: None,
            raw_data: Vec::new(),
        }
    }

    /// Per-page text through lopdf's content stream decoder.
    fn lopdf_page_texts(&self) -> Result<Vec<String>> {
        let doc = self
            .document
            .as_ref()
            .ok_or_else(|| PdfError::Parse("No document loaded".to_string()))?;

        let mut pages = Vec::new();
        for page_num in doc.get_pages().keys() {
            let text = doc.extract_text(&[*page_num]).unwrap_or_else(|e| {
                trace!("lopdf could not read page {}: {}", page_num, e);
                String::new()
            });
            pages.push(text);
        }
        Ok(pages)
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfProcessor for PdfExtractor {
    fn load(&mut self, data: &[u8]) -> Result<()> {
        let mut doc = Document::load_mem(data).map_err(|e| PdfError::Parse(e.to_string()))?;

        // Handle PDFs with empty password encryption
        if doc.is_encrypted() {
            if doc.decrypt("").is_err() {
                return Err(PdfError::Encrypted);
            }
            debug!("Decrypted PDF with empty password");

            // pdf-extract needs the decrypted bytes
            let mut decrypted_data = Vec::new();
            doc.save_to(&mut decrypted_data)
                .map_err(|e| PdfError::Parse(format!("Failed to save decrypted PDF: {}", e)))?;
            self.raw_data = decrypted_data;
        } else {
            self.raw_data = data.to_vec();
        }

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(PdfError::NoPages);
        }

        debug!("Loaded PDF with {} pages", page_count);
        self.document = Some(doc);
        Ok(())
    }

    fn extract_page_texts(&self) -> Result<Vec<String>> {
        if self.document.is_none() {
            return Err(PdfError::Parse("No document loaded".to_string()));
        }

        match pdf_extract::extract_text_from_mem_by_pages(&self.raw_data) {
            Ok(pages) => Ok(pages),
            Err(e) => {
                debug!("pdf-extract failed ({}), falling back to lopdf", e);
                self.lopdf_page_texts()
            }
        }
    }
}

/// Join page texts with newlines, skipping pages without text.
///
/// Returns `None` when every page is empty.
pub fn join_pages<S: AsRef<str>>(pages: &[S]) -> Option<String> {
    let non_empty: Vec<&str> = pages
        .iter()
        .map(|p| p.as_ref().trim_matches(|c: char| c == '\n' || c == '\r' || c == '\u{c}'))
        .filter(|p| !p.trim().is_empty())
        .collect();

    if non_empty.is_empty() {
        None
    } else {
        Some(non_empty.join("\n"))
    }
}
