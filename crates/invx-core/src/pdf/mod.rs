//! PDF processing module.

mod extractor;

pub use extractor::{PdfExtractor, join_pages};

use crate::error::PdfError;

/// Result type for PDF operations.
pub type Result<T> = std::result::Result<T, PdfError>;

/// Trait for PDF processing implementations.
pub trait PdfProcessor {
    /// Load a PDF from bytes.
    fn load(&mut self, data: &[u8]) -> Result<()>;

    /// Extract the text of every page, in page order.
    fn extract_page_texts(&self) -> Result<Vec<String>>;

    /// Extract the text of the whole document, skipping empty pages.
    fn extract_text(&self) -> Result<Option<String>> {
        Ok(join_pages(&self.extract_page_texts()?))
    }
}
