//! Plain-text recovery from fetched documents.

use image::ImageFormat;
use tracing::{debug, info, warn};

use crate::ocr::OcrProvider;
use crate::pdf::{PdfExtractor, PdfProcessor};
use crate::source::FetchedDocument;

/// Raster formats submitted to OCR.
const OCR_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
];

/// Text-extraction strategy for a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Paginated document read page by page.
    Pdf,
    /// Raster image sent to OCR.
    Image(ImageFormat),
    /// Anything else.
    Unsupported,
}

impl DocumentKind {
    /// Classify by file extension (case-insensitive).
    pub fn from_extension(extension: Option<&str>) -> Self {
        let Some(ext) = extension.map(str::to_ascii_lowercase) else {
            return DocumentKind::Unsupported;
        };
        if ext == "pdf" {
            return DocumentKind::Pdf;
        }
        match ImageFormat::from_extension(&ext) {
            Some(format) if OCR_FORMATS.contains(&format) => DocumentKind::Image(format),
            _ => DocumentKind::Unsupported,
        }
    }
}

/// Extract the text of a PDF held in memory.
///
/// `None` when the document cannot be read or every page is empty.
pub fn pdf_text(data: &[u8]) -> Option<String> {
    let mut extractor = PdfExtractor::new();
    if let Err(e) = extractor.load(data) {
        warn!("Error parsing PDF: {}", e);
        return None;
    }
    match extractor.extract_text() {
        Ok(text) => text,
        Err(e) => {
            warn!("Error extracting PDF text: {}", e);
            None
        }
    }
}

/// Dispatches documents to the PDF reader or the OCR service.
pub struct TextExtractor<'a> {
    ocr: &'a dyn OcrProvider,
}

impl<'a> TextExtractor<'a> {
    pub fn new(ocr: &'a dyn OcrProvider) -> Self {
        Self { ocr }
    }

    /// Recover the text of a fetched document.
    ///
    /// Faults are logged and reported as `None`; images without text yield
    /// an empty string.
    pub async fn extract(&self, doc: &FetchedDocument) -> Option<String> {
        let kind = DocumentKind::from_extension(doc.extension.as_deref());
        if kind == DocumentKind::Unsupported {
            warn!(
                "Unsupported file type {:?}, skipping {}",
                doc.extension.as_deref().unwrap_or(""),
                doc.title
            );
            return None;
        }

        let data = match tokio::fs::read(&doc.path).await {
            Ok(data) => data,
            Err(e) => {
                warn!("Could not read {}: {}", doc.path.display(), e);
                return None;
            }
        };

        match kind {
            DocumentKind::Pdf => {
                info!("Parsing PDF {}", doc.title);
                match tokio::task::spawn_blocking(move || pdf_text(&data)).await {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("PDF parsing task failed: {}", e);
                        None
                    }
                }
            }
            DocumentKind::Image(format) => {
                if let Ok(actual) = image::guess_format(&data) {
                    if actual != format {
                        debug!("{} looks like {:?}, not {:?}", doc.title, actual, format);
                    }
                }
                info!("Running OCR on {}", doc.title);
                match self.ocr.recognize(&data).await {
                    Ok(text) => {
                        if text.is_empty() {
                            info!("No text found in image {}", doc.title);
                        }
                        Some(text)
                    }
                    Err(e) => {
                        warn!("Error running OCR on {}: {}", doc.title, e);
                        None
                    }
                }
            }
            DocumentKind::Unsupported => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedOcr {
        result: Option<&'static str>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl OcrProvider for FixedOcr {
        async fn recognize(&self, _image: &[u8]) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .map(str::to_string)
                .ok_or_else(|| ProviderError::Response("quota exceeded".into()))
        }
    }

    fn ocr(result: Option<&'static str>) -> FixedOcr {
        FixedOcr {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    fn write(dir: &std::path::Path, name: &str, data: &[u8]) -> FetchedDocument {
        let path = dir.join(name);
        std::fs::write(&path, data).unwrap();
        FetchedDocument::new(name, path)
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(DocumentKind::from_extension(Some("PDF")), DocumentKind::Pdf);
        assert_eq!(
            DocumentKind::from_extension(Some("jpeg")),
            DocumentKind::Image(ImageFormat::Jpeg)
        );
        assert_eq!(
            DocumentKind::from_extension(Some("tif")),
            DocumentKind::Image(ImageFormat::Tiff)
        );
        assert_eq!(DocumentKind::from_extension(Some("gif")), DocumentKind::Unsupported);
        assert_eq!(DocumentKind::from_extension(Some("docx")), DocumentKind::Unsupported);
        assert_eq!(DocumentKind::from_extension(None), DocumentKind::Unsupported);
    }

    #[tokio::test]
    async fn test_image_goes_to_ocr() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = ocr(Some("INVOICE INV-7"));
        let extractor = TextExtractor::new(&provider);

        let doc = write(tmp.path(), "scan.PNG", b"\x89PNG\r\n\x1a\n");
        assert_eq!(extractor.extract(&doc).await.as_deref(), Some("INVOICE INV-7"));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_image_without_text_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = ocr(Some(""));
        let extractor = TextExtractor::new(&provider);

        let doc = write(tmp.path(), "blank.jpg", b"jpeg");
        assert_eq!(extractor.extract(&doc).await.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_ocr_fault_is_none() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = ocr(None);
        let extractor = TextExtractor::new(&provider);

        let doc = write(tmp.path(), "scan.bmp", b"BM");
        assert_eq!(extractor.extract(&doc).await, None);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsupported_and_broken_pdf_are_none() {
        let tmp = tempfile::tempdir().unwrap();
        let provider = ocr(Some("unused"));
        let extractor = TextExtractor::new(&provider);

        let docx = write(tmp.path(), "notes.docx", b"PK");
        assert_eq!(extractor.extract(&docx).await, None);

        let pdf = write(tmp.path(), "broken.pdf", b"%PDF-1.4 truncated");
        assert_eq!(extractor.extract(&pdf).await, None);

        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }
}
