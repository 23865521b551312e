//! Image OCR through a remote text-detection service.

mod vision;

pub use vision::VisionClient;

use async_trait::async_trait;

use crate::error::ProviderError;

/// Recognizes the text of one raster image.
#[async_trait]
pub trait OcrProvider: Send + Sync {
    /// Full-text annotation of the image; an empty string when the
    /// service found no text.
    async fn recognize(&self, image: &[u8]) -> Result<String, ProviderError>;
}
