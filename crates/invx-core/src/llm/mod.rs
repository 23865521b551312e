//! Text-completion model access.

mod gemini;

pub use gemini::GeminiClient;

use async_trait::async_trait;

use crate::error::ProviderError;

/// A language model that completes a text prompt.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Complete the prompt and return the model's text.
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError>;
}
