//! Google Cloud Vision `images:annotate` adapter.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::OcrProvider;
use crate::error::{InitError, ProviderError};
use crate::models::config::OcrConfig;

/// Vision API client using an API key.
#[derive(Clone)]
pub struct VisionClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl fmt::Debug for VisionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VisionClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<Status>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Status {
    #[serde(default)]
    message: String,
}

impl VisionClient {
    pub fn new(api_key: String, config: &OcrConfig) -> Result<Self, InitError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| InitError::Client {
                provider: "vision",
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }
}

/// Request body asking for dense text detection on one image.
pub(crate) fn annotate_request(image: &[u8]) -> Value {
    json!({
        "requests": [{
            "image": { "content": STANDARD.encode(image) },
            "features": [{ "type": "TEXT_DETECTION" }]
        }]
    })
}

/// Pull the full-text annotation out of an annotate response.
fn full_text(response: AnnotateResponse) -> Result<String, ProviderError> {
    let first = response
        .responses
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Response("empty annotate response".to_string()))?;

    if let Some(status) = first.error.filter(|s| !s.message.is_empty()) {
        return Err(ProviderError::Response(format!("Vision API error: {}", status.message)));
    }

    Ok(first.full_text_annotation.map(|a| a.text).unwrap_or_default())
}

#[async_trait]
impl OcrProvider for VisionClient {
    async fn recognize(&self, image: &[u8]) -> Result<String, ProviderError> {
        let res = self
            .http
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&annotate_request(image))
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let response: AnnotateResponse = res
            .json()
            .await
            .map_err(|e| ProviderError::Response(format!("invalid annotate response: {}", e.without_url())))?;
        let text = full_text(response)?;
        debug!("OCR recognized {} characters", text.len());
        Ok(text)
    }
}
