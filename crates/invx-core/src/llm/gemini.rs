//! Gemini `generateContent` adapter.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::debug;

use super::LlmProvider;
use crate::error::{InitError, ProviderError};
use crate::models::config::LlmConfig;

/// Gemini client bound to one model.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    url: Url,
    api_key: String,
    temperature: f32,
}

impl fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("url", &self.url.as_str())
            .field("temperature", &self.temperature)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self, InitError> {
        let client_err = |reason: String| InitError::Client {
            provider: "gemini",
            reason,
        };

        let base = Url::parse(&config.api_base).map_err(|e| client_err(e.to_string()))?;
        let url = base
            .join(&format!("models/{}:generateContent", config.model))
            .map_err(|e| client_err(e.to_string()))?;
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| client_err(e.to_string()))?;

        Ok(Self {
            http,
            url,
            api_key,
            temperature: config.temperature,
        })
    }

    fn request_body(&self, prompt: &str) -> Value {
        json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "generationConfig": { "temperature": self.temperature }
        })
    }
}

/// Concatenate the text parts of the first candidate.
fn candidate_text(response: GenerateResponse) -> Result<String, ProviderError> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(ProviderError::Response(format!("prompt rejected: {reason}")));
    };

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(ProviderError::Response(format!("empty completion (finish reason {reason})")));
    }
    Ok(text)
}

#[async_trait]
impl LlmProvider for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        debug!("Sending {} prompt characters to {}", prompt.len(), self.url.path());
        let res = self
            .http
            .post(self.url.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
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

        let response: GenerateResponse = res
            .json()
            .await
            .map_err(|e| ProviderError::Response(format!("invalid generateContent response: {}", e.without_url())))?;
        candidate_text(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(body: &str) -> Result<String, ProviderError> {
        candidate_text(serde_json::from_str(body).unwrap())
    }

    #[test]
    fn test_endpoint_from_config() {
        let client = GeminiClient::new("k".into(), &LlmConfig::default()).unwrap();
        assert_eq!(
            client.url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
        assert!(!format!("{client:?}").contains("\"k\""));
    }

    #[test]
    fn test_request_body() {
        let client = GeminiClient::new("k".into(), &LlmConfig::default()).unwrap();
        let body = client.request_body("hello");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
    }

    #[test]
    fn test_candidate_text_joins_parts() {
        let text = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(text.unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn test_blocked_prompt() {
        let err = parse(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_empty_candidate() {
        let err = parse(r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#).unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[tokio::test]
    async fn test_transport_error_hides_key() {
        let config = LlmConfig {
            api_base: "http://127.0.0.1:9/v1beta/".to_string(),
            ..LlmConfig::default()
        };
        let client = GeminiClient::new("SECRETGEMINI".into(), &config).unwrap();

        let err = client.complete("hello").await.unwrap_err();
        assert!(!err.to_string().contains("SECRETGEMINI"));
        assert!(!format!("{err:?}").contains("SECRETGEMINI"));
    }
}
