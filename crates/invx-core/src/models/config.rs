//! Configuration structures for the extraction pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::InitError;

/// Main configuration for the invx pipeline.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct InvxConfig {
    /// Document storage configuration.
    pub storage: StorageConfig,

    /// OCR service configuration.
    pub ocr: OcrConfig,

    /// Language model configuration.
    pub llm: LlmConfig,

    /// Currency conversion configuration.
    pub currency: CurrencyConfig,

    /// Report output configuration.
    pub report: ReportConfig,

    /// Retry policy for network calls.
    pub retry: RetryConfig,
}

/// Document storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Base URL of the Drive v3 API.
    pub api_base: String,

    /// Root directory for per-run download folders.
    pub download_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/drive/v3/".to_string(),
            download_dir: PathBuf::from("downloads"),
        }
    }
}

/// OCR service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Image annotation endpoint.
    pub endpoint: String,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://vision.googleapis.com/v1/images:annotate".to_string(),
            timeout_secs: 60,
        }
    }
}

/// Structured extraction strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMode {
    /// One completion request, then JSON location and repair.
    #[default]
    SingleShot,
    /// Bounded reasoning loop with access to the currency tool.
    Agent,
}

/// Language model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the generative language API.
    pub api_base: String,

    /// Model name.
    pub model: String,

    /// Sampling temperature.
    pub temperature: f32,

    /// Extraction strategy.
    pub mode: ExtractionMode,

    /// Maximum model turns in agent mode.
    pub max_agent_turns: usize,

    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://generativelanguage.googleapis.com/v1beta/".to_string(),
            model: "gemini-1.5-flash".to_string(),
            temperature: 0.0,
            mode: ExtractionMode::SingleShot,
            max_agent_turns: 6,
            timeout_secs: 120,
        }
    }
}

/// Currency conversion configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyConfig {
    /// Latest-rates endpoint.
    pub endpoint: String,

    /// Currency every total is converted to.
    pub target: String,
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.currencyapi.com/v3/latest".to_string(),
            target: "INR".to_string(),
        }
    }
}

/// Report output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Directory the report is written to.
    pub output_dir: PathBuf,

    /// Report file name.
    pub filename: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("processed"),
            filename: "invoices_processed.csv".to_string(),
        }
    }
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    pub max_attempts: u32,

    /// Delay before the first retry, in milliseconds.
    pub base_delay_ms: u64,

    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 10_000,
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl InvxConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}

/// Provider secrets, supplied through the environment.
#[derive(Clone)]
pub struct Credentials {
    pub drive_access_token: String,
    pub vision_api_key: String,
    pub gemini_api_key: String,
    pub currency_api_key: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("currency_api_key", &self.currency_api_key.is_some())
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub const DRIVE_ACCESS_TOKEN: &'static str = "DRIVE_ACCESS_TOKEN";
    pub const VISION_API_KEY: &'static str = "VISION_API_KEY";
    pub const GEMINI_API_KEY: &'static str = "GEMINI_API_KEY";
    pub const CURRENCY_API_KEY: &'static str = "CURRENCY_API_KEY";

    /// Read credentials from the process environment.
    pub fn from_env(mode: ExtractionMode) -> Result<Self, InitError> {
        Self::from_lookup(mode, |key| std::env::var(key).ok())
    }

    /// Read credentials through an arbitrary lookup. The currency key is
    /// only required in agent mode.
    pub fn from_lookup<F>(mode: ExtractionMode, lookup: F) -> Result<Self, InitError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &'static str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &'static str| get(key).ok_or(InitError::MissingCredential(key));

        let currency_api_key = get(Self::CURRENCY_API_KEY);
        if mode == ExtractionMode::Agent && currency_api_key.is_none() {
            return Err(InitError::MissingCredential(Self::CURRENCY_API_KEY));
        }

        Ok(Self {
            drive_access_token: require(Self::DRIVE_ACCESS_TOKEN)?,
            vision_api_key: require(Self::VISION_API_KEY)?,
            gemini_api_key: require(Self::GEMINI_API_KEY)?,
            currency_api_key,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: InvxConfig =
            serde_json::from_str(r#"{ "llm": { "mode": "agent" }, "retry": { "max_attempts": 5 } }"#)
                .unwrap();
        assert_eq!(config.llm.mode, ExtractionMode::Agent);
        assert_eq!(config.llm.max_agent_turns, 6);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 2_000);
        assert_eq!(config.currency.target, "INR");
    }

    #[test]
    fn test_credentials_required() {
        let vars = env(&[("DRIVE_ACCESS_TOKEN", "t"), ("GEMINI_API_KEY", "g")]);
        let err = Credentials::from_lookup(ExtractionMode::SingleShot, |k| vars.get(k).cloned())
            .unwrap_err();
        assert!(matches!(err, InitError::MissingCredential("VISION_API_KEY")));
    }

    #[test]
    fn test_currency_key_only_required_for_agent() {
        let vars = env(&[
            ("DRIVE_ACCESS_TOKEN", "t"),
            ("VISION_API_KEY", "v"),
            ("GEMINI_API_KEY", "g"),
            ("CURRENCY_API_KEY", "  "),
        ]);
        let lookup = |k: &str| vars.get(k).cloned();

        let creds = Credentials::from_lookup(ExtractionMode::SingleShot, lookup).unwrap();
        assert!(creds.currency_api_key.is_none());

        let err = Credentials::from_lookup(ExtractionMode::Agent, lookup).unwrap_err();
        assert!(matches!(err, InitError::MissingCredential("CURRENCY_API_KEY")));
    }

    #[test]
    fn test_credentials_debug_hides_secrets() {
        let creds = Credentials {
            drive_access_token: "secret-token".into(),
            vision_api_key: "secret-vision".into(),
            gemini_api_key: "secret-gemini".into(),
            currency_api_key: None,
        };
        assert!(!format!("{creds:?}").contains("secret"));
    }
}
