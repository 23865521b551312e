//! currencyapi.com `v3/latest` adapter.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::RateProvider;
use crate::error::{InitError, ProviderError};
use crate::models::config::CurrencyConfig;

#[derive(Clone)]
pub struct CurrencyApiClient {
    http: Client,
    endpoint: String,
    api_key: String,
}

impl fmt::Debug for CurrencyApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CurrencyApiClient")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct LatestResponse {
    #[serde(default)]
    data: HashMap<String, RateEntry>,
}

#[derive(Deserialize)]
struct RateEntry {
    value: f64,
}

impl CurrencyApiClient {
    pub fn new(api_key: String, config: &CurrencyConfig) -> Result<Self, InitError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| InitError::Client {
                provider: "currencyapi",
                reason: e.to_string(),
            })?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            api_key,
        })
    }
}

fn pick_rate(response: LatestResponse, to: &str) -> Result<f64, ProviderError> {
    response
        .data
        .get(to)
        .map(|entry| entry.value)
        .ok_or_else(|| ProviderError::Response(format!("no {to} rate in response")))
}

#[async_trait]
impl RateProvider for CurrencyApiClient {
    async fn rate(&self, from: &str, to: &str) -> Result<f64, ProviderError> {
        let res = self
            .http
            .get(&self.endpoint)
            .header("apikey", &self.api_key)
            .query(&[("base_currency", from), ("currencies", to)])
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

        let response: LatestResponse = res
            .json()
            .await
            .map_err(|e| ProviderError::Response(format!("invalid rates response: {}", e.without_url())))?;
        pick_rate(response, to)
    }
}
