//! Currency conversion tool used by the extraction agent.

mod currencyapi;

pub use currencyapi::CurrencyApiClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::error::ProviderError;

/// Source of exchange rates.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Units of `to` per one unit of `from`.
    async fn rate(&self, from: &str, to: &str) -> Result<f64, ProviderError>;
}

/// Arguments accepted by the `convert_currency` tool.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConvertCurrencyInput {
    pub amount: f64,
    pub from_currency: String,
}

/// Successful conversion, returned to the model as JSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Conversion {
    pub converted_amount: f64,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate: Option<f64>,
}

/// Why a conversion could not be performed.
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("'{0}' is not a three-letter currency code")]
    InvalidCode(String),

    #[error("amount must be a finite number")]
    InvalidAmount,

    #[error("currency rates are not configured")]
    Unavailable,

    #[error("could not fetch {from}->{to} rate: {source}")]
    Rate {
        from: String,
        to: String,
        #[source]
        source: ProviderError,
    },
}

/// Converts invoice totals into the report currency.
pub struct CurrencyConverter<'a> {
    rates: Option<&'a dyn RateProvider>,
    target: String,
}

impl<'a> CurrencyConverter<'a> {
    pub fn new(rates: Option<&'a dyn RateProvider>, target: impl Into<String>) -> Self {
        Self {
            rates,
            target: target.into().to_ascii_uppercase(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Convert `amount` from `from` into the target currency, rounded to
    /// two decimals. Same-currency conversions never touch the rate source.
    pub async fn convert(&self, amount: f64, from: &str) -> Result<Conversion, ConversionError> {
        let from = from.trim().to_ascii_uppercase();
        if from.len() != 3 || !from.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConversionError::InvalidCode(from));
        }
        if !amount.is_finite() {
            return Err(ConversionError::InvalidAmount);
        }

        if from == self.target {
            debug!("{} is already {}, no conversion", amount, self.target);
            return Ok(Conversion {
                converted_amount: amount,
                currency: self.target.clone(),
                rate: None,
            });
        }

        let rates = self.rates.ok_or(ConversionError::Unavailable)?;
        info!("Converting {} {} to {}", amount, from, self.target);
        let rate = rates
            .rate(&from, &self.target)
            .await
            .map_err(|source| ConversionError::Rate {
                from: from.clone(),
                to: self.target.clone(),
                source,
            })?;

        Ok(Conversion {
            converted_amount: round_cents(amount * rate),
            currency: self.target.clone(),
            rate: Some(rate),
        })
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRate {
        rate: Option<f64>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RateProvider for FixedRate {
        async fn rate(&self, _from: &str, _to: &str) -> Result<f64, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.rate
                .ok_or_else(|| ProviderError::Status { status: 503, body: String::new() })
        }
    }

    fn rates(rate: Option<f64>) -> FixedRate {
        FixedRate {
            rate,
            calls: AtomicUsize::new(0),
        }
    }

    #[tokio::test]
    async fn test_same_currency_skips_lookup() {
        let provider = rates(Some(2.0));
        let converter = CurrencyConverter::new(Some(&provider), "INR");

        let result = converter.convert(1312.5, "inr").await.unwrap();
        assert_eq!(
            result,
            Conversion {
                converted_amount: 1312.5,
                currency: "INR".into(),
                rate: None
            }
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_converts_and_rounds() {
        let provider = rates(Some(83.123456));
        let converter = CurrencyConverter::new(Some(&provider), "INR");

        let result = converter.convert(1312.5, "USD").await.unwrap();
        assert_eq!(result.converted_amount, 109099.54);
        assert_eq!(result.rate, Some(83.123456));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_errors_are_descriptive() {
        let provider = rates(None);
        let converter = CurrencyConverter::new(Some(&provider), "INR");

        let err = converter.convert(10.0, "dollars").await.unwrap_err();
        assert!(err.to_string().contains("three-letter"));

        let err = converter.convert(10.0, "USD").await.unwrap_err();
        assert!(err.to_string().contains("USD->INR"));

        let offline = CurrencyConverter::new(None, "INR");
        assert!(matches!(
            offline.convert(10.0, "EUR").await,
            Err(ConversionError::Unavailable)
        ));
    }

    #[test]
    fn test_input_rejects_unknown_fields() {
        let ok: ConvertCurrencyInput =
            serde_json::from_str(r#"{"amount": 5, "from_currency": "EUR"}"#).unwrap();
        assert_eq!(ok.amount, 5.0);
        assert!(serde_json::from_str::<ConvertCurrencyInput>(r#"{"amount": 5}"#).is_err());
        assert!(
            serde_json::from_str::<ConvertCurrencyInput>(
                r#"{"amount": 5, "from_currency": "EUR", "to": "INR"}"#
            )
            .is_err()
        );
    }
}
