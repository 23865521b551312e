//! Structured invoice extraction from raw document text.

mod agent;
pub mod json;
pub mod prompt;

pub use agent::{Agent, AgentOutcome, AgentTurn, ToolCall};

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::currency::{CurrencyConverter, RateProvider};
use crate::error::ExtractionError;
use crate::llm::LlmProvider;
use crate::models::config::{CurrencyConfig, ExtractionMode, LlmConfig};
use crate::models::invoice::InvoiceRecord;

/// Result type for extraction operations.
pub type Result<T> = std::result::Result<T, ExtractionError>;

/// Result of invoice extraction.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    /// Normalized invoice record.
    pub record: InvoiceRecord,
    /// Coercions applied while normalizing.
    pub warnings: Vec<String>,
    /// Model requests spent.
    pub turns: usize,
    /// Processing time in milliseconds.
    pub processing_time_ms: u64,
}

/// Turns raw invoice text into an [`InvoiceRecord`] with a language model.
pub struct StructuredExtractor<'a> {
    llm: &'a dyn LlmProvider,
    mode: ExtractionMode,
    converter: CurrencyConverter<'a>,
    max_turns: usize,
}

impl<'a> StructuredExtractor<'a> {
    /// One JSON-only completion per document.
    pub fn single_shot(llm: &'a dyn LlmProvider) -> Self {
        Self {
            llm,
            mode: ExtractionMode::SingleShot,
            converter: CurrencyConverter::new(None, CurrencyConfig::default().target),
            max_turns: 1,
        }
    }

    /// Tool-using loop with currency conversion.
    pub fn agent(llm: &'a dyn LlmProvider, converter: CurrencyConverter<'a>, max_turns: usize) -> Self {
        Self {
            llm,
            mode: ExtractionMode::Agent,
            converter,
            max_turns: max_turns.max(1),
        }
    }

    /// Build the extractor selected by configuration.
    pub fn from_config(
        llm: &'a dyn LlmProvider,
        rates: Option<&'a dyn RateProvider>,
        llm_config: &LlmConfig,
        currency: &CurrencyConfig,
    ) -> Self {
        match llm_config.mode {
            ExtractionMode::SingleShot => Self::single_shot(llm),
            ExtractionMode::Agent => Self::agent(
                llm,
                CurrencyConverter::new(rates, currency.target.clone()),
                llm_config.max_agent_turns,
            ),
        }
    }

    pub fn mode(&self) -> ExtractionMode {
        self.mode
    }

    /// Extract one invoice from its text.
    pub async fn extract(&self, text: &str) -> Result<ExtractionResult> {
        let start = Instant::now();

        let (value, turns) = match self.mode {
            ExtractionMode::SingleShot => {
                info!("Sending {} characters to the model", text.len());
                let reply = self.llm.complete(&prompt::single_shot(text)).await?;
                (json::parse_model_json(&reply)?, 1)
            }
            ExtractionMode::Agent => {
                let agent = Agent::new(self.llm, &self.converter, self.max_turns);
                let outcome = agent.run(text).await?;
                (outcome.answer, outcome.turns)
            }
        };

        let normalized = InvoiceRecord::from_json(&value)?;
        let mut record = normalized.record;
        let warnings = normalized.warnings;
        for w in &warnings {
            debug!("Normalization: {}", w);
        }

        if self.mode == ExtractionMode::Agent && record.total_amount_inr.is_none() {
            if record.currency.eq_ignore_ascii_case(self.converter.target()) {
                record.total_amount_inr = Some(record.total_amount);
            } else {
                warn!(
                    "Invoice {} has no converted total ({} -> {})",
                    record.invoice_number,
                    record.currency,
                    self.converter.target()
                );
            }
        }

        Ok(ExtractionResult {
            record,
            warnings,
            turns,
            processing_time_ms: start.elapsed().as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::models::invoice::{Amount, NOT_AVAILABLE};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;

    struct Reply(std::result::Result<&'static str, u16>);

    #[async_trait]
    impl LlmProvider for Reply {
        async fn complete(&self, _prompt: &str) -> std::result::Result<String, ProviderError> {
            self.0.map(str::to_string).map_err(|status| ProviderError::Status {
                status,
                body: "unavailable".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_single_shot_repairs_trailing_comma() {
        let llm = Reply(Ok(
            r#"```json
{"InvoiceNumber": "INV-1", "ItemsList": [{"Description": "Cloud", "Quantity": 10, "UnitPrice": 50, "Amount": 500},]}
```"#,
        ));
        let result = StructuredExtractor::single_shot(&llm).extract("text").await.unwrap();

        assert_eq!(result.record.invoice_number, "INV-1");
        assert_eq!(result.record.items_list.len(), 1);
        assert_eq!(result.record.items_list[0].amount, Amount::Value(Decimal::from(500)));
        assert_eq!(result.record.vendor_name, NOT_AVAILABLE);
        assert_eq!(result.record.total_amount, Amount::NotAvailable);
        assert_eq!(result.turns, 1);
    }

    #[tokio::test]
    async fn test_single_shot_failures() {
        let down = Reply(Err(503));
        assert!(matches!(
            StructuredExtractor::single_shot(&down).extract("t").await,
            Err(ExtractionError::ModelUnavailable(_))
        ));

        let prose = Reply(Ok("I could not find an invoice."));
        assert!(matches!(
            StructuredExtractor::single_shot(&prose).extract("t").await,
            Err(ExtractionError::NoJson(_))
        ));
    }

    #[tokio::test]
    async fn test_agent_defaults_converted_total_for_same_currency() {
        let llm = Reply(Ok(
            r#"{"thought": "already INR", "final_answer": {"InvoiceNumber": "A-7", "TotalAmount": 1180, "Currency": "INR"}}"#,
        ));
        let extractor = StructuredExtractor::agent(&llm, CurrencyConverter::new(None, "INR"), 6);
        let result = extractor.extract("text").await.unwrap();

        assert_eq!(result.record.total_amount_inr, Some(Amount::Value(Decimal::from(1180))));
    }

    #[tokio::test]
    async fn test_agent_leaves_foreign_total_unset() {
        let llm = Reply(Ok(
            r#"{"final_answer": {"InvoiceNumber": "A-8", "TotalAmount": 10, "Currency": "USD"}}"#,
        ));
        let extractor = StructuredExtractor::agent(&llm, CurrencyConverter::new(None, "INR"), 6);
        let result = extractor.extract("text").await.unwrap();

        assert_eq!(result.record.total_amount_inr, None);
    }

    #[test]
    fn test_from_config_selects_mode() {
        let llm = Reply(Ok("{}"));
        let mut config = LlmConfig::default();
        let currency = CurrencyConfig::default();
        assert_eq!(
            StructuredExtractor::from_config(&llm, None, &config, &currency).mode(),
            ExtractionMode::SingleShot
        );
        config.mode = ExtractionMode::Agent;
        assert_eq!(
            StructuredExtractor::from_config(&llm, None, &config, &currency).mode(),
            ExtractionMode::Agent
        );
    }
}
