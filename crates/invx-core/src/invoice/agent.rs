//! Bounded tool-using extraction loop.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::json::parse_model_json;
use super::prompt;
use crate::currency::{ConvertCurrencyInput, CurrencyConverter};
use crate::error::ExtractionError;
use crate::llm::LlmProvider;

/// Calls the model may request. Unknown names fail deserialization.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "tool", content = "input", rename_all = "snake_case")]
pub enum ToolCall {
    ConvertCurrency(ConvertCurrencyInput),
}

/// One parsed model turn.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentTurn {
    Act { thought: String, call: ToolCall },
    Finish { thought: String, answer: Value },
}

#[derive(Deserialize)]
struct RawTurn {
    #[serde(default)]
    thought: Option<String>,
    action: Option<RawAction>,
    final_answer: Option<Value>,
}

#[derive(Deserialize)]
struct RawAction {
    tool: String,
    #[serde(default)]
    input: Value,
}

impl AgentTurn {
    /// Parse a model reply; the error is the corrective message fed back
    /// to the model.
    pub fn parse(reply: &str) -> Result<Self, String> {
        let value = parse_model_json(reply).map_err(|e| format!("reply is not a JSON object ({e})"))?;
        let raw: RawTurn =
            serde_json::from_value(value).map_err(|e| format!("reply has the wrong shape ({e})"))?;
        let thought = raw.thought.unwrap_or_default();

        match (raw.action, raw.final_answer) {
            (Some(_), Some(_)) => Err("give either \"action\" or \"final_answer\", not both".into()),
            (None, None) => Err("reply must contain \"action\" or \"final_answer\"".into()),
            (None, Some(answer)) => Ok(AgentTurn::Finish { thought, answer }),
            (Some(action), None) => {
                // Tool input sometimes arrives as a JSON-encoded string.
                let input = match action.input {
                    Value::String(s) => serde_json::from_str(&s).unwrap_or(Value::String(s)),
                    other => other,
                };
                let call = serde_json::from_value(json!({ "tool": action.tool, "input": input }))
                    .map_err(|e| format!("invalid action for tool '{}': {e}", action.tool))?;
                Ok(AgentTurn::Act { thought, call })
            }
        }
    }
}

/// Final invoice object and the number of model turns spent.
#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub answer: Value,
    pub turns: usize,
}

/// Runs the think/act/observe loop until a final answer or the turn budget.
pub struct Agent<'a> {
    llm: &'a dyn LlmProvider,
    converter: &'a CurrencyConverter<'a>,
    max_turns: usize,
}

impl<'a> Agent<'a> {
    pub fn new(llm: &'a dyn LlmProvider, converter: &'a CurrencyConverter<'a>, max_turns: usize) -> Self {
        Self {
            llm,
            converter,
            max_turns,
        }
    }

    pub async fn run(&self, invoice_text: &str) -> Result<AgentOutcome, ExtractionError> {
        let mut transcript = String::new();

        for turn in 1..=self.max_turns {
            let prompt = prompt::agent(invoice_text, self.converter.target(), &transcript);
            let reply = self.llm.complete(&prompt).await?;

            let observation = match AgentTurn::parse(&reply) {
                Ok(AgentTurn::Finish { thought, answer }) => match final_object(answer) {
                    Ok(answer) => {
                        info!("Agent finished after {} turn(s)", turn);
                        debug!("Final thought: {}", thought);
                        return Ok(AgentOutcome { answer, turns: turn });
                    }
                    Err(msg) => {
                        warn!("Agent turn {}: {}", turn, msg);
                        format!("Error: {msg}")
                    }
                },
                Ok(AgentTurn::Act { thought, call }) => {
                    debug!("Agent turn {}: {}", turn, thought);
                    self.invoke(call).await
                }
                Err(msg) => {
                    warn!("Agent turn {}: {}", turn, msg);
                    format!("Error: {msg}. Reply with one JSON object as described.")
                }
            };

            transcript.push_str(&format!(
                "Turn {turn}:\n{}\nObservation: {observation}\n\n",
                reply.trim()
            ));
        }

        Err(ExtractionError::BudgetExhausted(self.max_turns))
    }

    async fn invoke(&self, call: ToolCall) -> String {
        match call {
            ToolCall::ConvertCurrency(input) => {
                match self.converter.convert(input.amount, &input.from_currency).await {
                    Ok(conversion) => serde_json::to_string(&conversion)
                        .unwrap_or_else(|e| format!("Error: could not encode result: {e}")),
                    Err(e) => format!("Error: {e}"),
                }
            }
        }
    }
}

/// A final answer must be an invoice object; a string is searched for one.
fn final_object(answer: Value) -> Result<Value, String> {
    let value = match answer {
        Value::String(s) => parse_model_json(&s).map_err(|e| format!("final_answer: {e}"))?,
        other => other,
    };
    if value.is_object() {
        Ok(value)
    } else {
        Err("final_answer must be the invoice JSON object".to_string())
    }
}
