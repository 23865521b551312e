//! Prompt templates for the extraction model.

use crate::models::invoice::INVOICE_FIELDS;

const FIELD_RULES: &str = "\
- \"ItemsList\" is an array of objects, each with \"Description\", \"Quantity\", \"UnitPrice\" and \"Amount\". Separate items with commas.
- If a field or item attribute is not present in the text, use the string \"N/A\". Never invent values.
- Subtotal, Tax, TotalAmount, Quantity, UnitPrice and Amount are JSON numbers without currency symbols or thousands separators.
- Dates use YYYY-MM-DD when the text allows it.
- Currency is the three-letter ISO code of the invoice currency.";

fn field_list() -> String {
    INVOICE_FIELDS.join(", ")
}

/// One-request prompt asking for the invoice object and nothing else.
pub fn single_shot(invoice_text: &str) -> String {
    format!(
        "You extract data from invoices.\n\
         Read the invoice text below and answer with exactly one JSON object.\n\n\
         Rules:\n\
         - Use exactly these keys: {fields}.\n\
         {FIELD_RULES}\n\
         - Output only the JSON object, with no text before or after it.\n\n\
         --- INVOICE TEXT ---\n\
         {invoice_text}\n\
         --- END OF TEXT ---\n",
        fields = field_list(),
    )
}

/// Prompt for one agent turn; `transcript` holds the earlier turns and
/// their observations.
pub fn agent(invoice_text: &str, target: &str, transcript: &str) -> String {
    let history = if transcript.is_empty() {
        "(no previous turns)".to_string()
    } else {
        transcript.to_string()
    };

    format!(
        "You extract data from invoices and express the total in {target}.\n\n\
         Available tool:\n\
         - convert_currency: converts an amount to {target}. \
         Input: {{\"amount\": <number>, \"from_currency\": \"<ISO code>\"}}.\n\n\
         Reply with exactly one JSON object per turn, in one of two shapes:\n\
         {{\"thought\": \"...\", \"action\": {{\"tool\": \"convert_currency\", \"input\": {{\"amount\": 1312.5, \"from_currency\": \"USD\"}}}}}}\n\
         {{\"thought\": \"...\", \"final_answer\": {{ ...invoice object... }}}}\n\n\
         Invoice object rules:\n\
         - Use exactly these keys: {fields}, TotalAmountINR.\n\
         {FIELD_RULES}\n\
         - TotalAmountINR is TotalAmount converted to {target} with the tool. \
         If the invoice is already in {target}, use TotalAmount.\n\n\
         --- INVOICE TEXT ---\n\
         {invoice_text}\n\
         --- END OF TEXT ---\n\n\
         Previous turns:\n\
         {history}\n\n\
         Your next turn:\n",
        fields = field_list(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_shot_lists_every_field() {
        let prompt = single_shot("Invoice #: INV-9");
        for field in INVOICE_FIELDS {
            assert!(prompt.contains(field), "{field}");
        }
        assert!(prompt.contains("Invoice #: INV-9"));
        assert!(!prompt.contains("TotalAmountINR"));
    }

    #[test]
    fn test_agent_prompt_carries_transcript() {
        let first = agent("text", "INR", "");
        assert!(first.contains("(no previous turns)"));
        assert!(first.contains("TotalAmountINR"));

        let later = agent("text", "INR", "Observation: {\"converted_amount\": 5.0}");
        assert!(later.contains("converted_amount"));
        assert!(!later.contains("(no previous turns)"));
    }
}
