//! Recovery of a JSON object from free-form model output.

use std::borrow::Cow;

use serde_json::Value;
use tracing::debug;

use crate::error::ExtractionError;

/// Slice from the first `{` to the last `}`.
///
/// Prose and markdown fences around the object are dropped.
pub fn locate_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

/// Apply the bounded syntax repairs, outside string literals only:
/// drop a comma that directly precedes `}` or `]`, and insert a comma
/// between `}` and a following `{`.
///
/// Valid JSON is returned unchanged (borrowed).
pub fn repair_json(text: &str) -> Cow<'_, str> {
    let bytes = text.as_bytes();
    let mut out: Option<String> = None;
    let mut in_string = false;
    let mut escaped = false;
    let mut copied = 0;

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b',' if matches!(next_significant(bytes, i + 1), Some(b'}' | b']')) => {
                let buf = out.get_or_insert_with(|| String::with_capacity(text.len()));
                buf.push_str(&text[copied..i]);
                copied = i + 1;
            }
            b'}' if next_significant(bytes, i + 1) == Some(b'{') => {
                let buf = out.get_or_insert_with(|| String::with_capacity(text.len() + 8));
                buf.push_str(&text[copied..=i]);
                buf.push(',');
                copied = i + 1;
            }
            _ => {}
        }
    }

    match out {
        Some(mut buf) => {
            buf.push_str(&text[copied..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(text),
    }
}

fn next_significant(bytes: &[u8], from: usize) -> Option<u8> {
    bytes[from..].iter().copied().find(|b| !b.is_ascii_whitespace())
}

/// Locate, parse and, if needed, repair-then-reparse the model's JSON.
pub fn parse_model_json(text: &str) -> Result<Value, ExtractionError> {
    let candidate = locate_object(text)
        .ok_or_else(|| ExtractionError::NoJson("no '{' ... '}' span in response".to_string()))?;

    match serde_json::from_str(candidate) {
        Ok(value) => Ok(value),
        Err(first) => {
            let repaired = repair_json(candidate);
            if matches!(repaired, Cow::Borrowed(_)) {
                return Err(ExtractionError::NoJson(first.to_string()));
            }
            debug!("Model JSON did not parse ({}), retrying after repair", first);
            serde_json::from_str(&repaired).map_err(|e| ExtractionError::NoJson(e.to_string()))
        }
    }
}
