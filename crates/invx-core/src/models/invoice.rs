//! Invoice record model produced by structured extraction.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::ExtractionError;

/// Placeholder for any field absent from the source text.
pub const NOT_AVAILABLE: &str = "N/A";

/// The eleven top-level fields every record carries, in report order.
pub const INVOICE_FIELDS: [&str; 11] = [
    "InvoiceNumber",
    "InvoiceDate",
    "VendorName",
    "CustomerName",
    "GSTIN",
    "Subtotal",
    "Tax",
    "TotalAmount",
    "Currency",
    "PaymentTerms",
    "ItemsList",
];

/// A numeric invoice value or the "N/A" sentinel.
///
/// Serializes as a JSON number or the literal string `"N/A"`, never as a
/// number formatted as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Amount {
    Value(Decimal),
    NotAvailable,
}

impl Amount {
    /// Coerce a loosely-typed model value into an amount.
    ///
    /// Returns the amount and whether the input had to be coerced
    /// (numeric text, or text that is not a number at all).
    fn coerce(value: Option<&Value>) -> (Self, Coercion) {
        match value {
            None | Some(Value::Null) => (Amount::NotAvailable, Coercion::Missing),
            Some(Value::Number(n)) => match decimal_from_json_number(n) {
                Some(d) => (Amount::Value(d), Coercion::None),
                None => (Amount::NotAvailable, Coercion::Dropped),
            },
            Some(Value::String(s)) => {
                let trimmed = s.trim();
                if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(NOT_AVAILABLE) {
                    return (Amount::NotAvailable, Coercion::None);
                }
                match parse_amount(trimmed) {
                    Some(d) => (Amount::Value(d), Coercion::FromText),
                    None => (Amount::NotAvailable, Coercion::Dropped),
                }
            }
            Some(_) => (Amount::NotAvailable, Coercion::Dropped),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Value(v) => write!(f, "{}", v.normalize()),
            Amount::NotAvailable => f.write_str(NOT_AVAILABLE),
        }
    }
}

impl From<Decimal> for Amount {
    fn from(value: Decimal) -> Self {
        Amount::Value(value)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Amount::NotAvailable => serializer.serialize_str(NOT_AVAILABLE),
            Amount::Value(v) if v.fract().is_zero() => match v.to_i64() {
                Some(i) => serializer.serialize_i64(i),
                None => serializer.serialize_f64(v.to_f64().unwrap_or_default()),
            },
            Amount::Value(v) => serializer.serialize_f64(v.to_f64().unwrap_or_default()),
        }
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a number or \"N/A\"")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
                Ok(Amount::Value(Decimal::from(v)))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
                Ok(Amount::Value(Decimal::from(v)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
                Decimal::try_from(v)
                    .map(Amount::Value)
                    .map_err(|_| E::custom(format!("amount out of range: {v}")))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
                if v.trim().eq_ignore_ascii_case(NOT_AVAILABLE) {
                    Ok(Amount::NotAvailable)
                } else {
                    Err(E::invalid_value(de::Unexpected::Str(v), &self))
                }
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Coercion {
    None,
    Missing,
    FromText,
    Dropped,
}

/// One line of an invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LineItem {
    pub description: String,
    pub quantity: Amount,
    pub unit_price: Amount,
    pub amount: Amount,
}

/// Normalized invoice fields extracted from one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InvoiceRecord {
    pub invoice_number: String,
    pub invoice_date: String,
    pub vendor_name: String,
    pub customer_name: String,
    #[serde(rename = "GSTIN")]
    pub gstin: String,
    pub subtotal: Amount,
    pub tax: Amount,
    pub total_amount: Amount,
    pub currency: String,
    pub payment_terms: String,
    pub items_list: Vec<LineItem>,

    /// Total converted to the report currency (agent mode only).
    #[serde(
        rename = "TotalAmountINR",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub total_amount_inr: Option<Amount>,

    /// Title of the document this record came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

/// A record together with the coercions applied to build it.
#[derive(Debug, Clone)]
pub struct NormalizedRecord {
    pub record: InvoiceRecord,
    pub warnings: Vec<String>,
}

impl InvoiceRecord {
    /// Build a record from the model's JSON object, filling every missing
    /// field with "N/A" and coercing numeric text to numbers.
    pub fn from_json(value: &Value) -> Result<NormalizedRecord, ExtractionError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ExtractionError::NotAnObject(type_name(value).to_string()))?;

        let mut warnings = Vec::new();
        let items_list = match obj.get("ItemsList") {
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .filter_map(|(idx, item)| match item.as_object() {
                    Some(line) => Some(LineItem {
                        description: text(line.get("Description")),
                        quantity: coerce_amount("Quantity", line, &mut warnings),
                        unit_price: coerce_amount("UnitPrice", line, &mut warnings),
                        amount: coerce_amount("Amount", line, &mut warnings),
                    }),
                    None => {
                        warnings.push(format!("ItemsList[{idx}]: not an object, dropped"));
                        None
                    }
                })
                .collect(),
            None | Some(Value::Null) | Some(Value::String(_)) => Vec::new(),
            Some(other) => {
                warnings.push(format!("ItemsList: expected an array, got {}", type_name(other)));
                Vec::new()
            }
        };

        let total_amount_inr = obj
            .get("TotalAmountINR")
            .map(|_| coerce_amount("TotalAmountINR", obj, &mut warnings));

        let record = InvoiceRecord {
            invoice_number: text(obj.get("InvoiceNumber")),
            invoice_date: normalize_date(text(obj.get("InvoiceDate")), &mut warnings),
            vendor_name: text(obj.get("VendorName")),
            customer_name: text(obj.get("CustomerName")),
            gstin: text(obj.get("GSTIN")),
            subtotal: coerce_amount("Subtotal", obj, &mut warnings),
            tax: coerce_amount("Tax", obj, &mut warnings),
            total_amount: coerce_amount("TotalAmount", obj, &mut warnings),
            currency: text(obj.get("Currency")),
            payment_terms: text(obj.get("PaymentTerms")),
            items_list,
            total_amount_inr,
            source_file: None,
        };

        Ok(NormalizedRecord { record, warnings })
    }

    /// Tag the record with the title of its originating document.
    pub fn with_source(mut self, title: impl Into<String>) -> Self {
        self.source_file = Some(title.into());
        self
    }
}

fn coerce_amount(key: &str, src: &Map<String, Value>, warnings: &mut Vec<String>) -> Amount {
    let (amount, coercion) = Amount::coerce(src.get(key));
    match coercion {
        Coercion::FromText => warnings.push(format!("{key}: numeric text coerced to number")),
        Coercion::Dropped => {
            warnings.push(format!("{key}: value is not a number, using {NOT_AVAILABLE}"))
        }
        Coercion::None | Coercion::Missing => {}
    }
    amount
}

/// Day-first and long-form layouts rewritten to ISO dates.
const DATE_FORMATS: [&str; 9] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d, %Y",
    "%b %d, %Y",
];

/// Rewrite a recognizable date as `YYYY-MM-DD`; anything else is kept.
fn normalize_date(date: String, warnings: &mut Vec<String>) -> String {
    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&date, fmt).ok());
    match parsed {
        Some(d) => {
            let iso = d.format("%Y-%m-%d").to_string();
            if iso != date {
                warnings.push(format!("InvoiceDate: '{date}' rewritten as {iso}"));
            }
            iso
        }
        None => date,
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn decimal_from_json_number(n: &serde_json::Number) -> Option<Decimal> {
    if let Some(i) = n.as_i64() {
        return Some(Decimal::from(i));
    }
    if let Some(u) = n.as_u64() {
        return Some(Decimal::from(u));
    }
    let repr = n.to_string();
    Decimal::from_str(&repr)
        .or_else(|_| Decimal::from_scientific(&repr))
        .ok()
}

/// Parse an amount written as text (e.g. "1,250.00", "$62.50", "1 234,56").
///
/// Currency symbols and codes are ignored. A lone comma followed by
/// exactly three digits is read as a thousands separator, otherwise as
/// the decimal separator.
pub fn parse_amount(s: &str) -> Option<Decimal> {
    let negative = s.trim_start().starts_with('-') || (s.contains('(') && s.contains(')'));

    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return None;
    }

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(c), None) => {
            let after = &cleaned[c + 1..];
            if after.len() == 3 || cleaned.matches(',').count() > 1 {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (None, _) => cleaned,
    };

    let value = Decimal::from_str(&normalized).ok()?;
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1250.00"), Some(dec("1250.00")));
        assert_eq!(parse_amount("1,250.00"), Some(dec("1250.00")));
        assert_eq!(parse_amount("$62.50"), Some(dec("62.50")));
        assert_eq!(parse_amount("1 234,56 PLN"), Some(dec("1234.56")));
        assert_eq!(parse_amount("1,250"), Some(dec("1250")));
        assert_eq!(parse_amount("12,5"), Some(dec("12.5")));
        assert_eq!(parse_amount("₹ 12,34,567.00"), Some(dec("1234567.00")));
        assert_eq!(parse_amount("-40.00"), Some(dec("-40.00")));
        assert_eq!(parse_amount("none"), None);
    }

    #[test]
    fn test_dates_normalized_to_iso() {
        let mut warnings = Vec::new();
        assert_eq!(normalize_date("26/08/2025".into(), &mut warnings), "2025-08-26");
        assert_eq!(normalize_date("26 August 2025".into(), &mut warnings), "2025-08-26");
        assert_eq!(warnings.len(), 2);

        assert_eq!(normalize_date("2025-08-26".into(), &mut warnings), "2025-08-26");
        assert_eq!(normalize_date("N/A".into(), &mut warnings), "N/A");
        assert_eq!(normalize_date("Q3 2025".into(), &mut warnings), "Q3 2025");
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_missing_fields_become_sentinel() {
        let normalized = InvoiceRecord::from_json(&json!({ "InvoiceNumber": "INV-1" })).unwrap();
        let record = normalized.record;

        assert_eq!(record.invoice_number, "INV-1");
        assert_eq!(record.vendor_name, NOT_AVAILABLE);
        assert_eq!(record.gstin, NOT_AVAILABLE);
        assert_eq!(record.subtotal, Amount::NotAvailable);
        assert_eq!(record.total_amount, Amount::NotAvailable);
        assert!(record.items_list.is_empty());
        assert_eq!(record.total_amount_inr, None);
        assert!(normalized.warnings.is_empty());
    }

    #[test]
    fn test_numeric_text_is_coerced() {
        let normalized = InvoiceRecord::from_json(&json!({
            "Subtotal": "1,250.00",
            "Tax": 62.5,
            "TotalAmount": "about a thousand",
            "ItemsList": [
                { "Description": "Cloud Service", "Quantity": "10", "UnitPrice": 50, "Amount": 500.0 }
            ]
        }))
        .unwrap();
        let record = normalized.record;

        assert_eq!(record.subtotal, Amount::Value(dec("1250.00")));
        assert_eq!(record.tax, Amount::Value(dec("62.5")));
        assert_eq!(record.total_amount, Amount::NotAvailable);
        assert_eq!(record.items_list[0].quantity, Amount::Value(dec("10")));
        assert_eq!(normalized.warnings.len(), 3);
    }

    #[test]
    fn test_items_keep_order_and_fill_sub_fields() {
        let record = InvoiceRecord::from_json(&json!({
            "ItemsList": [
                { "Description": "A", "Quantity": 1 },
                "garbage",
                { "Description": "B", "Amount": 3 }
            ]
        }))
        .unwrap()
        .record;

        let descriptions: Vec<_> = record.items_list.iter().map(|i| i.description.as_str()).collect();
        assert_eq!(descriptions, vec!["A", "B"]);
        assert_eq!(record.items_list[0].unit_price, Amount::NotAvailable);
        assert_eq!(record.items_list[1].quantity, Amount::NotAvailable);
    }

    #[test]
    fn test_non_object_is_rejected() {
        let err = InvoiceRecord::from_json(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, ExtractionError::NotAnObject(_)));
    }

    #[test]
    fn test_serialized_record_has_numbers_not_numeric_text() {
        let record = InvoiceRecord::from_json(&json!({
            "InvoiceNumber": 42,
            "Subtotal": "1250",
            "Tax": 62.5,
            "ItemsList": [{ "Description": "A", "Quantity": 2, "UnitPrice": 50.0, "Amount": 100.0 }]
        }))
        .unwrap()
        .record
        .with_source("scan.pdf");

        let value = serde_json::to_value(&record).unwrap();
        for field in INVOICE_FIELDS {
            assert!(value.get(field).is_some(), "missing {field}");
        }
        assert_eq!(value["InvoiceNumber"], json!("42"));
        assert_eq!(value["Subtotal"], json!(1250));
        assert_eq!(value["Tax"], json!(62.5));
        assert_eq!(value["TotalAmount"], json!("N/A"));
        assert_eq!(value["ItemsList"][0]["Quantity"], json!(2));
        assert_eq!(value["SourceFile"], json!("scan.pdf"));

        let back: InvoiceRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
