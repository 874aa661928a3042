//! Recovery of transaction records from free-text model replies.

use std::collections::HashMap;

use log::{debug, warn};
use serde_json::Value;

use crate::error::EmptyCause;
use crate::schema::{ExtractionOutcome, Transaction};
use crate::utils::{coerce_amount, normalize_date};

const FENCE: &str = "```";

/// Pick the fenced block holding the array, if the reply uses code fences.
///
/// A block may carry a `json` label right after the opening fence. When no
/// block starts with `[` the reply is returned unchanged.
pub fn strip_code_fences(response: &str) -> &str {
    let text = response.trim();
    if !text.contains(FENCE) {
        return text;
    }

    for part in text.split(FENCE) {
        let mut body = part.trim();
        if body.get(..4).is_some_and(|label| label.eq_ignore_ascii_case("json")) {
            body = body[4..].trim_start();
        }
        if body.starts_with('[') {
            return body.trim_end();
        }
    }
    text
}

/// The substring from the first `[` to the last `]`, after fence stripping.
pub fn recover_json_array(response: &str) -> Option<&str> {
    let text = strip_code_fences(response);
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

fn lowercase_keys(obj: &serde_json::Map<String, Value>) -> HashMap<String, &Value> {
    obj.iter().map(|(k, v)| (k.trim().to_lowercase(), v)).collect()
}

fn text_field(value: Option<&&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn amount_field(value: Option<&&Value>) -> Option<f64> {
    match value? {
        Value::Null => None,
        Value::Number(n) => Some(n.as_f64().filter(|v| v.is_finite()).unwrap_or(0.0)),
        Value::String(s) => Some(coerce_amount(s)),
        _ => Some(0.0),
    }
}

/// Build a canonical record from one reply object.
///
/// `date`, `description` and `amount` are required; a record missing any of
/// them, or whose date cannot be coerced, is rejected.
pub fn record_from_value(value: &Value) -> Option<Transaction> {
    let obj = value.as_object()?;
    let fields = lowercase_keys(obj);

    let date = normalize_date(&text_field(fields.get("date"))?)?;
    let description = text_field(fields.get("description"))?;
    let amount = amount_field(fields.get("amount"))?;
    let category = text_field(fields.get("category"));

    Some(Transaction::new(date, description, amount, category))
}

/// Turn a raw service reply into an extraction outcome. Never fails.
pub fn parse_response(response: &str) -> ExtractionOutcome {
    let Some(array) = recover_json_array(response) else {
        warn!("Extraction reply holds no JSON array ({} chars)", response.len());
        return ExtractionOutcome::empty(EmptyCause::MalformedResponse);
    };

    let values: Vec<Value> = match serde_json::from_str(array) {
        Ok(values) => values,
        Err(e) => {
            warn!("Extraction reply is not valid JSON: {}", e);
            return ExtractionOutcome::empty(EmptyCause::MalformedResponse);
        }
    };

    let total = values.len();
    let transactions: Vec<Transaction> = values.iter().filter_map(record_from_value).collect();
    if transactions.len() < total {
        debug!(
            "Dropped {} of {} extracted objects missing required fields",
            total - transactions.len(),
            total
        );
    }

    ExtractionOutcome::found(transactions)
}
