//! Coercion of the model's structured reply into a complete review record.
//!
//! Missing keys, explicit nulls and empty strings are treated differently on
//! purpose; downstream consumers rely on the exact output shape.

use serde_json::{Map, Value};

use crate::error::{ReviewBuilderError, Result};
use crate::schema::{CATEGORY_FIELDS, NOT_AVAILABLE};

/// Parses `raw` as a JSON object and fills the derived fields.
///
/// `request_duration` is the duration sent with the request and backfills
/// `duration_of_stay` when the model left it out.
pub fn normalize_reply(raw: &str, request_duration: Option<&str>) -> Result<Map<String, Value>> {
    let value: Value = serde_json::from_str(raw)?;
    match value {
        Value::Object(map) => Ok(normalize_fields(map, request_duration)),
        other => Err(ReviewBuilderError::MalformedReply(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

pub fn normalize_fields(
    mut review: Map<String, Value>,
    request_duration: Option<&str>,
) -> Map<String, Value> {
    if !review.contains_key("overall") {
        let overall = derive_overall(&review);
        review.insert("overall".to_string(), overall);
    }

    for field in CATEGORY_FIELDS {
        if matches!(review.get(field), Some(Value::Null)) {
            review.insert(field.to_string(), Value::from(NOT_AVAILABLE));
        }
    }

    if !review.contains_key("duration_of_stay") {
        let duration = request_duration.unwrap_or(NOT_AVAILABLE);
        review.insert("duration_of_stay".to_string(), Value::from(duration));
    }

    review
}

/// Rounded mean of the numeric category ratings as a string, or `"NA"`.
fn derive_overall(review: &Map<String, Value>) -> Value {
    let all_blank = CATEGORY_FIELDS.iter().all(|field| match review.get(*field) {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty() || s == NOT_AVAILABLE,
        Some(_) => false,
    });
    if all_blank {
        return Value::from(NOT_AVAILABLE);
    }

    let ratings: Vec<f64> = CATEGORY_FIELDS
        .iter()
        .filter_map(|field| review.get(*field).and_then(Value::as_f64))
        .collect();
    if ratings.is_empty() {
        return Value::from(NOT_AVAILABLE);
    }

    let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
    // Ties go to the even integer.
    Value::from((mean.round_ties_even() as i64).to_string())
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
