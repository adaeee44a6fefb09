//! Lenient accessors over loosely-shaped JSON payloads.
//!
//! Backends disagree on field names and on whether numbers arrive as numbers
//! or strings, so every lookup here takes a list of candidate keys and
//! accepts either representation.

use serde_json::Value;

/// First present, non-null value among `keys` on an object payload.
pub(crate) fn field<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let object = value.as_object()?;
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find(|candidate| !candidate.is_null())
}

/// Renders scalars as text. Objects and arrays are not text.
pub(crate) fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Text for a payload that is either a bare scalar or an object carrying one of `keys`.
pub(crate) fn text_or_field(value: &Value, keys: &[&str]) -> Option<String> {
    scalar_text(value).or_else(|| field(value, keys).and_then(scalar_text))
}

/// Like [`text_or_field`], but falls back to compact JSON for structured values.
pub(crate) fn text_or_json(value: &Value, keys: &[&str]) -> Option<String> {
    if let Some(text) = scalar_text(value) {
        return Some(text);
    }
    match field(value, keys) {
        Some(inner) => scalar_text(inner).or_else(|| Some(inner.to_string())),
        None if value.is_null() => None,
        None => Some(value.to_string()),
    }
}

/// Identifiers arrive as strings or integers.
pub(crate) fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Numbers arrive as JSON numbers or as strings such as `"1,204.50"` or `"$12"`.
pub(crate) fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let cleaned: String = text
                .trim()
                .chars()
                .filter(|c| !matches!(c, ',' | '$' | '%' | ' '))
                .collect();
            cleaned.parse::<f64>().ok().filter(|parsed| parsed.is_finite())
        }
        _ => None,
    }
}

/// Unwraps `{ <wrapper>: [...] }` or returns the value itself when it already is an array.
pub(crate) fn array_or_wrapped<'a>(value: &'a Value, wrappers: &[&str]) -> Option<&'a Vec<Value>> {
    if let Some(items) = value.as_array() {
        return Some(items);
    }
    field(value, wrappers).and_then(Value::as_array)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{array_or_wrapped, id_text, number, text_or_field, text_or_json};

    #[test]
    fn numeric_strings_are_cleaned() {
        assert_eq!(number(&json!("1,204.50")), Some(1204.5));
        assert_eq!(number(&json!("$12")), Some(12.0));
        assert_eq!(number(&json!(3)), Some(3.0));
        assert_eq!(number(&json!("n/a")), None);
        assert_eq!(number(&json!(null)), None);
    }

    #[test]
    fn text_accepts_bare_or_wrapped() {
        assert_eq!(text_or_field(&json!("hi"), &["delta"]).as_deref(), Some("hi"));
        assert_eq!(
            text_or_field(&json!({"content": "hi"}), &["delta", "content"]).as_deref(),
            Some("hi")
        );
        assert_eq!(text_or_field(&json!({"other": 1}), &["delta"]), None);
    }

    #[test]
    fn structured_values_fall_back_to_json() {
        assert_eq!(
            text_or_json(&json!({"output": {"rows": 2}}), &["output"]).as_deref(),
            Some(r#"{"rows":2}"#)
        );
        assert_eq!(text_or_json(&json!(null), &["output"]), None);
    }

    #[test]
    fn ids_and_wrappers() {
        assert_eq!(id_text(&json!(7)).as_deref(), Some("7"));
        assert_eq!(id_text(&json!("  ")), None);
        assert_eq!(array_or_wrapped(&json!({"rows": [1, 2]}), &["rows"]).map(Vec::len), Some(2));
        assert!(array_or_wrapped(&json!({"rows": 1}), &["rows"]).is_none());
    }
}
