//! Shape-tolerant helpers for provider JSON payloads.
//!
//! Providers change their payloads without notice; a missing or mistyped
//! field yields zero results and a warning rather than an error.

use serde_json::Value;
use tracing::warn;

/// Returns the first of `keys` holding an array.
///
/// A present but non-array field is logged and treated as empty.
pub(crate) fn array_field<'a>(value: &'a Value, keys: &[&str], provider: &str) -> &'a [Value] {
    for key in keys {
        match value.get(key) {
            Some(Value::Array(items)) => return items,
            Some(Value::Null) | None => continue,
            Some(other) => {
                warn!(
                    provider,
                    field = *key,
                    kind = kind(other),
                    "unexpected response shape, treating as zero results"
                );
                return &[];
            }
        }
    }
    &[]
}

/// Returns the first non-empty string (or number, stringified) among `keys`.
pub(crate) fn str_field(item: &Value, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| match item.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .next()
        .unwrap_or_default()
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_array_field_first_match() {
        let value = json!({"images": [1, 2], "results": [3]});
        assert_eq!(array_field(&value, &["results", "images"], "t").len(), 1);
        assert_eq!(array_field(&value, &["missing", "images"], "t").len(), 2);
    }

    #[test]
    fn test_array_field_wrong_shape_is_empty() {
        let value = json!({"results": {"items": []}});
        assert!(array_field(&value, &["results"], "t").is_empty());
        let value = json!({"results": "none"});
        assert!(array_field(&value, &["results"], "t").is_empty());
    }

    #[test]
    fn test_str_field_fallbacks() {
        let item = json!({"snippet": "", "description": "desc", "length": 253});
        assert_eq!(str_field(&item, &["content", "snippet", "description"]), "desc");
        assert_eq!(str_field(&item, &["length"]), "253");
        assert_eq!(str_field(&item, &["missing"]), "");
    }
}
