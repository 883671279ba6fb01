use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::Value;

/// How many times a string-encoded payload may wrap another encoded payload.
const MAX_DECODE_DEPTH: u8 = 2;

/// Normalize the wire `options` field of a question into an ordered list of
/// unique display strings.
///
/// Accepted shapes:
/// - a native array (`["a", "b"]`)
/// - a JSON-encoded string of an array (`"[\"a\",\"b\"]"`)
/// - a key-value object from the legacy document store (`{"0": "a", "1": "b"}`)
///
/// Anything that cannot be understood yields an empty list.
#[must_use]
pub fn normalize_options(raw: &Value) -> Vec<String> {
    dedup_options(collect(raw, MAX_DECODE_DEPTH))
}

/// Trim, drop blanks and drop repeats while keeping first-seen order.
pub(crate) fn dedup_options<I, S>(options: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    options
        .into_iter()
        .map(|option| option.into().trim().to_string())
        .filter(|option| !option.is_empty() && seen.insert(option.clone()))
        .collect()
}

fn collect(raw: &Value, depth: u8) -> Vec<String> {
    match raw {
        Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| compare_keys(a, b));
            entries
                .into_iter()
                .filter_map(|(_, value)| scalar_text(value))
                .collect()
        }
        Value::String(encoded) if depth > 0 => match serde_json::from_str::<Value>(encoded) {
            Ok(decoded @ (Value::Array(_) | Value::Object(_) | Value::String(_))) => {
                collect(&decoded, depth - 1)
            }
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

// Numeric keys sort numerically and before any other key.
fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}
