//! Query string flattening.
//!
//! Arrays become repeated keys (`category=3&category=4`) and nulls are
//! dropped entirely, which is what the backend services expect. reqwest's
//! own `.query()` goes through serde_urlencoded, which rejects sequences, so
//! the pairs are built here and appended to the URL directly.

use serde_json::Value;
use url::form_urlencoded;

/// Flatten a JSON value into ordered `(key, value)` pairs.
///
/// Non-object values produce no pairs.
pub fn query_pairs(params: &Value) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    if let Value::Object(map) = params {
        for (key, value) in map {
            push_value(&mut pairs, key, value);
        }
    }
    pairs
}

/// Serialize a JSON object as an `application/x-www-form-urlencoded` query.
pub fn serialize_query(params: &Value) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in query_pairs(params) {
        serializer.append_pair(&key, &value);
    }
    serializer.finish()
}

fn push_value(pairs: &mut Vec<(String, String)>, key: &str, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => pairs.push((key.to_string(), s.clone())),
        Value::Bool(_) | Value::Number(_) => pairs.push((key.to_string(), value.to_string())),
        Value::Array(items) => {
            for item in items {
                push_value(pairs, key, item);
            }
        }
        Value::Object(map) => {
            for (sub, inner) in map {
                push_value(pairs, &format!("{key}[{sub}]"), inner);
            }
        }
    }
}
