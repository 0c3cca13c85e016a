//! Deterministic request identity for deduplication.
//!
//! # Design
//! Two calls are "the same request" when method, URL and body all match. The
//! body component is serialized with `canonical_json`, which writes object
//! keys in sorted order at every nesting level, so logically identical
//! bodies that differ only in key order produce the same fingerprint. The
//! fingerprint is an equality key, not a cache key — it carries no TTL and
//! is forgotten the moment its request settles.

use serde_json::Value;

use crate::http::HttpMethod;

/// Compute the identity key for a request: `METHOD:url:canonicalBody`.
///
/// The body component is empty when there is no body.
pub fn fingerprint(method: &HttpMethod, url: &str, body: Option<&Value>) -> String {
    match body {
        Some(value) => format!("{}:{}:{}", method.as_str(), url, canonical_json(value)),
        None => format!("{}:{}:", method.as_str(), url),
    }
}

/// Serialize a JSON value with object keys in sorted order, recursively.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String((*key).clone()).to_string());
                out.push(':');
                write_canonical(&map[*key], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}
