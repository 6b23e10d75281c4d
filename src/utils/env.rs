// src/utils/env.rs

//! Environment placeholder resolution.
//!
//! Header and payload templates refer to secrets as `${NAME}`. Resolution
//! replaces a string that is exactly one placeholder with the value of the
//! environment variable `NAME`. An unset variable leaves the placeholder
//! untouched (lenient policy); credential validation treats a surviving
//! placeholder as missing, so a broken template fails fast there instead of
//! silently sending an empty header. Partial matches are never substituted.

use std::collections::BTreeMap;

use serde_json::Value;

/// True when `value` consists of exactly one `${NAME}` placeholder.
pub fn is_placeholder(value: &str) -> bool {
    value.len() > 3 && value.starts_with("${") && value.ends_with('}')
}

/// Environment variable name inside a placeholder, if `value` is one.
pub fn placeholder_key(value: &str) -> Option<&str> {
    if is_placeholder(value) {
        Some(&value[2..value.len() - 1])
    } else {
        None
    }
}

/// Resolve a single string against the process environment.
pub fn resolve_str(value: &str) -> String {
    match placeholder_key(value) {
        Some(key) => std::env::var(key).unwrap_or_else(|_| value.to_string()),
        None => value.to_string(),
    }
}

/// Recursively resolve placeholders through objects, arrays and scalars.
///
/// Non-string values pass through unchanged. The transform is pure: the
/// input is not modified.
pub fn resolve_value(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(resolve_str(s)),
        Value::Array(items) => Value::Array(items.iter().map(resolve_value).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), resolve_value(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Resolve placeholders in a flat string map (header templates).
pub fn resolve_map(map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(k, v)| (k.clone(), resolve_str(v)))
        .collect()
}
