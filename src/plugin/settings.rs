//! Typed accessors over raw plugin settings.
//!
//! Keys are matched exactly first, then ASCII case-insensitively, so
//! `webRoot` and `WebRoot` are both accepted.

use serde_json::Value;

use crate::plugin::{ConfigurationError, Settings};

pub fn get<'a>(settings: &'a Settings, key: &str) -> Option<&'a Value> {
    settings.get(key).or_else(|| {
        settings
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

pub fn require_str(settings: &Settings, key: &str) -> Result<String, ConfigurationError> {
    optional_str(settings, key)?.ok_or_else(|| ConfigurationError::MissingSetting(key.to_string()))
}

pub fn optional_str(settings: &Settings, key: &str) -> Result<Option<String>, ConfigurationError> {
    match get(settings, key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(other) => Err(ConfigurationError::invalid(
            key,
            format!("expected a string, got {other}"),
        )),
    }
}

/// Non-negative integer; numeric strings are accepted too.
pub fn optional_u64(settings: &Settings, key: &str) -> Result<Option<u64>, ConfigurationError> {
    match get(settings, key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| ConfigurationError::invalid(key, format!("expected a non-negative integer, got {n}"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigurationError::invalid(key, e.to_string())),
        Some(other) => Err(ConfigurationError::invalid(
            key,
            format!("expected a non-negative integer, got {other}"),
        )),
    }
}

pub fn optional_bool(settings: &Settings, key: &str) -> Result<Option<bool>, ConfigurationError> {
    match get(settings, key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::String(s)) => s
            .trim()
            .parse::<bool>()
            .map(Some)
            .map_err(|e| ConfigurationError::invalid(key, e.to_string())),
        Some(other) => Err(ConfigurationError::invalid(
            key,
            format!("expected a boolean, got {other}"),
        )),
    }
}

/// A list of strings; a single string is treated as a one-element list.
pub fn optional_str_list(
    settings: &Settings,
    key: &str,
) -> Result<Option<Vec<String>>, ConfigurationError> {
    match get(settings, key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(vec![s.clone()])),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(ConfigurationError::invalid(
                    key,
                    format!("expected a list of strings, found {other}"),
                )),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some),
        Some(other) => Err(ConfigurationError::invalid(
            key,
            format!("expected a list of strings, got {other}"),
        )),
    }
}
