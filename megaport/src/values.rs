//! Conversions between Terraform values and the plain types the API speaks

use crate::api::ApiError;
use std::collections::HashMap;
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

/// Builds an object value from `(name, value)` pairs
pub fn object<'a>(fields: impl IntoIterator<Item = (&'a str, Dynamic)>) -> Dynamic {
    Dynamic::Map(
        fields
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect(),
    )
}

/// Empty API strings become null in state
pub fn string_or_null(value: &str) -> Dynamic {
    if value.is_empty() {
        Dynamic::Null
    } else {
        Dynamic::String(value.to_string())
    }
}

pub fn string_list<S: AsRef<str>>(values: &[S]) -> Dynamic {
    Dynamic::List(
        values
            .iter()
            .map(|v| Dynamic::String(v.as_ref().to_string()))
            .collect(),
    )
}

/// Reads a `map(string)` attribute; null, unknown and non-string entries are skipped
pub fn read_string_map(value: &DynamicValue, path: &AttributePath) -> HashMap<String, String> {
    value
        .get_map_opt(path)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.as_string().map(|s| (k, s.to_string())))
        .collect()
}

/// Reads a `list(string)` attribute, skipping null entries
pub fn read_string_list(value: &Dynamic) -> Vec<String> {
    value
        .as_list()
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_string().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

pub fn string_map(map: &HashMap<String, String>) -> Dynamic {
    Dynamic::Map(
        map.iter()
            .map(|(k, v)| (k.clone(), Dynamic::String(v.clone())))
            .collect(),
    )
}

/// Replaces every unknown with null, for state saved after a partial apply
pub fn unknowns_to_null(value: &mut Dynamic) {
    match value {
        Dynamic::Unknown => *value = Dynamic::Null,
        Dynamic::List(items) => items.iter_mut().for_each(unknowns_to_null),
        Dynamic::Map(map) => map.values_mut().for_each(unknowns_to_null),
        _ => {}
    }
}

/// Writes an optional string from the API; an empty value leaves a null
/// attribute null instead of turning it into ""
pub fn set_optional_string(state: &mut DynamicValue, path: &AttributePath, value: &str) {
    let was_null = state.get(path).is_none_or(|v| v.is_null() || v.is_unknown());
    if value.is_empty() && was_null {
        let _ = state.set_null(path);
    } else {
        let _ = state.set_string(path, value);
    }
}

/// Diagnostic for a failed API call
pub fn api_diagnostic(summary: &str, err: &ApiError) -> Diagnostic {
    Diagnostic::error(summary, err.to_string())
}
