//! Common types and utilities for the Megaport API

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Every Megaport response wraps its payload in this envelope
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    #[serde(default)]
    pub message: Option<String>,
    pub data: T,
}

/// Error bodies carry a human readable message and sometimes a data string
#[derive(Debug, Deserialize)]
pub struct ApiErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl ApiErrorResponse {
    pub fn describe(&self) -> Option<String> {
        match (&self.message, &self.data) {
            (Some(message), Some(serde_json::Value::String(data))) if !data.is_empty() => {
                Some(format!("{}: {}", message, data))
            }
            (Some(message), _) => Some(message.clone()),
            _ => None,
        }
    }
}

/// Key/value resource tag as the tags endpoints exchange them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTag {
    pub key: String,
    pub value: String,
}

/// Converts the API's epoch-millisecond timestamps to RFC 3339 strings
pub fn deserialize_epoch_millis<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let millis = Option::<i64>::deserialize(deserializer)?;
    Ok(millis.and_then(format_epoch_millis))
}

/// Reads `null` as the type's default; the API sends null for unset strings
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub fn format_epoch_millis(millis: i64) -> Option<String> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .map(|t| t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
}
