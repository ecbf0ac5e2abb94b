//! Response envelope normalization
//!
//! Callers branch on `success`. A body that already carries a boolean `success`
//! field is taken as the service's own envelope; any other body is wrapped
//! according to the HTTP status.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{IdentityError, IdentityResult};

/// `{success, data?, message?}` as seen by every caller of the identity service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// HTTP status the envelope was produced from
    #[serde(skip)]
    pub status: Option<u16>,
}

impl ApiEnvelope<Value> {
    /// Build an envelope from a raw HTTP status and body
    pub fn from_http(status: u16, body: &str) -> Self {
        let status_ok = (200..300).contains(&status);
        let parsed: Option<Value> = if body.trim().is_empty() {
            None
        } else {
            serde_json::from_str(body).ok()
        };

        match parsed {
            Some(Value::Object(map)) if map.get("success").is_some_and(Value::is_boolean) => {
                let flag = map.get("success").and_then(Value::as_bool).unwrap_or(false);
                let message = map
                    .get("message")
                    .and_then(extract_message)
                    .or_else(|| map.get("errors").and_then(extract_message));
                Self {
                    success: flag && status_ok,
                    data: map.get("data").filter(|v| !v.is_null()).cloned(),
                    message,
                    status: Some(status),
                }
            }
            parsed if status_ok => Self {
                success: true,
                data: parsed,
                message: None,
                status: Some(status),
            },
            parsed => Self {
                success: false,
                data: None,
                message: parsed.as_ref().and_then(extract_message),
                status: Some(status),
            },
        }
    }

    /// Decode the payload, or turn a failed envelope into an error carrying
    /// the service message (`fallback` when the service gave none)
    pub fn into_result<T: DeserializeOwned>(self, fallback: &str) -> IdentityResult<T> {
        if !self.success {
            return Err(IdentityError::rejected(
                self.status,
                self.message.unwrap_or_else(|| fallback.to_string()),
            ));
        }

        let data = self
            .data
            .ok_or_else(|| IdentityError::invalid_payload("Identity service returned no data"))?;

        serde_json::from_value(data).map_err(|e| {
            IdentityError::invalid_payload(format!(
                "Unexpected response from identity service: {}",
                e
            ))
        })
    }
}

/// Pull a human-readable message out of an error body.
///
/// Understands `message`/`detail`/`error` keys, DRF `non_field_errors` and
/// per-field error lists.
fn extract_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Array(items) => items.iter().find_map(extract_message),
        Value::Object(map) => {
            for key in ["message", "detail", "error", "non_field_errors"] {
                if let Some(message) = map.get(key).and_then(extract_message) {
                    return Some(message);
                }
            }
            map.iter()
                .find_map(|(field, v)| extract_message(v).map(|m| format!("{}: {}", field, m)))
        }
        _ => None,
    }
}
