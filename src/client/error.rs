//! Error response parsing.

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

const MAX_RAW_MESSAGE: usize = 256;

/// Error body returned by the backend, e.g.
/// `{"statusCode": 400, "message": "Invalid token", "error": "Bad Request"}`.
/// `message` may also be a list of validation messages.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    message: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

impl ErrorResponse {
    fn message(&self) -> Option<String> {
        self.message
            .as_ref()
            .and_then(flatten_message)
            .or_else(|| self.error.as_ref().and_then(flatten_message))
    }
}

fn flatten_message(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<&str> = items.iter().filter_map(Value::as_str).collect();
            (!parts.is_empty()).then(|| parts.join("; "))
        }
        Value::Object(map) => map.get("message").and_then(flatten_message),
        _ => None,
    }
}

/// Best-effort human readable message for a failed response.
pub(crate) fn error_message(status: StatusCode, body: &[u8]) -> String {
    if let Ok(parsed) = serde_json::from_slice::<ErrorResponse>(body)
        && let Some(message) = parsed.message()
    {
        return message;
    }

    let raw = String::from_utf8_lossy(body);
    let raw = raw.trim();
    if !raw.is_empty() {
        return raw.chars().take(MAX_RAW_MESSAGE).collect();
    }

    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}
