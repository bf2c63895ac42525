// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared request/result types.

use crate::auth::AuthSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// HTTP method for the outbound request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    /// GET request - retrieve data
    #[default]
    Get,
    /// POST request - create or submit data
    Post,
    /// PUT request - update or replace data
    Put,
    /// PATCH request - partially update data
    Patch,
    /// DELETE request - remove data
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// POST/PUT/PATCH carry a serialized body; GET/DELETE do not.
    pub fn is_body_bearing(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }
}

/// One ordered header or query-parameter entry as entered in the console.
///
/// Order is preserved on the wire shape; when materialized into a map, later
/// duplicate keys overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Intent tag with special augmentation rules (tracking-number injection).
pub const TRACK_SHIPMENT_INTENT: &str = "track_shipment";

/// Declarative description of one outbound API call, as submitted by the
/// console. Transient: never persisted as-is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    /// Absolute http(s) URL of the courier endpoint.
    pub url: String,
    #[serde(default)]
    pub method: HttpMethod,
    #[serde(default)]
    pub auth: AuthSpec,
    /// Custom headers, insertion order preserved.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<KeyValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_params: Vec<KeyValue>,
    /// JSON-serializable body, or key/value object when form-encoding.
    #[serde(default)]
    pub body: Value,
    #[serde(default)]
    pub is_form_url_encoded: bool,
    /// Free-form intent tag; `track_shipment` triggers docket injection.
    #[serde(default)]
    pub api_intent: String,
    /// Tracking-number value injected for tracking intents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_docket: Option<String>,
}

/// Discriminated outcome of one classified call. Every path through the
/// classifier terminates in exactly one variant; nothing throws past it.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult {
    Success { data: Value },
    Error(ApiError),
}

impl ApiResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// In-band HTTP encoding: success serializes as the upstream payload,
    /// errors as `{"error": true, ...}`.
    pub fn into_body(self) -> Value {
        match self {
            Self::Success { data } => data,
            Self::Error(err) => err.into_body(),
        }
    }
}

/// Normalized failure shape shared by transport errors, HTTP errors, and
/// pre-flight rejections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_text: Option<String>,
    /// Human-readable explanation, always present.
    pub message: String,
    /// Raw upstream body (or diagnostic context) — kept so the console can
    /// drive field mapping off error payloads too.
    #[serde(default)]
    pub details: Value,
    #[serde(default)]
    pub is_network_error: bool,
    /// Machine-checkable code (`ECONNREFUSED`, `HTTP_UNAUTHORIZED`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ApiError {
    pub fn into_body(self) -> Value {
        let mut map = serde_json::Map::new();
        map.insert("error".to_string(), Value::Bool(true));
        if let Ok(Value::Object(fields)) = serde_json::to_value(&self) {
            map.extend(fields);
        }
        Value::Object(map)
    }

    /// Expired-session signature: HTTP 401 or an "unauthorized" / "token
    /// expired" message in the payload. Callers use this to re-run token
    /// acquisition; the generated adapter modules emit the same guard.
    pub fn is_token_expired(&self) -> bool {
        if self.status == Some(401) {
            return true;
        }
        let haystack = format!("{} {}", self.message, self.details).to_lowercase();
        haystack.contains("unauthorized") || haystack.contains("token expired")
    }
}

/// Build an [`ApiError`] for an HTTP status >= 400, with a status-specific
/// explanation so the console can suggest a remedy.
pub fn http_error(status: u16, status_text: &str, details: Value) -> ApiError {
    let (code, message): (&str, String) = match status {
        401 => (
            "HTTP_UNAUTHORIZED",
            "Authentication failed — the courier rejected the provided credentials".to_string(),
        ),
        403 => (
            "HTTP_FORBIDDEN",
            "Access forbidden — the credentials lack permission for this resource".to_string(),
        ),
        404 => (
            "HTTP_NOT_FOUND",
            "Endpoint not found — check the request URL and method".to_string(),
        ),
        500 => (
            "HTTP_INTERNAL_ERROR",
            "The courier API reported an internal server error".to_string(),
        ),
        502 => (
            "HTTP_BAD_GATEWAY",
            "Bad gateway — a proxy in front of the courier API failed".to_string(),
        ),
        503 => (
            "HTTP_SERVICE_UNAVAILABLE",
            "The courier API is temporarily unavailable".to_string(),
        ),
        504 => (
            "HTTP_GATEWAY_TIMEOUT",
            "Gateway timeout — the courier API took too long to respond".to_string(),
        ),
        _ => ("HTTP_ERROR", format!("Request failed with status {status}")),
    };
    ApiError {
        status: Some(status),
        status_text: if status_text.is_empty() {
            None
        } else {
            Some(status_text.to_string())
        },
        message,
        details,
        is_network_error: false,
        code: Some(code.to_string()),
    }
}

/// Build an [`ApiError`] for a transport-level failure (no response reached).
pub fn network_error(code: &str, message: impl Into<String>, details: Value) -> ApiError {
    ApiError {
        status: None,
        status_text: None,
        message: message.into(),
        details,
        is_network_error: true,
        code: Some(code.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn http_error_status_specific_messages() {
        let err = http_error(401, "Unauthorized", json!({"message": "nope"}));
        assert!(err.message.contains("Authentication failed"));
        assert_eq!(err.code.as_deref(), Some("HTTP_UNAUTHORIZED"));
        assert!(!err.is_network_error);

        let err = http_error(418, "", Value::Null);
        assert_eq!(err.message, "Request failed with status 418");
        assert_eq!(err.code.as_deref(), Some("HTTP_ERROR"));
        assert!(err.status_text.is_none());
    }

    #[test]
    fn error_body_is_in_band() {
        let body = http_error(503, "Service Unavailable", json!("down")).into_body();
        assert_eq!(body["error"], json!(true));
        assert_eq!(body["status"], json!(503));
        assert_eq!(body["isNetworkError"], json!(false));
        assert_eq!(body["details"], json!("down"));
    }

    #[test]
    fn success_body_is_the_payload() {
        let result = ApiResult::Success {
            data: json!({"ok": 1}),
        };
        assert_eq!(result.into_body(), json!({"ok": 1}));
    }

    #[test]
    fn token_expiry_signatures() {
        assert!(http_error(401, "", Value::Null).is_token_expired());
        assert!(
            http_error(400, "", json!({"message": "Token Expired"})).is_token_expired()
        );
        assert!(!http_error(404, "", Value::Null).is_token_expired());
    }

    #[test]
    fn request_config_wire_shape_is_camel_case() {
        let config: RequestConfig = serde_json::from_value(json!({
            "url": "https://api.example.com/track",
            "method": "POST",
            "queryParams": [{"key": "a", "value": "1"}],
            "isFormUrlEncoded": true,
            "apiIntent": "track_shipment",
            "testDocket": "ABC123"
        }))
        .unwrap();
        assert_eq!(config.method, HttpMethod::Post);
        assert!(config.is_form_url_encoded);
        assert_eq!(config.test_docket.as_deref(), Some("ABC123"));
        assert_eq!(config.query_params[0], KeyValue::new("a", "1"));
    }
}
