// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Dispatch and outcome classification.
//!
//! [`execute`] sends a [`PreparedRequest`] and normalizes every outcome into
//! one [`ApiResult`]: transport failures become network errors with a
//! humanized code, HTTP >= 400 becomes an HTTP error that still carries the
//! raw body (the console maps fields off error payloads too), anything else
//! is a success. Nothing throws past this boundary, and there are no retries
//! here — retry policy belongs to the caller.

use crate::request::{PreparedRequest, RequestBody};
use crate::types::{ApiResult, HttpMethod, http_error, network_error};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Hard dispatch ceiling applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared client with the fixed timeout. Construct once and pass around;
/// connection reuse comes for free without affecting any contract.
pub fn default_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()
}

/// Execute a prepared request. Always resolves to an [`ApiResult`].
pub async fn execute(client: &reqwest::Client, request: &PreparedRequest) -> ApiResult {
    let method = match request.method {
        HttpMethod::Get => reqwest::Method::GET,
        HttpMethod::Post => reqwest::Method::POST,
        HttpMethod::Put => reqwest::Method::PUT,
        HttpMethod::Patch => reqwest::Method::PATCH,
        HttpMethod::Delete => reqwest::Method::DELETE,
    };

    let mut builder = client.request(method, &request.url);
    for (key, value) in &request.headers {
        builder = builder.header(key, value);
    }
    match &request.body {
        Some(RequestBody::Json(value)) if !value.is_null() => {
            builder = builder.body(value.to_string());
        }
        Some(RequestBody::Form(encoded)) => {
            builder = builder.body(encoded.clone());
        }
        _ => {}
    }

    let response = match builder.send().await {
        Ok(response) => response,
        Err(err) => {
            let code = transport_code(&err);
            debug!(url = %request.url, code, "transport failure");
            return ApiResult::Error(network_error(
                code,
                humanize_network_code(code),
                Value::String(err.to_string()),
            ));
        }
    };

    let status = response.status();
    let status_text = status.canonical_reason().unwrap_or_default().to_string();
    // A failure while reading the body is still a transport failure, even
    // after a 2xx status line.
    let text = match response.text().await {
        Ok(text) => text,
        Err(err) => {
            let code = transport_code(&err);
            debug!(url = %request.url, code, "body read failure");
            return ApiResult::Error(network_error(
                code,
                humanize_network_code(code),
                Value::String(err.to_string()),
            ));
        }
    };
    // Non-JSON bodies stay addressable as a plain string value.
    let details: Value =
        serde_json::from_str(&text).unwrap_or_else(|_| Value::String(text.clone()));

    debug!(url = %request.url, status = status.as_u16(), "dispatch complete");

    if status.as_u16() >= 400 {
        ApiResult::Error(http_error(status.as_u16(), &status_text, details))
    } else {
        ApiResult::Success { data: details }
    }
}

/// Map a transport failure onto the classic code set the console keys its
/// remedies off.
fn transport_code(err: &reqwest::Error) -> &'static str {
    if err.is_timeout() {
        return "ETIMEDOUT";
    }
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(inner) = source {
        if let Some(io) = inner.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => return "ECONNREFUSED",
                std::io::ErrorKind::ConnectionReset | std::io::ErrorKind::ConnectionAborted => {
                    return "ECONNABORTED";
                }
                std::io::ErrorKind::TimedOut => return "ETIMEDOUT",
                _ => {}
            }
        }
        let text = inner.to_string().to_lowercase();
        if text.contains("dns") || text.contains("lookup") {
            return "ENOTFOUND";
        }
        source = inner.source();
    }
    "NETWORK_ERROR"
}

/// Human explanation for a transport code.
pub fn humanize_network_code(code: &str) -> &'static str {
    match code {
        "ENOTFOUND" => "The hostname could not be resolved — check the URL",
        "ECONNREFUSED" => "The connection was refused — the service may be down or the port wrong",
        "ETIMEDOUT" | "ECONNABORTED" => {
            "The request timed out — the service did not respond in time"
        }
        _ => "A network error occurred while contacting the service",
    }
}
