// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Auth-spec resolution.
//!
//! Turns a declarative [`AuthSpec`] into concrete header/query material for
//! the request builder. Only `jwt_auth` performs I/O: one token-acquisition
//! round trip through the response classifier, after which the effective
//! spec is a plain `bearer`.

use crate::classify;
use crate::request::{PreparedRequest, RequestBody};
use crate::types::{ApiError, ApiResult, HttpMethod};
use base64::{Engine as _, engine::general_purpose};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

/// Default header name for `api_key` auth.
pub const DEFAULT_API_KEY_NAME: &str = "x-api-key";

/// Default body path of the token in a `jwt_auth` response.
pub const DEFAULT_TOKEN_PATH: &str = "access_token";

/// Where an API key is injected.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiKeyLocation {
    #[default]
    Header,
    Query,
}

/// Declarative authentication scheme, exactly one mode active.
///
/// `jwt_auth` is transient: after resolution the effective spec used for
/// request building is `bearer` carrying the fetched token.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthSpec {
    #[default]
    None,
    #[serde(rename_all = "camelCase")]
    Basic { username: String, password: String },
    #[serde(rename_all = "camelCase")]
    Bearer { token: String },
    #[serde(rename_all = "camelCase")]
    ApiKey {
        api_key: String,
        #[serde(default = "default_api_key_name")]
        api_key_name: String,
        #[serde(default)]
        api_key_location: ApiKeyLocation,
    },
    #[serde(rename_all = "camelCase")]
    JwtAuth {
        jwt_auth_endpoint: String,
        #[serde(default = "default_jwt_method")]
        jwt_auth_method: HttpMethod,
        #[serde(default)]
        jwt_auth_headers: HashMap<String, String>,
        #[serde(default)]
        jwt_auth_body: Value,
        #[serde(default = "default_token_path")]
        jwt_token_path: String,
    },
}

fn default_api_key_name() -> String {
    DEFAULT_API_KEY_NAME.to_string()
}

fn default_jwt_method() -> HttpMethod {
    HttpMethod::Post
}

fn default_token_path() -> String {
    DEFAULT_TOKEN_PATH.to_string()
}

impl AuthSpec {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Fully resolved auth material for one request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedAuth {
    /// Headers to merge into the request (take precedence over custom ones).
    pub headers: Vec<(String, String)>,
    /// Query parameters contributed by auth (`api_key` in query location);
    /// assembled into the URL by the request builder.
    pub query_params: Vec<(String, String)>,
    /// The auth spec the request is effectively built with (`jwt_auth` collapses
    /// to `bearer` after token acquisition).
    pub effective_spec: AuthSpec,
}

/// Auth resolution failures. These are configuration/protocol problems, not
/// upstream business errors — the caller renders them in-band.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The token endpoint call itself failed (transport or HTTP error).
    /// Captured as data rather than thrown mid-flight so the console keeps
    /// the status and body for diagnosis.
    #[error("Token endpoint call failed: {source}")]
    TokenRequest { source: Box<TokenRequestFailure> },
    /// The auth server answered, but the token path did not resolve to a
    /// string.
    #[error("Could not extract a token at path '{path}' from the auth response")]
    TokenExtraction { path: String, details: Value },
}

/// Wrapper keeping the full classified failure of the token call.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct TokenRequestFailure {
    pub message: String,
    pub status: Option<u16>,
    pub details: Value,
    pub is_network_error: bool,
}

impl AuthError {
    /// Normalize into the in-band error shape.
    pub fn into_api_error(self) -> ApiError {
        match self {
            Self::TokenRequest { source } => ApiError {
                status: source.status,
                status_text: None,
                message: format!("Token endpoint call failed: {}", source.message),
                details: source.details,
                is_network_error: source.is_network_error,
                code: Some("AUTH_TOKEN_REQUEST_FAILED".to_string()),
            },
            Self::TokenExtraction { path, details } => ApiError {
                status: None,
                status_text: None,
                message: format!(
                    "Could not extract a token at path '{path}' from the auth response"
                ),
                details,
                is_network_error: false,
                code: Some("TOKEN_EXTRACTION_ERROR".to_string()),
            },
        }
    }
}

/// Ensure the `Bearer ` prefix exactly once.
pub fn ensure_bearer_prefix(token: &str) -> String {
    if token.starts_with("Bearer ") {
        token.to_string()
    } else {
        format!("Bearer {token}")
    }
}

/// Resolve an auth spec into concrete header/query material.
///
/// Performs network I/O only for `jwt_auth` (one token round trip). A
/// `bearer` spec with an empty token is a soft condition: logged, request
/// proceeds without an `Authorization` header.
pub async fn resolve_auth(
    client: &reqwest::Client,
    spec: &AuthSpec,
) -> Result<ResolvedAuth, AuthError> {
    match spec {
        AuthSpec::None => Ok(ResolvedAuth {
            effective_spec: AuthSpec::None,
            ..Default::default()
        }),
        AuthSpec::Basic { username, password } => {
            let encoded = general_purpose::STANDARD.encode(format!("{username}:{password}"));
            Ok(ResolvedAuth {
                headers: vec![("Authorization".to_string(), format!("Basic {encoded}"))],
                query_params: Vec::new(),
                effective_spec: spec.clone(),
            })
        }
        AuthSpec::Bearer { token } => {
            if token.is_empty() {
                warn!("bearer auth declared without a token; proceeding unauthenticated");
                return Ok(ResolvedAuth {
                    effective_spec: spec.clone(),
                    ..Default::default()
                });
            }
            Ok(ResolvedAuth {
                headers: vec![("Authorization".to_string(), ensure_bearer_prefix(token))],
                query_params: Vec::new(),
                effective_spec: spec.clone(),
            })
        }
        AuthSpec::ApiKey {
            api_key,
            api_key_name,
            api_key_location,
        } => {
            let name = if api_key_name.is_empty() {
                DEFAULT_API_KEY_NAME.to_string()
            } else {
                api_key_name.clone()
            };
            let mut resolved = ResolvedAuth {
                effective_spec: spec.clone(),
                ..Default::default()
            };
            match api_key_location {
                ApiKeyLocation::Header => resolved.headers.push((name, api_key.clone())),
                // Query params are assembled by the request builder.
                ApiKeyLocation::Query => resolved.query_params.push((name, api_key.clone())),
            }
            Ok(resolved)
        }
        AuthSpec::JwtAuth {
            jwt_auth_endpoint,
            jwt_auth_method,
            jwt_auth_headers,
            jwt_auth_body,
            jwt_token_path,
        } => {
            let token = fetch_jwt_token(
                client,
                jwt_auth_endpoint,
                *jwt_auth_method,
                jwt_auth_headers,
                jwt_auth_body,
                jwt_token_path,
            )
            .await?;
            Ok(ResolvedAuth {
                headers: vec![("Authorization".to_string(), ensure_bearer_prefix(&token))],
                query_params: Vec::new(),
                effective_spec: AuthSpec::Bearer { token },
            })
        }
    }
}

/// One token-acquisition round trip. Non-2xx responses are captured through
/// the classifier like any other call — an auth server rejecting
/// misconfigured headers still yields its status and body.
async fn fetch_jwt_token(
    client: &reqwest::Client,
    endpoint: &str,
    method: HttpMethod,
    headers: &HashMap<String, String>,
    body: &Value,
    token_path: &str,
) -> Result<String, AuthError> {
    let mut request_headers = headers.clone();
    if !request_headers
        .keys()
        .any(|k| k.eq_ignore_ascii_case("content-type"))
    {
        request_headers.insert("Content-Type".to_string(), "application/json".to_string());
    }
    let prepared = PreparedRequest {
        method,
        url: endpoint.to_string(),
        headers: request_headers,
        body: if method.is_body_bearing() {
            Some(RequestBody::Json(body.clone()))
        } else {
            None
        },
    };

    let data = match classify::execute(client, &prepared).await {
        ApiResult::Success { data } => data,
        ApiResult::Error(err) => {
            return Err(AuthError::TokenRequest {
                source: Box::new(TokenRequestFailure {
                    message: err.message,
                    status: err.status,
                    details: err.details,
                    is_network_error: err.is_network_error,
                }),
            });
        }
    };

    let path = if token_path.is_empty() {
        DEFAULT_TOKEN_PATH
    } else {
        token_path
    };
    // Dot-separated resolution only in this phase.
    match courierlink_fields::get_by_dotted_path(&data, path) {
        Some(Value::String(token)) if !token.is_empty() => Ok(token.clone()),
        _ => Err(AuthError::TokenExtraction {
            path: path.to_string(),
            details: data,
        }),
    }
}
