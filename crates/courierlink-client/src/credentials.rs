// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Stored credentials and the effective-auth resolution order.
//!
//! The proxy accepts three credential sources, tried in declared order:
//! explicit request auth, the courier's stored record, then named
//! environment variables. Absence at every stage is recoverable — the call
//! simply goes out unauthenticated.

use crate::auth::{ApiKeyLocation, AuthSpec, DEFAULT_TOKEN_PATH};
use crate::types::HttpMethod;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Credential fields of a stored courier record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoredCredentials {
    /// `none|basic|bearer|api_key|jwt_auth`, matching the auth-spec tags.
    #[serde(default)]
    pub auth_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_path: Option<String>,
}

impl StoredCredentials {
    pub fn is_empty(&self) -> bool {
        self.api_key.is_none()
            && self.username.is_none()
            && self.password.is_none()
            && self.token.is_none()
            && self.auth_endpoint.is_none()
    }

    /// Parse the credential fields out of a raw courier record.
    pub fn from_record(record: &Value) -> Self {
        serde_json::from_value(record.clone()).unwrap_or_default()
    }

    /// Map stored fields onto a declarative auth spec. An unknown or empty
    /// `auth_type` falls back to whichever fields are present.
    pub fn to_auth_spec(&self) -> AuthSpec {
        match self.auth_type.as_str() {
            "basic" => AuthSpec::Basic {
                username: self.username.clone().unwrap_or_default(),
                password: self.password.clone().unwrap_or_default(),
            },
            "bearer" => AuthSpec::Bearer {
                token: self.token.clone().unwrap_or_default(),
            },
            "api_key" => self.api_key_spec(),
            "jwt_auth" => self.jwt_spec(),
            "none" => AuthSpec::None,
            _ => {
                // Legacy records carry no auth_type; infer from the fields.
                if self.auth_endpoint.is_some() {
                    self.jwt_spec()
                } else if self.username.is_some() && self.password.is_some() {
                    AuthSpec::Basic {
                        username: self.username.clone().unwrap_or_default(),
                        password: self.password.clone().unwrap_or_default(),
                    }
                } else if let Some(token) = &self.token {
                    AuthSpec::Bearer {
                        token: token.clone(),
                    }
                } else if self.api_key.is_some() {
                    self.api_key_spec()
                } else {
                    AuthSpec::None
                }
            }
        }
    }

    fn api_key_spec(&self) -> AuthSpec {
        AuthSpec::ApiKey {
            api_key: self.api_key.clone().unwrap_or_default(),
            api_key_name: self
                .api_key_name
                .clone()
                .unwrap_or_else(|| crate::auth::DEFAULT_API_KEY_NAME.to_string()),
            api_key_location: ApiKeyLocation::Header,
        }
    }

    fn jwt_spec(&self) -> AuthSpec {
        let mut body = serde_json::Map::new();
        if let Some(username) = &self.username {
            body.insert("username".to_string(), Value::String(username.clone()));
        }
        if let Some(password) = &self.password {
            body.insert("password".to_string(), Value::String(password.clone()));
        }
        if let Some(api_key) = &self.api_key {
            body.insert("apiKey".to_string(), Value::String(api_key.clone()));
        }
        AuthSpec::JwtAuth {
            jwt_auth_endpoint: self.auth_endpoint.clone().unwrap_or_default(),
            jwt_auth_method: HttpMethod::Post,
            jwt_auth_headers: HashMap::new(),
            jwt_auth_body: Value::Object(body),
            jwt_token_path: self
                .token_path
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKEN_PATH.to_string()),
        }
    }
}

/// Outcome of a stored-credential lookup. Absence is recoverable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CredentialLookup {
    pub success: bool,
    pub credentials: Option<StoredCredentials>,
    pub error: Option<String>,
}

impl CredentialLookup {
    pub fn found(credentials: StoredCredentials) -> Self {
        Self {
            success: true,
            credentials: Some(credentials),
            error: None,
        }
    }

    pub fn missing(error: impl Into<String>) -> Self {
        Self {
            success: false,
            credentials: None,
            error: Some(error.into()),
        }
    }
}

/// Environment-variable prefix for per-courier fallback credentials
/// (`COURIERLINK_<NAME>_API_KEY` and friends).
pub const ENV_PREFIX: &str = "COURIERLINK";

fn env_key(courier: &str, suffix: &str) -> String {
    let name: String = courier
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{ENV_PREFIX}_{name}_{suffix}")
}

/// Resolve the effective auth spec: explicit request credentials, then the
/// stored record, then named environment variables, in that order.
pub fn effective_auth(
    request_auth: &AuthSpec,
    stored: Option<&StoredCredentials>,
    courier: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> AuthSpec {
    if !request_auth.is_none() {
        return request_auth.clone();
    }
    if let Some(credentials) = stored
        && !credentials.is_empty()
    {
        return credentials.to_auth_spec();
    }
    let Some(courier) = courier else {
        return AuthSpec::None;
    };
    let creds = StoredCredentials {
        auth_type: String::new(),
        api_key: env(&env_key(courier, "API_KEY")),
        api_key_name: env(&env_key(courier, "API_KEY_NAME")),
        username: env(&env_key(courier, "USERNAME")),
        password: env(&env_key(courier, "PASSWORD")),
        token: env(&env_key(courier, "TOKEN")),
        auth_endpoint: env(&env_key(courier, "AUTH_ENDPOINT")),
        token_path: env(&env_key(courier, "TOKEN_PATH")),
    };
    if creds.is_empty() {
        AuthSpec::None
    } else {
        creds.to_auth_spec()
    }
}

/// [`effective_auth`] backed by the process environment.
pub fn effective_auth_from_env(
    request_auth: &AuthSpec,
    stored: Option<&StoredCredentials>,
    courier: Option<&str>,
) -> AuthSpec {
    effective_auth(request_auth, stored, courier, |key| {
        std::env::var(key).ok()
    })
}
