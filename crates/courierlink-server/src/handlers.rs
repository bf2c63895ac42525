// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP handlers for the console API.
//!
//! The proxy endpoint answers HTTP 200 even when the upstream call failed —
//! the outcome is signaled in-band as `{"error": true, ...}` so the browser
//! always has a body to render fields from. Only a malformed request body is
//! an HTTP-level failure (500); method mismatches get axum's 405.

use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use courierlink_client::{
    ApiError, CredentialLookup, RequestConfig, StoredCredentials, build_request,
    effective_auth_from_env, execute, is_private_host, resolve_auth, validate,
};
use courierlink_codegen::{CompileOptions, compile, module_filename};
use courierlink_store::{Courier, FieldMapping, find_courier, mappings_for_courier};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

/// Proxy request body: a request configuration plus an optional courier
/// identifier for server-side credential lookup.
#[derive(Debug, Deserialize)]
pub struct ProxyRequest {
    #[serde(flatten)]
    pub config: RequestConfig,
    #[serde(default)]
    pub courier: Option<String>,
}

fn error_body(code: &str, message: impl Into<String>, details: Value) -> Value {
    ApiError {
        message: message.into(),
        code: Some(code.to_string()),
        details,
        ..Default::default()
    }
    .into_body()
}

/// `POST /courier-proxy`
pub async fn courier_proxy(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let request: ProxyRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "malformed proxy request body");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_body(
                    "INVALID_REQUEST",
                    "Request body could not be parsed",
                    Value::String(err.to_string()),
                )),
            );
        }
    };
    (StatusCode::OK, Json(run_proxy(&state, request).await))
}

/// Full proxy pipeline: validate, policy guard, credential resolution, auth
/// resolution, request assembly, dispatch. Every failure becomes an in-band
/// error body.
async fn run_proxy(state: &AppState, request: ProxyRequest) -> Value {
    let config = request.config;
    let courier = request.courier.as_deref();

    if let Err(err) = validate(&config) {
        return error_body("VALIDATION_ERROR", err.to_string(), Value::Null);
    }
    if !state.allow_private_hosts && is_private_host(&config.url) {
        return error_body(
            "PRIVATE_HOST_BLOCKED",
            "Requests to private or loopback hosts are not allowed",
            Value::String(config.url.clone()),
        );
    }

    let lookup = match courier {
        Some(name) => match find_courier(state.store.as_ref(), name).await {
            Ok(Some(record)) => CredentialLookup::found(StoredCredentials::from_record(&record)),
            Ok(None) => CredentialLookup::missing(format!("no stored courier named '{name}'")),
            Err(err) => {
                return error_body(
                    "PERSISTENCE_ERROR",
                    "Credential lookup failed",
                    Value::String(err.to_string()),
                );
            }
        },
        None => CredentialLookup::missing("no courier identifier supplied"),
    };
    let stored = lookup.credentials.clone().unwrap_or_default();

    let spec = effective_auth_from_env(&config.auth, lookup.credentials.as_ref(), courier);
    let mut resolved = match resolve_auth(&state.http, &spec).await {
        Ok(resolved) => resolved,
        Err(err) => return err.into_api_error().into_body(),
    };
    state
        .overrides
        .apply_forced_headers(courier, &stored, &mut resolved);

    let prepared = build_request(&config, &resolved, &state.overrides.tracking_body(courier));
    info!(url = %prepared.url, method = prepared.method.as_str(), "proxying courier call");
    execute(&state.http, &prepared).await.into_body()
}

/// Mapping-module request: a stored courier by name, optionally with the
/// mapping rows inlined (otherwise the persisted ones are used).
#[derive(Debug, Deserialize)]
pub struct MappingModuleRequest {
    pub courier: String,
    #[serde(default)]
    pub mappings: Option<Vec<FieldMapping>>,
}

/// `POST /mapping-module`
pub async fn mapping_module(
    State(state): State<AppState>,
    Json(request): Json<MappingModuleRequest>,
) -> (StatusCode, Json<Value>) {
    let record = match find_courier(state.store.as_ref(), &request.courier).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(error_body(
                    "COURIER_NOT_FOUND",
                    format!("no stored courier named '{}'", request.courier),
                    Value::Null,
                )),
            );
        }
        Err(err) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(error_body(
                    "PERSISTENCE_ERROR",
                    "Courier lookup failed",
                    Value::String(err.to_string()),
                )),
            );
        }
    };
    let Some(courier) = Courier::from_value(&record) else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(error_body(
                "INVALID_RECORD",
                "Stored courier record has an unexpected shape",
                record,
            )),
        );
    };

    let mappings = match request.mappings {
        Some(mappings) => mappings,
        None => match mappings_for_courier(state.store.as_ref(), &courier.id).await {
            Ok(mappings) => mappings,
            Err(err) => {
                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(error_body(
                        "PERSISTENCE_ERROR",
                        "Mapping lookup failed",
                        Value::String(err.to_string()),
                    )),
                );
            }
        },
    };

    let source = compile(&courier, &mappings, &CompileOptions::default());
    (
        StatusCode::OK,
        Json(json!({
            "filename": module_filename(&courier),
            "source": source,
        })),
    )
}

/// `GET /health`
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
