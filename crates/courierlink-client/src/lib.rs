// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Outbound request core for courier tracking integrations.
//!
//! This crate turns a declarative [`RequestConfig`](types::RequestConfig) —
//! method, URL, auth scheme, headers, body, intent — into an executed call
//! against an arbitrary third-party tracking API:
//!
//! 1. [`auth::resolve_auth`] materializes the declared [`auth::AuthSpec`]
//!    into concrete headers, performing the two-phase `jwt_auth` token
//!    acquisition when needed;
//! 2. [`request::build_request`] assembles the full outbound request as a
//!    pure transformation (header merge pipeline, query-string assembly,
//!    body encoding, intent-specific augmentation);
//! 3. [`classify::execute`] dispatches it and normalizes every outcome —
//!    success, HTTP error, transport failure — into one
//!    [`types::ApiResult`], never an exception.
//!
//! Per-courier quirks (forced headers, non-standard tracking body shapes)
//! live in the declarative [`overrides::CourierOverrides`] table rather than
//! in the core paths.

pub mod auth;
pub mod classify;
pub mod credentials;
pub mod overrides;
pub mod request;
pub mod types;

pub use auth::{
    ApiKeyLocation, AuthError, AuthSpec, DEFAULT_API_KEY_NAME, DEFAULT_TOKEN_PATH, ResolvedAuth,
    ensure_bearer_prefix, resolve_auth,
};
pub use classify::{DEFAULT_TIMEOUT, default_client, execute, humanize_network_code};
pub use credentials::{
    CredentialLookup, StoredCredentials, effective_auth, effective_auth_from_env,
};
pub use overrides::{CourierOverrides, ForcedHeader, HeaderSource, OverrideRule, TrackingBody};
pub use request::{
    PreparedRequest, RequestBody, ValidationError, build_request, is_private_host, validate,
};
pub use types::{
    ApiError, ApiResult, HttpMethod, KeyValue, RequestConfig, TRACK_SHIPMENT_INTENT, http_error,
    network_error,
};
