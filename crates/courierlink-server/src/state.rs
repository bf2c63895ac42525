// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Shared application state.

use courierlink_client::{
    CourierOverrides, ForcedHeader, HeaderSource, OverrideRule, TrackingBody, default_client,
};
use courierlink_store::RecordStore;
use std::sync::Arc;

/// State handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Shared outbound HTTP client (fixed timeout, connection reuse).
    pub http: reqwest::Client,
    pub store: Arc<dyn RecordStore>,
    pub overrides: Arc<CourierOverrides>,
    /// Policy escape hatch for tests and local development.
    pub allow_private_hosts: bool,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RecordStore>,
        allow_private_hosts: bool,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: default_client()?,
            store,
            overrides: Arc::new(default_overrides()),
            allow_private_hosts,
        })
    }
}

/// Per-courier quirks shipped with the server.
///
/// Safexpress wants both `Authorization` and `x-api-key` on every tracking
/// call regardless of the declared auth type, and a `{docNo, docType}` body
/// instead of the standard shape.
pub fn default_overrides() -> CourierOverrides {
    CourierOverrides::new().with_rule(
        "safexpress",
        OverrideRule {
            forced_headers: vec![
                ForcedHeader::new("Authorization", HeaderSource::BearerToken),
                ForcedHeader::new("x-api-key", HeaderSource::ApiKey),
            ],
            tracking_body: Some(TrackingBody::DocNoWithType {
                doc_type: "WB".to_string(),
            }),
        },
    )
}
