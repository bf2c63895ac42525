// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Declarative per-courier override table.
//!
//! Some integrations need more than their declared auth scheme describes —
//! e.g. a courier whose tracking endpoint wants *both* `Authorization` and
//! `x-api-key` at once, and a non-standard tracking body. Those quirks live
//! here as data keyed by courier identifier, so the auth and request
//! pipelines stay generic.

use crate::auth::{ResolvedAuth, ensure_bearer_prefix};
use crate::credentials::StoredCredentials;
use std::collections::HashMap;

/// Where a forced header takes its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderSource {
    /// The courier's stored API key.
    ApiKey,
    /// The session bearer token, `Bearer ` prefix ensured.
    BearerToken,
    /// A fixed value.
    Literal(String),
}

/// One header a courier integration always requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForcedHeader {
    pub name: String,
    pub source: HeaderSource,
}

impl ForcedHeader {
    pub fn new(name: impl Into<String>, source: HeaderSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }
}

/// Body shape merged into body-bearing `track_shipment` requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrackingBody {
    /// `{docNo, trackingNumber}`.
    #[default]
    Standard,
    /// `{docNo, docType}` with a fixed document type.
    DocNoWithType { doc_type: String },
}

/// Extra rules for one courier.
#[derive(Debug, Clone, Default)]
pub struct OverrideRule {
    pub forced_headers: Vec<ForcedHeader>,
    pub tracking_body: Option<TrackingBody>,
}

/// Lookup table of per-courier rules, keyed case-insensitively by courier
/// name/identifier.
#[derive(Debug, Clone, Default)]
pub struct CourierOverrides {
    rules: HashMap<String, OverrideRule>,
}

impl CourierOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule(mut self, courier: impl AsRef<str>, rule: OverrideRule) -> Self {
        self.rules
            .insert(courier.as_ref().to_lowercase(), rule);
        self
    }

    pub fn rule(&self, courier: &str) -> Option<&OverrideRule> {
        self.rules.get(&courier.to_lowercase())
    }

    /// Tracking-body shape for a courier; `Standard` when no rule applies.
    pub fn tracking_body(&self, courier: Option<&str>) -> TrackingBody {
        courier
            .and_then(|name| self.rule(name))
            .and_then(|rule| rule.tracking_body.clone())
            .unwrap_or_default()
    }

    /// Inject a courier's forced headers into resolved auth material,
    /// overwriting same-named entries. Header values come from the stored
    /// credentials; a missing credential just skips that header.
    pub fn apply_forced_headers(
        &self,
        courier: Option<&str>,
        credentials: &StoredCredentials,
        resolved: &mut ResolvedAuth,
    ) {
        let Some(rule) = courier.and_then(|name| self.rule(name)) else {
            return;
        };
        for forced in &rule.forced_headers {
            let value = match &forced.source {
                HeaderSource::ApiKey => credentials.api_key.clone(),
                HeaderSource::BearerToken => credentials
                    .token
                    .as_deref()
                    .map(ensure_bearer_prefix),
                HeaderSource::Literal(value) => Some(value.clone()),
            };
            let Some(value) = value else {
                continue;
            };
            resolved
                .headers
                .retain(|(name, _)| !name.eq_ignore_ascii_case(&forced.name));
            resolved.headers.push((forced.name.clone(), value));
        }
    }
}
