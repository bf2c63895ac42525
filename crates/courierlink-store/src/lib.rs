// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Record store for courier integration configuration.
//!
//! The console persists small JSON documents in named collections —
//! couriers, clients, field mappings, courier↔client links. [`RecordStore`]
//! is the access abstraction; [`memory::MemoryStore`] backs tests and local
//! runs, [`postgres::PostgresStore`] backs deployments.

pub mod memory;
pub mod postgres;

pub use self::memory::MemoryStore;
pub use self::postgres::PostgresStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Collection names used by the console.
pub mod collections {
    pub const COURIERS: &str = "couriers";
    pub const CLIENTS: &str = "clients";
    pub const FIELD_MAPPINGS: &str = "field_mappings";
    pub const COURIER_CLIENTS: &str = "courier_clients";
}

/// Result type using StoreError.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from the record store.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// No record with this id in the collection.
    #[error("record {id} not found in {collection}")]
    NotFound { collection: String, id: String },

    /// The backend failed.
    #[error("store backend error: {0}")]
    Backend(#[from] sqlx::Error),

    /// A stored document did not have the expected shape.
    #[error("invalid record in {collection}: {reason}")]
    InvalidRecord { collection: String, reason: String },
}

/// Access to JSON records grouped into named collections.
///
/// Records are JSON objects carrying a string `id`. Create assigns one when
/// the caller does not provide it.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_all(&self, collection: &str) -> Result<Vec<Value>>;

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Insert a record, assigning a fresh id when absent. Returns the stored
    /// document.
    async fn create(&self, collection: &str, record: Value) -> Result<Value>;

    /// Replace the record with this id. Fields not present in `record` are
    /// dropped; the `id` field is forced to match.
    async fn update(&self, collection: &str, id: &str, record: Value) -> Result<Value>;

    async fn remove(&self, collection: &str, id: &str) -> Result<()>;
}

/// A courier integration record, as stored in the `couriers` collection.
///
/// Credential fields sit alongside the endpoint configuration; the request
/// core re-parses them into its own credential type so the two crates stay
/// decoupled at the JSON boundary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Courier {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_intent: Option<String>,
}

impl Courier {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// One API-field → TMS-field mapping row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    pub id: String,
    pub courier_id: String,
    /// Dotted path into the courier API payload, e.g. `shipment.tracking[0].status`.
    pub api_field: String,
    /// Target TMS field name; empty means "discovered but not mapped".
    pub tms_field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_type: Option<String>,
}

impl FieldMapping {
    pub fn from_value(value: &Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

/// Find a courier by name, case-insensitively. Returns the raw record.
pub async fn find_courier(store: &dyn RecordStore, name: &str) -> Result<Option<Value>> {
    let records = store.get_all(collections::COURIERS).await?;
    Ok(records.into_iter().find(|record| {
        record
            .get("name")
            .and_then(Value::as_str)
            .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
    }))
}

/// Field mappings belonging to one courier.
pub async fn mappings_for_courier(
    store: &dyn RecordStore,
    courier_id: &str,
) -> Result<Vec<FieldMapping>> {
    let records = store.get_all(collections::FIELD_MAPPINGS).await?;
    Ok(records
        .iter()
        .filter_map(FieldMapping::from_value)
        .filter(|mapping| mapping.courier_id == courier_id)
        .collect())
}
