// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! In-memory record store for tests and local runs.

use crate::{RecordStore, Result, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Non-durable store backed by a nested map. Records within a collection are
/// ordered by id so listings are deterministic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn ensure_id(record: &mut Value) -> Result<String> {
    let Some(object) = record.as_object_mut() else {
        return Err(StoreError::InvalidRecord {
            collection: String::new(),
            reason: "record must be a JSON object".to_string(),
        });
    };
    let id = match object.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            let id = Uuid::new_v4().to_string();
            object.insert("id".to_string(), Value::String(id.clone()));
            id
        }
    };
    Ok(id)
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn create(&self, collection: &str, mut record: Value) -> Result<Value> {
        let id = ensure_id(&mut record).map_err(|err| match err {
            StoreError::InvalidRecord { reason, .. } => StoreError::InvalidRecord {
                collection: collection.to_string(),
                reason,
            },
            other => other,
        })?;
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(id, record.clone());
        Ok(record)
    }

    async fn update(&self, collection: &str, id: &str, mut record: Value) -> Result<Value> {
        let Some(object) = record.as_object_mut() else {
            return Err(StoreError::InvalidRecord {
                collection: collection.to_string(),
                reason: "record must be a JSON object".to_string(),
            });
        };
        object.insert("id".to_string(), Value::String(id.to_string()));

        let mut collections = self.collections.write().await;
        let records = collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;
        if !records.contains_key(id) {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        records.insert(id.to_string(), record.clone());
        Ok(record)
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        let removed = collections
            .get_mut(collection)
            .and_then(|records| records.remove(id));
        if removed.is_none() {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
