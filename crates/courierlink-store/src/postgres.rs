// Copyright (C) 2025 Courierlink Ltd.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed record store.
//!
//! All collections share one `records` table keyed by `(collection, id)`
//! with the document in a `jsonb` column. Schema setup is embedded; call
//! [`PostgresStore::migrate`] once at startup.

use crate::{RecordStore, Result, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;
use sqlx::Row;
use tracing::info;
use uuid::Uuid;

/// Embedded migrations for the records table.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/postgresql");

#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect and run migrations.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    /// Apply pending migrations. Safe to call repeatedly.
    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(sqlx::Error::from)?;
        info!("record store migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn ensure_object_id(collection: &str, record: &mut Value, forced: Option<&str>) -> Result<String> {
    let Some(object) = record.as_object_mut() else {
        return Err(StoreError::InvalidRecord {
            collection: collection.to_string(),
            reason: "record must be a JSON object".to_string(),
        });
    };
    if let Some(id) = forced {
        object.insert("id".to_string(), Value::String(id.to_string()));
        return Ok(id.to_string());
    }
    match object.get("id").and_then(Value::as_str) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => {
            let id = Uuid::new_v4().to_string();
            object.insert("id".to_string(), Value::String(id.clone()));
            Ok(id)
        }
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn get_all(&self, collection: &str) -> Result<Vec<Value>> {
        let rows = sqlx::query(
            r#"
            SELECT data
            FROM records
            WHERE collection = $1
            ORDER BY id
            "#,
        )
        .bind(collection)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<Value, _>("data"))
            .collect())
    }

    async fn get_by_id(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let row = sqlx::query(
            r#"
            SELECT data
            FROM records
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| row.get::<Value, _>("data")))
    }

    async fn create(&self, collection: &str, mut record: Value) -> Result<Value> {
        let id = ensure_object_id(collection, &mut record, None)?;
        sqlx::query(
            r#"
            INSERT INTO records (collection, id, data)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id)
            DO UPDATE SET data = EXCLUDED.data, updated_at = NOW()
            "#,
        )
        .bind(collection)
        .bind(&id)
        .bind(&record)
        .execute(&self.pool)
        .await?;
        Ok(record)
    }

    async fn update(&self, collection: &str, id: &str, mut record: Value) -> Result<Value> {
        ensure_object_id(collection, &mut record, Some(id))?;
        let result = sqlx::query(
            r#"
            UPDATE records
            SET data = $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(&record)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(record)
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM records
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }
}
