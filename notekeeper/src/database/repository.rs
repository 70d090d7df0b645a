//! Repository layer for database operations
//!
//! Stores JSON documents in a single SQLite key-value table.
//! Every write replaces the whole document for its key.

use super::models::KvEntry;
use crate::error::Result;
use crate::storage::KeyValueStore;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::SqlitePool;

/// Repository for database operations
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch the raw row for a key
    pub async fn get_entry(&self, key: &str) -> Result<Option<KvEntry>> {
        let entry = sqlx::query_as::<_, KvEntry>(
            r#"
            SELECT key, value, updated_at FROM kv_store WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Insert or replace the JSON document stored under `key`
    pub async fn put_raw(&self, key: &str, json: &str) -> Result<()> {
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(json)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("Stored key: {} ({} bytes)", key, json.len());
        Ok(())
    }

    /// Remove a key, returns whether a row existed
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let rows = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::debug!("Removed key: {} (existed: {})", key, rows > 0);
        Ok(rows > 0)
    }
}

#[async_trait]
impl KeyValueStore for Repository {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        match self.get_entry(key).await? {
            Some(entry) => Ok(Some(serde_json::from_str(&entry.value)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.put_raw(key, &json).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.remove(key).await?;
        Ok(())
    }
}
