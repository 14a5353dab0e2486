//! `IKeyValueStore` adapters
//!
//! [`SqliteKeyValueStore`] persists JSON documents in the `kv_store` table;
//! [`MemoryKeyValueStore`] keeps them in a concurrent map for tests and
//! one-shot CLI runs.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use sqlx::SqlitePool;

use filen_core::ports::IKeyValueStore;

use crate::CacheError;

/// SQLite-backed key-value store
///
/// Values are stored as JSON text; `updated_at` records the last write in
/// RFC 3339.
#[derive(Debug, Clone)]
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    /// Creates a store over an already migrated pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All keys starting with `prefix`, sorted
    pub async fn keys_with_prefix(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let keys: Vec<String> =
            sqlx::query_scalar("SELECT key FROM kv_store WHERE key LIKE ? ESCAPE '\\' ORDER BY key")
                .bind(&pattern)
                .fetch_all(&self.pool)
                .await
                .map_err(CacheError::from)?;
        Ok(keys)
    }
}

#[async_trait]
impl IKeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(CacheError::from)?;

        match raw {
            Some(text) => {
                let value = serde_json::from_str(&text).map_err(|e| {
                    CacheError::SerializationError(format!("Invalid JSON under '{key}': {e}"))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()> {
        let text = serde_json::to_string(&value)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;

        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(&text)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(CacheError::from)?;

        tracing::trace!(key, bytes = text.len(), "Stored value");
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;
        Ok(())
    }
}

/// In-memory key-value store
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    values: DashMap<String, serde_json::Value>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[async_trait]
impl IKeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
        Ok(self.values.get(key).map(|v| v.value().clone()))
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_store_roundtrip() {
        let store = MemoryKeyValueStore::new();
        assert!(store.get("missing").await.unwrap().is_none());

        store.set("k", json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!({"a": 1})));

        store.set("k", json!(false)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(false)));
        assert_eq!(store.len(), 1);

        store.delete("k").await.unwrap();
        store.delete("k").await.unwrap();
        assert!(store.is_empty());
    }
}
