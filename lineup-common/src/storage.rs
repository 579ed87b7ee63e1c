//! Key-value storage abstraction
//!
//! The bot asks storage for exactly four things: save/load a snapshot blob
//! keyed by schedule id, and save/load one bounded log string. Saves are
//! best-effort; callers log failures and keep the in-memory state
//! authoritative.

use crate::Result;
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;
use tokio::sync::Mutex;

const LOG_KEY: &str = "logs";

#[async_trait]
pub trait Storage: Send + Sync {
    async fn save_snapshot(&self, schedule_id: i64, blob: &str) -> Result<()>;
    async fn load_snapshot(&self, schedule_id: i64) -> Result<Option<String>>;
    async fn save_log(&self, text: &str) -> Result<()>;
    async fn load_log(&self) -> Result<Option<String>>;
}

/// SQLite-backed storage, one `kv` table
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn open(path: &Path) -> Result<SqliteStorage> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .connect_with(options)
            .await?;
        sqlx::query("CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&pool)
            .await?;
        Ok(SqliteStorage { pool })
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO kv (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar::<_, String>("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(value)
    }
}

fn snapshot_key(schedule_id: i64) -> String {
    format!("bot:{schedule_id}")
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn save_snapshot(&self, schedule_id: i64, blob: &str) -> Result<()> {
        self.put(&snapshot_key(schedule_id), blob).await
    }

    async fn load_snapshot(&self, schedule_id: i64) -> Result<Option<String>> {
        self.get(&snapshot_key(schedule_id)).await
    }

    async fn save_log(&self, text: &str) -> Result<()> {
        self.put(LOG_KEY, text).await
    }

    async fn load_log(&self) -> Result<Option<String>> {
        self.get(LOG_KEY).await
    }
}

/// In-memory storage for tests and `--check` runs
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> MemoryStorage {
        MemoryStorage::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_snapshot(&self, schedule_id: i64, blob: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(snapshot_key(schedule_id), blob.to_string());
        Ok(())
    }

    async fn load_snapshot(&self, schedule_id: i64) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(&snapshot_key(schedule_id)).cloned())
    }

    async fn save_log(&self, text: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(LOG_KEY.to_string(), text.to_string());
        Ok(())
    }

    async fn load_log(&self) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(LOG_KEY).cloned())
    }
}
