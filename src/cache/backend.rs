//! Storage Backend Module
//!
//! The durable key/value primitive underneath the persistent tier.
//! `SqliteBackend` is the durable implementation; `InMemoryBackend` keeps
//! records in process memory for ephemeral caches and tests.

use std::collections::HashMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

// == Storage Backend ==
/// Host-provided durable storage.
///
/// Every failure is reported as `CacheError::StorageUnavailable`.
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// Creates the underlying schema. May be called more than once.
    async fn open(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Upserts the record at `entry.key`.
    async fn put(&self, entry: &CacheEntry) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Every stored record.
    async fn scan(&self) -> Result<Vec<CacheEntry>>;

    /// Keys of records with `now - timestamp > ttl`.
    async fn expired_keys(&self, now: u64) -> Result<Vec<String>> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key)
            .collect())
    }

    /// Drops every record.
    async fn clear(&self) -> Result<()>;
}

// == SQLite Backend ==
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS cache_entries (
        key       TEXT PRIMARY KEY NOT NULL,
        timestamp INTEGER NOT NULL,
        ttl       INTEGER NOT NULL,
        size      INTEGER NOT NULL,
        record    TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_cache_entries_timestamp ON cache_entries(timestamp);
";

/// SQLite-backed durable store.
///
/// The connection lives behind a mutex and every statement runs on the
/// blocking pool.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    path: Option<PathBuf>,
    conn: Arc<Mutex<Option<Connection>>>,
}

impl SqliteBackend {
    /// A backend persisting to the database file at `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: Some(path.as_ref().to_path_buf()),
            conn: Arc::new(Mutex::new(None)),
        }
    }

    /// A backend over a private in-memory database (for testing).
    pub fn in_memory() -> Self {
        Self {
            path: None,
            conn: Arc::new(Mutex::new(None)),
        }
    }

    async fn with_conn<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || -> Result<R> {
            let guard = conn.lock();
            let conn = guard.as_ref().ok_or_else(|| {
                CacheError::StorageUnavailable("database is not open".to_string())
            })?;
            f(conn).map_err(CacheError::from)
        })
        .await?
    }
}

/// SQLite integers are signed; larger values saturate so a huge TTL never
/// turns negative and reads as expired.
fn to_sql_int(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn decode(record: &str) -> Result<CacheEntry> {
    serde_json::from_str(record).map_err(|e| {
        CacheError::StorageUnavailable(format!("corrupt cache record: {}", e))
    })
}

#[async_trait]
impl StorageBackend for SqliteBackend {
    async fn open(&self) -> Result<()> {
        let conn = Arc::clone(&self.conn);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut guard = conn.lock();
            if guard.is_some() {
                return Ok(());
            }

            let connection = match &path {
                Some(path) => {
                    let connection = Connection::open(path)?;
                    connection.execute_batch("PRAGMA journal_mode=WAL;")?;
                    connection
                }
                None => Connection::open_in_memory()?,
            };
            connection.execute_batch(SCHEMA)?;

            info!(path = ?path, "Opened cache database");
            *guard = Some(connection);
            Ok(())
        })
        .await?
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        let key = key.to_string();
        let record = self
            .with_conn(move |conn| {
                conn.query_row(
                    "SELECT record FROM cache_entries WHERE key = ?1",
                    params![key],
                    |row| row.get::<_, String>(0),
                )
                .optional()
            })
            .await?;

        record.as_deref().map(decode).transpose()
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        let record = serde_json::to_string(entry)?;
        let key = entry.key.clone();
        let timestamp = to_sql_int(entry.timestamp);
        let ttl = to_sql_int(entry.ttl);
        let size = to_sql_int(entry.size as u64);

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO cache_entries (key, timestamp, ttl, size, record)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(key) DO UPDATE SET
                     timestamp = excluded.timestamp,
                     ttl = excluded.ttl,
                     size = excluded.size,
                     record = excluded.record",
                params![key, timestamp, ttl, size, record],
            )
            .map(|_| ())
        })
        .await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM cache_entries WHERE key = ?1", params![key])
                .map(|_| ())
        })
        .await
    }

    async fn scan(&self) -> Result<Vec<CacheEntry>> {
        let records = self
            .with_conn(|conn| {
                let mut stmt =
                    conn.prepare("SELECT record FROM cache_entries ORDER BY timestamp")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()
            })
            .await?;

        records.iter().map(|record| decode(record)).collect()
    }

    async fn expired_keys(&self, now: u64) -> Result<Vec<String>> {
        let now = to_sql_int(now);
        let keys = self
            .with_conn(move |conn| {
                // `timestamp < now` narrows the scan through the timestamp index
                let mut stmt = conn.prepare(
                    "SELECT key FROM cache_entries
                     WHERE timestamp < ?1 AND ?1 - timestamp > ttl
                     ORDER BY timestamp",
                )?;
                let rows = stmt.query_map(params![now], |row| row.get::<_, String>(0))?;
                rows.collect::<rusqlite::Result<Vec<String>>>()
            })
            .await?;

        debug!(count = keys.len(), "Found expired cache records");
        Ok(keys)
    }

    async fn clear(&self) -> Result<()> {
        self.with_conn(|conn| conn.execute("DELETE FROM cache_entries", []).map(|_| ()))
            .await
    }
}

// == In-Memory Backend ==
/// Non-durable backend keeping records in a HashMap.
#[derive(Debug, Default, Clone)]
pub struct InMemoryBackend {
    records: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn open(&self) -> Result<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.records.lock().get(key).cloned())
    }

    async fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.records
            .lock()
            .insert(entry.key.clone(), entry.clone());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.records.lock().remove(key);
        Ok(())
    }

    async fn scan(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.records.lock().values().cloned().collect())
    }

    async fn clear(&self) -> Result<()> {
        self.records.lock().clear();
        Ok(())
    }
}
