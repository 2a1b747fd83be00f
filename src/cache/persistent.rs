//! Persistent Tier Module
//!
//! Durable second tier over a `StorageBackend`, opened lazily on first use.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::cache::{CacheEntry, Clock, StorageBackend};
use crate::error::{CacheError, Result};

// == Persistent Tier ==
/// Unbounded durable tier. Entries leave only through `delete`, `clear`,
/// expiry discovered on read, or `sweep`.
#[derive(Debug)]
pub struct PersistentTier {
    backend: Arc<dyn StorageBackend>,
    clock: Arc<dyn Clock>,
    opened: OnceCell<()>,
}

impl PersistentTier {
    pub fn new(backend: Arc<dyn StorageBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            opened: OnceCell::new(),
        }
    }

    // == Open ==
    /// Initializes the backend once. Concurrent callers await the same
    /// initialization; a failed attempt is retried by the next caller.
    pub async fn open(&self) -> Result<()> {
        self.opened
            .get_or_try_init(|| async {
                self.backend.open().await?;
                debug!("Persistent tier opened");
                Ok::<(), CacheError>(())
            })
            .await
            .map(|_| ())
    }

    pub fn is_open(&self) -> bool {
        self.opened.initialized()
    }

    // == Get ==
    /// Returns a fresh entry. An expired record is deleted and reported as a miss.
    pub async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.open().await?;

        let Some(entry) = self.backend.get(key).await? else {
            return Ok(None);
        };

        if entry.is_expired(self.clock.now_ms()) {
            if let Err(e) = self.backend.delete(key).await {
                debug!(key, error = %e, "Failed to drop expired record, leaving it to sweep");
            }
            return Ok(None);
        }

        Ok(Some(entry))
    }

    // == Get Stale ==
    /// Returns the record whether or not it has expired.
    pub async fn get_stale(&self, key: &str) -> Result<Option<CacheEntry>> {
        self.open().await?;
        self.backend.get(key).await
    }

    // == Put ==
    /// Upserts `entry`, replacing any prior record in full.
    pub async fn put(&self, entry: &CacheEntry) -> Result<()> {
        self.open().await?;
        self.backend.put(entry).await
    }

    // == Delete ==
    pub async fn delete(&self, key: &str) -> Result<()> {
        self.open().await?;
        self.backend.delete(key).await
    }

    // == Clear ==
    /// Drops the whole durable store.
    pub async fn clear(&self) -> Result<()> {
        self.open().await?;
        self.backend.clear().await
    }

    // == Sweep ==
    /// Removes every expired record and returns how many were removed.
    ///
    /// A record that fails to delete is skipped and retried on the next sweep.
    pub async fn sweep(&self) -> Result<usize> {
        self.open().await?;

        let expired = self.backend.expired_keys(self.clock.now_ms()).await?;
        let mut removed = 0;
        for key in &expired {
            match self.backend.delete(key).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(key = %key, error = %e, "Sweep failed to delete record"),
            }
        }

        if removed > 0 {
            info!(removed, "Persistent sweep removed expired records");
        }
        Ok(removed)
    }

    /// Every stored record, including expired ones.
    pub async fn entries(&self) -> Result<Vec<CacheEntry>> {
        self.open().await?;
        self.backend.scan().await
    }
}
