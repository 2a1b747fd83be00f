//! Cache Orchestrator Module
//!
//! `TieredCache` is the single entry point over the memory and persistent tiers.
//! It runs the fetch strategies and writes fetched values through both tiers.
//!
//! Concurrent writes to one key are not serialized: in each tier the write
//! that completes last wins. Concurrent fetches of one key that would write
//! the same TTL and strategy are coalesced.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::inflight::{FlightKey, InFlight};
use crate::cache::{
    CacheEntry, CacheStats, Clock, MemoryTier, PersistentTier, StorageBackend, Strategy,
    SystemClock, MAX_KEY_LENGTH,
};
use crate::config::Config;
use crate::error::{CacheError, Result};
use crate::tasks::Janitor;

// == Fetcher ==
/// Caller-supplied producer of the value to cache. Invoked at most once per `get`.
pub type Fetcher<T> = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<T>> + Send>;

/// Wraps an async closure as a [`Fetcher`].
///
/// ```ignore
/// let user = cache
///     .get("user:1", Some(fetcher(|| async { api.user(1).await })), GetOptions::default())
///     .await?;
/// ```
pub fn fetcher<T, F, Fut>(f: F) -> Fetcher<T>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
{
    Box::new(move || f().boxed())
}

// == Options ==
/// Per-call options for [`TieredCache::get`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// TTL for entries written by this call; the configured default if `None`
    pub ttl_ms: Option<u64>,
    /// Strategy for this call; the configured default if `None`
    pub strategy: Option<Strategy>,
    /// Skip tier reads but still write through
    pub force: bool,
}

impl GetOptions {
    pub fn strategy(strategy: Strategy) -> Self {
        Self {
            strategy: Some(strategy),
            ..Self::default()
        }
    }

    pub fn with_ttl(mut self, ttl_ms: u64) -> Self {
        self.ttl_ms = Some(ttl_ms);
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Per-call options for [`TieredCache::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    pub ttl_ms: Option<u64>,
    pub strategy: Option<Strategy>,
    pub etag: Option<String>,
    pub headers: Option<std::collections::HashMap<String, String>>,
}

impl SetOptions {
    pub fn ttl(ttl_ms: u64) -> Self {
        Self {
            ttl_ms: Some(ttl_ms),
            ..Self::default()
        }
    }
}

// == Tiers ==
/// Handles to both tiers and the shared clock.
#[derive(Debug, Clone)]
pub(crate) struct Tiers {
    pub(crate) memory: Arc<Mutex<MemoryTier>>,
    pub(crate) persistent: Arc<PersistentTier>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl Tiers {
    /// Memory, then persistent. A persistent hit is promoted into memory.
    async fn read(&self, key: &str) -> Option<CacheEntry> {
        let now = self.clock.now_ms();
        if let Some(entry) = self.memory.lock().get(key, now) {
            debug!(key, ttl_remaining_ms = entry.ttl_remaining_ms(now), "Memory tier hit");
            return Some(entry);
        }

        match self.persistent.get(key).await {
            Ok(Some(entry)) => {
                debug!(key, "Persistent tier hit, promoting to memory");
                if let Err(e) = self.memory.lock().put(entry.clone()) {
                    debug!(key, error = %e, "Skipped promotion into memory tier");
                }
                Some(entry)
            }
            Ok(None) => {
                debug!(key, "Miss in both tiers");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Persistent tier read failed, continuing memory-only");
                None
            }
        }
    }

    /// Like `read` but returns expired entries too. Nothing is promoted.
    async fn read_stale(&self, key: &str) -> Option<CacheEntry> {
        if let Some(entry) = self.memory.lock().peek_stale(key) {
            return Some(entry);
        }

        match self.persistent.get_stale(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Persistent tier read failed during fallback");
                None
            }
        }
    }

    /// Writes a fetched value through both tiers. Never fails the caller.
    async fn populate(&self, key: &str, data: Value, ttl: u64, strategy: Strategy) {
        let entry = match CacheEntry::new(key, data, ttl, strategy, self.clock.now_ms()) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Could not size fetched value, not caching it");
                return;
            }
        };

        match self.memory.lock().put(entry.clone()) {
            Ok(evicted) if !evicted.is_empty() => {
                debug!(key, evicted = ?evicted, "Evicted entries to admit fetched value");
            }
            Ok(_) => {}
            Err(e) => debug!(key, error = %e, "Fetched value kept out of memory tier"),
        }

        if let Err(e) = self.persistent.put(&entry).await {
            warn!(key, error = %e, "Persistent write failed, entry cached in memory only");
        }
    }
}

// == Tiered Cache ==
struct Inner {
    tiers: Tiers,
    inflight: InFlight,
    janitor: Janitor,
    default_ttl_ms: u64,
    default_strategy: Strategy,
}

/// Two-tier cache with strategy-driven reads.
///
/// Cheap to clone; clones share the same tiers. Constructed explicitly with
/// [`TieredCache::create`] and shut down with [`TieredCache::destroy`].
#[derive(Clone)]
pub struct TieredCache {
    inner: Arc<Inner>,
}

impl TieredCache {
    // == Create ==
    /// Builds a cache over `backend` and starts its janitor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create(config: &Config, backend: Arc<dyn StorageBackend>) -> Result<Self> {
        Self::with_clock(config, backend, Arc::new(SystemClock))
    }

    /// Like [`create`](Self::create) with an explicit clock.
    pub fn with_clock(
        config: &Config,
        backend: Arc<dyn StorageBackend>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        if config.default_ttl_ms == 0 {
            return Err(CacheError::InvalidRequest(
                "default TTL must be positive".to_string(),
            ));
        }
        if config.cleanup_interval_ms == 0 {
            return Err(CacheError::InvalidRequest(
                "cleanup interval must be positive".to_string(),
            ));
        }

        let tiers = Tiers {
            memory: Arc::new(Mutex::new(MemoryTier::new(config.max_size))),
            persistent: Arc::new(PersistentTier::new(backend, Arc::clone(&clock))),
            clock,
        };
        let janitor = Janitor::new(
            tiers.clone(),
            Duration::from_millis(config.cleanup_interval_ms),
        );
        janitor.start();

        Ok(Self {
            inner: Arc::new(Inner {
                tiers,
                inflight: InFlight::new(),
                janitor,
                default_ttl_ms: config.default_ttl_ms,
                default_strategy: config.strategy,
            }),
        })
    }

    // == Destroy ==
    /// Stops the janitor. Cached data is left in place.
    pub fn destroy(&self) {
        self.inner.janitor.stop();
    }

    /// The periodic sweeper owned by this cache.
    pub fn janitor(&self) -> &Janitor {
        &self.inner.janitor
    }

    // == Get ==
    /// Reads `key` according to the effective strategy.
    ///
    /// Returns `Ok(None)` only under cache-only on a full miss. A fetcher is
    /// required for every other strategy.
    pub async fn get<T>(
        &self,
        key: &str,
        fetcher: Option<Fetcher<T>>,
        options: GetOptions,
    ) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        validate_key(key)?;
        let strategy = options.strategy.unwrap_or(self.inner.default_strategy);
        let ttl = self.resolve_ttl(options.ttl_ms)?;

        let fetcher = match (strategy, fetcher) {
            (Strategy::CacheOnly, _) => None,
            (_, Some(fetcher)) => Some(fetcher),
            (_, None) => {
                return Err(CacheError::InvalidRequest(format!(
                    "a fetcher is required for the {} strategy",
                    strategy
                )))
            }
        };

        match (strategy, fetcher) {
            (Strategy::CacheOnly, _) => match self.inner.tiers.read(key).await {
                Some(entry) => decode(entry.data).map(Some),
                None => Ok(None),
            },

            (Strategy::NetworkOnly, Some(fetcher)) => fetcher()
                .await
                .map(Some)
                .map_err(|e| fetch_failed(key, e)),

            (Strategy::CacheFirst, Some(fetcher)) => {
                if !options.force {
                    if let Some(entry) = self.inner.tiers.read(key).await {
                        return decode(entry.data).map(Some);
                    }
                }
                self.fetch_through(key, fetcher, ttl, strategy).await.map(Some)
            }

            (Strategy::NetworkFirst, Some(fetcher)) => {
                match self.fetch_through(key, fetcher, ttl, strategy).await {
                    Ok(value) => Ok(Some(value)),
                    Err(err) if options.force => Err(err),
                    Err(err) => match self.inner.tiers.read_stale(key).await {
                        Some(entry) => {
                            warn!(key, error = %err, "Fetch failed, serving cached fallback");
                            decode(entry.data).map(Some)
                        }
                        None => Err(err),
                    },
                }
            }

            (Strategy::StaleWhileRevalidate, Some(fetcher)) => {
                if !options.force {
                    if let Some(entry) = self.inner.tiers.read(key).await {
                        self.spawn_refresh(key, fetcher, ttl, strategy);
                        return decode(entry.data).map(Some);
                    }
                }
                self.fetch_through(key, fetcher, ttl, strategy).await.map(Some)
            }

            (_, None) => Err(CacheError::Internal(format!(
                "no fetcher for the {} strategy",
                strategy
            ))),
        }
    }

    // == Set ==
    /// Writes `data` to both tiers.
    ///
    /// Fails with `EntryTooLarge` before touching either tier when the entry
    /// cannot fit in memory. A persistent write failure is logged and the
    /// entry stays cached in memory.
    pub async fn set<T>(&self, key: &str, data: T, options: SetOptions) -> Result<()>
    where
        T: Serialize,
    {
        validate_key(key)?;
        let ttl = self.resolve_ttl(options.ttl_ms)?;
        let strategy = options.strategy.unwrap_or(self.inner.default_strategy);
        let tiers = &self.inner.tiers;

        let entry = CacheEntry::new(
            key,
            serde_json::to_value(data)?,
            ttl,
            strategy,
            tiers.clock.now_ms(),
        )?
        .with_etag(options.etag)
        .with_headers(options.headers);

        let evicted = tiers.memory.lock().put(entry.clone())?;
        self.inner.inflight.forget(key);
        if !evicted.is_empty() {
            debug!(key, evicted = ?evicted, "Evicted entries to admit new entry");
        }

        if let Err(e) = tiers.persistent.put(&entry).await {
            warn!(key, error = %e, "Persistent write failed, entry cached in memory only");
        }
        Ok(())
    }

    // == Delete ==
    /// Removes `key` from both tiers. Deleting an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let tiers = &self.inner.tiers;

        tiers.memory.lock().delete(key);
        self.inner.inflight.forget(key);
        if let Err(e) = tiers.persistent.delete(key).await {
            warn!(key, error = %e, "Persistent delete failed");
        }
        Ok(())
    }

    // == Clear ==
    /// Empties both tiers, dropping the entire durable store.
    pub async fn clear(&self) -> Result<()> {
        let tiers = &self.inner.tiers;

        tiers.memory.lock().clear();
        self.inner.inflight.forget_all();
        if let Err(e) = tiers.persistent.clear().await {
            warn!(error = %e, "Persistent clear failed");
        }
        debug!("Cache cleared");
        Ok(())
    }

    // == Stats ==
    /// Memory tier statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.tiers.memory.lock().stats()
    }

    /// Keys currently held in memory, least recently used first.
    pub fn memory_keys(&self) -> Vec<String> {
        self.inner.tiers.memory.lock().keys()
    }

    fn resolve_ttl(&self, ttl_ms: Option<u64>) -> Result<u64> {
        match ttl_ms {
            Some(0) => Err(CacheError::InvalidRequest(
                "TTL must be positive".to_string(),
            )),
            Some(ttl) => Ok(ttl),
            None => Ok(self.inner.default_ttl_ms),
        }
    }

    /// Fetches `key` (joining any fetch already in flight) and writes it through.
    async fn fetch_through<T>(
        &self,
        key: &str,
        fetcher: Fetcher<T>,
        ttl: u64,
        strategy: Strategy,
    ) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
    {
        let flight = FlightKey::new(key, ttl, strategy);
        let (fetch, started) = self.inner.inflight.join(flight, || {
            fetch_and_populate(self.inner.tiers.clone(), key.to_string(), fetcher, ttl, strategy)
        });
        if !started {
            debug!(key, "Joined fetch already in flight");
        }

        let value = fetch.await.map_err(|reason| CacheError::FetchFailed {
            key: key.to_string(),
            reason,
        })?;
        decode(value)
    }

    /// Refreshes `key` on a detached task that outlives the caller.
    ///
    /// When a matching fetch is already registered the task awaits that one,
    /// so an abandoned fetch still completes.
    fn spawn_refresh<T>(&self, key: &str, fetcher: Fetcher<T>, ttl: u64, strategy: Strategy)
    where
        T: Serialize + Send + 'static,
    {
        let flight = FlightKey::new(key, ttl, strategy);
        let (fetch, started) = self.inner.inflight.join(flight, || {
            fetch_and_populate(self.inner.tiers.clone(), key.to_string(), fetcher, ttl, strategy)
        });
        if !started {
            debug!(key, "Revalidation joined fetch already in flight");
        }

        let key = key.to_string();
        tokio::spawn(async move {
            match fetch.await {
                Ok(_) => debug!(key = %key, "Background revalidation complete"),
                Err(reason) => warn!(key = %key, reason = %reason, "Background revalidation failed"),
            }
        });
    }
}

impl std::fmt::Debug for TieredCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TieredCache")
            .field("stats", &self.stats())
            .field("default_ttl_ms", &self.inner.default_ttl_ms)
            .field("default_strategy", &self.inner.default_strategy)
            .field("inflight", &self.inner.inflight)
            .finish()
    }
}

fn fetch_and_populate<T>(
    tiers: Tiers,
    key: String,
    fetcher: Fetcher<T>,
    ttl: u64,
    strategy: Strategy,
) -> BoxFuture<'static, std::result::Result<Value, String>>
where
    T: Serialize + Send + 'static,
{
    async move {
        let data = fetcher().await.map_err(|e| format!("{:#}", e))?;
        let value = serde_json::to_value(data)
            .map_err(|e| format!("fetched value is not serializable: {}", e))?;
        tiers.populate(&key, value.clone(), ttl, strategy).await;
        Ok(value)
    }
    .boxed()
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(CacheError::InvalidKey("key cannot be empty".to_string()));
    }
    if key.len() > MAX_KEY_LENGTH {
        return Err(CacheError::InvalidKey(format!(
            "key exceeds maximum length of {} bytes",
            MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

fn decode<T: DeserializeOwned>(data: Value) -> Result<T> {
    Ok(serde_json::from_value(data)?)
}

fn fetch_failed(key: &str, err: anyhow::Error) -> CacheError {
    CacheError::FetchFailed {
        key: key.to_string(),
        reason: format!("{:#}", err),
    }
}
