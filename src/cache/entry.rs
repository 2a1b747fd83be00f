//! Cache Entry Module
//!
//! Defines the record stored in both tiers, plus the clock every TTL check reads.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::Strategy;
use crate::error::Result;

// == Cache Entry ==
/// A single cached record.
///
/// Tiers hold `CacheEntry<serde_json::Value>`; typed payloads are converted at
/// the orchestrator boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T = serde_json::Value> {
    /// Unique key within the cache
    pub key: String,
    /// The cached payload
    pub data: T,
    /// Creation or refresh time (Unix milliseconds)
    pub timestamp: u64,
    /// Time to live in milliseconds
    pub ttl: u64,
    /// Serialized payload size in bytes, fixed at write time
    pub size: usize,
    /// Memory-tier access counter
    pub hits: u64,
    /// Strategy active when the entry was written
    pub strategy: Strategy,
    /// Optional validator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Optional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
}

impl<T: Serialize> CacheEntry<T> {
    // == Constructor ==
    /// Creates an entry stamped at `now`, sizing it from the JSON encoding of `data`.
    ///
    /// # Arguments
    /// * `key` - The cache key
    /// * `data` - The payload
    /// * `ttl` - Time to live in milliseconds
    /// * `strategy` - The strategy that produced the write
    /// * `now` - Current time in Unix milliseconds
    pub fn new(
        key: impl Into<String>,
        data: T,
        ttl: u64,
        strategy: Strategy,
        now: u64,
    ) -> Result<Self> {
        let size = serde_json::to_vec(&data)?.len();
        Ok(Self {
            key: key.into(),
            data,
            timestamp: now,
            ttl,
            size,
            hits: 0,
            strategy,
            etag: None,
            headers: None,
        })
    }
}

impl<T> CacheEntry<T> {
    /// Attaches an optional validator.
    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    /// Attaches optional metadata.
    pub fn with_headers(mut self, headers: Option<HashMap<String, String>>) -> Self {
        self.headers = headers;
        self
    }

    // == Is Expired ==
    /// An entry is expired once strictly more than `ttl` ms have passed since `timestamp`.
    pub fn is_expired(&self, now: u64) -> bool {
        now.saturating_sub(self.timestamp) > self.ttl
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds, `0` once expired.
    pub fn ttl_remaining_ms(&self, now: u64) -> u64 {
        self.timestamp.saturating_add(self.ttl).saturating_sub(now)
    }
}

// == Clock ==
/// Source of the current wall-clock time in Unix milliseconds.
///
/// Persisted entries outlive the process, so timestamps must be comparable
/// across restarts.
pub trait Clock: Send + Sync + Debug {
    fn now_ms(&self) -> u64;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        current_timestamp_ms()
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, delta_ms: u64) {
        self.now.fetch_add(delta_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}
