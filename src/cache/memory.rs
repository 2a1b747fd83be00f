//! Memory Tier Module
//!
//! Size-bounded cache combining HashMap storage with recency ordering and TTL expiry.
//! Every operation runs to completion without suspending.

use std::collections::HashMap;

use crate::cache::lru::RecencyOrder;
use crate::cache::stats::{CacheStats, Counters};
use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

// == Memory Tier ==
/// Fast tier bounded by the total byte size of its entries.
///
/// Invariant after every mutation: `current_size == Σ entry.size <= max_size`.
#[derive(Debug)]
pub struct MemoryTier {
    entries: HashMap<String, CacheEntry>,
    order: RecencyOrder,
    current_size: usize,
    max_size: usize,
    counters: Counters,
}

impl MemoryTier {
    // == Constructor ==
    /// Creates an empty tier holding at most `max_size` bytes.
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: RecencyOrder::new(),
            current_size: 0,
            max_size,
            counters: Counters::default(),
        }
    }

    // == Get ==
    /// Returns a fresh entry, promoting it to most recently used.
    ///
    /// An expired entry is removed and reported as a miss.
    pub fn get(&mut self, key: &str, now: u64) -> Option<CacheEntry> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.is_expired(now),
            None => {
                self.counters.record_miss();
                return None;
            }
        };

        if expired {
            self.remove_entry(key);
            self.counters.record_miss();
            return None;
        }

        self.order.promote(key);
        self.counters.record_hit();
        let entry = self.entries.get_mut(key)?;
        entry.hits += 1;
        Some(entry.clone())
    }

    // == Peek Stale ==
    /// Returns the entry whether or not it has expired, leaving recency and hits untouched.
    pub fn peek_stale(&self, key: &str) -> Option<CacheEntry> {
        self.entries.get(key).cloned()
    }

    // == Put ==
    /// Inserts or replaces an entry, evicting least recently used entries to make room.
    ///
    /// Returns the keys evicted. An entry larger than the whole tier is
    /// rejected with `EntryTooLarge` and nothing is evicted.
    pub fn put(&mut self, entry: CacheEntry) -> Result<Vec<String>> {
        if entry.size > self.max_size {
            return Err(CacheError::EntryTooLarge {
                key: entry.key,
                size: entry.size,
                max_size: self.max_size,
            });
        }

        self.remove_entry(&entry.key);

        let mut evicted = Vec::new();
        while self.current_size + entry.size > self.max_size {
            let Some(lru_key) = self.order.pop_lru() else {
                break;
            };
            if let Some(old) = self.entries.remove(&lru_key) {
                self.current_size -= old.size;
            }
            self.counters.record_eviction();
            evicted.push(lru_key);
        }

        self.current_size += entry.size;
        self.order.promote(&entry.key);
        self.entries.insert(entry.key.clone(), entry);
        Ok(evicted)
    }

    // == Delete ==
    /// Removes an entry. Absent keys are a no-op.
    pub fn delete(&mut self, key: &str) {
        self.remove_entry(key);
    }

    // == Clear ==
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
        self.current_size = 0;
    }

    // == Purge Expired ==
    /// Removes every expired entry and returns how many were removed.
    pub fn purge_expired(&mut self, now: u64) -> usize {
        let expired: Vec<String> = self
            .entries
            .values()
            .filter(|entry| entry.is_expired(now))
            .map(|entry| entry.key.clone())
            .collect();

        for key in &expired {
            self.remove_entry(key);
        }
        expired.len()
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        CacheStats::snapshot(
            self.current_size,
            self.max_size,
            self.entries.len(),
            self.counters,
        )
    }

    /// Keys from least to most recently used.
    pub fn keys(&self) -> Vec<String> {
        self.order.iter().map(str::to_string).collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn current_size(&self) -> usize {
        self.current_size
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn remove_entry(&mut self, key: &str) -> Option<CacheEntry> {
        let removed = self.entries.remove(key)?;
        self.order.remove(key);
        self.current_size -= removed.size;
        Some(removed)
    }
}
