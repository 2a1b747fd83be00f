//! Cache Statistics Module
//!
//! Memory tier occupancy plus hit, miss and eviction counters.

use serde::Serialize;

// == Counters ==
/// Running counters kept by the memory tier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Counters {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl Counters {
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_eviction(&mut self) {
        self.evictions += 1;
    }
}

// == Cache Stats ==
/// Point-in-time snapshot of the memory tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    /// Sum of entry sizes in bytes
    pub size: usize,
    /// Configured capacity in bytes
    pub max_size: usize,
    /// Number of entries held
    pub entry_count: usize,
    /// `size / max_size` as a percentage
    pub utilization_percent: f64,
    /// Successful memory-tier reads
    pub hits: u64,
    /// Memory-tier reads that found nothing fresh
    pub misses: u64,
    /// Entries evicted under size pressure
    pub evictions: u64,
    /// hits / (hits + misses)
    pub hit_rate: f64,
}

impl CacheStats {
    pub fn snapshot(size: usize, max_size: usize, entry_count: usize, counters: Counters) -> Self {
        Self {
            size,
            max_size,
            entry_count,
            utilization_percent: utilization_percent(size, max_size),
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            hit_rate: hit_rate(counters.hits, counters.misses),
        }
    }
}

fn utilization_percent(size: usize, max_size: usize) -> f64 {
    if max_size == 0 {
        0.0
    } else {
        size as f64 / max_size as f64 * 100.0
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64
    }
}
