//! Cache Module
//!
//! Two-tier caching: a size-bounded LRU memory tier over a durable persistent
//! tier, unified by `TieredCache` and its fetch strategies.

mod backend;
mod entry;
pub mod helpers;
mod inflight;
mod lru;
mod memory;
pub(crate) mod orchestrator;
mod persistent;
mod stats;
mod strategy;


// Re-export public types
pub use backend::{InMemoryBackend, SqliteBackend, StorageBackend};
pub use entry::{current_timestamp_ms, CacheEntry, Clock, ManualClock, SystemClock};
pub use memory::MemoryTier;
pub use orchestrator::{fetcher, Fetcher, GetOptions, SetOptions, TieredCache};
pub use persistent::PersistentTier;
pub use stats::CacheStats;
pub use strategy::Strategy;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
