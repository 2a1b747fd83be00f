//! Tiered Cache - A two-tier client-side cache
//!
//! A size-bounded LRU memory tier in front of a durable SQLite tier, with
//! TTL expiration, five fetch strategies, and a periodic janitor.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::{create_router, AppState, Upstream};
pub use cache::{
    fetcher, helpers, CacheStats, Fetcher, GetOptions, InMemoryBackend, SetOptions, SqliteBackend,
    StorageBackend, Strategy, TieredCache,
};
pub use config::Config;
pub use error::{CacheError, Result};
