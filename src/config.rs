//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::cache::Strategy;

/// Memory tier capacity default: 50 MiB
pub const DEFAULT_MAX_SIZE: usize = 50 * 1024 * 1024;
/// Entry lifetime default: 24 hours
pub const DEFAULT_TTL_MS: u64 = 24 * 60 * 60 * 1000;
/// Janitor interval default: 5 minutes
pub const DEFAULT_CLEANUP_INTERVAL_MS: u64 = 5 * 60 * 1000;

/// Cache and server configuration.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Memory tier capacity in bytes
    pub max_size: usize,
    /// TTL in milliseconds for entries written without an explicit TTL
    pub default_ttl_ms: u64,
    /// Janitor sweep interval in milliseconds
    pub cleanup_interval_ms: u64,
    /// Strategy used when a call does not name one
    pub strategy: Strategy,
    /// SQLite database file; records stay in process memory when unset
    pub db_path: Option<PathBuf>,
    /// HTTP server port
    pub server_port: u16,
    /// Origin fetched on cache misses by the HTTP surface
    pub upstream_url: Option<String>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_MAX_SIZE` - Memory tier capacity in bytes (default: 52428800)
    /// - `CACHE_DEFAULT_TTL_MS` - Default TTL in ms (default: 86400000)
    /// - `CACHE_CLEANUP_INTERVAL_MS` - Janitor interval in ms (default: 300000)
    /// - `CACHE_STRATEGY` - Default strategy (default: cache-first)
    /// - `CACHE_DB_PATH` - SQLite database path (default: unset, in-memory)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `UPSTREAM_URL` - Origin base URL (default: unset)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_size: parse_env("CACHE_MAX_SIZE").unwrap_or(defaults.max_size),
            default_ttl_ms: parse_env("CACHE_DEFAULT_TTL_MS")
                .filter(|ttl| *ttl > 0)
                .unwrap_or(defaults.default_ttl_ms),
            cleanup_interval_ms: parse_env("CACHE_CLEANUP_INTERVAL_MS")
                .filter(|interval| *interval > 0)
                .unwrap_or(defaults.cleanup_interval_ms),
            strategy: parse_env("CACHE_STRATEGY").unwrap_or(defaults.strategy),
            db_path: non_empty_env("CACHE_DB_PATH").map(PathBuf::from),
            server_port: parse_env("SERVER_PORT").unwrap_or(defaults.server_port),
            upstream_url: non_empty_env("UPSTREAM_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_MAX_SIZE,
            default_ttl_ms: DEFAULT_TTL_MS,
            cleanup_interval_ms: DEFAULT_CLEANUP_INTERVAL_MS,
            strategy: Strategy::CacheFirst,
            db_path: None,
            server_port: 3000,
            upstream_url: None,
        }
    }
}

fn non_empty_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}
