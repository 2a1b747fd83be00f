//! Fetch Strategy Module
//!
//! Policies governing how tier reads and fetcher invocation relate for a request.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CacheError;

// == Strategy ==
/// Fetch strategy for a single `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Fetch first, fall back to any cached copy (even stale) on failure
    NetworkFirst,
    /// Memory, then persistent, then fetch and write through
    #[default]
    CacheFirst,
    /// Serve any cached copy and refresh it in the background
    StaleWhileRevalidate,
    /// Always fetch, never touch either tier
    NetworkOnly,
    /// Never fetch
    CacheOnly,
}

impl Strategy {
    /// Canonical kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::NetworkFirst => "network-first",
            Strategy::CacheFirst => "cache-first",
            Strategy::StaleWhileRevalidate => "stale-while-revalidate",
            Strategy::NetworkOnly => "network-only",
            Strategy::CacheOnly => "cache-only",
        }
    }

    /// Whether a fetcher must be supplied for this strategy.
    pub fn requires_fetcher(&self) -> bool {
        !matches!(self, Strategy::CacheOnly)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "network-first" => Ok(Strategy::NetworkFirst),
            "cache-first" => Ok(Strategy::CacheFirst),
            "stale-while-revalidate" => Ok(Strategy::StaleWhileRevalidate),
            "network-only" => Ok(Strategy::NetworkOnly),
            "cache-only" => Ok(Strategy::CacheOnly),
            other => Err(CacheError::InvalidRequest(format!(
                "Unknown strategy '{}'",
                other
            ))),
        }
    }
}
