//! Consumer Helpers
//!
//! Conveniences built only on the public `TieredCache` API.

use futures::future::join_all;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::cache::{Fetcher, GetOptions, Strategy, TieredCache};
use crate::error::Result;

/// Warms `key` under cache-first. Failures are logged, never returned.
///
/// Returns whether the key is cached afterwards.
pub async fn prefetch<T>(
    cache: &TieredCache,
    key: &str,
    fetcher: Fetcher<T>,
    ttl_ms: Option<u64>,
) -> bool
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    let options = GetOptions {
        ttl_ms,
        strategy: Some(Strategy::CacheFirst),
        force: false,
    };

    match cache.get(key, Some(fetcher), options).await {
        Ok(_) => {
            debug!(key, "Prefetched");
            true
        }
        Err(e) => {
            warn!(key, error = %e, "Prefetch failed");
            false
        }
    }
}

/// Prefetches several keys concurrently. Returns how many ended up cached.
pub async fn prefetch_many<T>(
    cache: &TieredCache,
    items: Vec<(String, Fetcher<T>)>,
    ttl_ms: Option<u64>,
) -> usize
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    let results = join_all(
        items
            .into_iter()
            .map(|(key, fetcher)| async move { prefetch(cache, &key, fetcher, ttl_ms).await }),
    )
    .await;

    results.into_iter().filter(|cached| *cached).count()
}

/// Removes every key in `keys` from both tiers.
pub async fn invalidate<I, K>(cache: &TieredCache, keys: I) -> Result<()>
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    for key in keys {
        cache.delete(key.as_ref()).await?;
    }
    Ok(())
}

/// Fetches `key` unconditionally, writes it through and returns the new value.
pub async fn refresh<T>(
    cache: &TieredCache,
    key: &str,
    fetcher: Fetcher<T>,
    ttl_ms: Option<u64>,
) -> Result<Option<T>>
where
    T: Serialize + DeserializeOwned + Send + 'static,
{
    let options = GetOptions {
        ttl_ms,
        strategy: Some(Strategy::CacheFirst),
        force: true,
    };
    cache.get(key, Some(fetcher), options).await
}
