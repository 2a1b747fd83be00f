//! In-Flight Fetch Module
//!
//! Coalesces concurrent fetches of the same key into one shared future.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use serde_json::Value;

use crate::cache::Strategy;

/// Result of one fetch-and-populate run. The error is the fetch failure reason.
pub type FetchOutcome = std::result::Result<Value, String>;

/// A fetch any number of callers can await.
pub type SharedFetch = Shared<BoxFuture<'static, FetchOutcome>>;

/// Identity of a fetch: only callers writing the same entry share one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlightKey {
    pub key: String,
    pub ttl: u64,
    pub strategy: Strategy,
}

impl FlightKey {
    pub fn new(key: impl Into<String>, ttl: u64, strategy: Strategy) -> Self {
        Self {
            key: key.into(),
            ttl,
            strategy,
        }
    }
}

#[derive(Clone)]
struct Pending {
    id: u64,
    fetch: SharedFetch,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    pending: HashMap<FlightKey, Pending>,
}

impl Registry {
    /// Removes `flight` only if it is still registration `id`.
    fn finish(&mut self, flight: &FlightKey, id: u64) {
        if self.pending.get(flight).is_some_and(|p| p.id == id) {
            self.pending.remove(flight);
        }
    }
}

// == In Flight ==
/// Map of `(key, ttl, strategy) -> pending fetch`.
///
/// A fetch removes itself from the map when it completes. If every caller
/// drops it early it stays registered until a later caller resumes it or
/// [`forget`](InFlight::forget) discards it.
#[derive(Default, Clone)]
pub struct InFlight {
    registry: Arc<Mutex<Registry>>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    // == Join ==
    /// Returns the pending fetch for `flight`, or registers the one built by `start`.
    ///
    /// The flag is `true` when this call registered a new fetch. `start` is
    /// not invoked when a fetch is already pending.
    pub fn join<F>(&self, flight: FlightKey, start: F) -> (SharedFetch, bool)
    where
        F: FnOnce() -> BoxFuture<'static, FetchOutcome>,
    {
        if let Some(existing) = self.registry.lock().pending.get(&flight) {
            return (existing.fetch.clone(), false);
        }

        // Built outside the lock: `start` runs caller code.
        let fetch = start();

        let mut registry = self.registry.lock();
        if let Some(existing) = registry.pending.get(&flight) {
            return (existing.fetch.clone(), false);
        }
        registry.next_id += 1;
        let id = registry.next_id;

        let weak: Weak<Mutex<Registry>> = Arc::downgrade(&self.registry);
        let owned = flight.clone();
        let shared = async move {
            let outcome = fetch.await;
            if let Some(registry) = weak.upgrade() {
                registry.lock().finish(&owned, id);
            }
            outcome
        }
        .boxed()
        .shared();

        registry.pending.insert(
            flight,
            Pending {
                id,
                fetch: shared.clone(),
            },
        );
        (shared, true)
    }

    // == Forget ==
    /// Drops every registration for `key`. Fetches still awaited elsewhere
    /// run to completion, but no later caller joins them.
    pub fn forget(&self, key: &str) {
        self.registry
            .lock()
            .pending
            .retain(|flight, _| flight.key != key);
    }

    pub fn forget_all(&self) {
        self.registry.lock().pending.clear();
    }

    /// Number of fetches pending.
    pub fn len(&self) -> usize {
        self.registry.lock().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.lock().pending.is_empty()
    }
}

impl fmt::Debug for InFlight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlight")
            .field("pending", &self.len())
            .finish()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::oneshot;

    fn flight(key: &str) -> FlightKey {
        FlightKey::new(key, 1_000, Strategy::CacheFirst)
    }

    #[tokio::test]
    async fn test_concurrent_joins_share_one_fetch() {
        let inflight = InFlight::new();
        let starts = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = oneshot::channel::<Value>();

        let counter = starts.clone();
        let (first, leader) = inflight.join(flight("k"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { rx.await.map_err(|e| e.to_string()) }.boxed()
        });
        assert!(leader);

        let counter = starts.clone();
        let (second, leader) = inflight.join(flight("k"), move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(json!("unused")) }.boxed()
        });
        assert!(!leader);
        assert_eq!(inflight.len(), 1);

        tx.send(json!("shared")).unwrap();
        let (a, b) = tokio::join!(first, second);

        assert_eq!(a.unwrap(), json!("shared"));
        assert_eq!(b.unwrap(), json!("shared"));
        assert_eq!(starts.load(Ordering::SeqCst), 1);
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_cleared() {
        let inflight = InFlight::new();
        let (fetch, _) = inflight.join(flight("k"), || async { Err("boom".to_string()) }.boxed());

        assert_eq!(fetch.await.unwrap_err(), "boom");
        assert!(inflight.is_empty());

        // A later join starts a fresh fetch
        let (fetch, leader) = inflight.join(flight("k"), || async { Ok(json!(1)) }.boxed());
        assert!(leader);
        assert_eq!(fetch.await.unwrap(), json!(1));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_coalesce() {
        let inflight = InFlight::new();
        let (_a, leader_a) = inflight.join(flight("a"), || async { Ok(json!("a")) }.boxed());
        let (_b, leader_b) = inflight.join(flight("b"), || async { Ok(json!("b")) }.boxed());

        assert!(leader_a && leader_b);
        assert_eq!(inflight.len(), 2);
    }

    #[tokio::test]
    async fn test_distinct_ttls_do_not_coalesce() {
        let inflight = InFlight::new();
        let short = FlightKey::new("k", 10, Strategy::CacheFirst);
        let long = FlightKey::new("k", 10_000, Strategy::CacheFirst);

        let (_a, leader_a) = inflight.join(short, || async { Ok(json!(1)) }.boxed());
        let (_b, leader_b) = inflight.join(long, || async { Ok(json!(2)) }.boxed());

        assert!(leader_a && leader_b);
        assert_eq!(inflight.len(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_fetch_is_resumed() {
        let inflight = InFlight::new();
        let (fetch, _) = inflight.join(flight("k"), || async { Ok(json!("late")) }.boxed());
        drop(fetch);

        let (resumed, leader) =
            inflight.join(flight("k"), || async { Ok(json!("other")) }.boxed());
        assert!(!leader);
        assert_eq!(resumed.await.unwrap(), json!("late"));
        assert!(inflight.is_empty());
    }

    #[tokio::test]
    async fn test_forget_discards_abandoned_fetch() {
        let inflight = InFlight::new();
        let (fetch, _) = inflight.join(flight("k"), || async { Ok(json!("late")) }.boxed());
        drop(fetch);
        inflight.forget("k");
        assert!(inflight.is_empty());

        let (fresh, leader) = inflight.join(flight("k"), || async { Ok(json!("fresh")) }.boxed());
        assert!(leader);
        assert_eq!(fresh.await.unwrap(), json!("fresh"));
    }

    #[tokio::test]
    async fn test_forgotten_fetch_does_not_clear_newer_registration() {
        let inflight = InFlight::new();
        let (tx, rx) = oneshot::channel::<Value>();
        let (old, _) = inflight.join(flight("k"), move || {
            async move { rx.await.map_err(|e| e.to_string()) }.boxed()
        });
        inflight.forget("k");

        let (_newer, leader) =
            inflight.join(flight("k"), || futures::future::pending::<FetchOutcome>().boxed());
        assert!(leader);

        tx.send(json!("old")).unwrap();
        assert_eq!(old.await.unwrap(), json!("old"));
        assert_eq!(inflight.len(), 1);
    }
}
