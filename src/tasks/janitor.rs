//! Janitor Task
//!
//! Periodically sweeps expired entries out of both tiers so write-once,
//! read-never entries do not accumulate in the durable store.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cache::orchestrator::Tiers;

/// Owner of the periodic sweep timer.
///
/// `start` and `stop` are idempotent: at most one timer task exists at a
/// time. Dropping the janitor stops it.
#[derive(Debug)]
pub struct Janitor {
    tiers: Tiers,
    interval: Duration,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Janitor {
    pub(crate) fn new(tiers: Tiers, interval: Duration) -> Self {
        Self {
            tiers,
            interval,
            handle: Mutex::new(None),
        }
    }

    // == Start ==
    /// Spawns the sweep task. Returns `false` if it was already running.
    ///
    /// The first sweep happens one full interval after starting.
    pub fn start(&self) -> bool {
        let mut handle = self.handle.lock();
        if handle.as_ref().is_some_and(|h| !h.is_finished()) {
            return false;
        }

        let tiers = self.tiers.clone();
        let period = self.interval;
        *handle = Some(tokio::spawn(async move {
            info!(interval_ms = period.as_millis() as u64, "Starting cache janitor");

            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                sweep_once(&tiers).await;
            }
        }));
        true
    }

    // == Stop ==
    /// Aborts the sweep task. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        match self.handle.lock().take() {
            Some(handle) => {
                handle.abort();
                debug!("Cache janitor stopped");
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Runs one sweep immediately, outside the timer.
    pub async fn run_once(&self) -> usize {
        sweep_once(&self.tiers).await
    }
}

impl Drop for Janitor {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.get_mut().take() {
            handle.abort();
        }
    }
}

/// Purges expired memory entries, then sweeps the persistent tier.
/// Returns the total number of entries removed.
async fn sweep_once(tiers: &Tiers) -> usize {
    let now = tiers.clock.now_ms();
    let purged = tiers.memory.lock().purge_expired(now);

    let swept = match tiers.persistent.sweep().await {
        Ok(swept) => swept,
        Err(e) => {
            warn!(error = %e, "Persistent sweep failed");
            0
        }
    };

    if purged + swept > 0 {
        info!(purged, swept, "Janitor removed expired entries");
    } else {
        debug!("Janitor found no expired entries");
    }
    purged + swept
}
