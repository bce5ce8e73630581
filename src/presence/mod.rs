//! In-memory presence tracking
//!
//! Tracks the last-seen time of each visitor in a concurrent map and derives
//! a "currently online" count over a sliding window. The map lives for the
//! process lifetime only; a restart resets presence, which is acceptable
//! since the online count is a live-operational metric, not an audited one.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;

/// Default sliding window within which a visitor counts as online.
pub const DEFAULT_ONLINE_WINDOW_SECS: i64 = 300;

pub struct PresenceTracker {
    /// visitor_id -> last-seen Unix timestamp (seconds)
    last_seen: Arc<DashMap<String, i64>>,
    window_secs: i64,
    /// Shutdown signal sender for the background sweep task
    shutdown_tx: watch::Sender<bool>,
}

impl PresenceTracker {
    pub fn new(window_secs: i64) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            last_seen: Arc::new(DashMap::new()),
            window_secs,
            shutdown_tx,
        }
    }

    /// Record that `visitor_id` was seen at `now`.
    pub fn touch(&self, visitor_id: &str, now: i64) {
        self.last_seen.insert(visitor_id.to_string(), now);
    }

    /// Number of visitors seen within the window ending at `now`.
    ///
    /// Expired entries are dropped as a side effect to bound memory growth.
    /// `retain` locks one shard at a time; an entry concurrent with `touch`
    /// is either dropped or counted, never both.
    pub fn online_count(&self, now: i64) -> i64 {
        let window = self.window_secs;
        self.last_seen.retain(|_, seen| now - *seen < window);
        self.last_seen.len() as i64
    }

    /// Drop entries whose last-seen time has fallen out of the window.
    pub fn sweep(&self, now: i64) {
        let window = self.window_secs;
        self.last_seen.retain(|_, seen| now - *seen < window);
    }

    /// Number of tracked entries, expired or not.
    pub fn len(&self) -> usize {
        self.last_seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    /// Start a background task that periodically sweeps expired entries.
    ///
    /// Lazy expiry in [`online_count`] already keeps results correct; the
    /// sweep only bounds memory when the online endpoint is never polled.
    pub fn start_sweep_task(&self, interval_secs: u64) -> tokio::task::JoinHandle<()> {
        let last_seen = Arc::clone(&self.last_seen);
        let window = self.window_secs;
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut interval = time::interval(Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        let now = chrono::Utc::now().timestamp();
                        let before = last_seen.len();
                        last_seen.retain(|_, seen| now - *seen < window);
                        // Concurrent touches can grow the map mid-sweep
                        let dropped = before.saturating_sub(last_seen.len());
                        if dropped > 0 {
                            tracing::debug!("Presence sweep dropped {} expired entries", dropped);
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("Presence sweep task shutting down");
                            break;
                        }
                    }
                }
            }
        })
    }

    /// Signal shutdown to the sweep task.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Default for PresenceTracker {
    fn default() -> Self {
        Self::new(DEFAULT_ONLINE_WINDOW_SECS)
    }
}
