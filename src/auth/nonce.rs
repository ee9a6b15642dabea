//! Bounded in-memory nonce store for replay prevention.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::identity::Address;
use crate::protocol::Nonce;
use crate::validation::Area;

/// Longest TTL a store will apply, whatever it is configured with.
pub const MAX_NONCE_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Minimum spacing of the sweeps triggered by a full store.
const FULL_STORE_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Scope a nonce is consumed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonceKey {
    pub visitor: Address,
    pub owner: Address,
    pub area: Area,
    pub nonce: Nonce,
}

/// Outcome of [`NonceStore::check_and_store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonceCheck {
    /// First use inside the TTL; the nonce is now consumed.
    Recorded,
    /// Already consumed and still remembered.
    Replayed,
    /// Every slot holds a live nonce. Nothing was recorded.
    Full,
}

/// Thread-safe nonce store with TTL-based expiry and a hard capacity.
///
/// Entries live in a sharded map, so the check-and-insert for one key only
/// locks that key's shard. Live entries are never evicted: once the store is
/// full of them, new nonces are refused until some expire.
pub struct NonceStore {
    /// Map of scoped nonce -> expiry time.
    nonces: DashMap<NonceKey, Instant>,
    /// Time-to-live for consumed nonces.
    ttl: Duration,
    /// Maximum number of tracked nonces.
    capacity: usize,
    /// Reference point for `next_sweep_ms`.
    created: Instant,
    /// Earliest time, in ms since `created`, a full store may sweep again.
    next_sweep_ms: AtomicU64,
}

impl NonceStore {
    /// Create a new nonce store with the given TTL and capacity.
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            nonces: DashMap::new(),
            ttl: ttl.min(MAX_NONCE_TTL),
            capacity: capacity.max(1),
            created: Instant::now(),
            next_sweep_ms: AtomicU64::new(0),
        }
    }

    /// Record `key` as consumed unless it already is.
    ///
    /// The check and the insert happen under one shard lock, so two
    /// concurrent callers with the same key cannot both get `Recorded`.
    pub fn check_and_store(&self, key: NonceKey) -> NonceCheck {
        let now = Instant::now();
        let Some(expiry) = now.checked_add(self.ttl) else {
            warn!(ttl_secs = self.ttl.as_secs(), "Nonce expiry overflows the clock, refusing nonce");
            return NonceCheck::Full;
        };

        if self.nonces.len() >= self.capacity && !self.nonces.contains_key(&key) {
            self.sweep_if_due(now);
            if self.nonces.len() >= self.capacity {
                warn!(
                    capacity = self.capacity,
                    "Nonce store full of live entries, refusing new nonce"
                );
                return NonceCheck::Full;
            }
        }

        match self.nonces.entry(key) {
            Entry::Occupied(mut entry) => {
                if *entry.get() > now {
                    return NonceCheck::Replayed;
                }
                // Lapsed entry that the sweep has not collected yet.
                entry.insert(expiry);
                NonceCheck::Recorded
            }
            Entry::Vacant(entry) => {
                entry.insert(expiry);
                NonceCheck::Recorded
            }
        }
    }

    /// Drop expired entries, at most once per sweep interval.
    fn sweep_if_due(&self, now: Instant) {
        let elapsed_ms = now.saturating_duration_since(self.created).as_millis() as u64;
        let due = self.next_sweep_ms.load(Ordering::Relaxed);
        if elapsed_ms < due {
            return;
        }
        let next = elapsed_ms.saturating_add(FULL_STORE_SWEEP_INTERVAL.as_millis() as u64);
        if self
            .next_sweep_ms
            .compare_exchange(due, next, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            debug!("Nonce store full, sweeping expired entries");
            self.nonces.retain(|_, expiry| *expiry > now);
        }
    }

    /// Get the current number of stored nonces (for monitoring).
    pub fn len(&self) -> usize {
        self.nonces.len()
    }

    /// Check if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.nonces.is_empty()
    }

    /// Time-to-live applied to consumed nonces.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Force cleanup of expired nonces.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.nonces.retain(|_, expiry| *expiry > now);
    }

    /// Start a background cleanup task.
    ///
    /// This spawns a tokio task that periodically cleans up expired nonces.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            loop {
                interval_timer.tick().await;
                store.cleanup();
            }
        });
    }
}
