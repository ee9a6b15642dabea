//! Per-client rate limiting.
//!
//! Sliding window limiter in front of the authorizer, so a flood of bogus
//! signatures costs one map lookup per request once a client's budget is
//! spent. Clients are keyed by network rather than by raw address: a single
//! IPv6 host usually owns a whole /64 and could otherwise rotate through it
//! to get a fresh budget on every request.

use std::collections::{HashMap, VecDeque};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::warn;

/// Minimum spacing between full sweeps triggered by a saturated table.
const FULL_TABLE_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Identity a request budget is charged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientKey {
    /// A single IPv4 host, including IPv4-mapped IPv6 peers.
    V4(Ipv4Addr),
    /// The upper 64 bits of an IPv6 address.
    V6Prefix(u64),
}

impl From<IpAddr> for ClientKey {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => ClientKey::V4(v4),
            IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
                Some(v4) => ClientKey::V4(v4),
                None => ClientKey::V6Prefix((u128::from(v6) >> 64) as u64),
            },
        }
    }
}

/// Sliding window limiter with a bounded client table.
///
/// Each client key may make at most `max_requests` within `window`. At most
/// `max_clients` keys are tracked; once the table is full of active clients,
/// requests from untracked clients are refused until someone's window lapses.
pub struct RateLimiter {
    clients: Mutex<HashMap<ClientKey, VecDeque<Instant>>>,
    max_requests: usize,
    max_clients: usize,
    window: Duration,
    created: Instant,
    next_sweep_ms: AtomicU64,
}

impl RateLimiter {
    /// Create a new rate limiter.
    ///
    /// # Arguments
    ///
    /// * `max_requests` - Requests allowed per client within the window
    /// * `window_seconds` - Length of the sliding window in seconds
    /// * `max_clients` - Upper bound on distinct clients tracked at once
    pub fn new(max_requests: usize, window_seconds: u64, max_clients: usize) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            max_requests,
            max_clients: max_clients.max(1),
            window: Duration::from_secs(window_seconds),
            created: Instant::now(),
            next_sweep_ms: AtomicU64::new(0),
        }
    }

    /// Charge one request from `peer`.
    ///
    /// Returns `true` if the request is within budget, `false` if the client
    /// is over its limit or the client table is saturated.
    pub fn check_and_record(&self, peer: IpAddr) -> bool {
        let key = ClientKey::from(peer);
        let now = Instant::now();
        let cutoff = now.checked_sub(self.window);
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        if !clients.contains_key(&key) && clients.len() >= self.max_clients {
            if self.sweep_due(now) {
                clients.retain(|_, times| {
                    prune(times, cutoff);
                    !times.is_empty()
                });
            }
            if clients.len() >= self.max_clients {
                warn!(
                    tracked = clients.len(),
                    "Rate limiter client table full, refusing new client"
                );
                return false;
            }
        }

        let times = clients.entry(key).or_default();
        prune(times, cutoff);
        if times.len() >= self.max_requests {
            return false;
        }
        times.push_back(now);
        true
    }

    /// Drop clients with no requests inside the window.
    pub fn cleanup(&self) {
        let cutoff = Instant::now().checked_sub(self.window);
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());
        clients.retain(|_, times| {
            prune(times, cutoff);
            !times.is_empty()
        });
    }

    /// Number of client keys currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Start a background cleanup task.
    pub fn start_cleanup_task(self: &Arc<Self>, interval: Duration) {
        let limiter = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                limiter.cleanup();
            }
        });
    }

    fn sweep_due(&self, now: Instant) -> bool {
        let now_ms = now.saturating_duration_since(self.created).as_millis() as u64;
        let due = self.next_sweep_ms.load(Ordering::Relaxed);
        if now_ms < due {
            return false;
        }
        let next = now_ms.saturating_add(FULL_TABLE_SWEEP_INTERVAL.as_millis() as u64);
        self.next_sweep_ms
            .compare_exchange(due, next, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }
}

/// Drop timestamps at or before `cutoff`. Timestamps are pushed in order.
fn prune(times: &mut VecDeque<Instant>, cutoff: Option<Instant>) {
    let Some(cutoff) = cutoff else { return };
    while times.front().is_some_and(|&t| t <= cutoff) {
        times.pop_front();
    }
}
