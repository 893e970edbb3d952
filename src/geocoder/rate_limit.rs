//! Minimum-interval gate shared by every outbound geocoding request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// Enforces a minimum wall-clock interval between consecutive requests.
///
/// One limiter is shared (behind an `Arc`) by all clients talking to the
/// same upstream service. `acquire` reserves the next free slot under the
/// lock and sleeps after releasing it, so concurrent callers queue up in
/// slot order and no sleep ever holds the lock.
///
/// Time comes from `tokio::time`, so tests drive it with a paused clock.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    next_slot: Mutex<Option<Instant>>,
    acquired: AtomicU64,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            next_slot: Mutex::new(None),
            acquired: AtomicU64::new(0),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request may be sent.
    pub async fn acquire(&self) {
        let slot = self.reserve(Instant::now());
        let now = Instant::now();
        if slot > now {
            debug!("Rate limit: waiting {:?}", slot - now);
            tokio::time::sleep_until(slot).await;
        }
        self.acquired.fetch_add(1, Ordering::Relaxed);
    }

    /// Claim the earliest free slot at or after `now` and push the next one out.
    fn reserve(&self, now: Instant) -> Instant {
        let mut next = self
            .next_slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let slot = match *next {
            Some(t) if t > now => t,
            _ => now,
        };
        *next = Some(slot + self.min_interval);
        slot
    }

    /// Number of requests let through so far
    pub fn acquired(&self) -> u64 {
        self.acquired.load(Ordering::Relaxed)
    }
}
